//! Run Commands

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use tracing::info;

use saucejs_common::NotificationSink;
use saucejs_runner::{
    NegateVerdict, ProcessTunnelConfig, ProcessTunnelDriver, ReqwestTransport, RunCoordinator, SauceApi,
    TestRunner,
};

use crate::config::{self, AccountArgs, RunOptions};
use crate::output::{print_serialized, print_verdict, ConsoleReporter, OutputFormat};

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub options: RunOptions,

    /// Sauce Connect binary
    #[arg(long, default_value = "sc")]
    pub tunnel_binary: PathBuf,

    /// Seconds to wait for the tunnel to come up
    #[arg(long, default_value = "120")]
    pub tunnel_timeout: u64,

    /// Expect every page to fail: flip each verdict and record the flipped value
    #[arg(long)]
    pub negate: bool,
}

/// Run the configured batch; resolves to whether every job passed
pub async fn execute(args: RunArgs, account: &AccountArgs, format: OutputFormat, verbose: bool) -> Result<bool> {
    let config = Arc::new(config::resolve(account, &args.options)?);
    info!(
        "Running {} job(s) with {} (tunnel: {})",
        config.job_count(),
        config.framework,
        if config.tunneled { config.tunnel_identifier.as_str() } else { "off" }
    );

    let reporter: Arc<dyn NotificationSink> = Arc::new(ConsoleReporter::for_format(format, verbose));
    let transport = Arc::new(ReqwestTransport::new()?);
    let api = Arc::new(SauceApi::new(transport, config.credentials.clone(), config.api_base.as_str()));

    let mut runner = TestRunner::new(config.clone(), api, reporter.clone());
    if args.negate {
        runner = runner.with_hook(Arc::new(NegateVerdict));
    }

    let mut tunnel = ProcessTunnelConfig::from_run(&config, args.tunnel_binary);
    tunnel.ready_timeout = Duration::from_secs(args.tunnel_timeout);

    let coordinator = RunCoordinator::new(config.clone(), reporter);
    let verdict = coordinator
        .run(&runner, Box::new(ProcessTunnelDriver::new(tunnel)))
        .await?;

    print_verdict(&verdict, format)?;
    Ok(verdict.passed)
}

/// Print the resolved configuration; the access key is rendered hidden
pub fn show(options: RunOptions, account: &AccountArgs, format: OutputFormat) -> Result<()> {
    let config = config::resolve(account, &options)?;
    print_serialized(&config, format)
}
