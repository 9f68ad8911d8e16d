//! Configuration resolution: file, then environment, then flags

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::debug;

use saucejs_common::{AccessKey, BrowserSpec, Framework, RunConfiguration, Visibility};

/// Account options shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct AccountArgs {
    /// Configuration file (.toml, .yaml or .yml)
    #[arg(short, long, global = true, env = "SAUCEJS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Sauce Labs user name
    #[arg(long, global = true, env = "SAUCE_USERNAME")]
    pub username: Option<String>,

    /// Sauce Labs access key
    #[arg(long, global = true, env = "SAUCE_ACCESS_KEY", hide_env_values = true)]
    pub access_key: Option<String>,

    /// REST API root
    #[arg(long, global = true)]
    pub api_base: Option<String>,
}

/// Options describing one test run
#[derive(Args, Debug, Clone, Default)]
pub struct RunOptions {
    /// Test framework reporting the results
    #[arg(short, long)]
    pub framework: Option<Framework>,

    /// Test page URL (repeatable)
    #[arg(short, long = "url")]
    pub urls: Vec<String>,

    /// Browser as "os,browser,version" or a JSON record (repeatable)
    #[arg(short, long = "browser", value_parser = parse_browser)]
    pub browsers: Vec<BrowserSpec>,

    /// Build label
    #[arg(long)]
    pub build: Option<String>,

    /// Job tag (repeatable)
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Job display name
    #[arg(long)]
    pub name: Option<String>,

    /// Dashboard visibility: public, public restricted, share, team, private
    #[arg(long, value_parser = parse_visibility)]
    pub visibility: Option<Visibility>,

    /// Milliseconds between status polls
    #[arg(long)]
    pub poll_interval: Option<u64>,

    /// Status polls per job before giving up; 0 polls until completion
    #[arg(long, allow_negative_numbers = true)]
    pub status_check_attempts: Option<i64>,

    /// Whole-run retries after a failed attempt
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Maximum jobs in flight
    #[arg(long)]
    pub throttled: Option<usize>,

    /// Run without a Sauce Connect tunnel
    #[arg(long)]
    pub no_tunnel: bool,

    /// Tunnel identifier shared by the tunnel and every job
    #[arg(long)]
    pub tunnel_identifier: Option<String>,

    /// Extra argument for the tunnel binary (repeatable)
    #[arg(long = "tunnel-arg", allow_hyphen_values = true)]
    pub tunnel_args: Vec<String>,
}

/// Build the run configuration: file values, overridden by the environment
/// and flags, then validated
pub fn resolve(account: &AccountArgs, run: &RunOptions) -> Result<RunConfiguration> {
    let mut config = load_file(account.config.as_deref())?;
    apply_account(&mut config, account);

    if let Some(framework) = run.framework {
        config.framework = framework;
    }
    if !run.urls.is_empty() {
        config.urls = run.urls.clone();
    }
    if !run.browsers.is_empty() {
        config.browsers = run.browsers.clone();
    }
    if let Some(build) = &run.build {
        config.build = Some(build.clone());
    }
    if !run.tags.is_empty() {
        config.tags = run.tags.clone();
    }
    if let Some(name) = &run.name {
        config.test_name = name.clone();
    }
    if let Some(visibility) = run.visibility {
        config.visibility = visibility;
    }
    if let Some(interval) = run.poll_interval {
        config.poll_interval = interval;
    }
    if let Some(attempts) = run.status_check_attempts {
        config.status_check_attempts = attempts;
    }
    if let Some(retries) = run.max_retries {
        config.max_retries = retries;
    }
    if let Some(throttled) = run.throttled {
        config.throttled = Some(throttled);
    }
    if run.no_tunnel {
        config.tunneled = false;
    }
    if let Some(identifier) = &run.tunnel_identifier {
        config.tunnel_identifier = identifier.clone();
    }
    if !run.tunnel_args.is_empty() {
        config.tunnel_args = run.tunnel_args.clone();
    }

    config.validate().context("invalid run configuration")?;
    debug!(
        "Resolved {} job(s) for {} as {}",
        config.job_count(),
        config.framework,
        config.credentials.username
    );
    Ok(config)
}

/// Account-only resolution for the job administration commands
pub fn resolve_account(account: &AccountArgs) -> Result<RunConfiguration> {
    let mut config = load_file(account.config.as_deref())?;
    apply_account(&mut config, account);

    if config.credentials.username.is_empty() || config.credentials.access_key.is_empty() {
        bail!("Sauce Labs credentials are required (--username/--access-key or SAUCE_USERNAME/SAUCE_ACCESS_KEY)");
    }
    Ok(config)
}

fn load_file(path: Option<&Path>) -> Result<RunConfiguration> {
    match path {
        Some(path) => RunConfiguration::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => Ok(RunConfiguration::default()),
    }
}

fn apply_account(config: &mut RunConfiguration, account: &AccountArgs) {
    if let Some(username) = &account.username {
        config.credentials.username = username.clone();
    }
    if let Some(key) = &account.access_key {
        config.credentials.access_key = AccessKey::new(key.clone());
    }
    if let Some(api_base) = &account.api_base {
        config.api_base = api_base.clone();
    }
}

/// `os,browser,version` (version optional) or a JSON browser record
pub fn parse_browser(raw: &str) -> Result<BrowserSpec> {
    let raw = raw.trim();
    if raw.starts_with('{') || raw.starts_with('[') {
        return serde_json::from_str(raw).with_context(|| format!("invalid browser JSON: {}", raw));
    }

    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    match parts.as_slice() {
        [os, browser] => Ok(BrowserSpec::Triple(os.to_string(), browser.to_string(), String::new())),
        [os, browser, version] => Ok(BrowserSpec::Triple(
            os.to_string(),
            browser.to_string(),
            version.to_string(),
        )),
        _ => bail!("expected \"os,browser[,version]\", got {:?}", raw),
    }
}

pub fn parse_visibility(raw: &str) -> Result<Visibility> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .with_context(|| format!("unknown visibility {:?}", raw))
}
