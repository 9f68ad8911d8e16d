//! One run: tunnel up, orchestrate once, tunnel down

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, error, info, warn};

use saucejs_common::{NotificationSink, RunConfiguration};

use crate::error::{RunError, RunResult};
use crate::runner::{Orchestrate, RunVerdict};
use crate::tunnel::{TunnelDriver, TunnelManager};

pub struct RunCoordinator {
    config: Arc<RunConfiguration>,
    tunnels: TunnelManager,
}

impl RunCoordinator {
    pub fn new(config: Arc<RunConfiguration>, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            config,
            tunnels: TunnelManager::new(sink),
        }
    }

    /// Run the orchestrator exactly once inside the tunnel's lifetime.
    ///
    /// The tunnel is closed on every path out of the orchestrator, including
    /// errors and panics. A tunnel that fails to start aborts the run before
    /// any job is submitted.
    pub async fn run(
        &self,
        orchestrator: &dyn Orchestrate,
        driver: Box<dyn TunnelDriver>,
    ) -> RunResult<RunVerdict> {
        let handle = self.tunnels.open(&self.config, driver).await?;
        match handle.identifier() {
            Some(identifier) => info!("Jobs run through tunnel {}", identifier),
            None => debug!("Jobs run without a tunnel"),
        }

        let outcome = AssertUnwindSafe(orchestrator.run())
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                let message = panic_message(panic.as_ref());
                error!("Test run panicked: {}", message);
                Err(RunError::Internal(format!("test run panicked: {}", message)))
            });

        if let Err(e) = self.tunnels.close(handle).await {
            warn!("Failed to close tunnel cleanly: {}", e);
        }

        match &outcome {
            Ok(verdict) => info!(
                "Run finished after {} attempt(s): {}",
                verdict.attempt,
                if verdict.passed { "passed" } else { "failed" }
            ),
            Err(e) => error!("Run aborted: {}", e),
        }
        outcome
    }

    /// Same as [`run`](Self::run), reduced to the pass/fail bit
    pub async fn run_tests(
        &self,
        orchestrator: &dyn Orchestrate,
        driver: Box<dyn TunnelDriver>,
    ) -> RunResult<bool> {
        Ok(self.run(orchestrator, driver).await?.passed)
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
