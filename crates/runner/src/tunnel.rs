//! Tunnel lifecycle
//!
//! [`TunnelManager`] brackets a run with an optional secure tunnel. The
//! process itself is behind [`TunnelDriver`]; [`ProcessTunnelDriver`] runs the
//! Sauce Connect binary.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use saucejs_common::{AccessKey, LogMethod, Notification, NotificationSink, RunConfiguration, TunnelLogEvent};

use crate::error::{RunError, RunResult};

/// Line Sauce Connect prints once the tunnel accepts traffic
pub const READY_MARKER: &str = "Sauce Connect is up";

/// How long `close` waits for buffered log lines to drain
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait TunnelDriver: Send {
    /// Start the tunnel, streaming its log lines into `events`.
    /// Resolves to `true` once the tunnel is ready, `false` if it could not be established.
    async fn start(&mut self, events: mpsc::UnboundedSender<TunnelLogEvent>) -> RunResult<bool>;

    async fn stop(&mut self) -> RunResult<()>;
}

/// Opens and closes the run's tunnel, reporting progress to the sink
pub struct TunnelManager {
    sink: Arc<dyn NotificationSink>,
}

/// An opened tunnel; consumed by [`TunnelManager::close`]
pub struct TunnelHandle {
    inner: Option<OpenTunnel>,
}

struct OpenTunnel {
    identifier: String,
    driver: Box<dyn TunnelDriver>,
    forwarder: JoinHandle<()>,
}

impl TunnelHandle {
    /// Handle for a run that does not use a tunnel
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// Identifier jobs must carry; `None` when the run is untunneled
    pub fn identifier(&self) -> Option<&str> {
        self.inner.as_ref().map(|open| open.identifier.as_str())
    }
}

impl Drop for TunnelHandle {
    fn drop(&mut self) {
        if let Some(open) = &self.inner {
            warn!("Tunnel {} dropped without being closed", open.identifier);
            open.forwarder.abort();
        }
    }
}

impl TunnelManager {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink }
    }

    /// Start the tunnel if the run is tunnelled; otherwise return a disabled handle
    pub async fn open(
        &self,
        config: &RunConfiguration,
        mut driver: Box<dyn TunnelDriver>,
    ) -> RunResult<TunnelHandle> {
        if !config.tunneled {
            return Ok(TunnelHandle::disabled());
        }

        self.sink.notify(Notification::TunnelOpen);
        info!("Opening tunnel {}", config.tunnel_identifier);

        let (tx, mut rx) = mpsc::unbounded_channel::<TunnelLogEvent>();
        let sink = self.sink.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                sink.notify(Notification::TunnelEvent(event));
            }
        });

        let started = driver.start(tx).await;
        let failure = match started {
            Ok(true) => {
                self.sink.notify(Notification::TunnelOpened);
                info!("Tunnel {} is up", config.tunnel_identifier);
                return Ok(TunnelHandle {
                    inner: Some(OpenTunnel {
                        identifier: config.tunnel_identifier.clone(),
                        driver,
                        forwarder,
                    }),
                });
            }
            Ok(false) => "the tunnel did not become ready".to_string(),
            Err(e) => e.to_string(),
        };

        // The process may be half-started; never leave it behind.
        if let Err(e) = driver.stop().await {
            warn!("Failed to stop tunnel after start failure: {}", e);
        }
        drain(forwarder).await;
        Err(RunError::TunnelStart(failure))
    }

    /// Stop the tunnel; a disabled handle is a no-op
    pub async fn close(&self, mut handle: TunnelHandle) -> RunResult<()> {
        let Some(mut open) = handle.inner.take() else {
            return Ok(());
        };

        self.sink.notify(Notification::TunnelClose);
        info!("Closing tunnel {}", open.identifier);

        let result = open.driver.stop().await;
        drain(open.forwarder).await;
        result
    }
}

async fn drain(forwarder: JoinHandle<()>) {
    let abort = forwarder.abort_handle();
    if tokio::time::timeout(DRAIN_TIMEOUT, forwarder).await.is_err() {
        debug!("Tunnel log forwarder still busy after {:?}; abandoning it", DRAIN_TIMEOUT);
        abort.abort();
    }
}

/// Settings for running the Sauce Connect binary
#[derive(Debug, Clone)]
pub struct ProcessTunnelConfig {
    pub binary: PathBuf,
    pub username: String,
    pub access_key: AccessKey,
    pub identifier: String,
    pub extra_args: Vec<String>,
    pub ready_timeout: Duration,
    pub stop_grace: Duration,
}

impl ProcessTunnelConfig {
    pub fn from_run(config: &RunConfiguration, binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            username: config.credentials.username.clone(),
            access_key: config.credentials.access_key.clone(),
            identifier: config.tunnel_identifier.clone(),
            extra_args: config.tunnel_args.clone(),
            ready_timeout: Duration::from_secs(120),
            stop_grace: Duration::from_secs(5),
        }
    }

    /// Command-line arguments; the access key travels in the environment instead
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "--user".to_string(),
            self.username.clone(),
            "--tunnel-identifier".to_string(),
            self.identifier.clone(),
            "--se-port".to_string(),
            "0".to_string(),
        ];
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

/// [`TunnelDriver`] that spawns Sauce Connect as a child process
pub struct ProcessTunnelDriver {
    config: ProcessTunnelConfig,
    child: Option<Child>,
}

impl ProcessTunnelDriver {
    pub fn new(config: ProcessTunnelConfig) -> Self {
        Self { config, child: None }
    }
}

#[async_trait]
impl TunnelDriver for ProcessTunnelDriver {
    async fn start(&mut self, events: mpsc::UnboundedSender<TunnelLogEvent>) -> RunResult<bool> {
        info!("Spawning {}", self.config.binary.display());

        let mut child = Command::new(&self.config.binary)
            .args(self.config.args())
            .env("SAUCE_USERNAME", &self.config.username)
            .env("SAUCE_ACCESS_KEY", self.config.access_key.expose())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                RunError::TunnelStart(format!("failed to spawn {}: {}", self.config.binary.display(), e))
            })?;

        let (ready_tx, ready_rx) = oneshot::channel();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, events.clone(), LogMethod::Writeln, true, Some(ready_tx)));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, events, LogMethod::Error, false, None));
        }

        let ready = tokio::select! {
            ready = ready_rx => ready.is_ok(),
            status = child.wait() => {
                warn!("Tunnel process exited before it was ready: {:?}", status);
                false
            }
            _ = tokio::time::sleep(self.config.ready_timeout) => {
                warn!("Tunnel not ready after {:?}", self.config.ready_timeout);
                false
            }
        };

        self.child = Some(child);
        Ok(ready)
    }

    async fn stop(&mut self) -> RunResult<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        info!("Stopping tunnel (pid: {:?})", child.id());

        if let Some(status) = child.try_wait()? {
            debug!("Tunnel already exited: {}", status);
            return Ok(());
        }

        // Try graceful shutdown first
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = child.id() {
                if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok() {
                    match tokio::time::timeout(self.config.stop_grace, child.wait()).await {
                        Ok(status) => {
                            debug!("Tunnel exited: {}", status?);
                            return Ok(());
                        }
                        Err(_) => warn!("Tunnel ignored SIGTERM for {:?}; killing it", self.config.stop_grace),
                    }
                }
            }
        }

        child.kill().await?;
        Ok(())
    }
}

async fn forward_lines<R>(
    reader: R,
    events: mpsc::UnboundedSender<TunnelLogEvent>,
    method: LogMethod,
    verbose: bool,
    mut ready: Option<oneshot::Sender<()>>,
) where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.contains(READY_MARKER) {
            if let Some(ready) = ready.take() {
                let _ = ready.send(());
            }
        }
        let _ = events.send(TunnelLogEvent {
            verbose,
            method,
            text: line,
        });
    }
}
