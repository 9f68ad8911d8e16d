//! Batch orchestration over the URL × browser matrix

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use saucejs_common::{BrowserSpec, Notification, NotificationSink, Platform, RunConfiguration};

use crate::api::SauceApi;
use crate::error::{RunError, RunResult};
use crate::job::{Job, JobResult};

/// Ports Sauce Connect proxies for `localhost` pages
pub const SUPPORTED_PORTS: &[u16] = &[
    80, 443, 888, 2000, 2001, 2020, 2109, 2222, 2310, 3000, 3001, 3030, 3210, 3333, 4000, 4001,
    4040, 4321, 4502, 4503, 4567, 5000, 5001, 5050, 5555, 5432, 6000, 6001, 6060, 6666, 6543,
    7000, 7070, 7774, 7777, 8000, 8001, 8003, 8031, 8080, 8081, 8765, 8888, 9000, 9001, 9080,
    9090, 9876, 9877, 9999, 49221, 55001,
];

static EXPLICIT_PORT: Lazy<Regex> = Lazy::new(|| Regex::new(r":(\d+)/").expect("valid port pattern"));

/// True when the URL names a port the tunnel will not proxy
pub fn unsupported_port(url: &str) -> bool {
    let Some(port) = EXPLICIT_PORT.captures(url).and_then(|c| c.get(1)) else {
        return false;
    };
    match port.as_str().parse::<u16>() {
        Ok(port) => !SUPPORTED_PORTS.contains(&port),
        Err(_) => true,
    }
}

/// Outcome of one job within a batch
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub url: String,
    pub browser: BrowserSpec,
    pub platform: Platform,
    pub passed: bool,
    pub job_id: Option<String>,
    pub job_url: Option<String>,
    pub error: Option<String>,
}

/// Aggregate outcome of one batch attempt
#[derive(Debug, Clone, Serialize)]
pub struct RunVerdict {
    pub passed: bool,
    /// 1 for the first batch, incremented per retry
    pub attempt: u32,
    pub jobs: Vec<JobReport>,
}

impl RunVerdict {
    pub fn failed_jobs(&self) -> impl Iterator<Item = &JobReport> {
        self.jobs.iter().filter(|job| !job.passed)
    }
}

/// Called with each resolved job; returns the verdict to record for it
#[async_trait]
pub trait JobCompletionHook: Send + Sync {
    async fn on_job_complete(&self, job: &Job, result: &JobResult) -> RunResult<bool>;
}

/// Flips every verdict and records the flipped value on the remote job.
/// Used by suites whose pages are expected to fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct NegateVerdict;

#[async_trait]
impl JobCompletionHook for NegateVerdict {
    async fn on_job_complete(&self, job: &Job, result: &JobResult) -> RunResult<bool> {
        let passed = !result.passed;
        job.override_verdict(passed).await?;
        debug!("Job {} recorded as passed={}", result.job_id, passed);
        Ok(passed)
    }
}

/// Anything that can run the whole test batch once, retries included
#[async_trait]
pub trait Orchestrate: Send + Sync {
    async fn run(&self) -> RunResult<RunVerdict>;
}

/// Runs every URL on every browser, concurrently, with whole-run retries
pub struct TestRunner {
    config: Arc<RunConfiguration>,
    api: Arc<SauceApi>,
    sink: Arc<dyn NotificationSink>,
    hook: Option<Arc<dyn JobCompletionHook>>,
}

/// State shared by the tasks of one batch
struct Batch {
    config: Arc<RunConfiguration>,
    api: Arc<SauceApi>,
    sink: Arc<dyn NotificationSink>,
    hook: Option<Arc<dyn JobCompletionHook>>,
    throttle: Option<Arc<Semaphore>>,
    started: AtomicUsize,
    total: usize,
}

impl TestRunner {
    pub fn new(config: Arc<RunConfiguration>, api: Arc<SauceApi>, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            config,
            api,
            sink,
            hook: None,
        }
    }

    /// Install a hook that decides each resolved job's final verdict
    pub fn with_hook(mut self, hook: Arc<dyn JobCompletionHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Run the batch (with retries) and report only whether it passed
    pub async fn run_tests(&self) -> RunResult<bool> {
        Ok(self.run().await?.passed)
    }

    /// Run every job once, concurrently, and aggregate their verdicts
    pub async fn run_batch(&self, attempt: u32) -> RunVerdict {
        let matrix: Vec<(String, BrowserSpec)> = self
            .config
            .urls
            .iter()
            .flat_map(|url| self.config.browsers.iter().map(move |b| (url.clone(), b.clone())))
            .collect();

        info!("Attempt {}: starting {} job(s)", attempt, matrix.len());

        let batch = Arc::new(Batch {
            config: self.config.clone(),
            api: self.api.clone(),
            sink: self.sink.clone(),
            hook: self.hook.clone(),
            throttle: self.config.throttled.map(|n| Arc::new(Semaphore::new(n))),
            started: AtomicUsize::new(0),
            total: matrix.len(),
        });

        let handles: Vec<_> = matrix
            .iter()
            .cloned()
            .map(|(url, browser)| tokio::spawn(run_job(batch.clone(), url, browser)))
            .collect();

        let jobs: Vec<JobReport> = join_all(handles)
            .await
            .into_iter()
            .zip(matrix)
            .map(|(joined, (url, browser))| match joined {
                Ok(report) => report,
                Err(e) => {
                    error!("Job task for {} on {} died: {}", url, browser.platform(), e);
                    let report = failed_report(url, browser, format!("job task failed: {}", e));
                    batch.sink.notify(Notification::JobFailed {
                        url: report.url.clone(),
                        platform: report.platform.clone(),
                        error: report.error.clone().unwrap_or_default(),
                    });
                    report
                }
            })
            .collect();

        let passed = jobs.iter().all(|job| job.passed);
        info!(
            "Attempt {}: {}/{} job(s) passed",
            attempt,
            jobs.iter().filter(|job| job.passed).count(),
            jobs.len()
        );

        RunVerdict { passed, attempt, jobs }
    }
}

#[async_trait]
impl Orchestrate for TestRunner {
    async fn run(&self) -> RunResult<RunVerdict> {
        let mut attempt = 1;
        loop {
            let verdict = self.run_batch(attempt).await;
            if verdict.passed || attempt > self.config.max_retries {
                self.sink.notify(Notification::TestCompleted {
                    passed: verdict.passed,
                });
                return Ok(verdict);
            }

            warn!(
                "Attempt {} failed; retrying ({} of {})",
                attempt, attempt, self.config.max_retries
            );
            for job in verdict.failed_jobs() {
                self.sink.notify(Notification::Retrying {
                    url: job.url.clone(),
                    browser: job.browser.clone(),
                });
            }
            attempt += 1;
        }
    }
}

fn failed_report(url: String, browser: BrowserSpec, error: String) -> JobReport {
    JobReport {
        platform: browser.platform(),
        url,
        browser,
        passed: false,
        job_id: None,
        job_url: None,
        error: Some(error),
    }
}

async fn run_job(batch: Arc<Batch>, url: String, browser: BrowserSpec) -> JobReport {
    match execute(&batch, &url, &browser).await {
        Ok((result, passed)) => {
            let tunnel_id = batch.config.tunneled.then(|| batch.config.tunnel_identifier.clone());
            batch.sink.notify(Notification::JobCompleted {
                url: url.clone(),
                platform: result.platform.clone(),
                passed,
                job_url: Some(result.job_url.clone()),
                tunnel_id,
                port_warning: batch.config.tunneled && unsupported_port(&url),
            });
            JobReport {
                url,
                browser,
                platform: result.platform,
                passed,
                job_id: Some(result.job_id),
                job_url: Some(result.job_url),
                error: None,
            }
        }
        Err(e) => {
            warn!("Job for {} on {} failed: {}", url, browser.platform(), e);
            let report = failed_report(url, browser, e.to_string());
            batch.sink.notify(Notification::JobFailed {
                url: report.url.clone(),
                platform: report.platform.clone(),
                error: e.to_string(),
            });
            report
        }
    }
}

async fn execute(batch: &Batch, url: &str, browser: &BrowserSpec) -> RunResult<(JobResult, bool)> {
    let _permit = match &batch.throttle {
        Some(throttle) => Some(
            throttle
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| RunError::Internal(format!("job throttle closed: {}", e)))?,
        ),
        None => None,
    };

    let mut job = Job::new(batch.api.clone(), &batch.config, url, browser);
    job.start().await?;

    let started = batch.started.fetch_add(1, Ordering::SeqCst) + 1;
    batch.sink.notify(Notification::JobStarted {
        started_jobs: started,
        number_of_jobs: batch.total,
    });

    let result = job.get_result().await?;
    let passed = match &batch.hook {
        Some(hook) => hook.on_job_complete(&job, &result).await?,
        None => result.passed,
    };
    Ok((result, passed))
}
