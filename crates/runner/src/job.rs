//! A single remote test job
//!
//! A job walks `Created -> Submitted -> Polling -> Resolved -> Interpreted`.
//! Submission fails with [`RunError::Submission`], polling with
//! [`RunError::PollTimeout`] and interpretation with [`RunError::TestError`].

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use saucejs_common::{BrowserSpec, Framework, Platform, RunConfiguration, Visibility};

use crate::api::{job_page_url, SauceApi};
use crate::error::{RunError, RunResult};
use crate::interpreter::interpret;

/// Remote job ids are 32 lowercase alphanumerics
static JOB_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9]{32}$").expect("valid job id pattern"));

pub fn is_valid_job_id(id: &str) -> bool {
    JOB_ID.is_match(id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Created,
    Submitted,
    Polling,
    Resolved,
    Interpreted,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Created => write!(f, "created"),
            JobState::Submitted => write!(f, "submitted"),
            JobState::Polling => write!(f, "polling"),
            JobState::Resolved => write!(f, "resolved"),
            JobState::Interpreted => write!(f, "interpreted"),
        }
    }
}

/// Status record of a completed job, as returned by `js-tests/status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: String,

    /// Framework-specific result payload; `None` when the API dropped it
    #[serde(default)]
    pub result: Option<Value>,

    #[serde(default)]
    pub status: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Interpreted outcome of one job
#[derive(Debug, Clone, Serialize)]
pub struct JobResult {
    pub job_id: String,
    pub job_url: String,
    pub test_page_url: String,
    pub platform: Platform,
    pub passed: bool,
    pub status: JobStatus,
}

pub struct Job {
    api: Arc<SauceApi>,
    state: JobState,
    task_id: Option<String>,
    id: Option<String>,
    url: String,
    platform: Platform,
    framework: Framework,
    build: Option<String>,
    visibility: Visibility,
    tags: Vec<String>,
    name: String,
    poll_interval: Duration,
    status_check_attempts: i64,
    sauce_config: Map<String, Value>,
    capabilities: Map<String, Value>,
    tunnel_identifier: Option<String>,
}

impl Job {
    /// Build a job for one page on one browser; per-browser overrides win
    pub fn new(api: Arc<SauceApi>, config: &RunConfiguration, url: &str, browser: &BrowserSpec) -> Self {
        Self {
            api,
            state: JobState::Created,
            task_id: None,
            id: None,
            url: url.to_string(),
            platform: browser.platform(),
            framework: config.framework,
            build: config.build.clone(),
            visibility: browser.visibility().unwrap_or(config.visibility),
            tags: browser
                .tags()
                .map(<[String]>::to_vec)
                .unwrap_or_else(|| config.tags.clone()),
            name: browser
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| config.test_name.clone()),
            poll_interval: config.poll_interval(),
            status_check_attempts: config.status_check_attempts,
            sauce_config: config.sauce_config.clone(),
            capabilities: browser.capabilities().cloned().unwrap_or_default(),
            tunnel_identifier: config.tunneled.then(|| config.tunnel_identifier.clone()),
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref()
    }

    /// Remote job id, set once polling observed a completed job
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Submission body for `POST /js-tests`
    pub fn payload(&self) -> Value {
        let mut payload = json!({
            "platforms": [self.platform],
            "url": self.url,
            "framework": self.framework,
            "public": self.visibility,
            "tags": self.tags,
            "name": self.name,
        });
        if let Some(build) = &self.build {
            payload["build"] = json!(build);
        }

        deep_merge(&mut payload, &self.sauce_config);
        deep_merge(&mut payload, &self.capabilities);

        if let Some(tunnel_identifier) = &self.tunnel_identifier {
            payload["tunnel-identifier"] = json!(tunnel_identifier);
        }
        payload
    }

    /// Submit the job and record its task id
    pub async fn start(&mut self) -> RunResult<()> {
        if self.status_check_attempts <= 0 {
            warn!(
                "Job for {} on {} will poll until it completes (no attempt limit)",
                self.url, self.platform
            );
        }

        let body = self.api.submit_js_tests(self.payload()).await?;
        let task_id = body
            .get("js tests")
            .and_then(Value::as_array)
            .and_then(|ids| ids.first())
            .and_then(id_string)
            .ok_or_else(|| {
                RunError::Submission(format!("no task id returned for {} on {}", self.url, self.platform))
            })?;

        info!("Started {} on {} (task {})", self.url, self.platform, task_id);
        self.task_id = Some(task_id);
        self.state = JobState::Submitted;
        Ok(())
    }

    /// Poll until the job completes or the attempt budget runs out
    pub async fn complete(&mut self) -> RunResult<JobStatus> {
        let task_id = self
            .task_id
            .clone()
            .ok_or_else(|| RunError::Submission(format!("job for {} was never started", self.url)))?;
        let limit = u64::try_from(self.status_check_attempts).ok().filter(|n| *n > 0);

        self.state = JobState::Polling;
        let mut attempts: u64 = 0;

        loop {
            attempts += 1;

            match self.api.js_tests_status(&task_id).await {
                Ok(body) => {
                    if let Some(status) = completed_status(&body) {
                        debug!("Task {} resolved to job {} after {} poll(s)", task_id, status.job_id, attempts);
                        self.id = Some(status.job_id.clone());
                        self.state = JobState::Resolved;
                        return Ok(status);
                    }
                    debug!("Task {} not complete yet (poll {})", task_id, attempts);
                }
                Err(e) => {
                    warn!("Status poll {} for task {} failed: {}", attempts, task_id, e);
                }
            }

            if limit.is_some_and(|limit| attempts >= limit) {
                return Err(RunError::PollTimeout {
                    attempts,
                    interval_ms: self.poll_interval.as_millis() as u64,
                });
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Wait for completion and interpret the result
    pub async fn get_result(&mut self) -> RunResult<JobResult> {
        let status = self.complete().await?;

        if status.status.as_deref() == Some("test error") {
            return Err(RunError::TestError(format!(
                "{} on {} (job {})",
                self.url, self.platform, status.job_id
            )));
        }

        // The API sets the result to null when it cannot store it, e.g. an oversized payload
        let passed = match &status.result {
            Some(raw) if !raw.is_null() => interpret(self.framework, raw),
            _ => {
                warn!("Job {} reported no result body; treating as failed", status.job_id);
                false
            }
        };

        self.state = JobState::Interpreted;
        Ok(JobResult {
            job_url: job_page_url(&status.job_id),
            job_id: status.job_id.clone(),
            test_page_url: self.url.clone(),
            platform: self.platform.clone(),
            passed,
            status,
        })
    }

    fn remote_id(&self) -> RunResult<&str> {
        self.id
            .as_deref()
            .ok_or_else(|| RunError::NotResolved(format!("{} on {}", self.url, self.platform)))
    }

    /// Stop the remote job
    pub async fn stop(&self) -> RunResult<()> {
        self.api.stop_job(self.remote_id()?).await.map(|_| ())
    }

    /// Delete the remote job
    pub async fn delete(&self) -> RunResult<()> {
        self.api.delete_job(self.remote_id()?).await.map(|_| ())
    }

    /// Overwrite the pass/fail status recorded for the remote job
    pub async fn override_verdict(&self, passed: bool) -> RunResult<()> {
        self.api.set_job_passed(self.remote_id()?, passed).await.map(|_| ())
    }
}

/// The status record if the response marks the job complete with a valid id
fn completed_status(body: &Value) -> Option<JobStatus> {
    if body.get("completed").and_then(Value::as_bool) != Some(true) {
        return None;
    }
    let entry = body.get("js tests")?.as_array()?.first()?;
    let job_id = entry.get("job_id")?.as_str()?;
    if !is_valid_job_id(job_id) {
        return None;
    }
    serde_json::from_value(entry.clone()).ok()
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Merge `source` into `target`: objects merge key by key, other values overwrite
fn deep_merge(target: &mut Value, source: &Map<String, Value>) {
    let Value::Object(target) = target else {
        return;
    };
    for (key, value) in source {
        if let (Some(existing), Value::Object(nested)) = (target.get_mut(key), value) {
            if existing.is_object() {
                deep_merge(existing, nested);
                continue;
            }
        }
        target.insert(key.clone(), value.clone());
    }
}
