//! In-memory Sauce Labs API and tunnel for integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use saucejs_common::{BrowserSpec, Credentials, LogMethod, Notification, RunConfiguration, TunnelLogEvent};
use saucejs_runner::{ApiRequest, Method, RunError, RunResult, SauceApi, Transport, TunnelDriver};

pub const PAGE: &str = "http://127.0.0.1:9999/test/index.html";

/// How the fake API answers for one browser
#[derive(Debug, Clone)]
pub struct Script {
    /// Submission returns no task ids
    pub reject_submission: bool,
    /// Incomplete status answers before the job completes
    pub pending_polls: usize,
    /// Status polls failing at the transport level, before any other answer
    pub poll_errors: usize,
    /// Completion never carries a valid job id
    pub invalid_job_id: bool,
    /// Result per submission of this browser; the last one repeats
    pub results: Vec<Value>,
    pub status: Option<String>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            reject_submission: false,
            pending_polls: 0,
            poll_errors: 0,
            invalid_job_id: false,
            results: vec![json!({"passed": true})],
            status: None,
        }
    }
}

impl Script {
    pub fn failing() -> Self {
        Self {
            results: vec![json!({"passed": false})],
            ..Default::default()
        }
    }
}

struct Task {
    browser: String,
    script: Script,
    submission: usize,
    polls: usize,
    job_id: String,
}

#[derive(Default)]
struct State {
    scripts: HashMap<String, Script>,
    submissions: HashMap<String, usize>,
    tasks: HashMap<String, Task>,
    in_flight: usize,
    max_in_flight: usize,
}

/// Fake [`Transport`] scripted per browser name
#[derive(Default)]
pub struct FakeSauce {
    state: Mutex<State>,
    requests: Mutex<Vec<ApiRequest>>,
    next_task: AtomicUsize,
}

impl FakeSauce {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(self: Arc<Self>, browser: &str, script: Script) -> Arc<Self> {
        self.state.lock().scripts.insert(browser.to_string(), script);
        self
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    pub fn count(&self, method: Method, suffix: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.method == method && r.url.ends_with(suffix))
            .count()
    }

    pub fn submissions(&self) -> usize {
        self.count(Method::Post, "/js-tests")
    }

    /// Status polls issued for `browser`'s first submission
    pub fn polls_for(&self, browser: &str) -> usize {
        self.state
            .lock()
            .tasks
            .values()
            .filter(|t| t.submission == 0 && t.browser == browser)
            .map(|t| t.polls)
            .sum()
    }

    pub fn max_in_flight(&self) -> usize {
        self.state.lock().max_in_flight
    }

    fn submit(&self, body: &Value) -> Value {
        let browser = body["platforms"][0][1].as_str().unwrap_or_default().to_string();
        let mut state = self.state.lock();
        let script = state.scripts.get(&browser).cloned().unwrap_or_default();
        if script.reject_submission {
            return json!({"js tests": []});
        }

        let counter = state.submissions.entry(browser.clone()).or_insert(0);
        let submission = *counter;
        *counter += 1;

        let n = self.next_task.fetch_add(1, Ordering::SeqCst);
        let task_id = format!("task-{}", n);
        state.tasks.insert(
            task_id.clone(),
            Task {
                browser,
                script,
                submission,
                polls: 0,
                job_id: format!("{:032x}", n + 1),
            },
        );
        state.in_flight += 1;
        state.max_in_flight = state.max_in_flight.max(state.in_flight);
        json!({"js tests": [task_id]})
    }

    fn status(&self, body: &Value) -> RunResult<Value> {
        let task_id = body["js tests"][0].as_str().unwrap_or_default().to_string();
        let mut state = self.state.lock();
        let Some(task) = state.tasks.get_mut(&task_id) else {
            return Ok(json!({"completed": false, "js tests": []}));
        };
        task.polls += 1;

        if task.polls <= task.script.poll_errors {
            return Err(RunError::Transport {
                status: 502,
                body: "Bad Gateway".to_string(),
            });
        }
        if task.script.invalid_job_id {
            return Ok(json!({"completed": true, "js tests": [{"job_id": "job not ready"}]}));
        }
        if task.polls <= task.script.poll_errors + task.script.pending_polls {
            return Ok(json!({"completed": false, "js tests": [{"job_id": "job not ready"}]}));
        }

        let results = &task.script.results;
        let result = results[task.submission.min(results.len() - 1)].clone();
        let response = json!({
            "completed": true,
            "js tests": [{
                "job_id": task.job_id,
                "result": result,
                "status": task.script.status,
            }]
        });
        state.in_flight = state.in_flight.saturating_sub(1);
        Ok(response)
    }
}

#[async_trait]
impl Transport for FakeSauce {
    async fn request(&self, request: ApiRequest) -> RunResult<Value> {
        self.requests.lock().push(request.clone());
        let body = request.body.clone().unwrap_or(Value::Null);
        match request.method {
            Method::Post if request.url.ends_with("/js-tests") => Ok(self.submit(&body)),
            Method::Post if request.url.ends_with("/js-tests/status") => self.status(&body),
            Method::Put | Method::Delete if request.url.contains("/jobs/") => Ok(Value::Null),
            method => Err(RunError::Internal(format!("unexpected request {:?} {}", method, request.url))),
        }
    }
}

/// Tunnel driver that counts its starts and stops
pub struct FakeDriver {
    ready: bool,
    pub starts: Arc<AtomicUsize>,
    pub stops: Arc<AtomicUsize>,
}

impl FakeDriver {
    pub fn new(ready: bool) -> Self {
        Self {
            ready,
            starts: Arc::new(AtomicUsize::new(0)),
            stops: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl TunnelDriver for FakeDriver {
    async fn start(&mut self, events: mpsc::UnboundedSender<TunnelLogEvent>) -> RunResult<bool> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        let _ = events.send(TunnelLogEvent {
            verbose: true,
            method: LogMethod::Writeln,
            text: "Sauce Connect is up".to_string(),
        });
        Ok(self.ready)
    }

    async fn stop(&mut self) -> RunResult<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn browser(os: &str, name: &str, version: &str) -> BrowserSpec {
    BrowserSpec::Triple(os.to_string(), name.to_string(), version.to_string())
}

/// Untunnelled jasmine run of [`PAGE`] on the given browsers
pub fn config(browsers: Vec<BrowserSpec>) -> RunConfiguration {
    RunConfiguration {
        credentials: Credentials::new("builder", "key"),
        urls: vec![PAGE.to_string()],
        browsers,
        poll_interval: 1000,
        status_check_attempts: 5,
        tunneled: false,
        tunnel_identifier: "4242".to_string(),
        ..Default::default()
    }
}

pub fn api(transport: Arc<FakeSauce>) -> Arc<SauceApi> {
    Arc::new(SauceApi::new(
        transport,
        Credentials::new("builder", "key"),
        "https://saucelabs.test/rest/v1",
    ))
}

pub fn drain(rx: &mut mpsc::UnboundedReceiver<Notification>) -> Vec<Notification> {
    let mut out = Vec::new();
    while let Ok(n) = rx.try_recv() {
        out.push(n);
    }
    out
}
