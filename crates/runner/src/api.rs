//! Typed wrapper over the Sauce Labs JS unit-test endpoints

use std::sync::Arc;

use serde_json::{json, Value};

use saucejs_common::Credentials;

use crate::error::RunResult;
use crate::transport::{ApiRequest, Method, Transport};

/// Dashboard page for a finished job
pub fn job_page_url(job_id: &str) -> String {
    format!("https://saucelabs.com/tests/{}", job_id)
}

/// Client for one account's js-tests and jobs resources
#[derive(Clone)]
pub struct SauceApi {
    transport: Arc<dyn Transport>,
    credentials: Credentials,
    base_url: String,
}

impl SauceApi {
    pub fn new(transport: Arc<dyn Transport>, credentials: Credentials, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            credentials,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn username(&self) -> &str {
        &self.credentials.username
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.credentials.username, path)
    }

    async fn call(&self, method: Method, path: &str, body: Option<Value>) -> RunResult<Value> {
        self.transport
            .request(ApiRequest {
                method,
                url: self.url(path),
                auth: self.credentials.clone(),
                body,
            })
            .await
    }

    /// `POST /js-tests`
    pub async fn submit_js_tests(&self, payload: Value) -> RunResult<Value> {
        self.call(Method::Post, "js-tests", Some(payload)).await
    }

    /// `POST /js-tests/status`
    pub async fn js_tests_status(&self, task_id: &str) -> RunResult<Value> {
        self.call(
            Method::Post,
            "js-tests/status",
            Some(json!({ "js tests": [task_id] })),
        )
        .await
    }

    /// `PUT /jobs/{id}/stop`
    pub async fn stop_job(&self, job_id: &str) -> RunResult<Value> {
        self.call(Method::Put, &format!("jobs/{}/stop", job_id), None).await
    }

    /// `DELETE /jobs/{id}`
    pub async fn delete_job(&self, job_id: &str) -> RunResult<Value> {
        self.call(Method::Delete, &format!("jobs/{}", job_id), None).await
    }

    /// `PUT /jobs/{id}` with `{passed}`
    pub async fn set_job_passed(&self, job_id: &str, passed: bool) -> RunResult<Value> {
        self.call(
            Method::Put,
            &format!("jobs/{}", job_id),
            Some(json!({ "passed": passed })),
        )
        .await
    }
}

impl std::fmt::Debug for SauceApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SauceApi")
            .field("credentials", &self.credentials)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
