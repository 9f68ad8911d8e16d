//! HTTP transport for the Sauce Labs REST API
//!
//! The core talks to the API only through [`Transport`]; [`ReqwestTransport`]
//! is the production implementation.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::trace;

use saucejs_common::Credentials;

use crate::error::{RunError, RunResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// One authenticated API call
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub auth: Credentials,
    pub body: Option<Value>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue the request and return the decoded JSON body (`Null` when empty)
    async fn request(&self, request: ApiRequest) -> RunResult<Value>;
}

/// [`Transport`] backed by a shared `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> RunResult<Self> {
        Self::with_timeout(Duration::from_secs(60))
    }

    pub fn with_timeout(timeout: Duration) -> RunResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("saucejs/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn request(&self, request: ApiRequest) -> RunResult<Value> {
        trace!("{:?} {}", request.method, request.url);

        let mut builder = self
            .client
            .request(request.method.into(), &request.url)
            .basic_auth(&request.auth.username, Some(request.auth.access_key.expose()));
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(RunError::Transport {
                status: status.as_u16(),
                body: text,
            });
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}
