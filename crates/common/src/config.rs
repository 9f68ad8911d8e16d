//! Run configuration
//!
//! A [`RunConfiguration`] is resolved once per invocation (file, then
//! environment, then command-line flags) and is read-only afterwards.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::credentials::Credentials;
use crate::error::{Error, Result};
use crate::types::{BrowserSpec, Framework, Visibility};

/// Default REST endpoint root
pub const DEFAULT_API_BASE: &str = "https://saucelabs.com/rest/v1";

/// Seconds between the Unix epoch and 2009-01-01T00:00:00Z
const TUNNEL_ID_EPOCH: i64 = 1_230_768_000;

/// Resolved options for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfiguration {
    #[serde(flatten)]
    pub credentials: Credentials,

    pub framework: Framework,

    /// Test pages to run; every page runs on every browser
    pub urls: Vec<String>,

    pub browsers: Vec<BrowserSpec>,

    pub build: Option<String>,

    pub tags: Vec<String>,

    #[serde(rename = "testname")]
    pub test_name: String,

    #[serde(rename = "public")]
    pub visibility: Visibility,

    /// Delay between status polls, in milliseconds
    pub poll_interval: u64,

    /// Maximum status polls per job; zero or negative polls until completion
    pub status_check_attempts: i64,

    pub tunneled: bool,

    #[serde(rename = "identifier")]
    pub tunnel_identifier: String,

    pub tunnel_args: Vec<String>,

    /// Extra keys deep-merged into every submission payload
    pub sauce_config: serde_json::Map<String, serde_json::Value>,

    /// Whole-batch resubmissions after a failed attempt
    pub max_retries: u32,

    /// Maximum jobs in flight at once (unlimited when absent)
    pub throttled: Option<usize>,

    pub api_base: String,
}

impl Default for RunConfiguration {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            framework: Framework::Jasmine,
            urls: Vec::new(),
            browsers: vec![BrowserSpec::default()],
            build: None,
            tags: Vec::new(),
            test_name: String::new(),
            visibility: Visibility::default(),
            poll_interval: 2_000,
            status_check_attempts: 90,
            tunneled: true,
            tunnel_identifier: default_tunnel_identifier(),
            tunnel_args: Vec::new(),
            sauce_config: serde_json::Map::new(),
            max_retries: 0,
            throttled: None,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

/// Tunnel identifier derived from the current time, unique per second
pub fn default_tunnel_identifier() -> String {
    (chrono::Utc::now().timestamp() - TUNNEL_ID_EPOCH).to_string()
}

impl RunConfiguration {
    /// Load a configuration file; `.yaml`/`.yml` is read as YAML, anything else as TOML.
    ///
    /// Top-level keys that name no option are rejected.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let is_yaml = path
            .extension()
            .map(|ext| ext == "yaml" || ext == "yml")
            .unwrap_or(false);

        let config = if is_yaml {
            let raw: serde_yaml::Value = serde_yaml::from_str(&content)?;
            if let Some(map) = raw.as_mapping() {
                reject_unknown_keys(map.keys().filter_map(|key| key.as_str()))?;
            }
            serde_yaml::from_value(raw)?
        } else {
            let raw: toml::Table = toml::from_str(&content)?;
            reject_unknown_keys(raw.keys().map(String::as_str))?;
            toml::Value::Table(raw).try_into()?
        };
        tracing::debug!("Loaded run configuration from {}", path.display());
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval)
    }

    /// Number of jobs one batch will launch
    pub fn job_count(&self) -> usize {
        self.urls.len() * self.browsers.len()
    }

    /// Reject configurations that cannot start a run
    pub fn validate(&self) -> Result<()> {
        if self.credentials.username.is_empty() {
            return Err(Error::InvalidConfig(
                "username is required (set SAUCE_USERNAME or --username)".to_string(),
            ));
        }
        if self.credentials.access_key.is_empty() {
            return Err(Error::InvalidConfig(
                "access key is required (set SAUCE_ACCESS_KEY)".to_string(),
            ));
        }
        if self.urls.is_empty() {
            return Err(Error::InvalidConfig(
                "at least one test page url is required (urls or --url)".to_string(),
            ));
        }
        if self.browsers.is_empty() {
            return Err(Error::InvalidConfig("at least one browser is required".to_string()));
        }
        if self.throttled == Some(0) {
            return Err(Error::InvalidConfig("throttled must be at least 1".to_string()));
        }
        if self.tunneled && self.tunnel_identifier.is_empty() {
            return Err(Error::InvalidConfig(
                "a tunnel identifier is required when tunneled".to_string(),
            ));
        }
        for url in &self.urls {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Error::InvalidConfig(format!(
                    "test page url must be http(s): {}",
                    url
                )));
            }
        }
        if !self.api_base.starts_with("http") {
            return Err(Error::InvalidConfig(format!("invalid api_base: {}", self.api_base)));
        }
        Ok(())
    }
}

/// Every key a configuration file may use is a key of the serialized defaults
fn reject_unknown_keys<'a>(keys: impl IntoIterator<Item = &'a str>) -> Result<()> {
    let known = serde_json::to_value(RunConfiguration::default())?;
    let unknown: Vec<&str> = keys.into_iter().filter(|key| known.get(*key).is_none()).collect();
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!(
            "unrecognized option(s): {}",
            unknown.join(", ")
        )))
    }
}
