//! Core types for saucejs

use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

use crate::error::Error;

/// Unit-test framework whose result dialect a test page reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Framework {
    Jasmine,
    Qunit,
    Mocha,
    YuiTest,
    Custom,
}

impl Framework {
    pub const ALL: [Framework; 5] = [
        Framework::Jasmine,
        Framework::Qunit,
        Framework::Mocha,
        Framework::YuiTest,
        Framework::Custom,
    ];

    /// Identifier sent to the REST API
    pub fn as_str(&self) -> &'static str {
        match self {
            Framework::Jasmine => "jasmine",
            Framework::Qunit => "qunit",
            Framework::Mocha => "mocha",
            Framework::YuiTest => "YUI Test",
            Framework::Custom => "custom",
        }
    }
}

impl FromStr for Framework {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "jasmine" => Ok(Framework::Jasmine),
            "qunit" => Ok(Framework::Qunit),
            "mocha" => Ok(Framework::Mocha),
            // "yui" is the short name used on the command line
            "YUI Test" | "yui" => Ok(Framework::YuiTest),
            "custom" => Ok(Framework::Custom),
            other => Err(Error::UnknownFramework(other.to_string())),
        }
    }
}

impl TryFrom<String> for Framework {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Framework> for String {
    fn from(framework: Framework) -> Self {
        framework.as_str().to_string()
    }
}

impl std::fmt::Display for Framework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who can see a job on the Sauce Labs dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    #[serde(rename = "public")]
    Public,
    #[serde(rename = "public restricted")]
    PublicRestricted,
    #[serde(rename = "share")]
    Share,
    #[serde(rename = "team")]
    Team,
    #[serde(rename = "private")]
    Private,
}

impl Default for Visibility {
    fn default() -> Self {
        Self::Team
    }
}

/// Operating system, browser name and browser version of one remote worker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[String; 3]", into = "[String; 3]")]
pub struct Platform {
    pub os: String,
    pub browser: String,
    pub version: String,
}

impl Platform {
    pub fn new(os: impl Into<String>, browser: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            browser: browser.into(),
            version: version.into(),
        }
    }
}

impl From<[String; 3]> for Platform {
    fn from([os, browser, version]: [String; 3]) -> Self {
        Self { os, browser, version }
    }
}

impl From<Platform> for [String; 3] {
    fn from(platform: Platform) -> Self {
        [platform.os, platform.browser, platform.version]
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<&str> = [&self.os, &self.browser, &self.version]
            .into_iter()
            .map(String::as_str)
            .filter(|part| !part.is_empty())
            .collect();
        if parts.is_empty() {
            f.write_str("(default platform)")
        } else {
            f.write_str(&parts.join(" "))
        }
    }
}

/// One entry of the requested browser matrix
///
/// Accepts either `["Windows 7", "chrome", "31"]` (the version may be left
/// out) or a record such as
/// `{ platform = "Linux", browserName = "firefox", version = "45", tags = ["ff"] }`.
/// Keys a record does not recognise are kept as extra capabilities and merged
/// into that job's submission payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BrowserSpec {
    Triple(String, String, String),
    Record(BrowserRecord),
}

#[derive(Deserialize)]
struct LenientString(#[serde(deserialize_with = "lenient_string")] String);

#[derive(Deserialize)]
#[serde(untagged)]
enum BrowserSpecRepr {
    Positional(Vec<LenientString>),
    Record(BrowserRecord),
}

impl<'de> Deserialize<'de> for BrowserSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match BrowserSpecRepr::deserialize(deserializer)? {
            BrowserSpecRepr::Record(record) => Ok(BrowserSpec::Record(record)),
            BrowserSpecRepr::Positional(parts) => {
                let len = parts.len();
                let mut parts = parts.into_iter().map(|LenientString(part)| part);
                match (parts.next(), parts.next(), parts.next(), len) {
                    (Some(os), Some(browser), version, 2 | 3) => {
                        Ok(BrowserSpec::Triple(os, browser, version.unwrap_or_default()))
                    }
                    _ => Err(serde::de::Error::invalid_length(
                        len,
                        &"[os, browser] or [os, browser, version]",
                    )),
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrowserRecord {
    #[serde(default)]
    pub platform: String,

    #[serde(default, rename = "browserName")]
    pub browser_name: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,

    #[serde(default, rename = "public", skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,

    #[serde(flatten)]
    pub capabilities: serde_json::Map<String, serde_json::Value>,
}

impl Default for BrowserSpec {
    fn default() -> Self {
        BrowserSpec::Record(BrowserRecord::default())
    }
}

impl BrowserSpec {
    pub fn platform(&self) -> Platform {
        match self {
            BrowserSpec::Triple(os, browser, version) => Platform::new(os, browser, version),
            BrowserSpec::Record(record) => {
                Platform::new(&record.platform, &record.browser_name, &record.version)
            }
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            BrowserSpec::Record(record) => record.name.as_deref(),
            BrowserSpec::Triple(..) => None,
        }
    }

    pub fn tags(&self) -> Option<&[String]> {
        match self {
            BrowserSpec::Record(record) => record.tags.as_deref(),
            BrowserSpec::Triple(..) => None,
        }
    }

    pub fn visibility(&self) -> Option<Visibility> {
        match self {
            BrowserSpec::Record(record) => record.visibility,
            BrowserSpec::Triple(..) => None,
        }
    }

    pub fn capabilities(&self) -> Option<&serde_json::Map<String, serde_json::Value>> {
        match self {
            BrowserSpec::Record(record) if !record.capabilities.is_empty() => {
                Some(&record.capabilities)
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for BrowserSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{}", self.platform()),
        }
    }
}

/// Accepts `"45"`, `45` or `45.0` where a version string is expected
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Lenient::deserialize(deserializer)? {
        Lenient::Text(s) => s,
        Lenient::Int(i) => i.to_string(),
        Lenient::Float(f) => f.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framework_round_trips_api_identifiers() {
        for framework in Framework::ALL {
            let parsed: Framework = framework.as_str().parse().unwrap();
            assert_eq!(parsed, framework);
        }
        assert_eq!("yui".parse::<Framework>().unwrap(), Framework::YuiTest);
    }

    #[test]
    fn test_unknown_framework_is_rejected() {
        let err = "tape".parse::<Framework>().unwrap_err();
        assert!(matches!(err, Error::UnknownFramework(name) if name == "tape"));

        let from_json: Result<Framework, _> = serde_json::from_str("\"tape\"");
        assert!(from_json.is_err());
    }

    #[test]
    fn test_browser_triple_and_record() {
        let browsers: Vec<BrowserSpec> = serde_json::from_str(
            r#"[
                ["Windows 7", "chrome", ""],
                {"platform": "Linux", "browserName": "firefox", "version": 45,
                 "name": "ff-smoke", "public": "private", "screenResolution": "1280x1024"}
            ]"#,
        )
        .unwrap();

        assert_eq!(browsers[0].platform(), Platform::new("Windows 7", "chrome", ""));
        assert_eq!(browsers[0].name(), None);
        assert!(browsers[0].capabilities().is_none());

        assert_eq!(browsers[1].platform(), Platform::new("Linux", "firefox", "45"));
        assert_eq!(browsers[1].name(), Some("ff-smoke"));
        assert_eq!(browsers[1].visibility(), Some(Visibility::Private));
        let caps = browsers[1].capabilities().unwrap();
        assert_eq!(caps["screenResolution"], "1280x1024");
    }

    #[test]
    fn test_browser_pair_without_version() {
        let from_json: Vec<BrowserSpec> =
            serde_json::from_str(r#"[["Linux", "chrome"], ["OS X 10.9", "safari", 7]]"#).unwrap();
        assert_eq!(from_json[0], BrowserSpec::Triple("Linux".into(), "chrome".into(), "".into()));
        assert_eq!(from_json[1].platform(), Platform::new("OS X 10.9", "safari", "7"));

        #[derive(Deserialize)]
        struct Matrix {
            browsers: Vec<BrowserSpec>,
        }
        let from_toml: Matrix = toml::from_str(r#"browsers = [["Linux", "chrome"]]"#).unwrap();
        let from_yaml: Matrix = serde_yaml::from_str("browsers:\n  - [Linux, chrome]\n").unwrap();
        assert_eq!(from_toml.browsers, from_json[..1]);
        assert_eq!(from_yaml.browsers, from_json[..1]);
    }

    #[test]
    fn test_browser_list_of_wrong_length_is_rejected() {
        assert!(serde_json::from_str::<BrowserSpec>(r#"["Linux"]"#).is_err());
        assert!(serde_json::from_str::<BrowserSpec>(r#"["Linux", "chrome", "45", "extra"]"#).is_err());
    }

    #[test]
    fn test_empty_record_is_default_platform() {
        let spec: BrowserSpec = serde_json::from_str("{}").unwrap();
        assert_eq!(spec, BrowserSpec::default());
        assert_eq!(spec.platform().to_string(), "(default platform)");
    }

    #[test]
    fn test_platform_serializes_as_array() {
        let platform = Platform::new("OS X 10.11", "safari", "9");
        let json = serde_json::to_value(&platform).unwrap();
        assert_eq!(json, serde_json::json!(["OS X 10.11", "safari", "9"]));
        assert_eq!(platform.to_string(), "OS X 10.11 safari 9");
    }
}
