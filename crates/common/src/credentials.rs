//! Sauce Labs account credentials
//!
//! The access key is wrapped in [`AccessKey`], which never renders its value:
//! `Debug`, `Display` and `Serialize` all produce `[hidden]`. The only way to
//! read it is [`AccessKey::expose`], used by the HTTP transport and the tunnel
//! driver when they authenticate.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Placeholder rendered wherever the key would otherwise be printed
pub const HIDDEN: &str = "[hidden]";

#[derive(Clone)]
pub struct AccessKey(SecretString);

impl AccessKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(SecretString::from(key.into()))
    }

    /// Read the raw key for authentication
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }
}

impl std::fmt::Debug for AccessKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccessKey({})", HIDDEN)
    }
}

impl std::fmt::Display for AccessKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(HIDDEN)
    }
}

impl Serialize for AccessKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(HIDDEN)
    }
}

impl<'de> Deserialize<'de> for AccessKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(AccessKey::new)
    }
}

/// Username and access key used for HTTP basic auth and the tunnel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,

    #[serde(default = "empty_key", rename = "key")]
    pub access_key: AccessKey,
}

fn empty_key() -> AccessKey {
    AccessKey::new(String::new())
}

impl Credentials {
    pub fn new(username: impl Into<String>, access_key: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            access_key: AccessKey::new(access_key),
        }
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new(String::new(), String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_key_never_renders() {
        let creds = Credentials::new("builder", "0123-secret-4567");

        assert_eq!(creds.access_key.to_string(), HIDDEN);
        assert!(!format!("{:?}", creds).contains("secret"));

        let json = serde_json::to_string(&creds).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains(HIDDEN));

        assert_eq!(creds.access_key.expose(), "0123-secret-4567");
    }

    #[test]
    fn test_access_key_deserializes_from_plain_string() {
        let creds: Credentials =
            serde_json::from_str(r#"{"username": "builder", "key": "abc"}"#).unwrap();
        assert_eq!(creds.username, "builder");
        assert_eq!(creds.access_key.expose(), "abc");
    }
}
