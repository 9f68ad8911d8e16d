//! Error types for saucejs configuration and shared types

use thiserror::Error;

/// Result type alias using the common Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while resolving configuration and shared types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unknown test framework: {0} (expected one of: jasmine, qunit, mocha, YUI Test, custom)")]
    UnknownFramework(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
