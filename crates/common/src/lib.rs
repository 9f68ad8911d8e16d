//! saucejs Common Library
//!
//! Configuration, credential, browser-matrix and notification types shared by
//! the runner core and the command-line front end.

pub mod config;
pub mod credentials;
pub mod error;
pub mod notification;
pub mod types;

// Re-export commonly used types
pub use config::RunConfiguration;
pub use credentials::{AccessKey, Credentials};
pub use error::{Error, Result};
pub use notification::{LogMethod, Notification, NotificationSink, TunnelLogEvent};
pub use types::*;

/// saucejs version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
