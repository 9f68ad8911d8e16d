//! Progress notifications emitted during a run
//!
//! The core only ever writes to a [`NotificationSink`]; rendering is left to
//! the consumer (the CLI console reporter, a channel in tests).

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::types::{BrowserSpec, Platform};

/// Log channel a tunnel line arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogMethod {
    Write,
    Writeln,
    Error,
    Ok,
    Debug,
}

/// One line of tunnel output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelLogEvent {
    pub verbose: bool,
    pub method: LogMethod,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Notification {
    TunnelOpen,

    TunnelOpened,

    TunnelClose,

    TunnelEvent(TunnelLogEvent),

    #[serde(rename_all = "camelCase")]
    JobStarted {
        started_jobs: usize,
        number_of_jobs: usize,
    },

    #[serde(rename_all = "camelCase")]
    JobCompleted {
        url: String,
        platform: Platform,
        passed: bool,
        job_url: Option<String>,
        tunnel_id: Option<String>,
        /// The page's port is not proxied by the tunnel
        port_warning: bool,
    },

    /// A job ended in an error rather than a test verdict
    #[serde(rename_all = "camelCase")]
    JobFailed {
        url: String,
        platform: Platform,
        error: String,
    },

    TestCompleted {
        passed: bool,
    },

    Retrying {
        url: String,
        browser: BrowserSpec,
    },
}

/// Consumer of progress notifications
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

impl NotificationSink for mpsc::UnboundedSender<Notification> {
    fn notify(&self, notification: Notification) {
        // A closed receiver means nobody is rendering; the run carries on.
        let _ = self.send(notification);
    }
}

impl<T: NotificationSink + ?Sized> NotificationSink for std::sync::Arc<T> {
    fn notify(&self, notification: Notification) {
        (**self).notify(notification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_tagging() {
        let json = serde_json::to_value(Notification::JobStarted {
            started_jobs: 2,
            number_of_jobs: 3,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "jobStarted", "startedJobs": 2, "numberOfJobs": 3})
        );

        let json = serde_json::to_value(Notification::TunnelEvent(TunnelLogEvent {
            verbose: true,
            method: LogMethod::Writeln,
            text: "up".to_string(),
        }))
        .unwrap();
        assert_eq!(json["type"], "tunnelEvent");
        assert_eq!(json["method"], "writeln");
    }

    #[tokio::test]
    async fn test_channel_sink_delivers_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.notify(Notification::TunnelOpen);
        tx.notify(Notification::TestCompleted { passed: true });
        drop(tx);

        assert_eq!(rx.recv().await, Some(Notification::TunnelOpen));
        assert_eq!(rx.recv().await, Some(Notification::TestCompleted { passed: true }));
        assert_eq!(rx.recv().await, None);
    }
}
