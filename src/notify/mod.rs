//! Outbound notification capability.
//!
//! Email delivery is best-effort everywhere it is used (setup confirmation,
//! password reset): callers log a failure and move on, they never roll back
//! or surface it.

use std::fmt;

/// Capability interface for sending a notification to a member.
pub trait Notifier: Send + Sync {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// Failure to hand a message to the delivery channel.
#[derive(Debug)]
pub struct NotifyError(pub String);

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "notification failed: {}", self.0)
    }
}

impl std::error::Error for NotifyError {}

/// Default notifier: writes the message to the log instead of delivering it.
/// Stands in for the mail integration in development and tests.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        tracing::info!(to, subject, body, "outbound notification");
        Ok(())
    }
}
