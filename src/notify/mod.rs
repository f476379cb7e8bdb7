//! Notification collaborators for divergence alerts.
//!
//! The monitor decides *whether* to notify and hands an [`Alert`] to a
//! [`Notifier`]. How the message reaches a person (mail, chat, pager) is
//! up to the notifier implementation.
//!
//! - [`LogNotifier`]: emits the alert through `tracing`
//! - [`ChannelNotifier`]: forwards alerts over a tokio channel to whatever
//!   delivers them

mod channel;
mod log;

pub use channel::ChannelNotifier;
pub use log::LogNotifier;

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::data::Alert;

/// Errors that can occur while handing off an alert.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The receiving side is gone.
    #[error("Notification channel closed")]
    Closed,

    /// The transport reported a failure.
    #[error("Notification delivery failed: {0}")]
    Delivery(String),

    /// The hand-off did not complete in time.
    #[error("Notification timed out after {0:?}")]
    Timeout(Duration),
}

/// Trait for delivering alerts.
#[async_trait]
pub trait Notifier: Send + Sync + Debug {
    /// Deliver one alert. Failures are reported, never retried here.
    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError>;
}
