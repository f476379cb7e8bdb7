//! Tracing-based notifier.

use async_trait::async_trait;
use tracing::warn;

use super::{Notifier, NotifyError};
use crate::data::Alert;

/// Writes each alert to the log at `WARN` level.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    element: String,
}

impl LogNotifier {
    /// Create a notifier for the named element (e.g. "NCR1588719800").
    pub fn new(element: impl Into<String>) -> Self {
        Self {
            element: element.into(),
        }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError> {
        warn!(
            subject = alert.subject(),
            peak = alert.peak_divergence,
            "{}",
            alert.body(&self.element)
        );
        Ok(())
    }
}
