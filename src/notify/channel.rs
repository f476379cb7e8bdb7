//! Channel-based notifier.
//!
//! Hands alerts to another task through a tokio mpsc channel, the
//! integration point for an external delivery service.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{Notifier, NotifyError};
use crate::data::Alert;

/// A notifier that sends alerts through a channel.
///
/// # Example
///
/// ```
/// use strainwatch::notify::ChannelNotifier;
///
/// let (notifier, mut alerts) = ChannelNotifier::create(16);
/// ```
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::Sender<Alert>,
}

impl ChannelNotifier {
    pub fn new(sender: mpsc::Sender<Alert>) -> Self {
        Self { sender }
    }

    /// Create a notifier and the receiver its alerts arrive on.
    pub fn create(buffer: usize) -> (Self, mpsc::Receiver<Alert>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError> {
        self.sender.send(alert.clone()).await.map_err(|_| NotifyError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert() -> Alert {
        Alert {
            peak_divergence: 200.0,
            timestamp_ns: 3,
            threshold: 150.0,
        }
    }

    #[tokio::test]
    async fn test_forwards_alert() {
        let (notifier, mut rx) = ChannelNotifier::create(4);
        notifier.notify(&alert()).await.unwrap();
        assert_eq!(rx.recv().await, Some(alert()));
    }

    #[tokio::test]
    async fn test_closed_receiver_fails() {
        let (notifier, rx) = ChannelNotifier::create(4);
        drop(rx);
        let err = notifier.notify(&alert()).await.unwrap_err();
        assert!(matches!(err, NotifyError::Closed));
    }
}
