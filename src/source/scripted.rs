//! Scripted in-memory data source.
//!
//! Replays pre-loaded sample sets, one per fetch and channel, and records
//! every requested range. Clones share the same script, so a caller can
//! keep a handle to inspect requests after handing the source to a monitor.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use strainwatch_adapters::AdapterError;
use strainwatch_types::Sample;

use super::{Channel, TelemetrySource};

#[derive(Debug, Default)]
struct Script {
    monitored: VecDeque<Vec<Sample>>,
    reference: VecDeque<Vec<Sample>>,
    auxiliary: Vec<VecDeque<Vec<Sample>>>,
    requests: Vec<(Channel, u64, u64)>,
    reject_connect: bool,
}

/// A telemetry source that serves scripted responses.
///
/// Each fetch for a channel pops that channel's next scripted set; once the
/// script runs out, fetches return no data.
///
/// # Example
///
/// ```
/// use strainwatch::source::ScriptedSource;
/// use strainwatch_types::Sample;
///
/// let source = ScriptedSource::new();
/// source.push_cycle(
///     vec![Sample::new(1, 300.0)],
///     vec![Sample::new(1, 100.0)],
/// );
/// assert!(source.requests().is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    script: Arc<Mutex<Script>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A source whose handshake is refused.
    pub fn rejecting() -> Self {
        let source = Self::new();
        source.script.lock().reject_connect = true;
        source
    }

    /// Queue the responses for one cycle.
    pub fn push_cycle(&self, monitored: Vec<Sample>, reference: Vec<Sample>) {
        let mut script = self.script.lock();
        script.monitored.push_back(monitored);
        script.reference.push_back(reference);
    }

    /// Queue the next response for an auxiliary channel.
    pub fn push_auxiliary(&self, index: usize, samples: Vec<Sample>) {
        let mut script = self.script.lock();
        if script.auxiliary.len() <= index {
            script.auxiliary.resize_with(index + 1, VecDeque::new);
        }
        script.auxiliary[index].push_back(samples);
    }

    /// Every `(channel, start_ns, end_ns)` fetched so far, in call order.
    pub fn requests(&self) -> Vec<(Channel, u64, u64)> {
        self.script.lock().requests.clone()
    }
}

#[async_trait]
impl TelemetrySource for ScriptedSource {
    async fn connect(&mut self) -> Result<(), AdapterError> {
        if self.script.lock().reject_connect {
            return Err(AdapterError::Auth("Handshake returned status 401".to_string()));
        }
        Ok(())
    }

    async fn fetch(&self, channel: Channel, start_ns: u64, end_ns: u64) -> Vec<Sample> {
        let mut script = self.script.lock();
        script.requests.push((channel, start_ns, end_ns));
        let queue = match channel {
            Channel::Monitored => Some(&mut script.monitored),
            Channel::Reference => Some(&mut script.reference),
            Channel::Auxiliary(index) => script.auxiliary.get_mut(index),
        };
        queue.and_then(VecDeque::pop_front).unwrap_or_default()
    }

    fn description(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_per_channel_then_empties() {
        let source = ScriptedSource::new();
        source.push_cycle(vec![Sample::new(1, 1.0)], vec![Sample::new(1, 2.0)]);

        let m = source.fetch(Channel::Monitored, 0, 5).await;
        let r = source.fetch(Channel::Reference, 0, 5).await;
        assert_eq!(m, vec![Sample::new(1, 1.0)]);
        assert_eq!(r, vec![Sample::new(1, 2.0)]);

        assert!(source.fetch(Channel::Monitored, 5, 10).await.is_empty());
        assert_eq!(
            source.requests(),
            vec![
                (Channel::Monitored, 0, 5),
                (Channel::Reference, 0, 5),
                (Channel::Monitored, 5, 10),
            ]
        );
    }

    #[tokio::test]
    async fn test_auxiliary_queues() {
        let source = ScriptedSource::new();
        source.push_auxiliary(1, vec![Sample::new(4, 4.0)]);

        assert!(source.fetch(Channel::Auxiliary(0), 0, 5).await.is_empty());
        assert_eq!(
            source.fetch(Channel::Auxiliary(1), 0, 5).await,
            vec![Sample::new(4, 4.0)]
        );
        assert!(source.fetch(Channel::Auxiliary(7), 0, 5).await.is_empty());
    }

    #[tokio::test]
    async fn test_rejecting_connect() {
        let mut source = ScriptedSource::rejecting();
        assert!(matches!(source.connect().await, Err(AdapterError::Auth(_))));
    }

    #[tokio::test]
    async fn test_clones_share_script() {
        let source = ScriptedSource::new();
        let handle = source.clone();
        handle.push_cycle(vec![Sample::new(9, 9.0)], vec![]);
        assert_eq!(source.fetch(Channel::Monitored, 0, 1).await.len(), 1);
        assert_eq!(handle.requests().len(), 1);
    }
}
