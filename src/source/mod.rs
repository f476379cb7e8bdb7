//! Telemetry source abstraction for fetching channel samples.
//!
//! The polling loop talks to the telemetry service only through the
//! [`TelemetrySource`] trait, so it can be driven by the SensorCloud client
//! in production and by a scripted in-memory source in tests.

mod scripted;
mod sensorcloud;

pub use scripted::ScriptedSource;
pub use sensorcloud::SensorCloudSource;

use std::fmt::{self, Debug};

use async_trait::async_trait;
use strainwatch_adapters::AdapterError;
use strainwatch_types::Sample;

/// Which side of the comparison a fetch is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// The element under observation.
    Monitored,
    /// The control element it is compared against.
    Reference,
    /// An extra channel fetched only for display, by position.
    Auxiliary(usize),
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Monitored => write!(f, "monitored"),
            Channel::Reference => write!(f, "reference"),
            Channel::Auxiliary(index) => write!(f, "auxiliary #{}", index),
        }
    }
}

/// Trait for pulling channel samples from a telemetry service.
///
/// # Example
///
/// ```
/// use strainwatch::source::{Channel, ScriptedSource, TelemetrySource};
/// use strainwatch_types::Sample;
///
/// # tokio_test::block_on(async {
/// let mut source = ScriptedSource::new();
/// source.push_cycle(vec![Sample::new(1, 2.0)], vec![]);
///
/// source.connect().await.unwrap();
/// let samples = source.fetch(Channel::Monitored, 0, 10).await;
/// assert_eq!(samples.len(), 1);
/// # });
/// ```
#[async_trait]
pub trait TelemetrySource: Send + Sync + Debug {
    /// Establish a session with the service.
    ///
    /// An error here is fatal for the run.
    async fn connect(&mut self) -> Result<(), AdapterError>;

    /// Fetch one channel's samples in `[start_ns, end_ns]`.
    ///
    /// Returns an empty set when nothing is available, including when the
    /// request or its decoding failed. Failures are logged, not returned.
    async fn fetch(&self, channel: Channel, start_ns: u64, end_ns: u64) -> Vec<Sample>;

    /// Returns a human-readable description of the source.
    fn description(&self) -> &str;
}
