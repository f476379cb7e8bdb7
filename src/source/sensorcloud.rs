//! SensorCloud-backed telemetry source.

use async_trait::async_trait;
use strainwatch_adapters::sensorcloud::{ChannelPath, SensorCloudClient, Session};
use strainwatch_adapters::AdapterError;
use strainwatch_types::Sample;
use tracing::{info, warn};

use super::{Channel, TelemetrySource};

/// A telemetry source that reads one sensor's channel pair from SensorCloud.
///
/// The session obtained by [`TelemetrySource::connect`] is reused for every
/// fetch; there is no re-authentication during a run.
#[derive(Debug)]
pub struct SensorCloudSource {
    client: SensorCloudClient,
    device_id: String,
    auth_key: String,
    monitored: ChannelPath,
    reference: ChannelPath,
    auxiliary: Vec<ChannelPath>,
    session: Option<Session>,
    description: String,
}

impl SensorCloudSource {
    pub fn new(
        client: SensorCloudClient,
        device_id: impl Into<String>,
        auth_key: impl Into<String>,
        sensor_id: &str,
        monitored_channel: &str,
        reference_channel: &str,
    ) -> Self {
        let device_id = device_id.into();
        let description = format!(
            "sensorcloud: {}/{} ({} vs {})",
            device_id, sensor_id, monitored_channel, reference_channel
        );
        Self {
            monitored: ChannelPath::new(device_id.as_str(), sensor_id, monitored_channel),
            reference: ChannelPath::new(device_id.as_str(), sensor_id, reference_channel),
            auxiliary: Vec::new(),
            client,
            device_id,
            auth_key: auth_key.into(),
            session: None,
            description,
        }
    }

    /// Add a display-only channel of the same sensor. Channels are addressed
    /// as [`Channel::Auxiliary`] in the order they were added.
    pub fn with_auxiliary(mut self, channel_id: &str) -> Self {
        let path = ChannelPath::new(
            self.monitored.device_id.as_str(),
            self.monitored.sensor_id.as_str(),
            channel_id,
        );
        self.auxiliary.push(path);
        self
    }

    fn path(&self, channel: Channel) -> Option<&ChannelPath> {
        match channel {
            Channel::Monitored => Some(&self.monitored),
            Channel::Reference => Some(&self.reference),
            Channel::Auxiliary(index) => self.auxiliary.get(index),
        }
    }
}

#[async_trait]
impl TelemetrySource for SensorCloudSource {
    async fn connect(&mut self) -> Result<(), AdapterError> {
        let session = self.client.authenticate(&self.device_id, &self.auth_key).await?;
        info!(server = %session.server, "Connected to SensorCloud");
        self.session = Some(session);
        Ok(())
    }

    async fn fetch(&self, channel: Channel, start_ns: u64, end_ns: u64) -> Vec<Sample> {
        let Some(session) = &self.session else {
            warn!(%channel, "Fetch attempted before authentication");
            return Vec::new();
        };

        let Some(path) = self.path(channel) else {
            warn!(%channel, "No such channel configured");
            return Vec::new();
        };
        match self.client.fetch_range(session, path, start_ns, end_ns).await {
            Ok(samples) => samples,
            Err(e) => {
                warn!(%channel, channel_id = %path.channel_id, error = %e, "Fetch failed, treating as no data");
                Vec::new()
            }
        }
    }

    fn description(&self) -> &str {
        &self.description
    }
}
