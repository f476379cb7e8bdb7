//! SensorCloud adapter using the binary (XDR) REST API.
//!
//! SensorCloud splits access in two steps: a handshake against a fixed
//! authentication host returns a token plus the host that actually serves
//! the device's data, and every data request then goes to that host with
//! the token attached.
//!
//! Both responses are binary, decoded by [`strainwatch_types`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use strainwatch_adapters::sensorcloud::{ChannelPath, SensorCloudClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SensorCloudClient::builder()
//!         .timeout(Duration::from_secs(5))
//!         .build()?;
//!
//!     let session = client.authenticate("OAPI00B5E1S3Q7X9", "secret-key").await?;
//!     let channel = ChannelPath::new("OAPI00B5E1S3Q7X9", "44936", "ch3");
//!
//!     for sample in client.fetch_range(&session, &channel, 0, u64::MAX).await? {
//!         println!("{} {}", sample.timestamp_ns, sample.value);
//!     }
//!
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use reqwest::{header, Client};
use tracing::debug;

use strainwatch_types::{decode_auth_response, decode_sample_stream, Sample};

use crate::AdapterError;

/// Public authentication host.
pub const DEFAULT_AUTH_ENDPOINT: &str = "https://sensorcloud.microstrain.com";

const XDR_CONTENT_TYPE: &str = "application/xdr";

/// Credentials obtained from the authentication handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Host serving data requests for the device.
    pub server: String,
    /// Token attached to every data request.
    pub token: String,
}

/// Identifies one channel of one sensor on a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPath {
    /// Device (node) identifier, also used for authentication.
    pub device_id: String,
    /// Sensor on the device.
    pub sensor_id: String,
    /// Channel of the sensor, e.g. `ch1`.
    pub channel_id: String,
}

impl ChannelPath {
    /// Create a path from its three identifiers.
    pub fn new(
        device_id: impl Into<String>,
        sensor_id: impl Into<String>,
        channel_id: impl Into<String>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            sensor_id: sensor_id.into(),
            channel_id: channel_id.into(),
        }
    }
}

/// SensorCloud client for authenticating and fetching time-series data.
#[derive(Debug, Clone)]
pub struct SensorCloudClient {
    client: Client,
    auth_endpoint: String,
    data_scheme: String,
}

impl SensorCloudClient {
    /// Create a new builder for configuring the client.
    pub fn builder() -> SensorCloudClientBuilder {
        SensorCloudClientBuilder::default()
    }

    /// Perform the authentication handshake for a device.
    ///
    /// Any non-success status, undecodable body, or empty server/token is
    /// reported as [`AdapterError::Auth`]. There is no retry.
    pub async fn authenticate(&self, device_id: &str, key: &str) -> Result<Session, AdapterError> {
        let url = format!(
            "{}/SensorCloud/devices/{}/authenticate/",
            self.auth_endpoint,
            urlencoded(device_id)
        );

        debug!(device = device_id, "Authenticating with SensorCloud");

        let response = self
            .client
            .get(&url)
            .header(header::ACCEPT, XDR_CONTENT_TYPE)
            .query(&[("version", "1"), ("key", key)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AdapterError::Auth(format!(
                "Handshake returned status {}",
                response.status()
            )));
        }

        let body = response.bytes().await?;
        let auth = decode_auth_response(&body).map_err(|e| AdapterError::Auth(e.to_string()))?;

        if auth.server.is_empty() || auth.token.is_empty() {
            return Err(AdapterError::Auth(
                "Handshake returned an empty server or token".to_string(),
            ));
        }

        debug!(server = %auth.server, "Authenticated");

        Ok(Session {
            server: auth.server,
            token: auth.token,
        })
    }

    /// Fetch the samples of one channel in `[start_ns, end_ns]`.
    ///
    /// A non-success status means the service has nothing in range and
    /// yields an empty set. Transport and decode failures are returned as
    /// errors so the caller can log them.
    pub async fn fetch_range(
        &self,
        session: &Session,
        channel: &ChannelPath,
        start_ns: u64,
        end_ns: u64,
    ) -> Result<Vec<Sample>, AdapterError> {
        let url = self.data_url(session, channel);
        let start = start_ns.to_string();
        let end = end_ns.to_string();

        let response = self
            .client
            .get(&url)
            .header(header::ACCEPT, XDR_CONTENT_TYPE)
            .query(&[
                ("version", "1"),
                ("auth_token", session.token.as_str()),
                ("starttime", start.as_str()),
                ("endtime", end.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            debug!(
                channel = %channel.channel_id,
                status = %response.status(),
                "No data in range"
            );
            return Ok(Vec::new());
        }

        let body = response.bytes().await?;
        let samples: Vec<Sample> = decode_sample_stream(&body)?.collect();

        debug!(
            channel = %channel.channel_id,
            count = samples.len(),
            "Fetched samples"
        );

        Ok(samples)
    }

    fn data_url(&self, session: &Session, channel: &ChannelPath) -> String {
        format!(
            "{}://{}/SensorCloud/devices/{}/sensors/{}/channels/{}/streams/timeseries/data/",
            self.data_scheme,
            session.server,
            urlencoded(&channel.device_id),
            urlencoded(&channel.sensor_id),
            urlencoded(&channel.channel_id)
        )
    }
}

/// Builder for SensorCloudClient.
#[derive(Debug, Default)]
pub struct SensorCloudClientBuilder {
    auth_endpoint: Option<String>,
    data_scheme: Option<String>,
    timeout: Option<Duration>,
}

impl SensorCloudClientBuilder {
    /// Set the authentication endpoint (default: [`DEFAULT_AUTH_ENDPOINT`]).
    pub fn auth_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.auth_endpoint = Some(endpoint.into());
        self
    }

    /// Set the scheme used to reach the data server (default: "https").
    pub fn data_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.data_scheme = Some(scheme.into());
        self
    }

    /// Set the request timeout (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<SensorCloudClient, AdapterError> {
        let timeout = self.timeout.unwrap_or(Duration::from_secs(10));

        let client = Client::builder().timeout(timeout).build()?;

        Ok(SensorCloudClient {
            client,
            auth_endpoint: self
                .auth_endpoint
                .map(|e| e.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_AUTH_ENDPOINT.to_string()),
            data_scheme: self.data_scheme.unwrap_or_else(|| "https".to_string()),
        })
    }
}

// URL encode a string for use in paths
fn urlencoded(s: &str) -> String {
    s.replace('%', "%25").replace('/', "%2F").replace(' ', "%20")
}
