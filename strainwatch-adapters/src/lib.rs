//! # strainwatch-adapters
//!
//! Clients for the telemetry services that host strain sensor data.
//!
//! Each adapter performs the service's authentication handshake and fetches
//! time-series samples for a channel over a time range, decoding the wire
//! format with [`strainwatch_types`].
//!
//! ## Supported Services
//!
//! - **SensorCloud** (`sensorcloud` feature) - MicroStrain's hosted telemetry
//!   service, binary XDR responses over HTTPS
//!
//! ## Quick Start (SensorCloud)
//!
//! ```rust,no_run
//! use strainwatch_adapters::sensorcloud::{ChannelPath, SensorCloudClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SensorCloudClient::builder().build()?;
//!     let session = client.authenticate("OAPI00B5E1S3Q7X9", "secret-key").await?;
//!
//!     let channel = ChannelPath::new("OAPI00B5E1S3Q7X9", "44936", "ch1");
//!     let samples = client
//!         .fetch_range(&session, &channel, 1_700_000_000_000_000_000, 1_700_000_600_000_000_000)
//!         .await?;
//!
//!     println!("Fetched {} samples", samples.len());
//!     Ok(())
//! }
//! ```

pub mod error;

#[cfg(feature = "sensorcloud")]
pub mod sensorcloud;

pub use error::AdapterError;

// Re-export types for convenience
pub use strainwatch_types::{AuthResponse, Sample};
