//! Configuration loading.
//!
//! Settings come from an optional TOML file layered under environment
//! variables prefixed with `STRAINWATCH_`:
//!
//! ```toml
//! device_id = "OAPI00B5E1S3Q7X9"
//! auth_key = "..."
//! sensor_id = "44936"
//! monitored_channel = "ch1"
//! reference_channel = "ch3"
//! threshold = 274.0
//! interval = "120s"
//! window = "10m"
//!
//! # Shown in the status lines, never analyzed
//! [[auxiliary_channels]]
//! channel = "ch2"
//! label = "NCR Bending"
//! ```
//!
//! ```bash
//! STRAINWATCH_AUTH_KEY=... strainwatch --config strainwatch.toml
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use strainwatch_adapters::sensorcloud::{SensorCloudClient, DEFAULT_AUTH_ENDPOINT};

use crate::data::duration::parse_duration;
use crate::monitor::MonitorConfig;
use crate::source::SensorCloudSource;

/// A channel shown alongside the compared pair but never analyzed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuxiliaryChannel {
    pub channel: String,
    pub label: String,
}

/// Raw settings as read from file and environment.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub device_id: Option<String>,
    pub auth_key: Option<String>,
    pub auth_endpoint: String,
    pub sensor_id: String,
    pub monitored_channel: String,
    pub monitored_label: String,
    pub reference_channel: String,
    pub reference_label: String,
    pub auxiliary_channels: Vec<AuxiliaryChannel>,
    /// Name of the monitored element, used in alert messages.
    pub element: String,
    pub threshold: f64,
    pub interval: String,
    pub window: String,
    pub timeout: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device_id: None,
            auth_key: None,
            auth_endpoint: DEFAULT_AUTH_ENDPOINT.to_string(),
            sensor_id: "44936".to_string(),
            monitored_channel: "ch1".to_string(),
            monitored_label: "NCR Axial".to_string(),
            reference_channel: "ch3".to_string(),
            reference_label: "Control Axial".to_string(),
            auxiliary_channels: vec![AuxiliaryChannel {
                channel: "ch2".to_string(),
                label: "NCR Bending".to_string(),
            }],
            element: "NCR1588719800".to_string(),
            threshold: 274.0,
            interval: "120s".to_string(),
            window: "10m".to_string(),
            timeout: "10s".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from an optional file plus the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let config = builder
            .add_source(Environment::with_prefix("STRAINWATCH").try_parsing(true))
            .build()
            .context("Failed to read configuration")?;

        config.try_deserialize().context("Invalid configuration")
    }

    /// Resolve into the monitor's runtime configuration.
    pub fn monitor_config(&self) -> Result<MonitorConfig> {
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            bail!("threshold must be a non-negative number, got {}", self.threshold);
        }
        let interval = parse_duration(&self.interval).context("Invalid interval")?;
        if interval.is_zero() {
            bail!("interval must be greater than zero");
        }
        let window = parse_duration(&self.window).context("Invalid window")?;
        if window.is_zero() {
            bail!("window must be greater than zero");
        }

        Ok(MonitorConfig {
            threshold: self.threshold,
            interval,
            window,
            monitored_label: self.monitored_label.clone(),
            reference_label: self.reference_label.clone(),
            auxiliary_labels: self
                .auxiliary_channels
                .iter()
                .map(|aux| aux.label.clone())
                .collect(),
            notify_timeout: self.request_timeout()?,
            max_cycles: None,
        })
    }

    /// Timeout for telemetry calls and alert hand-off.
    pub fn request_timeout(&self) -> Result<Duration> {
        parse_duration(&self.timeout).context("Invalid timeout")
    }

    /// Build the SensorCloud source. Fails if credentials are missing.
    pub fn sensorcloud_source(&self) -> Result<SensorCloudSource> {
        let (Some(device_id), Some(auth_key)) = (non_empty(&self.device_id), non_empty(&self.auth_key))
        else {
            bail!("device_id and auth_key must be set (STRAINWATCH_DEVICE_ID, STRAINWATCH_AUTH_KEY)");
        };

        let client = SensorCloudClient::builder()
            .auth_endpoint(self.auth_endpoint.as_str())
            .timeout(self.request_timeout()?)
            .build()?;

        let source = SensorCloudSource::new(
            client,
            device_id,
            auth_key,
            &self.sensor_id,
            &self.monitored_channel,
            &self.reference_channel,
        );
        Ok(self
            .auxiliary_channels
            .iter()
            .fold(source, |source, aux| source.with_auxiliary(&aux.channel)))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_toml(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(file, "{}", content).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_defaults_resolve() {
        let config = Settings::default().monitor_config().unwrap();
        let expected = MonitorConfig {
            auxiliary_labels: vec!["NCR Bending".to_string()],
            ..MonitorConfig::default()
        };
        assert_eq!(config, expected);
    }

    #[test]
    fn test_load_from_file() {
        let file = write_toml(
            r#"
            device_id = "DEV1"
            auth_key = "secret"
            threshold = 150.0
            interval = "30s"
            window = "5m"
            monitored_channel = "ch2"
            monitored_label = "NCR Bending"
            "#,
        );

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.device_id.as_deref(), Some("DEV1"));
        assert_eq!(settings.monitored_channel, "ch2");
        assert_eq!(settings.reference_channel, "ch3");

        let config = settings.monitor_config().unwrap();
        assert_eq!(config.threshold, 150.0);
        assert_eq!(config.interval, Duration::from_secs(30));
        assert_eq!(config.window, Duration::from_secs(300));
        assert_eq!(config.monitored_label, "NCR Bending");
    }

    #[test]
    fn test_auxiliary_channels_from_file() {
        let file = write_toml(
            r#"
            timeout = "3s"

            [[auxiliary_channels]]
            channel = "ch2"
            label = "NCR Bending"

            [[auxiliary_channels]]
            channel = "ch4"
            label = "Deck Temperature"
            "#,
        );

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.auxiliary_channels.len(), 2);
        assert_eq!(settings.auxiliary_channels[1].channel, "ch4");

        let config = settings.monitor_config().unwrap();
        assert_eq!(config.auxiliary_labels, vec!["NCR Bending", "Deck Temperature"]);
        assert_eq!(config.notify_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_auxiliary_channels_can_be_disabled() {
        let file = write_toml("auxiliary_channels = []\n");
        let settings = Settings::load(Some(file.path())).unwrap();
        assert!(settings.auxiliary_channels.is_empty());
        assert!(settings.monitor_config().unwrap().auxiliary_labels.is_empty());
    }

    #[test]
    fn test_missing_file_is_error() {
        let err = Settings::load(Some(Path::new("/nonexistent/strainwatch.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read configuration"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut settings = Settings {
            interval: "soon".to_string(),
            ..Settings::default()
        };
        assert!(settings.monitor_config().is_err());

        settings.interval = "0s".to_string();
        assert!(settings.monitor_config().is_err());

        settings.interval = "120s".to_string();
        settings.threshold = -1.0;
        assert!(settings.monitor_config().is_err());
    }

    #[test]
    fn test_source_requires_credentials() {
        let settings = Settings {
            device_id: Some("DEV1".to_string()),
            auth_key: Some("  ".to_string()),
            ..Settings::default()
        };
        let err = settings.sensorcloud_source().unwrap_err();
        assert!(err.to_string().contains("auth_key"));

        let settings = Settings {
            auth_key: Some("secret".to_string()),
            ..settings
        };
        assert!(settings.sensorcloud_source().is_ok());
    }
}
