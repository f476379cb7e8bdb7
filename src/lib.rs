//! # strainwatch
//!
//! A live divergence monitor for a pair of structural strain sensor channels.
//!
//! The monitor periodically pulls recent samples for a monitored element and
//! a reference (control) element from a remote telemetry service, compares
//! them at the timestamps both channels reported, and raises an alert when
//! their divergence exceeds a fixed threshold.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                             Monitor                              │
//! │  ┌──────────┐    ┌──────────────┐    ┌──────────┐    ┌────────┐  │
//! │  │  source  │───▶│ divergence   │───▶│  alert   │───▶│ notify │  │
//! │  │ (fetch)  │    │ (align/peak) │    │ (state)  │    │        │  │
//! │  └──────────┘    └──────────────┘    └──────────┘    └────────┘  │
//! │       ▲                                                          │
//! │       └── SensorCloudSource | ScriptedSource                     │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`source`]**: Telemetry source abstraction ([`TelemetrySource`] trait) with
//!   a SensorCloud implementation and a scripted in-memory one
//! - **[`data`]**: Exact-timestamp alignment, peak divergence, and the
//!   edge-triggered alert state machine ([`RunState`])
//! - **[`notify`]**: Alert hand-off ([`Notifier`] trait)
//! - **[`monitor`]**: The polling loop ([`Monitor`]) with cooperative shutdown
//! - **[`settings`]**: File and environment configuration
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Credentials from the environment, everything else from defaults
//! STRAINWATCH_DEVICE_ID=OAPI00B5E1S3Q7X9 STRAINWATCH_AUTH_KEY=... strainwatch
//!
//! # Custom threshold, single cycle
//! strainwatch --config strainwatch.toml --threshold 150 --once
//! ```
//!
//! ### As a library
//!
//! ```
//! use strainwatch::{ChannelNotifier, Monitor, MonitorConfig, ScriptedSource};
//!
//! let source = ScriptedSource::new();
//! let (notifier, _alerts) = ChannelNotifier::create(16);
//! let monitor = Monitor::new(source, notifier, MonitorConfig::default());
//! ```

pub mod data;
pub mod monitor;
pub mod notify;
pub mod settings;
pub mod source;

// Re-export main types for convenience
pub use data::{Alert, CycleOutcome, CycleResult, RunState, RunSummary};
pub use monitor::{CycleReport, Monitor, MonitorConfig};
pub use notify::{ChannelNotifier, LogNotifier, Notifier, NotifyError};
pub use settings::{AuxiliaryChannel, Settings};
pub use source::{Channel, ScriptedSource, SensorCloudSource, TelemetrySource};
