//! # strainwatch-types
//!
//! Core types for strain telemetry. This crate defines the [`Sample`] record
//! and decodes the two binary payloads served by the SensorCloud telemetry
//! service:
//!
//! - the authentication handshake response ([`decode_auth_response`])
//! - the time-series sample stream ([`decode_sample_stream`])
//!
//! Both payloads are big-endian, XDR-style encodings. Decoding never touches
//! the network; callers hand in the full response body.
//!
//! ## Features
//!
//! - `serde`: derive `Serialize`/`Deserialize` for [`Sample`]
//!
//! ## Example
//!
//! ```rust
//! use strainwatch_types::{decode_sample_stream, Sample};
//!
//! let mut body = Vec::new();
//! body.extend_from_slice(&Sample::new(1_000, 12.5).encode());
//! body.extend_from_slice(&Sample::new(2_000, -3.0).encode());
//!
//! let samples: Vec<Sample> = decode_sample_stream(&body).unwrap().collect();
//! assert_eq!(samples.len(), 2);
//! assert_eq!(samples[1].value, -3.0);
//! ```

mod error;
mod frame;
mod sample;

pub use error::DecodeError;
pub use frame::{decode_auth_response, decode_sample_stream, AuthResponse, SampleFrames};
pub use sample::{Sample, SAMPLE_RECORD_LEN};
