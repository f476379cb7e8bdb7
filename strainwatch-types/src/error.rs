//! Error types for wire-format decoding.

use thiserror::Error;

/// Errors that can occur while decoding a SensorCloud payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The authentication response does not follow the expected layout.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The sample stream length is not a whole number of records.
    #[error("Truncated stream: {len} bytes is not a multiple of {record_len}")]
    TruncatedStream {
        /// Total length of the buffer that was handed in.
        len: usize,
        /// Size of one record.
        record_len: usize,
    },
}
