//! Sample - one timestamped reading from a sensor channel.

/// Size in bytes of one encoded sample record.
pub const SAMPLE_RECORD_LEN: usize = 12;

/// A single reading from a sensor channel.
///
/// Timestamps are nanoseconds since the Unix epoch, as served by the
/// telemetry service.
///
/// # Example
///
/// ```rust
/// use strainwatch_types::Sample;
///
/// let sample = Sample::new(1_700_000_000_000_000_000, 42.0);
/// let bytes = sample.encode();
/// assert_eq!(Sample::decode(&bytes), sample);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sample {
    /// Nanoseconds since the Unix epoch.
    pub timestamp_ns: u64,
    /// Channel reading.
    pub value: f32,
}

impl Sample {
    /// Create a new sample.
    pub fn new(timestamp_ns: u64, value: f32) -> Self {
        Self {
            timestamp_ns,
            value,
        }
    }

    /// Decode one record: 8-byte big-endian timestamp, 4-byte big-endian float.
    pub fn decode(record: &[u8; SAMPLE_RECORD_LEN]) -> Self {
        let mut ts = [0u8; 8];
        let mut val = [0u8; 4];
        ts.copy_from_slice(&record[..8]);
        val.copy_from_slice(&record[8..]);
        Self {
            timestamp_ns: u64::from_be_bytes(ts),
            value: f32::from_be_bytes(val),
        }
    }

    /// Encode this sample in the wire layout read by [`Sample::decode`].
    pub fn encode(&self) -> [u8; SAMPLE_RECORD_LEN] {
        let mut out = [0u8; SAMPLE_RECORD_LEN];
        out[..8].copy_from_slice(&self.timestamp_ns.to_be_bytes());
        out[8..].copy_from_slice(&self.value.to_be_bytes());
        out
    }
}
