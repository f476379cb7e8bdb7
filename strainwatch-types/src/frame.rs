//! Decoders for the SensorCloud binary payloads.
//!
//! ## Authentication response
//!
//! ```text
//! ┌──────────┬────────────────┬─────────────┬──────────┬─────────────────┐
//! │ L1 (u32) │ token (L1)     │ padding (?) │ L2 (u32) │ server (L2)     │
//! └──────────┴────────────────┴─────────────┴──────────┴─────────────────┘
//! ```
//!
//! The padding between the token and the server field is not documented by
//! the vendor, so the server length is located by scanning forward one byte
//! at a time for the first big-endian value in `1..=100`.
//!
//! ## Sample stream
//!
//! A flat array of 12-byte records, see [`Sample::decode`].

use std::ops::RangeInclusive;
use std::slice::ChunksExact;

use crate::{DecodeError, Sample, SAMPLE_RECORD_LEN};

/// Smallest buffer that can hold both length fields.
const MIN_AUTH_LEN: usize = 8;

/// Server name lengths accepted while scanning for the server field.
const PLAUSIBLE_SERVER_LEN: RangeInclusive<usize> = 1..=100;

/// Decoded authentication handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResponse {
    /// Host serving data requests for this device.
    pub server: String,
    /// Token to pass on every data request.
    pub token: String,
}

/// Decode the authentication handshake body into server host and token.
///
/// Trailing NUL padding is stripped from both text fields. A zero server
/// length followed only by padding decodes to an empty server name.
///
/// # Errors
///
/// Returns [`DecodeError::MalformedResponse`] if the buffer is shorter than
/// 8 bytes, the token overruns the buffer, either field is not UTF-8, or no
/// plausible server length is found before the buffer ends.
pub fn decode_auth_response(bytes: &[u8]) -> Result<AuthResponse, DecodeError> {
    if bytes.len() < MIN_AUTH_LEN {
        return Err(DecodeError::MalformedResponse(format!(
            "response is {} bytes, need at least {}",
            bytes.len(),
            MIN_AUTH_LEN
        )));
    }

    let token_len = read_u32(bytes, 0) as usize;
    let token_end = 4usize
        .checked_add(token_len)
        .filter(|end| *end <= bytes.len())
        .ok_or_else(|| {
            DecodeError::MalformedResponse(format!(
                "token length {} exceeds {} byte response",
                token_len,
                bytes.len()
            ))
        })?;
    let token = read_text(&bytes[4..token_end], "token")?;
    let server = scan_server(bytes, token_end)?;

    Ok(AuthResponse { server, token })
}

fn scan_server(bytes: &[u8], start: usize) -> Result<String, DecodeError> {
    let mut offset = start;
    while offset + 4 <= bytes.len() {
        let candidate = read_u32(bytes, offset) as usize;
        if PLAUSIBLE_SERVER_LEN.contains(&candidate) {
            let begin = offset + 4;
            let end = begin + candidate;
            if end > bytes.len() {
                return Err(DecodeError::MalformedResponse(format!(
                    "server length {} at offset {} overruns {} byte response",
                    candidate,
                    offset,
                    bytes.len()
                )));
            }
            return read_text(&bytes[begin..end], "server");
        }
        offset += 1;
    }

    // Zero-length server field, possibly followed by padding
    if bytes.len() >= start + 4 && bytes[start..].iter().all(|b| *b == 0) {
        return Ok(String::new());
    }

    Err(DecodeError::MalformedResponse(format!(
        "no plausible server length after offset {}",
        start
    )))
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_be_bytes(word)
}

fn read_text(bytes: &[u8], field: &str) -> Result<String, DecodeError> {
    let text = std::str::from_utf8(bytes).map_err(|e| {
        DecodeError::MalformedResponse(format!("{} is not valid UTF-8: {}", field, e))
    })?;
    Ok(text.trim_end_matches('\0').to_string())
}

/// Decode a time-series body into its samples.
///
/// The returned iterator borrows the buffer and can be cloned to walk the
/// samples again.
///
/// # Errors
///
/// Returns [`DecodeError::TruncatedStream`] if the length is not a multiple
/// of [`SAMPLE_RECORD_LEN`].
pub fn decode_sample_stream(bytes: &[u8]) -> Result<SampleFrames<'_>, DecodeError> {
    if bytes.len() % SAMPLE_RECORD_LEN != 0 {
        return Err(DecodeError::TruncatedStream {
            len: bytes.len(),
            record_len: SAMPLE_RECORD_LEN,
        });
    }
    Ok(SampleFrames {
        chunks: bytes.chunks_exact(SAMPLE_RECORD_LEN),
    })
}

/// Iterator over the records of a sample stream.
#[derive(Debug, Clone)]
pub struct SampleFrames<'a> {
    chunks: ChunksExact<'a, u8>,
}

impl Iterator for SampleFrames<'_> {
    type Item = Sample;

    fn next(&mut self) -> Option<Self::Item> {
        let chunk = self.chunks.next()?;
        let mut record = [0u8; SAMPLE_RECORD_LEN];
        record.copy_from_slice(chunk);
        Some(Sample::decode(&record))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl ExactSizeIterator for SampleFrames<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a handshake body with `pad` NUL bytes between token and server.
    fn encode_auth(token: &str, server: &str, pad: usize) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(token.len() as u32).to_be_bytes());
        out.extend_from_slice(token.as_bytes());
        out.extend(std::iter::repeat(0u8).take(pad));
        out.extend_from_slice(&(server.len() as u32).to_be_bytes());
        out.extend_from_slice(server.as_bytes());
        out
    }

    #[test]
    fn test_auth_round_trip_lengths() {
        for len in 0..=100 {
            let token: String = "t".repeat(len);
            let server: String = "s".repeat(len);
            for pad in 0..4 {
                let body = encode_auth(&token, &server, pad);
                let decoded = decode_auth_response(&body).unwrap();
                assert_eq!(decoded.token, token, "len={} pad={}", len, pad);
                assert_eq!(decoded.server, server, "len={} pad={}", len, pad);
            }
        }
    }

    #[test]
    fn test_auth_strips_nul_padding_inside_fields() {
        let mut body = Vec::new();
        body.extend_from_slice(&8u32.to_be_bytes());
        body.extend_from_slice(b"abc12\0\0\0");
        body.extend_from_slice(&20u32.to_be_bytes());
        body.extend_from_slice(b"dsx.example.com\0\0\0\0\0");

        let decoded = decode_auth_response(&body).unwrap();
        assert_eq!(decoded.token, "abc12");
        assert_eq!(decoded.server, "dsx.example.com");
    }

    #[test]
    fn test_auth_skips_xdr_alignment() {
        // 5-byte token padded to a 4-byte boundary
        let body = encode_auth("hello", "dsx.sensorcloud.microstrain.com", 3);
        let decoded = decode_auth_response(&body).unwrap();
        assert_eq!(decoded.token, "hello");
        assert_eq!(decoded.server, "dsx.sensorcloud.microstrain.com");
    }

    #[test]
    fn test_auth_too_short() {
        let err = decode_auth_response(&[0, 0, 0, 1, b'x']).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedResponse(_)));
    }

    #[test]
    fn test_auth_token_overruns_buffer() {
        let mut body = Vec::new();
        body.extend_from_slice(&500u32.to_be_bytes());
        body.extend_from_slice(b"short");
        let err = decode_auth_response(&body).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedResponse(_)));
    }

    #[test]
    fn test_auth_no_plausible_server_length() {
        let mut body = Vec::new();
        body.extend_from_slice(&1u32.to_be_bytes());
        body.push(b'x');
        body.extend_from_slice(&[0xff, 0xff, 0xff, 0xff]);
        let err = decode_auth_response(&body).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedResponse(_)));
    }

    #[test]
    fn test_auth_server_overruns_buffer() {
        let mut body = Vec::new();
        body.extend_from_slice(&1u32.to_be_bytes());
        body.push(b'x');
        body.extend_from_slice(&50u32.to_be_bytes());
        body.extend_from_slice(b"too-short");
        let err = decode_auth_response(&body).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedResponse(_)));
    }

    #[test]
    fn test_auth_invalid_utf8() {
        let mut body = Vec::new();
        body.extend_from_slice(&2u32.to_be_bytes());
        body.extend_from_slice(&[0xc3, 0x28]);
        body.extend_from_slice(&1u32.to_be_bytes());
        body.push(b'h');
        let err = decode_auth_response(&body).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedResponse(ref msg) if msg.contains("token")));
    }

    #[test]
    fn test_sample_stream_counts_and_reencodes() {
        let samples: Vec<Sample> = (0..25)
            .map(|i| Sample::new(1_000_000 * i as u64, i as f32 * -1.25))
            .collect();
        let body: Vec<u8> = samples.iter().flat_map(|s| s.encode()).collect();

        let frames = decode_sample_stream(&body).unwrap();
        assert_eq!(frames.len(), body.len() / SAMPLE_RECORD_LEN);

        let reencoded: Vec<u8> = frames.clone().flat_map(|s| s.encode()).collect();
        assert_eq!(reencoded, body);

        // Restartable: a second pass yields the same samples
        let again: Vec<Sample> = frames.collect();
        assert_eq!(again, samples);
    }

    #[test]
    fn test_sample_stream_empty() {
        let frames = decode_sample_stream(&[]).unwrap();
        assert_eq!(frames.count(), 0);
    }

    #[test]
    fn test_sample_stream_truncated() {
        for len in [1, 11, 13, 23, 25] {
            let body = vec![0u8; len];
            let err = decode_sample_stream(&body).unwrap_err();
            assert_eq!(
                err,
                DecodeError::TruncatedStream {
                    len,
                    record_len: SAMPLE_RECORD_LEN
                }
            );
        }
    }
}
