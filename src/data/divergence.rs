//! Time alignment and divergence computation.
//!
//! Two channels are compared only at timestamps both of them reported.
//! There is no interpolation and no nearest-neighbour matching: a sample
//! without an exact partner on the other channel is counted as unmatched
//! and otherwise ignored.

use std::collections::{BTreeMap, BTreeSet};

use strainwatch_types::Sample;

const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// A timestamp at which both channels report a value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignedPair {
    pub timestamp_ns: u64,
    pub monitored: f32,
    pub reference: f32,
}

impl AlignedPair {
    /// Signed divergence (monitored minus reference) at this timestamp.
    pub fn divergence(&self) -> DivergenceSample {
        DivergenceSample {
            timestamp_ns: self.timestamp_ns,
            divergence: f64::from(self.monitored) - f64::from(self.reference),
        }
    }
}

/// Signed difference between the channels at one timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DivergenceSample {
    pub timestamp_ns: u64,
    pub divergence: f64,
}

/// Analysis of one polling cycle's window.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleResult {
    /// Divergence with the largest magnitude; earliest wins on ties.
    pub peak: DivergenceSample,
    /// Seconds from the freshest aligned timestamp to the analysis time.
    pub delay_secs: f64,
    /// Seconds between the oldest and freshest aligned timestamps.
    pub span_secs: f64,
    /// Every aligned timestamp, used for gap detection.
    pub aligned: BTreeSet<u64>,
    /// Monitored samples with no reference partner.
    pub unmatched_monitored: usize,
    /// Reference samples with no monitored partner.
    pub unmatched_reference: usize,
}

/// Outcome of a cycle's divergence computation.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// The channels share at least one timestamp.
    Analyzed(CycleResult),
    /// Nothing to compare this cycle.
    NoData,
}

impl CycleOutcome {
    /// The analysis, if there was anything to compare.
    pub fn result(&self) -> Option<&CycleResult> {
        match self {
            CycleOutcome::Analyzed(result) => Some(result),
            CycleOutcome::NoData => None,
        }
    }
}

/// Per-channel figures printed with each cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChannelSummary {
    /// Number of samples fetched.
    pub count: usize,
    /// Value at the freshest timestamp.
    pub latest: Option<f32>,
    /// Largest finite value in the window.
    pub peak: Option<f32>,
}

impl ChannelSummary {
    /// Summarize one channel's fetched samples as received, before alignment.
    pub fn from_samples(samples: &[Sample]) -> Self {
        let latest = samples.iter().max_by_key(|s| s.timestamp_ns).map(|s| s.value);
        let peak = samples
            .iter()
            .map(|s| s.value)
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<f32>, v| Some(acc.map_or(v, |a| a.max(v))));

        Self {
            count: samples.len(),
            latest,
            peak,
        }
    }
}

/// Build a timestamp-to-value map. A repeated timestamp keeps the last value
/// received, and a timestamp whose last value is not finite is dropped.
fn index(samples: &[Sample]) -> BTreeMap<u64, f32> {
    let mut index: BTreeMap<u64, f32> = samples
        .iter()
        .map(|s| (s.timestamp_ns, s.value))
        .collect();
    index.retain(|_, value| value.is_finite());
    index
}

/// Pair up samples that share an exact timestamp, in timestamp order.
pub fn align(monitored: &[Sample], reference: &[Sample]) -> Vec<AlignedPair> {
    pair_up(&index(monitored), &index(reference))
}

fn pair_up(monitored: &BTreeMap<u64, f32>, reference: &BTreeMap<u64, f32>) -> Vec<AlignedPair> {
    monitored
        .iter()
        .filter_map(|(ts, m)| {
            reference.get(ts).map(|r| AlignedPair {
                timestamp_ns: *ts,
                monitored: *m,
                reference: *r,
            })
        })
        .collect()
}

/// Compare two channels over the same window.
///
/// `now_ns` is the wall-clock time of the analysis, used for the delay.
pub fn compute(monitored: &[Sample], reference: &[Sample], now_ns: u64) -> CycleOutcome {
    let monitored_index = index(monitored);
    let reference_index = index(reference);

    let pairs = pair_up(&monitored_index, &reference_index);

    let (Some(first), Some(last)) = (pairs.first(), pairs.last()) else {
        return CycleOutcome::NoData;
    };
    let earliest = first.timestamp_ns;
    let latest = last.timestamp_ns;

    // Pairs are in timestamp order, so a strict comparison keeps the earliest tie
    let mut peak = first.divergence();
    for pair in &pairs[1..] {
        let candidate = pair.divergence();
        if candidate.divergence.abs() > peak.divergence.abs() {
            peak = candidate;
        }
    }

    let aligned: BTreeSet<u64> = pairs.iter().map(|p| p.timestamp_ns).collect();

    CycleOutcome::Analyzed(CycleResult {
        peak,
        delay_secs: (i128::from(now_ns) - i128::from(latest)) as f64 / NANOS_PER_SEC,
        span_secs: (latest - earliest) as f64 / NANOS_PER_SEC,
        unmatched_monitored: monitored_index.len() - aligned.len(),
        unmatched_reference: reference_index.len() - aligned.len(),
        aligned,
    })
}
