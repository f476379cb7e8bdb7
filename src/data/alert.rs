//! Threshold alerting and gap tracking across polling cycles.
//!
//! [`RunState`] is a plain value threaded through the polling loop: each
//! cycle hands the current state and the cycle's [`CycleOutcome`] to
//! [`RunState::step`] and gets back the next state plus an [`Evaluation`]
//! describing what happened.
//!
//! Notification is edge-triggered. The first cycle whose peak exceeds the
//! threshold arms the alert and requests one notification; later cycles of
//! the same excursion are suppressed. The alert disarms once the peak is
//! back at or below the threshold, so the next excursion notifies again.
//!
//! ```text
//!            |peak| > threshold / notify
//!   ┌────────┐ ─────────────────────────▶ ┌────────┐
//!   │ Idle   │                            │ Armed  │ ◀─┐ |peak| > threshold
//!   └────────┘ ◀───────────────────────── └────────┘ ──┘ (suppressed)
//!            |peak| <= threshold
//! ```

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use super::divergence::CycleOutcome;

/// Subject line for divergence alerts.
pub const ALERT_SUBJECT: &str = "Strain Monitor Alert: Strain Difference Exceeded";

/// A request to notify about a threshold excursion.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    /// Signed peak divergence that crossed the threshold.
    pub peak_divergence: f64,
    /// Timestamp of that peak.
    pub timestamp_ns: u64,
    /// Threshold in force when the alert fired.
    pub threshold: f64,
}

impl Alert {
    pub fn subject(&self) -> &'static str {
        ALERT_SUBJECT
    }

    /// Message body naming the monitored element.
    pub fn body(&self, element: &str) -> String {
        format!(
            "The peak strain difference exceeded the threshold of {:.2} for {}.\n\nValue: {:.2}",
            self.threshold, element, self.peak_divergence
        )
    }
}

/// How a cycle's peak compared with the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdStatus {
    /// No aligned samples this cycle.
    NoData,
    /// At or below the threshold. `disarmed` is set when this ends an excursion.
    Within { disarmed: bool },
    /// Above the threshold and a notification was requested.
    Breached,
    /// Above the threshold, already notified for this excursion.
    Suppressed,
}

/// Whether this cycle's aligned timestamps overlap the previous cycle's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapStatus {
    /// No earlier cycle to compare against.
    NoBaseline,
    /// The windows share at least one timestamp.
    Overlap,
    /// The windows are disjoint: telemetry was missed or delayed.
    Gap,
    /// No data this cycle, nothing compared.
    Skipped,
}

/// What a single cycle decided.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub threshold: ThresholdStatus,
    pub gap: GapStatus,
    /// Set when this cycle should dispatch a notification.
    pub alert: Option<Alert>,
}

/// State carried from one cycle to the next for the lifetime of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunState {
    /// A notification has been requested for the current excursion.
    pub alert_armed: bool,
    /// Largest absolute peak divergence seen so far.
    pub max_divergence_seen: f64,
    /// Cycles whose aligned timestamps did not overlap the previous set.
    pub gap_count: u64,
    /// Aligned timestamps of the last cycle that had data.
    pub previous_timestamps: Option<BTreeSet<u64>>,
    pub cycles: u64,
    pub no_data_cycles: u64,
    pub alerts_triggered: u64,
    pub delivery_failures: u64,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one cycle's outcome.
    pub fn step(mut self, outcome: &CycleOutcome, threshold: f64) -> (Self, Evaluation) {
        self.cycles += 1;

        let result = match outcome {
            CycleOutcome::NoData => {
                // Keep the gap baseline from the last cycle with data
                self.no_data_cycles += 1;
                let evaluation = Evaluation {
                    threshold: ThresholdStatus::NoData,
                    gap: GapStatus::Skipped,
                    alert: None,
                };
                return (self, evaluation);
            }
            CycleOutcome::Analyzed(result) => result,
        };

        let gap = match &self.previous_timestamps {
            None => GapStatus::NoBaseline,
            Some(previous) if previous.is_disjoint(&result.aligned) => {
                self.gap_count += 1;
                GapStatus::Gap
            }
            Some(_) => GapStatus::Overlap,
        };
        self.previous_timestamps = Some(result.aligned.clone());

        let magnitude = result.peak.divergence.abs();
        self.max_divergence_seen = self.max_divergence_seen.max(magnitude);

        let mut alert = None;
        let status = if magnitude > threshold {
            if self.alert_armed {
                ThresholdStatus::Suppressed
            } else {
                self.alert_armed = true;
                self.alerts_triggered += 1;
                alert = Some(Alert {
                    peak_divergence: result.peak.divergence,
                    timestamp_ns: result.peak.timestamp_ns,
                    threshold,
                });
                ThresholdStatus::Breached
            }
        } else {
            let disarmed = self.alert_armed;
            self.alert_armed = false;
            ThresholdStatus::Within { disarmed }
        };

        let evaluation = Evaluation {
            threshold: status,
            gap,
            alert,
        };
        (self, evaluation)
    }

    /// Report for the end of a run.
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            alert_fired: self.alerts_triggered > 0,
            max_divergence_seen: self.max_divergence_seen,
            gap_count: self.gap_count,
            cycles: self.cycles,
            no_data_cycles: self.no_data_cycles,
            alerts_triggered: self.alerts_triggered,
            delivery_failures: self.delivery_failures,
        }
    }
}

/// Figures printed when a run ends.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub alert_fired: bool,
    pub max_divergence_seen: f64,
    pub gap_count: u64,
    pub cycles: u64,
    pub no_data_cycles: u64,
    pub alerts_triggered: u64,
    pub delivery_failures: u64,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run summary")?;
        writeln!(
            f,
            "  Alert fired:          {}",
            if self.alert_fired { "yes" } else { "no" }
        )?;
        writeln!(f, "  Max divergence seen:  {:.2}", self.max_divergence_seen)?;
        writeln!(f, "  Gaps detected:        {}", self.gap_count)?;
        write!(
            f,
            "  Cycles:               {} ({} without data)",
            self.cycles, self.no_data_cycles
        )?;
        if self.delivery_failures > 0 {
            write!(
                f,
                "\n  Failed deliveries:    {} of {}",
                self.delivery_failures, self.alerts_triggered
            )?;
        }
        Ok(())
    }
}
