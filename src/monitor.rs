//! The polling loop.
//!
//! Every interval the monitor fetches the last `window` of both channels,
//! computes their divergence, steps the [`RunState`], and dispatches at most
//! one notification. Shutdown is cooperative: the loop races each fetch and
//! each sleep against a caller-supplied shutdown future, abandoning a cycle
//! that has not finished fetching. Once a cycle's data is in, its state
//! change and notification always complete together; the notification is
//! bounded by `notify_timeout` instead.

use std::fmt;
use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use strainwatch_adapters::AdapterError;
use tracing::{debug, error, info, warn};

use crate::data::duration::format_seconds;
use crate::data::{
    compute, Alert, ChannelSummary, CycleOutcome, Evaluation, GapStatus, RunState, RunSummary,
    ThresholdStatus,
};
use crate::notify::{Notifier, NotifyError};
use crate::source::{Channel, TelemetrySource};

/// Resolved settings for one monitoring run.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Absolute divergence above which an alert fires.
    pub threshold: f64,
    /// Pause between the end of one cycle and the start of the next.
    pub interval: Duration,
    /// How far back each cycle fetches.
    pub window: Duration,
    /// Display name of the monitored channel.
    pub monitored_label: String,
    /// Display name of the reference channel.
    pub reference_label: String,
    /// Display names of channels fetched for the status lines only, in
    /// [`Channel::Auxiliary`] index order.
    pub auxiliary_labels: Vec<String>,
    /// Longest wait for a notifier to accept an alert.
    pub notify_timeout: Duration,
    /// Stop after this many cycles. `None` runs until shutdown.
    pub max_cycles: Option<u64>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            threshold: 274.0,
            interval: Duration::from_secs(120),
            window: Duration::from_secs(600),
            monitored_label: "NCR Axial".to_string(),
            reference_label: "Control Axial".to_string(),
            auxiliary_labels: Vec::new(),
            notify_timeout: Duration::from_secs(10),
            max_cycles: None,
        }
    }
}

/// Everything one cycle observed and decided.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub window_start_ns: u64,
    pub window_end_ns: u64,
    pub monitored: ChannelSummary,
    pub reference: ChannelSummary,
    /// Display-only channels with their labels.
    pub auxiliary: Vec<(String, ChannelSummary)>,
    pub outcome: CycleOutcome,
    pub evaluation: Evaluation,
    /// `Some(true)` if an alert was delivered, `Some(false)` if delivery failed.
    pub delivered: Option<bool>,
    monitored_label: String,
    reference_label: String,
    threshold: f64,
}

/// What a cycle fetched and derived, before the run state is touched.
#[derive(Debug)]
struct Observation {
    window_start_ns: u64,
    window_end_ns: u64,
    monitored: ChannelSummary,
    reference: ChannelSummary,
    auxiliary: Vec<(String, ChannelSummary)>,
    outcome: CycleOutcome,
}

/// Monitors the divergence between two channels of one sensor.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use strainwatch::monitor::{Monitor, MonitorConfig};
/// use strainwatch::notify::ChannelNotifier;
/// use strainwatch::source::ScriptedSource;
/// use strainwatch_types::Sample;
///
/// # tokio_test::block_on(async {
/// let source = ScriptedSource::new();
/// source.push_cycle(
///     vec![Sample::new(1, 300.0)],
///     vec![Sample::new(1, 100.0)],
/// );
///
/// let (notifier, mut alerts) = ChannelNotifier::create(4);
/// let config = MonitorConfig {
///     threshold: 150.0,
///     max_cycles: Some(1),
///     ..MonitorConfig::default()
/// };
///
/// let summary = Monitor::new(source, notifier, config)
///     .run(std::future::pending())
///     .await
///     .unwrap();
///
/// assert!(summary.alert_fired);
/// assert_eq!(alerts.recv().await.unwrap().peak_divergence, 200.0);
/// # });
/// ```
#[derive(Debug)]
pub struct Monitor<S, N> {
    source: S,
    notifier: N,
    config: MonitorConfig,
    state: RunState,
}

impl<S: TelemetrySource, N: Notifier> Monitor<S, N> {
    pub fn new(source: S, notifier: N, config: MonitorConfig) -> Self {
        Self {
            source,
            notifier,
            config,
            state: RunState::new(),
        }
    }

    /// Current run state.
    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Authenticate, then poll until `shutdown` resolves or the cycle limit
    /// is reached. Cycle status is printed to stdout.
    ///
    /// Only an authentication failure ends the run with an error; every
    /// other problem is confined to the cycle it happened in.
    pub async fn run<F>(mut self, shutdown: F) -> Result<RunSummary, AdapterError>
    where
        F: Future<Output = ()>,
    {
        info!(source = self.source.description(), "Starting monitor");
        self.source.connect().await?;

        tokio::pin!(shutdown);

        loop {
            let observation = tokio::select! {
                biased;
                _ = &mut shutdown => None,
                observation = self.observe() => Some(observation),
            };
            let Some(observation) = observation else {
                info!("Shutdown requested, abandoning in-flight cycle");
                break;
            };
            // Not raced against shutdown: the state change and its notification land together
            let report = self.commit(observation).await;
            println!("{}", report);

            if self.config.max_cycles.is_some_and(|max| self.state.cycles >= max) {
                debug!(cycles = self.state.cycles, "Cycle limit reached");
                break;
            }

            println!(
                "\nWaiting for next data update ({})...",
                format_seconds(self.config.interval.as_secs_f64())
            );
            let interrupted = tokio::select! {
                biased;
                _ = &mut shutdown => true,
                _ = tokio::time::sleep(self.config.interval) => false,
            };
            if interrupted {
                info!("Shutdown requested during sleep");
                break;
            }
        }

        Ok(self.state.summary())
    }

    /// Run a single cycle: fetch both channels, analyze, evaluate, notify.
    pub async fn run_once(&mut self) -> CycleReport {
        let observation = self.observe().await;
        self.commit(observation).await
    }

    /// Fetch every channel for the current window and analyze the pair.
    /// Leaves the run state untouched, so it can be abandoned at any await.
    async fn observe(&self) -> Observation {
        let now = now_ns();
        let window_ns = u64::try_from(self.config.window.as_nanos()).unwrap_or(u64::MAX);
        let start = now.saturating_sub(window_ns);

        let auxiliary = async {
            let mut fetched = Vec::with_capacity(self.config.auxiliary_labels.len());
            for index in 0..self.config.auxiliary_labels.len() {
                fetched.push(self.source.fetch(Channel::Auxiliary(index), start, now).await);
            }
            fetched
        };
        let (monitored, reference, auxiliary) = tokio::join!(
            self.source.fetch(Channel::Monitored, start, now),
            self.source.fetch(Channel::Reference, start, now),
            auxiliary,
        );

        if monitored.is_empty() {
            warn!(channel = %self.config.monitored_label, "No recent data");
        }
        if reference.is_empty() {
            warn!(channel = %self.config.reference_label, "No recent data");
        }

        Observation {
            window_start_ns: start,
            window_end_ns: now,
            outcome: compute(&monitored, &reference, now),
            monitored: ChannelSummary::from_samples(&monitored),
            reference: ChannelSummary::from_samples(&reference),
            auxiliary: self
                .config
                .auxiliary_labels
                .iter()
                .cloned()
                .zip(auxiliary.iter().map(|samples| ChannelSummary::from_samples(samples)))
                .collect(),
        }
    }

    /// Step the run state with an observation and deliver any alert it raises.
    async fn commit(&mut self, observation: Observation) -> CycleReport {
        let (state, evaluation) =
            std::mem::take(&mut self.state).step(&observation.outcome, self.config.threshold);
        self.state = state;

        let delivered = match &evaluation.alert {
            Some(alert) => Some(self.deliver(alert).await),
            None => None,
        };

        CycleReport {
            window_start_ns: observation.window_start_ns,
            window_end_ns: observation.window_end_ns,
            monitored: observation.monitored,
            reference: observation.reference,
            auxiliary: observation.auxiliary,
            outcome: observation.outcome,
            evaluation,
            delivered,
            monitored_label: self.config.monitored_label.clone(),
            reference_label: self.config.reference_label.clone(),
            threshold: self.config.threshold,
        }
    }

    /// Hand an alert to the notifier. Returns whether it was accepted.
    async fn deliver(&mut self, alert: &Alert) -> bool {
        let limit = self.config.notify_timeout;
        let result = tokio::time::timeout(limit, self.notifier.notify(alert))
            .await
            .unwrap_or(Err(NotifyError::Timeout(limit)));

        match result {
            Ok(()) => {
                info!(peak = alert.peak_divergence, "Alert sent");
                true
            }
            Err(e) => {
                // Stay armed: this excursion is not retried
                error!(error = %e, peak = alert.peak_divergence, "Failed to send alert");
                self.state.delivery_failures += 1;
                false
            }
        }
    }
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

/// Format a nanosecond timestamp as UTC wall-clock time.
pub fn format_timestamp(timestamp_ns: u64) -> String {
    let secs = (timestamp_ns / 1_000_000_000) as i64;
    let nanos = (timestamp_ns % 1_000_000_000) as u32;
    match DateTime::<Utc>::from_timestamp(secs, nanos) {
        Some(t) => t.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => format!("{}ns", timestamp_ns),
    }
}

fn format_value(value: Option<f32>) -> String {
    value.map_or_else(|| "No data".to_string(), |v| format!("{:.2}", v))
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "\nWindow {} .. {}",
            format_timestamp(self.window_start_ns),
            format_timestamp(self.window_end_ns)
        )?;
        let pair = [
            (&self.monitored_label, &self.monitored),
            (&self.reference_label, &self.reference),
        ];
        let auxiliary = self.auxiliary.iter().map(|(label, summary)| (label, summary));
        for (label, summary) in pair.into_iter().chain(auxiliary) {
            writeln!(
                f,
                "{}: latest {}, peak {} ({} samples)",
                label,
                format_value(summary.latest),
                format_value(summary.peak),
                summary.count
            )?;
        }

        let pair = format!("{} - {}", self.monitored_label, self.reference_label);
        let Some(result) = self.outcome.result() else {
            return write!(f, "Peak ({}) difference: No data", pair);
        };

        writeln!(
            f,
            "Peak ({}) difference: {:.2} at {} (delay {}, span {}, {} aligned)",
            pair,
            result.peak.divergence,
            format_timestamp(result.peak.timestamp_ns),
            format_seconds(result.delay_secs),
            format_seconds(result.span_secs),
            result.aligned.len()
        )?;
        if result.unmatched_monitored + result.unmatched_reference > 0 {
            writeln!(
                f,
                "Unmatched samples: {} {}, {} {}",
                result.unmatched_monitored,
                self.monitored_label,
                result.unmatched_reference,
                self.reference_label
            )?;
        }

        let magnitude = result.peak.divergence.abs();
        match self.evaluation.threshold {
            ThresholdStatus::Breached => {
                write!(
                    f,
                    "Threshold breached! Absolute difference = {:.2} (threshold = {:.2})",
                    magnitude, self.threshold
                )?;
                match self.delivered {
                    Some(true) => write!(f, ", alert sent")?,
                    Some(false) => write!(f, ", alert delivery FAILED")?,
                    None => {}
                }
            }
            ThresholdStatus::Suppressed => write!(
                f,
                "Threshold still breached ({:.2} > {:.2}), alert already sent",
                magnitude, self.threshold
            )?,
            ThresholdStatus::Within { disarmed } => {
                write!(f, "Difference within threshold ({:.2})", magnitude)?;
                if disarmed {
                    write!(f, ", excursion ended")?;
                }
            }
            ThresholdStatus::NoData => {}
        }

        if self.evaluation.gap == GapStatus::Gap {
            write!(f, "\nGap: no overlap with the previous cycle's samples")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use strainwatch_types::Sample;

    use crate::notify::ChannelNotifier;
    use crate::source::ScriptedSource;

    const SEC: u64 = 1_000_000_000;

    #[derive(Debug)]
    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn notify(&self, _alert: &Alert) -> Result<(), NotifyError> {
            Err(NotifyError::Delivery("smtp unreachable".to_string()))
        }
    }

    #[derive(Debug)]
    struct StalledNotifier;

    #[async_trait]
    impl Notifier for StalledNotifier {
        async fn notify(&self, _alert: &Alert) -> Result<(), NotifyError> {
            std::future::pending().await
        }
    }

    fn config(threshold: f64, max_cycles: Option<u64>) -> MonitorConfig {
        MonitorConfig {
            threshold,
            max_cycles,
            ..MonitorConfig::default()
        }
    }

    fn series(start: u64, values: &[f32]) -> Vec<Sample> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Sample::new(start + i as u64 * SEC, *v))
            .collect()
    }

    #[tokio::test]
    async fn test_end_to_end_single_excursion() {
        let source = ScriptedSource::new();
        source.push_cycle(
            series(100 * SEC, &[100.0, 100.0, 300.0]),
            series(100 * SEC, &[100.0, 100.0, 100.0]),
        );
        let (notifier, mut alerts) = ChannelNotifier::create(4);

        let mut monitor = Monitor::new(source, notifier, config(150.0, None));
        let report = monitor.run_once().await;

        let result = report.outcome.result().unwrap();
        assert_eq!(result.peak.divergence, 200.0);
        assert_eq!(result.peak.timestamp_ns, 102 * SEC);
        assert_eq!(report.evaluation.threshold, ThresholdStatus::Breached);
        assert_eq!(report.delivered, Some(true));

        let alert = alerts.recv().await.unwrap();
        assert_eq!(alert.peak_divergence, 200.0);
        assert!(alerts.try_recv().is_err());

        assert_eq!(monitor.state().max_divergence_seen, 200.0);
        assert!(monitor.state().summary().alert_fired);
    }

    #[tokio::test]
    async fn test_run_once_requests_window() {
        let source = ScriptedSource::new();
        let handle = source.clone();
        let (notifier, _alerts) = ChannelNotifier::create(4);

        let mut monitor = Monitor::new(source, notifier, config(10.0, None));
        let report = monitor.run_once().await;

        assert_eq!(report.window_end_ns - report.window_start_ns, 600 * SEC);
        let requests = handle.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests.contains(&(Channel::Monitored, report.window_start_ns, report.window_end_ns)));
        assert!(requests.contains(&(Channel::Reference, report.window_start_ns, report.window_end_ns)));
        assert_eq!(report.outcome, CycleOutcome::NoData);
        assert!(report.to_string().contains("difference: No data"));
    }

    #[tokio::test]
    async fn test_delivery_failure_keeps_alert_armed() {
        let source = ScriptedSource::new();
        source.push_cycle(series(SEC, &[50.0]), series(SEC, &[0.0]));
        source.push_cycle(series(2 * SEC, &[60.0]), series(2 * SEC, &[0.0]));

        let mut monitor = Monitor::new(source, FailingNotifier, config(10.0, None));

        let first = monitor.run_once().await;
        assert_eq!(first.delivered, Some(false));
        assert!(monitor.state().alert_armed);

        let second = monitor.run_once().await;
        assert_eq!(second.evaluation.threshold, ThresholdStatus::Suppressed);
        assert_eq!(second.delivered, None);

        let summary = monitor.state().summary();
        assert_eq!(summary.delivery_failures, 1);
        assert_eq!(summary.alerts_triggered, 1);
    }

    #[tokio::test]
    async fn test_run_stops_after_max_cycles() {
        let source = ScriptedSource::new();
        source.push_cycle(series(SEC, &[1.0, 2.0]), series(SEC, &[1.0, 2.0]));
        source.push_cycle(series(10 * SEC, &[1.0]), series(10 * SEC, &[1.0]));
        let (notifier, _alerts) = ChannelNotifier::create(4);

        let config = MonitorConfig {
            interval: Duration::from_millis(1),
            ..config(10.0, Some(2))
        };
        let summary = Monitor::new(source, notifier, config)
            .run(std::future::pending())
            .await
            .unwrap();

        assert_eq!(summary.cycles, 2);
        assert_eq!(summary.gap_count, 1);
        assert!(!summary.alert_fired);
    }

    #[tokio::test]
    async fn test_authentication_failure_is_fatal() {
        let source = ScriptedSource::rejecting();
        let handle = source.clone();
        let (notifier, _alerts) = ChannelNotifier::create(4);

        let err = Monitor::new(source, notifier, config(10.0, None))
            .run(std::future::pending())
            .await
            .unwrap_err();

        assert!(matches!(err, AdapterError::Auth(_)));
        assert!(handle.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_between_cycles() {
        let source = ScriptedSource::new();
        let (notifier, _alerts) = ChannelNotifier::create(4);

        // Cycles at 0s, 120s and 240s; shutdown lands during the third sleep
        let shutdown = tokio::time::sleep(Duration::from_secs(250));
        let summary = Monitor::new(source, notifier, config(10.0, None))
            .run(shutdown)
            .await
            .unwrap();

        assert_eq!(summary.cycles, 3);
        assert_eq!(summary.no_data_cycles, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_sleep() {
        let source = ScriptedSource::new();
        let (notifier, _alerts) = ChannelNotifier::create(4);

        let started = tokio::time::Instant::now();
        let shutdown = tokio::time::sleep(Duration::from_secs(5));
        let summary = Monitor::new(source, notifier, config(10.0, None))
            .run(shutdown)
            .await
            .unwrap();

        assert_eq!(summary.cycles, 1);
        assert!(started.elapsed() < Duration::from_secs(120));
    }

    #[tokio::test]
    async fn test_shutdown_before_first_cycle() {
        let source = ScriptedSource::new();
        let handle = source.clone();
        let (notifier, _alerts) = ChannelNotifier::create(4);

        let summary = Monitor::new(source, notifier, config(10.0, None))
            .run(std::future::ready(()))
            .await
            .unwrap();

        assert_eq!(summary.cycles, 0);
        assert!(handle.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_notifier_counts_as_failure() {
        let source = ScriptedSource::new();
        source.push_cycle(series(SEC, &[300.0]), series(SEC, &[100.0]));

        let started = tokio::time::Instant::now();
        // Shutdown fires while the notifier is still stuck
        let shutdown = tokio::time::sleep(Duration::from_secs(5));
        let summary = Monitor::new(source, StalledNotifier, config(150.0, None))
            .run(shutdown)
            .await
            .unwrap();

        assert_eq!(summary.cycles, 1);
        assert!(summary.alert_fired);
        assert_eq!(summary.alerts_triggered, 1);
        assert_eq!(summary.delivery_failures, 1);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(10));
        assert!(elapsed < Duration::from_secs(120));
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_channel_notifier_times_out() {
        let source = ScriptedSource::new();
        source.push_cycle(series(SEC, &[300.0]), series(SEC, &[100.0]));
        let (notifier, _alerts) = ChannelNotifier::create(1);
        let queued = Alert {
            peak_divergence: 1.0,
            timestamp_ns: 0,
            threshold: 0.0,
        };
        notifier.notify(&queued).await.unwrap();

        let config = MonitorConfig {
            notify_timeout: Duration::from_secs(2),
            ..config(150.0, None)
        };
        let mut monitor = Monitor::new(source, notifier, config);
        let report = monitor.run_once().await;

        assert_eq!(report.evaluation.threshold, ThresholdStatus::Breached);
        assert_eq!(report.delivered, Some(false));
        assert_eq!(monitor.state().delivery_failures, 1);
        assert!(report.to_string().contains("alert delivery FAILED"));
    }

    #[tokio::test]
    async fn test_auxiliary_channels_are_display_only() {
        let source = ScriptedSource::new();
        let handle = source.clone();
        source.push_cycle(series(SEC, &[100.0]), series(SEC, &[100.0]));
        source.push_auxiliary(0, series(SEC, &[55.0, 12.5]));
        let (notifier, _alerts) = ChannelNotifier::create(4);

        let config = MonitorConfig {
            auxiliary_labels: vec!["NCR Bending".to_string(), "Spare".to_string()],
            ..config(10.0, None)
        };
        let mut monitor = Monitor::new(source, notifier, config);
        let report = monitor.run_once().await;

        assert_eq!(report.auxiliary.len(), 2);
        let (label, bending) = &report.auxiliary[0];
        assert_eq!(label, "NCR Bending");
        assert_eq!(bending.latest, Some(12.5));
        assert_eq!(bending.peak, Some(55.0));
        assert_eq!(report.auxiliary[1].1.count, 0);

        let requests = handle.requests();
        assert_eq!(requests.len(), 4);
        assert!(requests.iter().any(|(channel, _, _)| *channel == Channel::Auxiliary(1)));

        let result = report.outcome.result().unwrap();
        assert_eq!(result.peak.divergence, 0.0);

        let text = report.to_string();
        assert!(text.contains("NCR Bending: latest 12.50, peak 55.00 (2 samples)"));
        assert!(text.contains("Spare: latest No data"));
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00 UTC");
        assert_eq!(
            format_timestamp(1_743_800_400 * SEC),
            "2025-04-04 21:00:00 UTC"
        );
    }
}
