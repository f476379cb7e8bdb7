//! Divergence analysis and alert state.
//!
//! This module turns two channels' raw samples into a per-cycle verdict.
//!
//! ## Submodules
//!
//! - [`divergence`]: Exact-timestamp alignment and peak divergence ([`compute`])
//! - [`alert`]: Edge-triggered threshold alerting and gap tracking ([`RunState`])
//! - [`duration`]: Parsing and formatting of duration strings (e.g., "120s", "10m")
//!
//! ## Data Flow
//!
//! ```text
//! monitored samples ─┐
//!                    ├──▶ divergence::compute() ──▶ CycleOutcome
//! reference samples ─┘                                  │
//!                                                       ▼
//!                         RunState::step() ──▶ (RunState, Evaluation)
//!                                                       │
//!                                                       └──▶ Alert (maybe)
//! ```

pub mod alert;
pub mod divergence;
pub mod duration;

pub use alert::{Alert, Evaluation, GapStatus, RunState, RunSummary, ThresholdStatus};
pub use divergence::{
    align, compute, AlignedPair, ChannelSummary, CycleOutcome, CycleResult, DivergenceSample,
};
