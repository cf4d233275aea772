//! Silence-based cut decision
//!
//! A cut fires when the aggregated RMS level of a report is below the
//! silence threshold and the open slice has lasted at least the minimum
//! slice length:
//!
//! ```text
//! cut = aggregate(rms_db) < threshold_db
//!       && (report.end_time - slice_start) >= min_slice_length
//! ```
//!
//! The decision is a pure function of its inputs.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use slicer_core::{ChannelLevel, ClockTime, LoudnessReport};
use std::time::Duration;

/// How per-channel RMS levels reduce to the single value compared against
/// the silence threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelAggregate {
    /// First channel only
    First,
    /// Loudest channel: silent only when every channel is silent
    #[default]
    Loudest,
    /// Quietest channel: silent as soon as any channel is silent
    Quietest,
    /// Power mean across channels
    Mean,
}

impl ChannelAggregate {
    /// Reduce channel RMS levels to one dB value
    ///
    /// Returns `None` for an empty channel list.
    pub fn aggregate(self, channels: &[ChannelLevel]) -> Option<f64> {
        let levels = channels.iter().map(|c| c.rms_db);
        match self {
            Self::First => channels.first().map(|c| c.rms_db),
            Self::Loudest => levels.reduce(f64::max),
            Self::Quietest => levels.reduce(f64::min),
            Self::Mean => {
                if channels.is_empty() {
                    return None;
                }
                let power: f64 = levels.map(|db| 10f64.powf(db / 10.0)).sum();
                Some(10.0 * (power / channels.len() as f64).log10())
            }
        }
    }
}

/// Outcome of evaluating one report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CutDecision {
    /// Whether a slice boundary should be placed
    pub cut: bool,
    /// End time of the report that was evaluated
    pub end_time: ClockTime,
}

/// Evaluate one report against the open slice
pub fn evaluate(
    report: &LoudnessReport,
    slice_start: ClockTime,
    min_slice_length: Duration,
    silence_threshold_db: f64,
    aggregate: ChannelAggregate,
) -> Result<CutDecision> {
    if report.channels.is_empty() {
        return Err(PipelineError::MalformedReport(
            "report carries no channels".to_string(),
        ));
    }
    if report.channels.iter().any(|c| c.rms_db.is_nan()) {
        return Err(PipelineError::MalformedReport(
            "rms level is NaN".to_string(),
        ));
    }

    let level = aggregate.aggregate(&report.channels).ok_or_else(|| {
        PipelineError::MalformedReport("no level to aggregate".to_string())
    })?;

    let elapsed = report.end_time.saturating_since(slice_start);
    let cut = level < silence_threshold_db && elapsed >= min_slice_length;

    Ok(CutDecision {
        cut,
        end_time: report.end_time,
    })
}

/// [`evaluate`] bound to a fixed configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliceHeuristic {
    silence_threshold_db: f64,
    min_slice_length: Duration,
    aggregate: ChannelAggregate,
}

impl SliceHeuristic {
    /// Create a heuristic
    pub fn new(
        silence_threshold_db: f64,
        min_slice_length: Duration,
        aggregate: ChannelAggregate,
    ) -> Self {
        Self {
            silence_threshold_db,
            min_slice_length,
            aggregate,
        }
    }

    /// Silence threshold in dB
    pub fn silence_threshold_db(&self) -> f64 {
        self.silence_threshold_db
    }

    /// Minimum slice length
    pub fn min_slice_length(&self) -> Duration {
        self.min_slice_length
    }

    /// Evaluate a report against a slice that started at `slice_start`
    pub fn evaluate(&self, report: &LoudnessReport, slice_start: ClockTime) -> Result<CutDecision> {
        evaluate(
            report,
            slice_start,
            self.min_slice_length,
            self.silence_threshold_db,
            self.aggregate,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(end_ms: u64, rms: &[f64]) -> LoudnessReport {
        LoudnessReport::new(
            ClockTime::from_millis(end_ms),
            rms.iter().map(|&r| ChannelLevel::new(r, r, r)).collect(),
        )
    }

    fn heuristic() -> SliceHeuristic {
        SliceHeuristic::new(-36.0, Duration::from_secs(1), ChannelAggregate::Loudest)
    }

    #[test]
    fn test_silence_too_early_does_not_cut() {
        let decision = heuristic()
            .evaluate(&report(500, &[-40.0]), ClockTime::ZERO)
            .unwrap();
        assert!(!decision.cut);
        assert_eq!(decision.end_time, ClockTime::from_millis(500));
    }

    #[test]
    fn test_silence_after_min_length_cuts() {
        let decision = heuristic()
            .evaluate(&report(1200, &[-40.0]), ClockTime::ZERO)
            .unwrap();
        assert!(decision.cut);
        assert_eq!(decision.end_time, ClockTime::from_millis(1200));
    }

    #[test]
    fn test_exact_min_length_cuts() {
        let decision = heuristic()
            .evaluate(&report(3000, &[-40.0]), ClockTime::from_millis(2000))
            .unwrap();
        assert!(decision.cut);
    }

    #[test]
    fn test_loud_report_never_cuts() {
        let decision = heuristic()
            .evaluate(&report(60_000, &[-10.0]), ClockTime::ZERO)
            .unwrap();
        assert!(!decision.cut);
    }

    #[test]
    fn test_threshold_is_strict() {
        let decision = heuristic()
            .evaluate(&report(5000, &[-36.0]), ClockTime::ZERO)
            .unwrap();
        assert!(!decision.cut);
    }

    #[test]
    fn test_empty_channels_malformed() {
        let result = heuristic().evaluate(&report(5000, &[]), ClockTime::ZERO);
        assert!(matches!(result, Err(PipelineError::MalformedReport(_))));
    }

    #[test]
    fn test_nan_rms_malformed() {
        let result = heuristic().evaluate(&report(5000, &[-50.0, f64::NAN]), ClockTime::ZERO);
        assert!(matches!(result, Err(PipelineError::MalformedReport(_))));
    }

    #[test]
    fn test_report_before_slice_start_does_not_cut() {
        let decision = heuristic()
            .evaluate(&report(100, &[-90.0]), ClockTime::from_millis(5000))
            .unwrap();
        assert!(!decision.cut);
    }

    #[test]
    fn test_aggregates() {
        let channels: Vec<ChannelLevel> = [-50.0, -20.0]
            .iter()
            .map(|&r| ChannelLevel::new(r, r, r))
            .collect();

        assert_eq!(ChannelAggregate::First.aggregate(&channels), Some(-50.0));
        assert_eq!(ChannelAggregate::Loudest.aggregate(&channels), Some(-20.0));
        assert_eq!(ChannelAggregate::Quietest.aggregate(&channels), Some(-50.0));

        let mean = ChannelAggregate::Mean.aggregate(&channels).unwrap();
        assert!(mean > -24.0 && mean < -20.0, "mean {mean}");

        assert_eq!(ChannelAggregate::Loudest.aggregate(&[]), None);
        assert_eq!(ChannelAggregate::Mean.aggregate(&[]), None);
    }

    #[test]
    fn test_loudest_requires_all_channels_silent() {
        let h = heuristic();
        let one_silent = h.evaluate(&report(2000, &[-60.0, -20.0]), ClockTime::ZERO).unwrap();
        assert!(!one_silent.cut);

        let quietest = SliceHeuristic::new(-36.0, Duration::from_secs(1), ChannelAggregate::Quietest);
        let decision = quietest
            .evaluate(&report(2000, &[-60.0, -20.0]), ClockTime::ZERO)
            .unwrap();
        assert!(decision.cut);
    }

    #[test]
    fn test_aggregate_serde_names() {
        let parsed: ChannelAggregate = serde_json::from_str("\"quietest\"").unwrap();
        assert_eq!(parsed, ChannelAggregate::Quietest);
    }
}
