//! Control loop
//!
//! Single-threaded dispatch of bus messages: each level report is checked
//! against the heuristic and may turn into a cut request. Recoverable
//! errors are absorbed here; fatal ones end the loop.

use crate::controller::PipelineController;
use crate::error::{PipelineError, Result};
use crate::heuristic::SliceHeuristic;
use crate::state::SliceRecord;
use crate::streaming::BusMessage;
use crossbeam_channel::Receiver;
use serde::Serialize;
use slicer_core::LoudnessReport;

/// What happened to one report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Malformed; dropped without a decision
    Discarded,
    /// Evaluated, no boundary
    NoCut,
    /// Evaluated, cut requested
    CutRequested,
    /// Evaluated as a cut, but one was already in flight
    CutIgnored,
}

/// Totals from a finished run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    /// Every slice produced, in order
    pub slices: Vec<SliceRecord>,
    /// Reports received
    pub reports: u64,
    /// Cuts requested
    pub cuts_requested: u64,
    /// Cut decisions dropped because a cut was in flight
    pub cuts_ignored: u64,
    /// Malformed reports dropped
    pub reports_discarded: u64,
}

impl RunSummary {
    /// Frames across all slices
    pub fn total_frames(&self) -> u64 {
        self.slices.iter().map(|s| s.frames).sum()
    }
}

/// Event-dispatch loop delivering reports to the controller
pub struct ControlLoop {
    controller: PipelineController,
    heuristic: SliceHeuristic,
    bus: Receiver<BusMessage>,
    expected_channels: Option<usize>,
    summary: RunSummary,
}

impl ControlLoop {
    /// Create a loop; `expected_channels` pins the report width when known
    pub fn new(
        controller: PipelineController,
        heuristic: SliceHeuristic,
        bus: Receiver<BusMessage>,
        expected_channels: Option<usize>,
    ) -> Self {
        Self {
            controller,
            heuristic,
            bus,
            expected_channels,
            summary: RunSummary::default(),
        }
    }

    /// Evaluate one report and request a cut if it calls for one
    ///
    /// Only fatal errors are returned.
    pub fn handle_report(&mut self, report: &LoudnessReport) -> Result<ReportOutcome> {
        self.summary.reports += 1;

        match self.try_handle(report) {
            Ok(outcome) => Ok(outcome),
            Err(e @ PipelineError::MalformedReport(_)) => {
                tracing::warn!(end_time = %report.end_time, error = %e, "Report discarded");
                self.summary.reports_discarded += 1;
                Ok(ReportOutcome::Discarded)
            }
            Err(e @ PipelineError::ConcurrentCutIgnored { .. }) => {
                tracing::debug!(end_time = %report.end_time, reason = %e, "Cut ignored");
                self.summary.cuts_ignored += 1;
                Ok(ReportOutcome::CutIgnored)
            }
            Err(e) => Err(e),
        }
    }

    fn try_handle(&mut self, report: &LoudnessReport) -> Result<ReportOutcome> {
        // Width is fixed for a stream: the first report sets it if unknown
        let expected = *self
            .expected_channels
            .get_or_insert(report.channel_count());
        if report.channel_count() != expected {
            return Err(PipelineError::MalformedReport(format!(
                "expected {expected} channels, got {}",
                report.channel_count()
            )));
        }

        let state = self.controller.state();
        let decision = self.heuristic.evaluate(report, state.slice_start_time)?;
        tracing::debug!(
            end_time = %decision.end_time,
            cut = decision.cut,
            sequence = state.sequence_number,
            "Report evaluated"
        );

        if !decision.cut {
            return Ok(ReportOutcome::NoCut);
        }

        self.controller.request_cut(decision.end_time)?;
        self.summary.cuts_requested += 1;
        Ok(ReportOutcome::CutRequested)
    }

    /// Run until end of stream or a fatal error
    pub fn run(mut self) -> Result<RunSummary> {
        loop {
            let message = self
                .bus
                .recv()
                .map_err(|_| PipelineError::Disconnected)?;

            match message {
                BusMessage::Level(report) => {
                    self.handle_report(&report)?;
                }
                BusMessage::Eos => {
                    tracing::info!(
                        slices = self.controller.completed_slices().len(),
                        "End of stream"
                    );
                    break;
                }
                BusMessage::Error(e) => {
                    return Err(e);
                }
            }
        }

        self.summary.slices = self.controller.completed_slices();
        Ok(self.summary)
    }

    /// Totals so far
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::OutputBranch;
    use crate::heuristic::ChannelAggregate;
    use crate::sink::MemorySinkFactory;
    use crate::state::SlicePhase;
    use crate::suspend::SuspendPoint;
    use crossbeam_channel::bounded;
    use slicer_audio::SampleEncoding;
    use slicer_core::{ChannelLevel, ClockTime};
    use std::sync::Arc;
    use std::time::Duration;

    fn report(end_ms: u64, rms: &[f64]) -> LoudnessReport {
        LoudnessReport::new(
            ClockTime::from_millis(end_ms),
            rms.iter().map(|&r| ChannelLevel::new(r, r, r)).collect(),
        )
    }

    fn setup() -> (ControlLoop, PipelineController, OutputBranch) {
        let controller = PipelineController::new(
            Box::new(MemorySinkFactory::new()),
            Arc::new(SuspendPoint::new()),
        );
        let mut branch = OutputBranch::new(1, 8000, SampleEncoding::Float32);
        controller.open_first_slice(&mut branch).unwrap();
        let (_tx, rx) = bounded(4);
        let heuristic = SliceHeuristic::new(-36.0, Duration::from_secs(1), ChannelAggregate::Loudest);
        let control = ControlLoop::new(controller.clone(), heuristic, rx, Some(1));
        (control, controller, branch)
    }

    #[test]
    fn test_loud_report_no_cut() {
        let (mut control, controller, _branch) = setup();
        let outcome = control.handle_report(&report(5000, &[-10.0])).unwrap();
        assert_eq!(outcome, ReportOutcome::NoCut);
        assert_eq!(controller.state().phase, SlicePhase::Idle);
    }

    #[test]
    fn test_single_flight() {
        let (mut control, controller, mut branch) = setup();

        assert_eq!(
            control.handle_report(&report(1200, &[-50.0])).unwrap(),
            ReportOutcome::CutRequested
        );
        assert_eq!(
            control.handle_report(&report(1220, &[-50.0])).unwrap(),
            ReportOutcome::CutIgnored
        );

        controller
            .suspend_point()
            .pass(&[0.0; 8], &mut branch)
            .unwrap();

        let state = controller.state();
        assert_eq!(state.sequence_number, 1);
        assert_eq!(state.slice_start_time, ClockTime::from_millis(1200));
        assert_eq!(control.summary().cuts_requested, 1);
        assert_eq!(control.summary().cuts_ignored, 1);
    }

    #[test]
    fn test_malformed_report_leaves_phase_unchanged() {
        let (mut control, controller, _branch) = setup();
        let before = controller.state();

        assert_eq!(
            control.handle_report(&report(5000, &[])).unwrap(),
            ReportOutcome::Discarded
        );
        assert_eq!(
            control.handle_report(&report(5000, &[-60.0, -60.0])).unwrap(),
            ReportOutcome::Discarded
        );

        assert_eq!(controller.state(), before);
        assert_eq!(control.summary().reports_discarded, 2);
        assert_eq!(control.summary().reports, 2);
    }

    #[test]
    fn test_corrupt_samples_never_read_as_silence() {
        let (mut control, controller, _branch) = setup();
        let mut meter = slicer_loudness::LevelMeter::new(
            slicer_core::AudioFormat::float32(8000, 1),
            slicer_loudness::LevelSettings::default(),
        )
        .unwrap();

        // Quiet block with one NaN sample, well past the minimum length
        meter.process(&vec![0.0; 8000]).unwrap();
        let mut samples = vec![0.0; 160];
        samples[40] = f32::NAN;
        let reports = meter.process(&samples).unwrap();
        assert_eq!(reports.len(), 1);

        assert_eq!(
            control.handle_report(&reports[0]).unwrap(),
            ReportOutcome::Discarded
        );
        assert_eq!(controller.state().phase, SlicePhase::Idle);
        assert_eq!(control.summary().cuts_requested, 0);
    }

    #[test]
    fn test_min_length_measured_from_new_slice_start() {
        let (mut control, controller, mut branch) = setup();

        control.handle_report(&report(1500, &[-50.0])).unwrap();
        controller
            .suspend_point()
            .pass(&[0.0; 8], &mut branch)
            .unwrap();

        // 800ms into the second slice
        assert_eq!(
            control.handle_report(&report(2300, &[-50.0])).unwrap(),
            ReportOutcome::NoCut
        );
        assert_eq!(
            control.handle_report(&report(2500, &[-50.0])).unwrap(),
            ReportOutcome::CutRequested
        );
    }

    #[test]
    fn test_run_stops_on_eos_and_error() {
        let controller = PipelineController::new(
            Box::new(MemorySinkFactory::new()),
            Arc::new(SuspendPoint::new()),
        );
        let heuristic = SliceHeuristic::new(-36.0, Duration::from_secs(1), ChannelAggregate::Loudest);

        let (tx, rx) = bounded(8);
        tx.send(BusMessage::Level(report(20, &[-10.0]))).unwrap();
        tx.send(BusMessage::Eos).unwrap();
        let summary = ControlLoop::new(controller.clone(), heuristic, rx, None)
            .run()
            .unwrap();
        assert_eq!(summary.reports, 1);
        assert!(summary.slices.is_empty());

        let (tx, rx) = bounded(8);
        tx.send(BusMessage::Error(PipelineError::SinkSwapFailed {
            sequence: 3,
            reason: "disk full".to_string(),
        }))
        .unwrap();
        let err = ControlLoop::new(controller.clone(), heuristic, rx, None)
            .run()
            .unwrap_err();
        assert!(err.is_sink_failure());

        let (tx, rx) = bounded::<BusMessage>(8);
        drop(tx);
        assert!(matches!(
            ControlLoop::new(controller, heuristic, rx, None).run(),
            Err(PipelineError::Disconnected)
        ));
    }
}
