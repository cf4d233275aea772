//! Cut state machine and output swap
//!
//! The controller owns the slice bookkeeping and the sink factory behind a
//! single mutex shared by the control thread (which requests cuts) and the
//! streaming thread (which executes them inside the suspend hook).
//!
//! A cut runs as:
//!
//! 1. `request_cut` (control thread): Idle -> CutRequested, arm the hook
//! 2. hook fires (streaming thread, data held): -> Draining, register the
//!    drain callback, send the drain marker to the encoder
//! 3. drain complete (streaming thread): -> Swapping, record the closed
//!    slice, allocate and attach the next sink
//! 4. hook returns, point released, then the release hook: sequence += 1,
//!    -> Idle
//!
//! Steps 2-4 complete before the held buffer moves on, so every sample
//! lands in exactly one slice. The phase only returns to Idle once the
//! point is flowing again, so a request can never find it still held.

use crate::branch::{DrainedSlice, OutputBranch};
use crate::error::{PipelineError, Result};
use crate::sink::SinkFactory;
use crate::state::{SlicePhase, SliceRecord, SliceState};
use crate::suspend::{ReleaseHook, SuspendPoint};
use slicer_core::ClockTime;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

struct Inner {
    state: SliceState,
    pending_cut: Option<ClockTime>,
    factory: Box<dyn SinkFactory>,
    completed: Vec<SliceRecord>,
    failed: bool,
}

struct Shared {
    inner: Mutex<Inner>,
    idle: Condvar,
    suspend: Arc<SuspendPoint>,
}

/// Serializes cut requests and performs the drain/swap
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct PipelineController {
    shared: Arc<Shared>,
}

impl PipelineController {
    /// Create a controller over a sink factory and the suspend point it
    /// drives
    pub fn new(factory: Box<dyn SinkFactory>, suspend: Arc<SuspendPoint>) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: SliceState::default(),
                    pending_cut: None,
                    factory,
                    completed: Vec::new(),
                    failed: false,
                }),
                idle: Condvar::new(),
                suspend,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// The suspend point this controller arms
    pub fn suspend_point(&self) -> Arc<SuspendPoint> {
        Arc::clone(&self.shared.suspend)
    }

    /// Allocate slice 0 and attach it before any data flows
    pub fn open_first_slice(&self, branch: &mut OutputBranch) -> Result<()> {
        let mut inner = self.lock();
        let sink = inner.factory.next()?;
        inner.state.sequence_number = sink.sequence();
        branch.attach(sink)
    }

    /// Ask for a slice boundary at `end_time`
    ///
    /// Only accepted while idle; otherwise the request is dropped with
    /// [`PipelineError::ConcurrentCutIgnored`].
    pub fn request_cut(&self, end_time: ClockTime) -> Result<()> {
        let mut inner = self.lock();
        if inner.state.phase != SlicePhase::Idle {
            return Err(PipelineError::ConcurrentCutIgnored {
                phase: inner.state.phase,
            });
        }

        inner.state.phase = SlicePhase::CutRequested;
        inner.pending_cut = Some(end_time);

        let controller = self.clone();
        let armed = self
            .shared
            .suspend
            .block(Box::new(move |branch| controller.on_blocked(branch)));

        if let Err(e) = armed {
            inner.state.phase = SlicePhase::Idle;
            inner.pending_cut = None;
            return Err(match e {
                // Only a swap ever holds the point
                PipelineError::SuspendPointBusy => PipelineError::ConcurrentCutIgnored {
                    phase: SlicePhase::Swapping,
                },
                other => other,
            });
        }

        tracing::debug!(%end_time, sequence = inner.state.sequence_number, "Cut requested");
        Ok(())
    }

    /// Streaming thread, data held: start the drain
    fn on_blocked(&self, branch: &mut OutputBranch) -> Result<Option<ReleaseHook>> {
        let sequence = {
            let mut inner = self.lock();
            inner.state.phase = SlicePhase::Draining;
            inner.state.sequence_number
        };

        let controller = self.clone();
        branch.on_drain_complete(Box::new(move |branch, drained| {
            controller.on_drain_complete(branch, drained)
        }));

        match branch.send_drain() {
            Ok(_) => {
                let controller = self.clone();
                let release: ReleaseHook = Box::new(move || controller.on_released());
                Ok(Some(release))
            }
            Err(e @ PipelineError::SinkSwapFailed { .. }) => Err(e),
            Err(e) => Err(self.fail(sequence, &e)),
        }
    }

    /// Streaming thread, old sink closed: attach the next one
    fn on_drain_complete(&self, branch: &mut OutputBranch, drained: &DrainedSlice) -> Result<()> {
        let mut inner = self.lock();
        inner.state.phase = SlicePhase::Swapping;

        let start_time = inner.state.slice_start_time;
        let end_time = inner.pending_cut.unwrap_or(start_time);
        inner.completed.push(SliceRecord {
            sequence: drained.sequence,
            location: drained.location.clone(),
            frames: drained.frames,
            start_time,
            end_time,
        });

        let attached = inner
            .factory
            .next()
            .and_then(|sink| branch.attach(sink));
        if let Err(e) = attached {
            inner.failed = true;
            drop(inner);
            return Err(self.fail(drained.sequence, &e));
        }

        Ok(())
    }

    /// Streaming thread, point flowing again: the cut is complete
    fn on_released(&self) {
        let mut inner = self.lock();
        if inner.state.phase != SlicePhase::Swapping {
            return;
        }

        let start_time = inner.state.slice_start_time;
        let end_time = inner.pending_cut.take().unwrap_or(start_time);
        inner.state.sequence_number += 1;
        inner.state.slice_start_time = end_time;
        inner.state.phase = SlicePhase::Idle;
        self.shared.idle.notify_all();

        tracing::debug!(
            sequence = inner.state.sequence_number,
            slice_start = %end_time,
            "Cut complete"
        );
    }

    fn fail(&self, sequence: u64, cause: &PipelineError) -> PipelineError {
        tracing::error!(sequence, error = %cause, "Sink swap failed");
        let mut inner = self.lock();
        inner.failed = true;
        self.shared.idle.notify_all();
        PipelineError::SinkSwapFailed {
            sequence,
            reason: cause.to_string(),
        }
    }

    /// Close the open slice at end of stream
    ///
    /// A cut that was requested but never reached the suspend point is
    /// abandoned: the tail stays in the open slice.
    pub fn close_final_slice(
        &self,
        branch: &mut OutputBranch,
        end_time: ClockTime,
    ) -> Result<Option<SliceRecord>> {
        let start_time = {
            let mut inner = self.lock();
            if inner.state.phase != SlicePhase::Idle {
                if self.shared.suspend.disarm() {
                    tracing::warn!(
                        pending = ?inner.pending_cut,
                        "End of stream with cut pending; cut abandoned"
                    );
                }
                inner.state.phase = SlicePhase::Idle;
                inner.pending_cut = None;
            }
            inner.state.slice_start_time
        };

        if !branch.is_attached() {
            return Ok(None);
        }

        let drained = branch.send_drain()?;
        let record = SliceRecord {
            sequence: drained.sequence,
            location: drained.location,
            frames: drained.frames,
            start_time,
            end_time: end_time.max(start_time),
        };
        let mut inner = self.lock();
        inner.completed.push(record.clone());
        self.shared.idle.notify_all();

        Ok(Some(record))
    }

    /// Snapshot of the slice state
    pub fn state(&self) -> SliceState {
        self.lock().state
    }

    /// Slices closed so far, in order
    pub fn completed_slices(&self) -> Vec<SliceRecord> {
        self.lock().completed.clone()
    }

    /// True once a swap has failed
    pub fn has_failed(&self) -> bool {
        self.lock().failed
    }

    /// Block until no cut is in flight
    ///
    /// Returns false on timeout or after a failed swap.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let inner = self.lock();
        let (inner, _) = self
            .shared
            .idle
            .wait_timeout_while(inner, timeout, |inner| {
                inner.state.phase != SlicePhase::Idle && !inner.failed
            })
            .unwrap_or_else(PoisonError::into_inner);
        inner.state.phase == SlicePhase::Idle && !inner.failed
    }
}

impl std::fmt::Debug for PipelineController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineController")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{MemorySinkFactory, SinkHandle};
    use slicer_audio::SampleEncoding;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    fn setup() -> (PipelineController, OutputBranch, crate::sink::MemoryStore) {
        let factory = MemorySinkFactory::new();
        let store = factory.store();
        let controller = PipelineController::new(Box::new(factory), Arc::new(SuspendPoint::new()));
        let mut branch = OutputBranch::new(1, 8000, SampleEncoding::Float32);
        controller.open_first_slice(&mut branch).unwrap();
        (controller, branch, store)
    }

    fn frames(store: &crate::sink::MemoryStore, sequence: u64) -> u32 {
        hound::WavReader::new(Cursor::new(store.bytes(sequence).unwrap()))
            .unwrap()
            .duration()
    }

    #[test]
    fn test_initial_state() {
        let (controller, branch, store) = setup();
        let state = controller.state();
        assert_eq!(state.sequence_number, 0);
        assert_eq!(state.phase, SlicePhase::Idle);
        assert_eq!(state.slice_start_time, ClockTime::ZERO);
        assert_eq!(branch.current_sequence(), Some(0));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_cut_swaps_on_next_buffer() {
        let (controller, mut branch, store) = setup();
        let point = controller.suspend_point();

        point.pass(&[0.1; 100], &mut branch).unwrap();
        controller.request_cut(ClockTime::from_millis(1500)).unwrap();
        assert_eq!(controller.state().phase, SlicePhase::CutRequested);

        point.pass(&[0.2; 40], &mut branch).unwrap();

        let state = controller.state();
        assert_eq!(state.phase, SlicePhase::Idle);
        assert_eq!(state.sequence_number, 1);
        assert_eq!(state.slice_start_time, ClockTime::from_millis(1500));
        assert!(controller.wait_idle(Duration::from_millis(10)));

        assert_eq!(frames(&store, 0), 100);
        assert_eq!(branch.frames_in_slice(), 40);

        let completed = controller.completed_slices();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].frames, 100);
        assert_eq!(completed[0].end_time, ClockTime::from_millis(1500));
    }

    #[test]
    fn test_second_request_ignored_while_in_flight() {
        let (controller, mut branch, store) = setup();
        let point = controller.suspend_point();

        controller.request_cut(ClockTime::from_millis(1000)).unwrap();
        let err = controller.request_cut(ClockTime::from_millis(1020)).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ConcurrentCutIgnored {
                phase: SlicePhase::CutRequested
            }
        ));

        point.pass(&[0.0; 10], &mut branch).unwrap();
        point.pass(&[0.0; 10], &mut branch).unwrap();

        assert_eq!(controller.state().sequence_number, 1);
        assert_eq!(store.len(), 2);
        assert_eq!(
            controller.state().slice_start_time,
            ClockTime::from_millis(1000)
        );
    }

    #[test]
    fn test_request_while_point_held_is_ignored() {
        let (controller, mut branch, store) = setup();
        let point = controller.suspend_point();
        point.pass(&[0.1; 50], &mut branch).unwrap();

        {
            let mut inner = controller.lock();
            inner.state.phase = SlicePhase::CutRequested;
            inner.pending_cut = Some(ClockTime::from_millis(1200));
        }

        // Request a second cut after the new sink is attached but before the
        // point lets the held buffer through
        let racing = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&racing);
        let hooked = controller.clone();
        point
            .block(Box::new(move |branch| {
                let release = hooked.on_blocked(branch)?;
                let phase = hooked.state().phase;
                let result = hooked.request_cut(ClockTime::from_millis(2500));
                *slot.lock().unwrap() = Some((phase, result));
                Ok(release)
            }))
            .unwrap();

        point.pass(&[0.2; 20], &mut branch).unwrap();

        let (phase, result) = racing.lock().unwrap().take().unwrap();
        assert_eq!(phase, SlicePhase::Swapping);
        let err = result.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ConcurrentCutIgnored {
                phase: SlicePhase::Swapping
            }
        ));
        assert!(!err.is_fatal());

        let state = controller.state();
        assert_eq!(state.phase, SlicePhase::Idle);
        assert_eq!(state.sequence_number, 1);
        assert_eq!(state.slice_start_time, ClockTime::from_millis(1200));
        assert!(!point.is_blocked());
        assert_eq!(branch.frames_in_slice(), 20);

        // Once released, the next request goes through
        controller.request_cut(ClockTime::from_millis(2500)).unwrap();
        point.pass(&[0.3; 5], &mut branch).unwrap();
        assert_eq!(controller.state().sequence_number, 2);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_cut_requests_race_streaming_thread() {
        let (controller, mut branch, store) = setup();
        let point = controller.suspend_point();
        let done = Arc::new(AtomicBool::new(false));

        let requester = {
            let controller = controller.clone();
            let done = Arc::clone(&done);
            thread::spawn(move || -> Result<(u64, u64)> {
                let (mut accepted, mut ignored) = (0u64, 0u64);
                let mut millis = 0u64;
                while !done.load(Ordering::Acquire) {
                    millis += 1;
                    match controller.request_cut(ClockTime::from_millis(millis)) {
                        Ok(()) => accepted += 1,
                        Err(PipelineError::ConcurrentCutIgnored { .. }) => ignored += 1,
                        Err(e) => return Err(e),
                    }
                    thread::yield_now();
                }
                Ok((accepted, ignored))
            })
        };

        for _ in 0..5000 {
            point.pass(&[0.1; 8], &mut branch).unwrap();
        }
        done.store(true, Ordering::Release);
        let (accepted, _ignored) = requester.join().unwrap().unwrap();

        controller
            .close_final_slice(&mut branch, ClockTime::from_millis(u64::from(u32::MAX)))
            .unwrap();
        assert!(!controller.has_failed());

        let slices = controller.completed_slices();
        let cuts = slices.len() as u64 - 1;
        // At most one accepted cut was still pending at close
        assert!(accepted == cuts || accepted == cuts + 1, "{accepted} vs {cuts}");

        assert_eq!(slices.iter().map(|s| s.frames).sum::<u64>(), 5000 * 8);
        assert_eq!(store.len(), slices.len());
        for (n, slice) in slices.iter().enumerate() {
            assert_eq!(slice.sequence, n as u64);
            if n > 0 {
                assert_eq!(slice.start_time, slices[n - 1].end_time);
            }
        }
    }

    struct FailingFactory {
        inner: MemorySinkFactory,
        fail_at: u64,
        calls: u64,
    }

    impl SinkFactory for FailingFactory {
        fn next(&mut self) -> Result<SinkHandle> {
            let call = self.calls;
            self.calls += 1;
            if call == self.fail_at {
                return Err(PipelineError::SinkCreationFailed {
                    location: format!("mem://{call}"),
                    source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
                });
            }
            self.inner.next()
        }
    }

    #[test]
    fn test_swap_failure_is_fatal_and_keeps_point_blocked() {
        let factory = FailingFactory {
            inner: MemorySinkFactory::new(),
            fail_at: 1,
            calls: 0,
        };
        let controller = PipelineController::new(Box::new(factory), Arc::new(SuspendPoint::new()));
        let mut branch = OutputBranch::new(1, 8000, SampleEncoding::Float32);
        controller.open_first_slice(&mut branch).unwrap();
        let point = controller.suspend_point();

        point.pass(&[0.0; 10], &mut branch).unwrap();
        controller.request_cut(ClockTime::from_millis(2000)).unwrap();

        let err = point.pass(&[0.0; 10], &mut branch).unwrap_err();
        assert!(matches!(err, PipelineError::SinkSwapFailed { sequence: 0, .. }));
        assert!(err.is_fatal());

        assert!(point.is_failed());
        assert!(controller.has_failed());
        assert_eq!(controller.state().phase, SlicePhase::Swapping);
        assert!(!controller.wait_idle(Duration::from_millis(10)));
        assert!(matches!(
            point.pass(&[0.0; 10], &mut branch),
            Err(PipelineError::SuspendPointFailed)
        ));
    }

    #[test]
    fn test_close_final_slice_abandons_pending_cut() {
        let (controller, mut branch, store) = setup();
        let point = controller.suspend_point();

        point.pass(&[0.0; 30], &mut branch).unwrap();
        controller.request_cut(ClockTime::from_millis(1200)).unwrap();

        let record = controller
            .close_final_slice(&mut branch, ClockTime::from_millis(1300))
            .unwrap()
            .unwrap();

        assert_eq!(record.sequence, 0);
        assert_eq!(record.frames, 30);
        assert_eq!(record.end_time, ClockTime::from_millis(1300));
        assert!(!point.is_blocked());
        assert_eq!(controller.state().phase, SlicePhase::Idle);
        assert_eq!(store.len(), 1);
        assert_eq!(frames(&store, 0), 30);
    }

    #[test]
    fn test_close_twice_is_noop() {
        let (controller, mut branch, _store) = setup();
        assert!(controller
            .close_final_slice(&mut branch, ClockTime::ZERO)
            .unwrap()
            .is_some());
        assert!(controller
            .close_final_slice(&mut branch, ClockTime::ZERO)
            .unwrap()
            .is_none());
        assert_eq!(controller.completed_slices().len(), 1);
    }
}
