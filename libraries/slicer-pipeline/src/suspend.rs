//! Suspend point between the meter and the output branch
//!
//! Any thread may arm a one-shot hook with [`SuspendPoint::block`]. The next
//! buffer reaching [`SuspendPoint::pass`] on the streaming thread is held
//! while the hook runs there, with exclusive access to the output branch.
//! A hook may hand back a [`ReleaseHook`], which runs once the point is
//! flowing again and before the held buffer moves on.
//!
//! ```text
//!            block(hook)              pass(): hook Ok
//!  Flowing ─────────────► Armed ───────────────────────► Blocked ──unblock──► Flowing
//!                                                           │
//!                                                           │ hook Err
//!                                                           ▼
//!                                                        Failed (terminal)
//! ```
//!
//! A failed hook leaves the point failed for good: no further data passes,
//! so nothing is ever written behind a broken swap.

use crate::branch::OutputBranch;
use crate::error::{PipelineError, Result};
use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// One-shot hook run on the streaming thread while data is held
pub type BlockHook = Box<dyn FnOnce(&mut OutputBranch) -> Result<Option<ReleaseHook>> + Send>;

/// Continuation of a successful hook, run after the point is released
pub type ReleaseHook = Box<dyn FnOnce() + Send>;

enum PointState {
    Flowing,
    Armed(BlockHook),
    Blocked,
    Failed,
}

impl fmt::Debug for PointState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Flowing => "Flowing",
            Self::Armed(_) => "Armed",
            Self::Blocked => "Blocked",
            Self::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// Blocking probe point on the data path
#[derive(Debug)]
pub struct SuspendPoint {
    state: Mutex<PointState>,
    released: Condvar,
}

impl SuspendPoint {
    /// Create a point in the flowing state
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PointState::Flowing),
            released: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PointState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Arm a hook for the next buffer
    ///
    /// Only a flowing point can be armed.
    pub fn block(&self, hook: BlockHook) -> Result<()> {
        let mut state = self.lock();
        match *state {
            PointState::Flowing => {
                *state = PointState::Armed(hook);
                Ok(())
            }
            PointState::Failed => Err(PipelineError::SuspendPointFailed),
            PointState::Armed(_) | PointState::Blocked => Err(PipelineError::SuspendPointBusy),
        }
    }

    /// Release a held point
    pub fn unblock(&self) {
        let mut state = self.lock();
        if matches!(*state, PointState::Blocked) {
            *state = PointState::Flowing;
            self.released.notify_all();
        }
    }

    /// Drop an armed hook that has not fired yet
    ///
    /// Returns true when a hook was removed.
    pub fn disarm(&self) -> bool {
        let mut state = self.lock();
        if matches!(*state, PointState::Armed(_)) {
            *state = PointState::Flowing;
            return true;
        }
        false
    }

    /// True while a hook is armed or running
    pub fn is_blocked(&self) -> bool {
        matches!(*self.lock(), PointState::Armed(_) | PointState::Blocked)
    }

    /// True once a hook has failed
    pub fn is_failed(&self) -> bool {
        matches!(*self.lock(), PointState::Failed)
    }

    /// Wait until the point is no longer held
    ///
    /// Returns false on timeout or if the point failed.
    pub fn wait_released(&self, timeout: Duration) -> bool {
        let state = self.lock();
        let (state, _) = self
            .released
            .wait_timeout_while(state, timeout, |s| matches!(s, PointState::Blocked))
            .unwrap_or_else(PoisonError::into_inner);
        !matches!(*state, PointState::Blocked | PointState::Failed)
    }

    /// Move one buffer through the point into the branch
    ///
    /// If a hook is armed it runs first, on this thread, and the buffer goes
    /// to whatever sink the hook left attached.
    pub fn pass(&self, samples: &[f32], branch: &mut OutputBranch) -> Result<()> {
        let hook = {
            let mut state = self.lock();
            // Another thread's hook is running: wait for it to finish
            while matches!(*state, PointState::Blocked) {
                state = self
                    .released
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }

            match std::mem::replace(&mut *state, PointState::Flowing) {
                PointState::Armed(hook) => {
                    *state = PointState::Blocked;
                    Some(hook)
                }
                PointState::Failed => {
                    *state = PointState::Failed;
                    return Err(PipelineError::SuspendPointFailed);
                }
                PointState::Flowing | PointState::Blocked => None,
            }
        };

        if let Some(hook) = hook {
            tracing::debug!("Suspend point blocked, running hook");
            match hook(branch) {
                Ok(release) => {
                    self.unblock();
                    if let Some(release) = release {
                        release();
                    }
                }
                Err(e) => {
                    let mut state = self.lock();
                    *state = PointState::Failed;
                    self.released.notify_all();
                    return Err(e);
                }
            }
        }

        branch.push(samples)
    }
}

impl Default for SuspendPoint {
    fn default() -> Self {
        Self::new()
    }
}
