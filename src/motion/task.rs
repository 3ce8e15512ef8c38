//! Background motion tasks.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::error::{Error, MotorError, Result};

#[derive(Debug, Default)]
struct ClaimState {
    busy: AtomicBool,
    /// Id of the most recent claim. Ids start at 1.
    generation: AtomicU64,
    /// Id of the claim asked to stop.
    stopped: AtomicU64,
}

/// Single-writer flag for one stage.
///
/// Only the holder of a [`BusyGuard`] may drive the stage's actuator. Each claim has
/// its own id, so a stop aimed at a finished claim never reaches a later one.
#[derive(Debug, Clone, Default)]
pub struct BusyFlag {
    state: Arc<ClaimState>,
}

impl BusyFlag {
    /// Create an idle flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the stage. Returns `None` if another request holds it.
    pub fn try_acquire(&self) -> Option<BusyGuard> {
        self.state
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        let claim = self.state.generation.fetch_add(1, Ordering::AcqRel) + 1;
        Some(BusyGuard {
            state: Arc::clone(&self.state),
            claim,
        })
    }

    /// Whether some request currently holds the stage.
    #[inline]
    pub fn is_busy(&self) -> bool {
        self.state.busy.load(Ordering::Acquire)
    }

    /// Stop whichever claim holds the stage now.
    pub fn stop_current(&self) {
        let current = self.state.generation.load(Ordering::Acquire);
        self.state.stopped.store(current, Ordering::Release);
    }
}

/// Proof of exclusive access to a stage; released on drop.
#[derive(Debug)]
pub struct BusyGuard {
    state: Arc<ClaimState>,
    claim: u64,
}

impl BusyGuard {
    /// Whether this claim was asked to stop.
    #[inline]
    pub fn stop_requested(&self) -> bool {
        self.state.stopped.load(Ordering::Acquire) == self.claim
    }

    /// Closure stopping this claim only. Harmless once the claim is released.
    pub fn stopper(&self) -> impl Fn() + Send + Sync + 'static {
        let state = Arc::clone(&self.state);
        let claim = self.claim;
        move || state.stopped.store(claim, Ordering::Release)
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.state.busy.store(false, Ordering::Release);
    }
}

/// Handle to a move or scan running on its own thread.
///
/// Call [`MotionHandle::wait`] to block until it finishes, or drop the handle to let
/// it run detached and poll the stage instead.
pub struct MotionHandle<T> {
    thread: JoinHandle<T>,
    stop: Box<dyn Fn() + Send + Sync>,
}

impl<T> MotionHandle<T> {
    pub(crate) fn new(thread: JoinHandle<T>, stop: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            thread,
            stop: Box::new(stop),
        }
    }

    /// Block until the task completes and return its outcome.
    pub fn wait(self) -> Result<T> {
        self.thread
            .join()
            .map_err(|_| Error::Motor(MotorError::TaskPanicked))
    }

    /// Whether the task has finished.
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Ask the task to stop. It halts before its next physical step.
    ///
    /// Has no effect once the task has finished, even if the stage is running a
    /// later request.
    pub fn cancel(&self) {
        (self.stop)();
    }
}

impl<T> core::fmt::Debug for MotionHandle<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MotionHandle")
            .field("finished", &self.thread.is_finished())
            .finish()
    }
}
