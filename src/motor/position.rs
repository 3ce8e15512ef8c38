//! Absolute position tracking for the scanning stage.

use std::sync::atomic::{AtomicI32, Ordering};

/// Signed step count from a fixed but arbitrary origin.
///
/// Written only by the task currently driving the stage; read at any time by
/// status queries.
#[derive(Debug, Default)]
pub struct AbsolutePosition {
    steps: AtomicI32,
}

impl AbsolutePosition {
    /// Create a tracker at `steps`.
    #[inline]
    pub fn new(steps: i32) -> Self {
        Self {
            steps: AtomicI32::new(steps),
        }
    }

    /// Current position in steps.
    #[inline]
    pub fn get(&self) -> i32 {
        self.steps.load(Ordering::Acquire)
    }

    /// Move by `delta` steps and return the new position.
    #[inline]
    pub fn move_steps(&self, delta: i32) -> i32 {
        self.steps.fetch_add(delta, Ordering::AcqRel) + delta
    }
}
