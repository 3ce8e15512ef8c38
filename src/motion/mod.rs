//! Motion module for monochromator-motion.
//!
//! Provides cancellation, the per-stage single-writer guard and handles to
//! background moves.

mod cancel;
mod task;

pub use cancel::CancellationToken;
pub use task::{BusyFlag, BusyGuard, MotionHandle};
