//! Motor module for monochromator-motion.
//!
//! Provides the port selector and scanning stage state machines, their builders,
//! the scanning engine and the instrument facade.

mod builder;
mod limits;
mod port;
mod position;
mod scan;
mod scanning;
pub mod state;
mod system;

pub use builder::{PortSelectorBuilder, ScanStageBuilder, DEFAULT_START_POSITION};
pub use limits::LimitSwitchPair;
pub use port::PortSelector;
pub use position::AbsolutePosition;
pub use scan::{InvalidateHook, ScanStage};
pub use scanning::{ScanJob, ScanOutcome};
pub use state::{PortState, ScanState};
pub use system::Monochromator;
