//! Position persistence for monochromator-motion.
//!
//! Provides the on-disk record, operator counter readouts and the crash-detecting
//! [`PositionStore`].

mod readout;
mod record;
mod store;

pub use readout::{CounterReadout, ReadoutError};
pub use record::{PersistedRecord, BAD_MAGIC, GOOD_MAGIC, RECORD_LEN};
pub use store::{PositionStore, ReadoutSource, StdinReadout, WRITE_ATTEMPTS};
