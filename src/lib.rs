//! # monochromator-motion
//!
//! Limit-switch bounded stepper stages of a motorized monochromator.
//!
//! ## Features
//!
//! - **Port selectors**: two-position stages that travel until a limit switch closes
//! - **Scanning stage**: absolute position tracking with backlash-compensated moves
//! - **Scans**: stepping between two positions with trigger pulse and trigger input
//! - **Crash detection**: the position file is invalidated before the first step and
//!   restored at clean shutdown
//! - **Configuration-driven**: stages and the position file are described in TOML
//! - **Hardware agnostic**: talks to hardware through the [`hal::Gpio`] and
//!   [`hal::Actuator`] traits, with an embedded-hal 1.0 STEP/DIR actuator and a
//!   simulator included
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use monochromator_motion::{load_config, Monochromator, StdinReadout};
//!
//! let config = load_config("monochromator.toml")?;
//! let mono = Monochromator::from_config(config, gpio, grating, &mut StdinReadout)?;
//!
//! let scan = mono.scan().start_scan_seconds(1_000, 2_000, 100, 5, 10)?;
//! scan.wait()?;
//!
//! mono.shutdown()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]
#![allow(clippy::result_large_err)]

// Core modules
pub mod config;
pub mod error;
pub mod hal;
pub mod motion;
pub mod motor;
pub mod persist;
pub mod scanlog;

// Re-exports for ergonomic API
pub use config::{load_config, parse_config, validate_config, MonochromatorConfig};
pub use error::{Error, RejectedRequest, Result};
pub use hal::{Actuator, Gpio, Level, MotorDirection, StepStyle};
pub use motion::{CancellationToken, MotionHandle};
pub use motor::{
    state, Monochromator, PortSelector, PortSelectorBuilder, PortState, ScanJob, ScanOutcome,
    ScanStage, ScanStageBuilder, ScanState,
};
pub use persist::{CounterReadout, PersistedRecord, PositionStore, ReadoutSource, StdinReadout};
pub use scanlog::{FileScanLog, NullScanLog, ScanEvent, ScanLog};
