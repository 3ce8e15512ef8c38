//! Hardware collaborator contracts.
//!
//! The motors only ever talk to hardware through [`Gpio`] (limit switches and trigger
//! lines) and [`Actuator`] (one stepper step at a time). Concrete drivers live outside
//! this crate, except for the embedded-hal STEP/DIR actuator and the simulator.

use core::time::Duration;

use serde::Deserialize;

use crate::error::Result;

pub mod sim;
mod step_dir;

pub use step_dir::StepDirActuator;

/// Logic level of a digital line. `High` means a limit switch is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Line is high (switch active).
    High,
    /// Line is low (switch open).
    Low,
}

impl Level {
    /// Whether a switch reading this level is active.
    #[inline]
    pub fn is_active(self) -> bool {
        self == Level::High
    }
}

/// Input bias resistor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    /// Pull-up.
    Up,
    /// Pull-down.
    Down,
    /// Floating.
    None,
}

/// Interrupt edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// Low to high.
    Rising,
    /// High to low.
    Falling,
    /// Either transition.
    Both,
}

/// Direction command for a stepper driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotorDirection {
    /// Rotate forward.
    Forward,
    /// Rotate backward.
    Backward,
    /// Hold the coils energized.
    Brake,
    /// De-energize the coils.
    Release,
}

impl MotorDirection {
    /// Whether this direction actually moves the carriage.
    #[inline]
    pub fn is_travel(self) -> bool {
        matches!(self, MotorDirection::Forward | MotorDirection::Backward)
    }
}

/// Coil excitation style for one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStyle {
    /// One coil at a time.
    Single,
    /// Two coils at a time (full torque).
    #[default]
    Double,
    /// Alternating single/double half steps.
    Interleave,
    /// Driver microstepping.
    Microstep,
}

/// Digital I/O collaborator addressed by line number.
///
/// Implementations use interior mutability: limit switches are sampled from
/// motion threads and status queries at the same time.
pub trait Gpio: Send + Sync {
    /// Configure a line as input with the given bias.
    fn configure_input(&self, line: u32, pull: Pull) -> Result<()>;

    /// Sample a line.
    fn read(&self, line: u32) -> Level;

    /// Configure a line as push-pull output.
    fn configure_output(&self, line: u32) -> Result<()>;

    /// Drive an output line.
    fn write(&self, line: u32, level: Level);

    /// Arm a line as interrupt source on the given edge.
    fn configure_interrupt(&self, line: u32, edge: Edge) -> Result<()>;

    /// Block until the armed edge fires or `timeout` elapses. Returns `true` on edge.
    fn wait_for_edge(&self, line: u32, timeout: Duration) -> bool;
}

/// A stepper motor that can be advanced one step at a time.
pub trait Actuator: Send {
    /// Advance one step in `direction` using `style`.
    fn step_once(&mut self, direction: MotorDirection, style: StepStyle) -> Result<()>;
}

impl<A: Actuator + ?Sized> Actuator for Box<A> {
    fn step_once(&mut self, direction: MotorDirection, style: StepStyle) -> Result<()> {
        (**self).step_once(direction, style)
    }
}
