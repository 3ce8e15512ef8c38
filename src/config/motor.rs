//! Per-stage configuration from TOML.

use heapless::String;
use serde::Deserialize;

use crate::hal::{MotorDirection, StepStyle};

use super::units::StepBudget;

/// Scanning stage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanMotorConfig {
    /// Human-readable name (max 32 chars).
    pub name: String<32>,

    /// GPIO line of limit switch 1.
    pub limit_switch_1: u32,

    /// Direction that drives the carriage toward switch 1.
    #[serde(default = "default_scan_direction_1")]
    pub direction_1: MotorDirection,

    /// GPIO line of limit switch 2.
    pub limit_switch_2: u32,

    /// Direction that drives the carriage toward switch 2.
    #[serde(default = "default_scan_direction_2")]
    pub direction_2: MotorDirection,

    /// Overshoot used when approaching from the switch 2 side.
    #[serde(default = "default_backlash")]
    pub backlash_steps: i32,

    /// Coil excitation style.
    #[serde(default)]
    pub step_style: StepStyle,

    /// Optional trigger input line, gates advancing to the next scan point.
    #[serde(default)]
    pub trigger_in: Option<u32>,

    /// Optional trigger output line, pulsed at every scan point.
    #[serde(default)]
    pub trigger_out: Option<u32>,
}

/// Port selector configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PortSelectorConfig {
    /// Human-readable name (max 32 chars).
    pub name: String<32>,

    /// GPIO line of limit switch 1.
    pub limit_switch_1: u32,

    /// GPIO line of limit switch 2.
    pub limit_switch_2: u32,

    /// Whether switch 1 marks Port A.
    #[serde(default = "default_true")]
    pub switch_1_is_port_a: bool,

    /// Direction that drives the carriage toward switch 1.
    #[serde(default = "default_port_direction_1")]
    pub direction_1: MotorDirection,

    /// Direction that drives the carriage toward switch 2.
    #[serde(default = "default_port_direction_2")]
    pub direction_2: MotorDirection,

    /// Coil excitation style.
    #[serde(default)]
    pub step_style: StepStyle,

    /// Give up a request after this many steps.
    #[serde(default)]
    pub step_budget: StepBudget,
}

/// Default backlash compensation in steps.
pub const DEFAULT_BACKLASH_STEPS: i32 = 200;

fn default_backlash() -> i32 {
    DEFAULT_BACKLASH_STEPS
}

fn default_true() -> bool {
    true
}

fn default_scan_direction_1() -> MotorDirection {
    MotorDirection::Backward
}

fn default_scan_direction_2() -> MotorDirection {
    MotorDirection::Forward
}

fn default_port_direction_1() -> MotorDirection {
    MotorDirection::Forward
}

fn default_port_direction_2() -> MotorDirection {
    MotorDirection::Backward
}
