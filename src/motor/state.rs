//! Stage states derived from limit switch readings.
//!
//! States are never stored: every query re-samples both switches and maps the
//! pair of levels through the tables below.

use crate::hal::Level;

/// Position of a binary port selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortState {
    /// Both switches open, carriage between ports.
    Moving,
    /// Resting on the Port A switch.
    PortA,
    /// Resting on the Port B switch.
    PortB,
    /// Both switches closed, wiring fault.
    Error,
}

/// Limit state of the scanning stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Both switches open, free to move.
    Good,
    /// Limit switch 1 hit.
    AtLimit1,
    /// Limit switch 2 hit.
    AtLimit2,
    /// Both switches closed, wiring fault.
    Error,
}

impl PortState {
    /// Derive the selector state from switch levels.
    ///
    /// | SW1 | SW2 | State |
    /// |---|---|---|
    /// | active | active | Error |
    /// | open | open | Moving |
    /// | active | open | A if `switch_1_is_port_a` else B |
    /// | open | active | B if `switch_1_is_port_a` else A |
    pub fn from_levels(switch_1: Level, switch_2: Level, switch_1_is_port_a: bool) -> Self {
        match (switch_1.is_active(), switch_2.is_active()) {
            (true, true) => PortState::Error,
            (false, false) => PortState::Moving,
            (true, false) if switch_1_is_port_a => PortState::PortA,
            (true, false) => PortState::PortB,
            (false, true) if switch_1_is_port_a => PortState::PortB,
            (false, true) => PortState::PortA,
        }
    }

    /// Whether this state can be requested as a motion target.
    #[inline]
    pub fn is_commandable(self) -> bool {
        matches!(self, PortState::PortA | PortState::PortB)
    }

    /// Operator-facing name.
    pub fn name(self) -> &'static str {
        match self {
            PortState::Moving => "Moving",
            PortState::PortA => "Port A",
            PortState::PortB => "Port B",
            PortState::Error => "Error",
        }
    }
}

impl ScanState {
    /// Derive the stage state from switch levels.
    pub fn from_levels(switch_1: Level, switch_2: Level) -> Self {
        match (switch_1.is_active(), switch_2.is_active()) {
            (true, true) => ScanState::Error,
            (false, false) => ScanState::Good,
            (true, false) => ScanState::AtLimit1,
            (false, true) => ScanState::AtLimit2,
        }
    }

    /// Operator-facing text. `Good` renders as `Moving` or `Ready`.
    pub fn text(self, moving: bool) -> &'static str {
        match self {
            ScanState::Error => "Error",
            ScanState::AtLimit1 => "At-Limit-1",
            ScanState::AtLimit2 => "At-Limit-2",
            ScanState::Good if moving => "Moving",
            ScanState::Good => "Ready",
        }
    }
}

impl core::fmt::Display for PortState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}
