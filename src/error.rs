//! Error types for monochromator-motion.
//!
//! Construction, wiring and persistence failures are fatal and surface as [`Error`].
//! Requests that are merely refused at runtime surface as [`RejectedRequest`] so the
//! operator interface stays usable.

use core::fmt;

/// Result type alias using the library's Error type.
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for all fatal monochromator-motion failures.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Invalid construction arguments or configuration
    Config(ConfigError),
    /// Both limit switches of a stage read active
    Wiring(WiringError),
    /// Persisted position missing, corrupt or not writable
    Persistence(PersistenceError),
    /// Actuator or background task failure
    Motor(MotorError),
}

/// Configuration-related errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Failed to parse TOML configuration
    ParseError(heapless::String<128>),
    /// File I/O error while reading configuration
    IoError(heapless::String<128>),
    /// No actuator was supplied to a builder
    MissingActuator,
    /// No GPIO collaborator was supplied to a builder
    MissingGpio,
    /// A required limit switch line was not supplied
    MissingLimitSwitch,
    /// Both limit switches were given the same line
    DuplicateLimitSwitch(u32),
    /// A trigger line collides with another configured line
    DuplicateTriggerLine(u32),
    /// Both switch directions are the same
    SameSwitchDirection,
    /// A switch direction does not move the carriage
    NonTravelDirection {
        /// Which switch (1 or 2)
        switch: u8,
    },
    /// Backlash compensation is negative
    NegativeBacklash(i32),
    /// Invalid step budget (must be > 0)
    InvalidStepBudget(u32),
    /// Invalid counter conversion factor (must be > 0)
    InvalidStepsPerCount(u32),
    /// A GPIO line could not be configured
    Gpio {
        /// Offending line
        line: u32,
        /// What was being configured
        operation: &'static str,
    },
    /// Port selector did not settle on Port A at start-up
    InitialPort(heapless::String<16>),
    /// Port selector name not found in configuration
    SelectorNotFound(heapless::String<32>),
    /// Port selector registered twice
    DuplicateSelector(heapless::String<32>),
}

/// Limit switch contradiction detected at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WiringError {
    /// Limit switch 1 line
    pub switch_1: u32,
    /// Limit switch 2 line
    pub switch_2: u32,
}

/// Position store errors.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistenceError {
    /// Record has the wrong size
    SizeMismatch {
        /// Observed file size in bytes
        found: u64,
        /// Expected file size in bytes
        expected: u64,
    },
    /// Sentinel does not mark a clean shutdown
    BadSentinel(i32),
    /// Stored position is exactly zero
    ZeroPosition,
    /// Record file does not exist where one is required
    Missing,
    /// A write did not succeed within the retry budget
    WriteFailed {
        /// Field being written
        field: &'static str,
        /// Attempts made
        attempts: u32,
    },
    /// Operator input ended before a valid readout was entered
    NoReadout,
    /// Underlying I/O failure
    Io(heapless::String<128>),
}

/// Motor operation errors.
#[derive(Debug, Clone, PartialEq)]
pub enum MotorError {
    /// Pin operation failed
    PinError,
    /// Background motion task panicked
    TaskPanicked,
}

/// Request refused at runtime. The operation is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectedRequest {
    /// Requested `Moving` or `Error`, which cannot be commanded
    NotTravelState,
    /// Another move or scan is already driving this stage
    Busy,
    /// A scan is already running
    AlreadyScanning,
    /// Scan parameters failed validation
    InvalidScan(&'static str),
}

impl PersistenceError {
    /// Instruction shown to the operator for unrecoverable record states.
    pub const OPERATOR_HINT: &'static str = "please delete the position file and restart";
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e),
            Error::Wiring(e) => write!(f, "Wiring error: {}", e),
            Error::Persistence(e) => write!(f, "Persistence error: {}", e),
            Error::Motor(e) => write!(f, "Motor error: {}", e),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            ConfigError::IoError(msg) => write!(f, "I/O error: {}", msg),
            ConfigError::MissingActuator => write!(f, "Stepper actuator is required"),
            ConfigError::MissingGpio => write!(f, "GPIO collaborator is required"),
            ConfigError::MissingLimitSwitch => write!(f, "Both limit switch lines are required"),
            ConfigError::DuplicateLimitSwitch(line) => {
                write!(f, "Limit switches share line {}", line)
            }
            ConfigError::DuplicateTriggerLine(line) => {
                write!(f, "Trigger line {} is already in use", line)
            }
            ConfigError::SameSwitchDirection => {
                write!(f, "Limit switches can not be in the same direction")
            }
            ConfigError::NonTravelDirection { switch } => {
                write!(f, "Limit switch {} direction is not forward or backward", switch)
            }
            ConfigError::NegativeBacklash(v) => {
                write!(f, "Invalid backlash: {} steps. Must be >= 0", v)
            }
            ConfigError::InvalidStepBudget(v) => write!(f, "Invalid step budget: {}. Must be > 0", v),
            ConfigError::InvalidStepsPerCount(v) => {
                write!(f, "Invalid steps per counter unit: {}. Must be > 0", v)
            }
            ConfigError::Gpio { line, operation } => {
                write!(f, "Could not {} on line {}", operation, line)
            }
            ConfigError::InitialPort(state) => {
                write!(f, "Expected state Port A, but current state is {}", state)
            }
            ConfigError::SelectorNotFound(name) => write!(f, "Port selector '{}' not found", name),
            ConfigError::DuplicateSelector(name) => {
                write!(f, "Port selector '{}' is already registered", name)
            }
        }
    }
}

impl fmt::Display for WiringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Both limit switches (lines {} and {}) are closed",
            self.switch_1, self.switch_2
        )
    }
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceError::SizeMismatch { found, expected } => write!(
                f,
                "Position file is {} bytes, expected {}; {}",
                found,
                expected,
                Self::OPERATOR_HINT
            ),
            PersistenceError::BadSentinel(magic) => write!(
                f,
                "Magic 0x{:08x} is invalid, position may be stale; {}",
                magic,
                Self::OPERATOR_HINT
            ),
            PersistenceError::ZeroPosition => {
                write!(f, "Stored position is 0; {}", Self::OPERATOR_HINT)
            }
            PersistenceError::Missing => write!(f, "Position file not found"),
            PersistenceError::WriteFailed { field, attempts } => {
                write!(f, "Could not store {} after {} attempts", field, attempts)
            }
            PersistenceError::NoReadout => write!(f, "No counter readout was entered"),
            PersistenceError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl fmt::Display for MotorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotorError::PinError => write!(f, "GPIO pin operation failed"),
            MotorError::TaskPanicked => write!(f, "Motion task panicked"),
        }
    }
}

impl fmt::Display for RejectedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectedRequest::NotTravelState => {
                write!(f, "Requested Moving or Error, which are not commandable")
            }
            RejectedRequest::Busy => write!(f, "Stage is busy with another request"),
            RejectedRequest::AlreadyScanning => write!(f, "A scan is already running"),
            RejectedRequest::InvalidScan(reason) => write!(f, "Invalid scan: {}", reason),
        }
    }
}

// Conversion impls
impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<WiringError> for Error {
    fn from(e: WiringError) -> Self {
        Error::Wiring(e)
    }
}

impl From<PersistenceError> for Error {
    fn from(e: PersistenceError) -> Self {
        Error::Persistence(e)
    }
}

impl From<MotorError> for Error {
    fn from(e: MotorError) -> Self {
        Error::Motor(e)
    }
}

impl From<std::io::Error> for PersistenceError {
    fn from(e: std::io::Error) -> Self {
        PersistenceError::Io(truncated(&e.to_string()))
    }
}

/// Copy a message into a fixed-capacity string, cutting it at a char boundary.
pub(crate) fn truncated<const N: usize>(msg: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for c in msg.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

impl std::error::Error for Error {}

impl std::error::Error for ConfigError {}

impl std::error::Error for WiringError {}

impl std::error::Error for PersistenceError {}

impl std::error::Error for MotorError {}

impl std::error::Error for RejectedRequest {}
