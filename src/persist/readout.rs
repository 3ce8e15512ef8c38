//! Operator counter readouts.
//!
//! The stage carries a mechanical counter reading e.g. `12.50`. When no position
//! file exists the operator types the counter value and it becomes the position.

use core::fmt;
use core::str::FromStr;

use crate::config::StepsPerCount;

/// A counter reading in hundredths of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CounterReadout {
    hundredths: u32,
}

/// Why a typed readout was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadoutError {
    /// No `.` in the input.
    MissingDecimalPoint,
    /// More than two digits after the `.`.
    TooManyDecimals,
    /// Fewer than two digits after the `.`.
    TooFewDecimals,
    /// Not a number.
    NotANumber,
    /// Zero or too large.
    OutOfRange,
}

impl CounterReadout {
    /// Reading in hundredths of a unit.
    #[inline]
    pub const fn hundredths(self) -> u32 {
        self.hundredths
    }

    /// Absolute stage position for this reading.
    ///
    /// Returns `None` if the position does not fit a step counter.
    pub fn to_steps(self, steps_per_count: StepsPerCount) -> Option<i32> {
        let steps = u64::from(self.hundredths) * u64::from(steps_per_count.value()) / 100;
        i32::try_from(steps).ok()
    }

    /// Reading the counter shows at `steps`. Negative positions read as zero.
    pub fn from_steps(steps: i32, steps_per_count: StepsPerCount) -> Self {
        let steps = u64::try_from(steps).unwrap_or(0);
        let hundredths = steps * 100 / u64::from(steps_per_count.value());
        Self {
            hundredths: u32::try_from(hundredths).unwrap_or(u32::MAX),
        }
    }
}

impl FromStr for CounterReadout {
    type Err = ReadoutError;

    /// Parse `X.XX`: digits, a point, exactly two digits, greater than zero.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (whole, frac) = s.split_once('.').ok_or(ReadoutError::MissingDecimalPoint)?;
        match frac.len() {
            n if n > 2 => return Err(ReadoutError::TooManyDecimals),
            n if n < 2 => return Err(ReadoutError::TooFewDecimals),
            _ => {}
        }
        let all_digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(whole) || !all_digits(frac) {
            return Err(ReadoutError::NotANumber);
        }
        let whole: u32 = whole.parse().map_err(|_| ReadoutError::OutOfRange)?;
        let frac: u32 = frac.parse().map_err(|_| ReadoutError::NotANumber)?;
        let hundredths = whole
            .checked_mul(100)
            .and_then(|h| h.checked_add(frac))
            .ok_or(ReadoutError::OutOfRange)?;
        if hundredths == 0 {
            return Err(ReadoutError::OutOfRange);
        }
        Ok(Self { hundredths })
    }
}

impl fmt::Display for CounterReadout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.hundredths / 100, self.hundredths % 100)
    }
}

impl fmt::Display for ReadoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadoutError::MissingDecimalPoint => write!(f, "does not include '.'"),
            ReadoutError::TooManyDecimals => write!(f, "more digits after decimal point"),
            ReadoutError::TooFewDecimals => write!(f, "not enough digits after decimal point"),
            ReadoutError::NotANumber => write!(f, "not a number"),
            ReadoutError::OutOfRange => write!(f, "value must be greater than 0.00"),
        }
    }
}

impl std::error::Error for ReadoutError {}
