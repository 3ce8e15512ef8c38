//! Validated step quantities.
//!
//! Zero is never a meaningful step budget or counter conversion factor, so both are
//! rejected when the value is constructed (and therefore when TOML is deserialized).

use serde::Deserialize;

use crate::error::ConfigError;

/// Maximum number of steps a port selector may take for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepBudget(u32);

impl StepBudget {
    /// 50 revolutions of a 200 step/rev motor.
    pub const DEFAULT: Self = Self(10_000);

    /// Create a budget.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidStepBudget` for zero.
    pub fn new(steps: u32) -> Result<Self, ConfigError> {
        if steps == 0 {
            Err(ConfigError::InvalidStepBudget(steps))
        } else {
            Ok(Self(steps))
        }
    }

    /// Get the raw step count.
    #[inline]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl Default for StepBudget {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u32> for StepBudget {
    type Error = ConfigError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Motor steps per unit of the operator's mechanical counter.
///
/// The counter reads with two decimals; one whole unit is this many steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepsPerCount(u32);

impl StepsPerCount {
    /// Factor of the stock counter.
    pub const DEFAULT: Self = Self(250);

    /// Create a conversion factor.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidStepsPerCount` for zero.
    pub fn new(steps: u32) -> Result<Self, ConfigError> {
        if steps == 0 {
            Err(ConfigError::InvalidStepsPerCount(steps))
        } else {
            Ok(Self(steps))
        }
    }

    /// Get the raw factor.
    #[inline]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl Default for StepsPerCount {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u32> for StepsPerCount {
    type Error = ConfigError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

fn deserialize_checked<'de, D, T>(
    deserializer: D,
    make: fn(u32) -> Result<T, ConfigError>,
) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use core::fmt::Write;
    let value = u32::deserialize(deserializer)?;
    make(value).map_err(|e| {
        let mut buf = heapless::String::<128>::new();
        let _ = write!(buf, "{}", e);
        serde::de::Error::custom(buf.as_str())
    })
}

impl<'de> Deserialize<'de> for StepBudget {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserialize_checked(deserializer, StepBudget::new)
    }
}

impl<'de> Deserialize<'de> for StepsPerCount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserialize_checked(deserializer, StepsPerCount::new)
    }
}
