//! Limit switch pair bound to two GPIO lines.

use std::sync::Arc;

use crate::error::{ConfigError, Error, Result};
use crate::hal::{Gpio, Level, Pull};

/// Two mutually exclusive limit switches at the ends of travel.
pub struct LimitSwitchPair<G: Gpio> {
    gpio: Arc<G>,
    switch_1: u32,
    switch_2: u32,
}

impl<G: Gpio> LimitSwitchPair<G> {
    /// Validate the lines and configure both as pulled-up inputs.
    pub fn configure(gpio: Arc<G>, switch_1: u32, switch_2: u32) -> Result<Self> {
        if switch_1 == switch_2 {
            return Err(Error::Config(ConfigError::DuplicateLimitSwitch(switch_1)));
        }
        gpio.configure_input(switch_1, Pull::Up)?;
        gpio.configure_input(switch_2, Pull::Up)?;
        Ok(Self {
            gpio,
            switch_1,
            switch_2,
        })
    }

    /// Sample both switches.
    #[inline]
    pub fn read(&self) -> (Level, Level) {
        (self.gpio.read(self.switch_1), self.gpio.read(self.switch_2))
    }

    /// The GPIO bank the switches live on.
    pub fn gpio(&self) -> &Arc<G> {
        &self.gpio
    }
}
