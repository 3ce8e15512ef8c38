//! STEP/DIR stepper driver over embedded-hal 1.0 pins.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::error::{MotorError, Result};

use super::{Actuator, MotorDirection, StepStyle};

/// Width of the STEP pulse in microseconds.
const PULSE_WIDTH_US: u32 = 2;

/// [`Actuator`] driving a STEP/DIR stepper driver chip.
///
/// Generic over:
/// - `STEP`: STEP pin type (must implement `OutputPin`)
/// - `DIR`: DIR pin type (must implement `OutputPin`)
/// - `DELAY`: Delay provider (must implement `DelayNs`)
///
/// `Brake` and `Release` are accepted and ignored: a STEP/DIR driver has no
/// per-step coil command for them. The step style is likewise fixed by the
/// driver's microstep jumpers.
pub struct StepDirActuator<STEP, DIR, DELAY>
where
    STEP: OutputPin,
    DIR: OutputPin,
    DELAY: DelayNs,
{
    step_pin: STEP,
    dir_pin: DIR,
    delay: DELAY,
    /// Cached to avoid unnecessary pin writes.
    current_direction: Option<MotorDirection>,
    invert_direction: bool,
    /// Dwell after each pulse, in nanoseconds.
    step_interval_ns: u32,
}

impl<STEP, DIR, DELAY> StepDirActuator<STEP, DIR, DELAY>
where
    STEP: OutputPin,
    DIR: OutputPin,
    DELAY: DelayNs,
{
    /// Create an actuator. `step_interval_ns` is the total period of one step.
    pub fn new(step_pin: STEP, dir_pin: DIR, delay: DELAY, step_interval_ns: u32) -> Self {
        Self {
            step_pin,
            dir_pin,
            delay,
            current_direction: None,
            invert_direction: false,
            step_interval_ns,
        }
    }

    /// Invert direction pin logic.
    pub fn inverted(mut self, invert: bool) -> Self {
        self.invert_direction = invert;
        self
    }

    /// Release the pins.
    pub fn release(self) -> (STEP, DIR, DELAY) {
        (self.step_pin, self.dir_pin, self.delay)
    }

    fn set_direction(&mut self, direction: MotorDirection) -> Result<()> {
        if self.current_direction == Some(direction) {
            return Ok(());
        }

        let pin_high = match direction {
            MotorDirection::Forward => !self.invert_direction,
            _ => self.invert_direction,
        };

        if pin_high {
            self.dir_pin.set_high().map_err(|_| MotorError::PinError)?;
        } else {
            self.dir_pin.set_low().map_err(|_| MotorError::PinError)?;
        }

        self.current_direction = Some(direction);
        Ok(())
    }
}

impl<STEP, DIR, DELAY> Actuator for StepDirActuator<STEP, DIR, DELAY>
where
    STEP: OutputPin + Send,
    DIR: OutputPin + Send,
    DELAY: DelayNs + Send,
{
    fn step_once(&mut self, direction: MotorDirection, _style: StepStyle) -> Result<()> {
        if !direction.is_travel() {
            return Ok(());
        }
        self.set_direction(direction)?;

        self.step_pin.set_high().map_err(|_| MotorError::PinError)?;
        self.delay.delay_us(PULSE_WIDTH_US);
        self.step_pin.set_low().map_err(|_| MotorError::PinError)?;

        let rest_ns = self.step_interval_ns.saturating_sub(PULSE_WIDTH_US * 1000);
        if rest_ns > 0 {
            self.delay.delay_ns(rest_ns);
        }
        Ok(())
    }
}
