//! Builder pattern for the stages.

use std::sync::Arc;

use crate::config::{PortSelectorConfig, ScanMotorConfig, StepBudget, DEFAULT_BACKLASH_STEPS};
use crate::error::{ConfigError, Error, Result};
use crate::hal::{Actuator, Gpio, MotorDirection, StepStyle};
use crate::motion::CancellationToken;
use crate::scanlog::{NullScanLog, ScanLog};

use super::port::{PortParts, PortSelector};
use super::scan::{InvalidateHook, ScanParts, ScanStage};

/// Start position used when no persisted position is supplied.
pub const DEFAULT_START_POSITION: i32 = 100_000;

/// Builder for creating PortSelector instances.
pub struct PortSelectorBuilder<A, G> {
    actuator: Option<A>,
    gpio: Option<Arc<G>>,
    name: Option<heapless::String<32>>,
    switch_1: Option<u32>,
    switch_2: Option<u32>,
    switch_1_is_port_a: bool,
    direction_1: MotorDirection,
    direction_2: MotorDirection,
    style: StepStyle,
    step_budget: StepBudget,
    cancel: Option<CancellationToken>,
}

impl<A, G> Default for PortSelectorBuilder<A, G>
where
    A: Actuator + 'static,
    G: Gpio + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<A, G> PortSelectorBuilder<A, G>
where
    A: Actuator + 'static,
    G: Gpio + 'static,
{
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            actuator: None,
            gpio: None,
            name: None,
            switch_1: None,
            switch_2: None,
            switch_1_is_port_a: true,
            direction_1: MotorDirection::Forward,
            direction_2: MotorDirection::Backward,
            style: StepStyle::Double,
            step_budget: StepBudget::DEFAULT,
            cancel: None,
        }
    }

    /// Set the stepper actuator.
    pub fn actuator(mut self, actuator: A) -> Self {
        self.actuator = Some(actuator);
        self
    }

    /// Set the GPIO bank the switches are wired to.
    pub fn gpio(mut self, gpio: Arc<G>) -> Self {
        self.gpio = Some(gpio);
        self
    }

    /// Set the selector name.
    pub fn name(mut self, name: &str) -> Self {
        self.name = heapless::String::try_from(name).ok();
        self
    }

    /// Set both limit switch lines.
    pub fn limit_switches(mut self, switch_1: u32, switch_2: u32) -> Self {
        self.switch_1 = Some(switch_1);
        self.switch_2 = Some(switch_2);
        self
    }

    /// Set whether switch 1 marks Port A.
    pub fn switch_1_is_port_a(mut self, yes: bool) -> Self {
        self.switch_1_is_port_a = yes;
        self
    }

    /// Set the directions toward switch 1 and switch 2.
    pub fn directions(mut self, toward_1: MotorDirection, toward_2: MotorDirection) -> Self {
        self.direction_1 = toward_1;
        self.direction_2 = toward_2;
        self
    }

    /// Set the step style.
    pub fn step_style(mut self, style: StepStyle) -> Self {
        self.style = style;
        self
    }

    /// Set the per-request step budget.
    pub fn step_budget(mut self, budget: StepBudget) -> Self {
        self.step_budget = budget;
        self
    }

    /// Share a cancellation token with other stages.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Configure from a PortSelectorConfig.
    pub fn from_config(mut self, config: &PortSelectorConfig) -> Self {
        self.name = Some(config.name.clone());
        self.switch_1 = Some(config.limit_switch_1);
        self.switch_2 = Some(config.limit_switch_2);
        self.switch_1_is_port_a = config.switch_1_is_port_a;
        self.direction_1 = config.direction_1;
        self.direction_2 = config.direction_2;
        self.style = config.step_style;
        self.step_budget = config.step_budget;
        self
    }

    /// Build the PortSelector.
    ///
    /// # Errors
    ///
    /// Returns an error if required fields are missing, the hardware cannot be
    /// configured, or the selector cannot settle on Port A.
    pub fn build(self) -> Result<PortSelector<A, G>> {
        let actuator = self
            .actuator
            .ok_or(Error::Config(ConfigError::MissingActuator))?;
        let gpio = self.gpio.ok_or(Error::Config(ConfigError::MissingGpio))?;
        let (switch_1, switch_2) = self
            .switch_1
            .zip(self.switch_2)
            .ok_or(Error::Config(ConfigError::MissingLimitSwitch))?;

        PortSelector::new(PortParts {
            name: self.name.unwrap_or_else(|| crate::error::truncated("port selector")),
            actuator,
            gpio,
            switch_1,
            switch_2,
            switch_1_is_port_a: self.switch_1_is_port_a,
            direction_1: self.direction_1,
            direction_2: self.direction_2,
            style: self.style,
            step_budget: self.step_budget.value(),
            cancel: self.cancel.unwrap_or_default(),
        })
    }
}

/// Builder for creating ScanStage instances.
pub struct ScanStageBuilder<A, G> {
    actuator: Option<A>,
    gpio: Option<Arc<G>>,
    name: Option<heapless::String<32>>,
    switch_1: Option<u32>,
    switch_2: Option<u32>,
    direction_1: MotorDirection,
    direction_2: MotorDirection,
    style: StepStyle,
    backlash_steps: i32,
    start_position: i32,
    invalidate: Option<InvalidateHook>,
    trigger_in: Option<u32>,
    trigger_out: Option<u32>,
    cancel: Option<CancellationToken>,
    log: Option<Arc<dyn ScanLog>>,
}

impl<A, G> Default for ScanStageBuilder<A, G>
where
    A: Actuator + 'static,
    G: Gpio + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<A, G> ScanStageBuilder<A, G>
where
    A: Actuator + 'static,
    G: Gpio + 'static,
{
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            actuator: None,
            gpio: None,
            name: None,
            switch_1: None,
            switch_2: None,
            direction_1: MotorDirection::Backward,
            direction_2: MotorDirection::Forward,
            style: StepStyle::Double,
            backlash_steps: DEFAULT_BACKLASH_STEPS,
            start_position: DEFAULT_START_POSITION,
            invalidate: None,
            trigger_in: None,
            trigger_out: None,
            cancel: None,
            log: None,
        }
    }

    /// Set the stepper actuator.
    pub fn actuator(mut self, actuator: A) -> Self {
        self.actuator = Some(actuator);
        self
    }

    /// Set the GPIO bank the switches and trigger lines are wired to.
    pub fn gpio(mut self, gpio: Arc<G>) -> Self {
        self.gpio = Some(gpio);
        self
    }

    /// Set the stage name.
    pub fn name(mut self, name: &str) -> Self {
        self.name = heapless::String::try_from(name).ok();
        self
    }

    /// Set both limit switch lines.
    pub fn limit_switches(mut self, switch_1: u32, switch_2: u32) -> Self {
        self.switch_1 = Some(switch_1);
        self.switch_2 = Some(switch_2);
        self
    }

    /// Set the directions toward switch 1 and switch 2.
    pub fn directions(mut self, toward_1: MotorDirection, toward_2: MotorDirection) -> Self {
        self.direction_1 = toward_1;
        self.direction_2 = toward_2;
        self
    }

    /// Set the step style.
    pub fn step_style(mut self, style: StepStyle) -> Self {
        self.style = style;
        self
    }

    /// Set backlash compensation in steps.
    ///
    /// Moves toward switch 1 overshoot by this much and come back.
    pub fn backlash_steps(mut self, steps: i32) -> Self {
        self.backlash_steps = steps;
        self
    }

    /// Set the absolute position the stage starts at.
    pub fn start_position(mut self, steps: i32) -> Self {
        self.start_position = steps;
        self
    }

    /// Run `hook` once, before the first physical step.
    pub fn invalidate_hook<F>(mut self, hook: F) -> Self
    where
        F: FnMut() -> Result<()> + Send + 'static,
    {
        self.invalidate = Some(Box::new(hook));
        self
    }

    /// Set the trigger input line.
    pub fn trigger_in(mut self, line: u32) -> Self {
        self.trigger_in = Some(line);
        self
    }

    /// Set the trigger output line.
    pub fn trigger_out(mut self, line: u32) -> Self {
        self.trigger_out = Some(line);
        self
    }

    /// Share a cancellation token with other stages.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Record moves and scans to `log`.
    pub fn scan_log(mut self, log: Arc<dyn ScanLog>) -> Self {
        self.log = Some(log);
        self
    }

    /// Configure from a ScanMotorConfig.
    pub fn from_config(mut self, config: &ScanMotorConfig) -> Self {
        self.name = Some(config.name.clone());
        self.switch_1 = Some(config.limit_switch_1);
        self.switch_2 = Some(config.limit_switch_2);
        self.direction_1 = config.direction_1;
        self.direction_2 = config.direction_2;
        self.style = config.step_style;
        self.backlash_steps = config.backlash_steps;
        self.trigger_in = config.trigger_in;
        self.trigger_out = config.trigger_out;
        self
    }

    /// Build the ScanStage.
    ///
    /// # Errors
    ///
    /// Returns an error if required fields are missing or the hardware cannot be
    /// configured.
    pub fn build(self) -> Result<ScanStage<A, G>> {
        let actuator = self
            .actuator
            .ok_or(Error::Config(ConfigError::MissingActuator))?;
        let gpio = self.gpio.ok_or(Error::Config(ConfigError::MissingGpio))?;
        let (switch_1, switch_2) = self
            .switch_1
            .zip(self.switch_2)
            .ok_or(Error::Config(ConfigError::MissingLimitSwitch))?;
        if self.backlash_steps < 0 {
            return Err(Error::Config(ConfigError::NegativeBacklash(self.backlash_steps)));
        }

        ScanStage::new(ScanParts {
            name: self.name.unwrap_or_else(|| crate::error::truncated("scan stage")),
            actuator,
            gpio,
            switch_1,
            direction_1: self.direction_1,
            switch_2,
            direction_2: self.direction_2,
            style: self.style,
            backlash_steps: self.backlash_steps,
            start_position: self.start_position,
            invalidate: self.invalidate,
            trigger_in: self.trigger_in,
            trigger_out: self.trigger_out,
            cancel: self.cancel.unwrap_or_default(),
            log: self.log.unwrap_or_else(|| Arc::new(NullScanLog)),
        })
    }
}
