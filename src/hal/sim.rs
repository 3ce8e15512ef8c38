//! Simulated hardware.
//!
//! A [`SimMechanism`] is a virtual carriage travelling between two limit positions.
//! [`SimActuator`] moves it and [`SimGpio`] exposes its limit switches (and trigger
//! lines) on GPIO lines, so the motors can be exercised without a test rig.
//!
//! ```rust,ignore
//! let mech = SimMechanism::new(1_000, 0, 20_000);
//! let gpio = SimGpio::new(mech.clone()).limit_switches(36, 37);
//! let actuator = SimActuator::new(mech.clone());
//! ```

use core::time::Duration;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use crate::error::{ConfigError, Error, MotorError, Result};

use super::{Actuator, Edge, Gpio, Level, MotorDirection, Pull, StepStyle};

/// Shared state of a simulated carriage.
#[derive(Debug)]
pub struct SimMechanism {
    position: AtomicI64,
    /// Switch 1 closes at or below this position.
    lower_limit: i64,
    /// Switch 2 closes at or above this position.
    upper_limit: i64,
    steps_taken: AtomicU64,
    step_delay: Mutex<Duration>,
    fail_steps: Mutex<bool>,
}

impl SimMechanism {
    /// Create a carriage at `position` with switches at `lower_limit` / `upper_limit`.
    pub fn new(position: i64, lower_limit: i64, upper_limit: i64) -> Arc<Self> {
        Arc::new(Self {
            position: AtomicI64::new(position),
            lower_limit,
            upper_limit,
            steps_taken: AtomicU64::new(0),
            step_delay: Mutex::new(Duration::ZERO),
            fail_steps: Mutex::new(false),
        })
    }

    /// Mechanical position of the carriage.
    pub fn position(&self) -> i64 {
        self.position.load(Ordering::SeqCst)
    }

    /// Teleport the carriage (e.g. to emulate manual adjustment).
    pub fn set_position(&self, position: i64) {
        self.position.store(position, Ordering::SeqCst);
    }

    /// Total physical steps executed so far.
    pub fn steps_taken(&self) -> u64 {
        self.steps_taken.load(Ordering::SeqCst)
    }

    /// Time each physical step takes.
    pub fn set_step_delay(&self, delay: Duration) {
        *self.step_delay.lock() = delay;
    }

    /// Make every subsequent step fail with a pin error.
    pub fn fail_steps(&self, fail: bool) {
        *self.fail_steps.lock() = fail;
    }

    /// Whether switch 1 is closed.
    pub fn at_lower(&self) -> bool {
        self.position() <= self.lower_limit
    }

    /// Whether switch 2 is closed.
    pub fn at_upper(&self) -> bool {
        self.position() >= self.upper_limit
    }
}

/// [`Actuator`] that moves a [`SimMechanism`] by one unit per step.
#[derive(Debug, Clone)]
pub struct SimActuator {
    mech: Arc<SimMechanism>,
    /// Sign applied to `Forward`.
    forward_sign: i64,
}

impl SimActuator {
    /// `Forward` increases the carriage position.
    pub fn new(mech: Arc<SimMechanism>) -> Self {
        Self {
            mech,
            forward_sign: 1,
        }
    }

    /// `Forward` decreases the carriage position.
    pub fn reversed(mech: Arc<SimMechanism>) -> Self {
        Self {
            mech,
            forward_sign: -1,
        }
    }
}

impl Actuator for SimActuator {
    fn step_once(&mut self, direction: MotorDirection, _style: StepStyle) -> Result<()> {
        if *self.mech.fail_steps.lock() {
            return Err(Error::Motor(MotorError::PinError));
        }
        let delta = match direction {
            MotorDirection::Forward => self.forward_sign,
            MotorDirection::Backward => -self.forward_sign,
            MotorDirection::Brake | MotorDirection::Release => 0,
        };
        let delay = *self.mech.step_delay.lock();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        self.mech.position.fetch_add(delta, Ordering::SeqCst);
        self.mech.steps_taken.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct GpioState {
    inputs: HashMap<u32, Pull>,
    outputs: HashSet<u32>,
    interrupts: HashMap<u32, Edge>,
    forced: HashMap<u32, Level>,
    writes: Vec<(u32, Level)>,
    pending_edges: HashMap<u32, VecDeque<bool>>,
    failing: HashSet<u32>,
}

/// [`Gpio`] whose limit lines follow a [`SimMechanism`].
#[derive(Debug)]
pub struct SimGpio {
    mech: Arc<SimMechanism>,
    switch_1: Option<u32>,
    switch_2: Option<u32>,
    carriages: Vec<(Arc<SimMechanism>, u32, u32)>,
    state: Mutex<GpioState>,
}

impl SimGpio {
    /// Create a GPIO bank with no limit lines attached.
    pub fn new(mech: Arc<SimMechanism>) -> Self {
        Self {
            mech,
            switch_1: None,
            switch_2: None,
            carriages: Vec::new(),
            state: Mutex::new(GpioState::default()),
        }
    }

    /// Attach the carriage's limit switches to lines.
    pub fn limit_switches(mut self, switch_1: u32, switch_2: u32) -> Self {
        self.switch_1 = Some(switch_1);
        self.switch_2 = Some(switch_2);
        self
    }

    /// Attach another carriage's limit switches, e.g. a port selector sharing the bank.
    pub fn carriage(mut self, mech: Arc<SimMechanism>, switch_1: u32, switch_2: u32) -> Self {
        self.carriages.push((mech, switch_1, switch_2));
        self
    }

    /// Override what a line reads until [`SimGpio::release_line`].
    pub fn force_level(&self, line: u32, level: Level) {
        self.state.lock().forced.insert(line, level);
    }

    /// Remove a forced level.
    pub fn release_line(&self, line: u32) {
        self.state.lock().forced.remove(&line);
    }

    /// Make any configuration call on `line` fail.
    pub fn fail_configuration(&self, line: u32) {
        self.state.lock().failing.insert(line);
    }

    /// Queue outcomes for successive `wait_for_edge` calls on `line`.
    /// `true` fires immediately; `false` waits out the timeout.
    pub fn script_edges(&self, line: u32, edges: &[bool]) {
        self.state
            .lock()
            .pending_edges
            .entry(line)
            .or_default()
            .extend(edges.iter().copied());
    }

    /// Every level written to output lines, in order.
    pub fn writes(&self) -> Vec<(u32, Level)> {
        self.state.lock().writes.clone()
    }

    /// Number of rising transitions written to `line`.
    pub fn pulses(&self, line: u32) -> usize {
        self.state
            .lock()
            .writes
            .iter()
            .filter(|(l, level)| *l == line && *level == Level::High)
            .count()
    }

    /// Bias configured on an input line.
    pub fn input_pull(&self, line: u32) -> Option<Pull> {
        self.state.lock().inputs.get(&line).copied()
    }

    /// Whether `line` was configured as output.
    pub fn is_output(&self, line: u32) -> bool {
        self.state.lock().outputs.contains(&line)
    }

    /// Edge armed on `line`, if any.
    pub fn interrupt_edge(&self, line: u32) -> Option<Edge> {
        self.state.lock().interrupts.get(&line).copied()
    }

    fn check(&self, line: u32, operation: &'static str) -> Result<()> {
        if self.state.lock().failing.contains(&line) {
            return Err(Error::Config(ConfigError::Gpio { line, operation }));
        }
        Ok(())
    }
}

impl Gpio for SimGpio {
    fn configure_input(&self, line: u32, pull: Pull) -> Result<()> {
        self.check(line, "configure input")?;
        self.state.lock().inputs.insert(line, pull);
        Ok(())
    }

    fn read(&self, line: u32) -> Level {
        if let Some(level) = self.state.lock().forced.get(&line) {
            return *level;
        }
        let active = if Some(line) == self.switch_1 {
            self.mech.at_lower()
        } else if Some(line) == self.switch_2 {
            self.mech.at_upper()
        } else {
            self.carriages.iter().any(|(mech, switch_1, switch_2)| {
                (line == *switch_1 && mech.at_lower()) || (line == *switch_2 && mech.at_upper())
            })
        };
        if active {
            Level::High
        } else {
            Level::Low
        }
    }

    fn configure_output(&self, line: u32) -> Result<()> {
        self.check(line, "configure output")?;
        self.state.lock().outputs.insert(line);
        Ok(())
    }

    fn write(&self, line: u32, level: Level) {
        self.state.lock().writes.push((line, level));
    }

    fn configure_interrupt(&self, line: u32, edge: Edge) -> Result<()> {
        self.check(line, "configure interrupt")?;
        self.state.lock().interrupts.insert(line, edge);
        Ok(())
    }

    fn wait_for_edge(&self, line: u32, timeout: Duration) -> bool {
        let scripted = self
            .state
            .lock()
            .pending_edges
            .get_mut(&line)
            .and_then(|q| q.pop_front());
        match scripted {
            Some(true) => true,
            _ => {
                thread::sleep(timeout);
                false
            }
        }
    }
}
