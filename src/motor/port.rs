//! Binary port selector.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use crate::error::{ConfigError, Error, RejectedRequest, Result, WiringError};
use crate::hal::{Actuator, Gpio, MotorDirection, StepStyle};
use crate::motion::{BusyFlag, BusyGuard, CancellationToken, MotionHandle};

use super::limits::LimitSwitchPair;
use super::state::PortState;

/// Everything [`PortSelector::new`] needs, assembled by the builder.
pub(crate) struct PortParts<A, G: Gpio> {
    pub name: heapless::String<32>,
    pub actuator: A,
    pub gpio: Arc<G>,
    pub switch_1: u32,
    pub switch_2: u32,
    pub switch_1_is_port_a: bool,
    pub direction_1: MotorDirection,
    pub direction_2: MotorDirection,
    pub style: StepStyle,
    pub step_budget: u32,
    pub cancel: CancellationToken,
}

struct PortShared<A, G: Gpio> {
    name: heapless::String<32>,
    limits: LimitSwitchPair<G>,
    switch_1_is_port_a: bool,
    direction_1: MotorDirection,
    direction_2: MotorDirection,
    style: StepStyle,
    step_budget: u32,
    actuator: Mutex<A>,
    busy: BusyFlag,
    moving: AtomicBool,
    cancel: CancellationToken,
}

/// Two-position optical path selector.
///
/// The carriage travels until the limit switch of the requested port closes.
pub struct PortSelector<A, G: Gpio> {
    shared: Arc<PortShared<A, G>>,
}

impl<A, G> PortSelector<A, G>
where
    A: Actuator + 'static,
    G: Gpio + 'static,
{
    /// Configure the switches and settle on a port.
    ///
    /// A carriage found between ports is driven to Port A before returning.
    pub(crate) fn new(parts: PortParts<A, G>) -> Result<Self> {
        if parts.direction_1 == parts.direction_2 {
            return Err(Error::Config(ConfigError::SameSwitchDirection));
        }
        if !parts.direction_1.is_travel() {
            return Err(Error::Config(ConfigError::NonTravelDirection { switch: 1 }));
        }
        if !parts.direction_2.is_travel() {
            return Err(Error::Config(ConfigError::NonTravelDirection { switch: 2 }));
        }
        if parts.step_budget == 0 {
            return Err(Error::Config(ConfigError::InvalidStepBudget(0)));
        }

        let limits = LimitSwitchPair::configure(Arc::clone(&parts.gpio), parts.switch_1, parts.switch_2)?;
        let selector = Self {
            shared: Arc::new(PortShared {
                name: parts.name,
                limits,
                switch_1_is_port_a: parts.switch_1_is_port_a,
                direction_1: parts.direction_1,
                direction_2: parts.direction_2,
                style: parts.style,
                step_budget: parts.step_budget,
                actuator: Mutex::new(parts.actuator),
                busy: BusyFlag::new(),
                moving: AtomicBool::new(false),
                cancel: parts.cancel,
            }),
        };

        match selector.get_state() {
            PortState::Error => {
                return Err(Error::Wiring(WiringError {
                    switch_1: parts.switch_1,
                    switch_2: parts.switch_2,
                }))
            }
            PortState::Moving => {
                tracing::info!(
                    "Port selector '{}' is between ports, moving to {}",
                    selector.name(),
                    PortState::PortA
                );
                let reached = selector.set_state(PortState::PortA, true, true);
                if reached != PortState::PortA {
                    return Err(Error::Config(ConfigError::InitialPort(crate::error::truncated(
                        reached.name(),
                    ))));
                }
            }
            state => tracing::info!("Port selector '{}' ready at {}", selector.name(), state),
        }
        Ok(selector)
    }

    /// Selector name.
    pub fn name(&self) -> &str {
        self.shared.name.as_str()
    }

    /// Re-sample the switches.
    pub fn get_state(&self) -> PortState {
        self.shared.state()
    }

    /// Re-sample the switches and render the state name.
    pub fn get_state_text(&self) -> &'static str {
        self.get_state().name()
    }

    /// Whether a move is running.
    #[inline]
    pub fn is_moving(&self) -> bool {
        self.shared.moving.load(Ordering::Acquire)
    }

    /// Whether a request holds the selector.
    #[inline]
    pub fn is_busy(&self) -> bool {
        self.shared.busy.is_busy()
    }

    /// Stop the in-flight move before its next step.
    pub fn emergency_stop(&self) {
        self.shared.busy.stop_current();
        self.shared.moving.store(false, Ordering::Release);
    }

    /// Start moving to `target` on a background thread.
    ///
    /// The handle yields the state the selector ended in, which differs from `target`
    /// when the step budget ran out or the move was stopped.
    pub fn request(
        &self,
        target: PortState,
        enforce_step_limit: bool,
    ) -> core::result::Result<MotionHandle<PortState>, RejectedRequest> {
        if !target.is_commandable() {
            tracing::warn!(
                "Port selector '{}': {} can not be requested",
                self.shared.name,
                target
            );
            return Err(RejectedRequest::NotTravelState);
        }
        let guard = match self.shared.busy.try_acquire() {
            Some(guard) => guard,
            None => {
                tracing::warn!("Port selector '{}': busy, request ignored", self.shared.name);
                return Err(RejectedRequest::Busy);
            }
        };
        let stop = guard.stopper();

        let shared = Arc::clone(&self.shared);
        let thread = thread::spawn(move || shared.drive(guard, target, enforce_step_limit));
        Ok(MotionHandle::new(thread, stop))
    }

    /// Move to `target`.
    ///
    /// With `blocking` the final state is returned. Otherwise the state before the
    /// move is returned and the caller polls [`PortSelector::get_state`]. A rejected
    /// request returns [`PortState::Error`].
    pub fn set_state(&self, target: PortState, blocking: bool, enforce_step_limit: bool) -> PortState {
        let before = self.get_state();
        let handle = match self.request(target, enforce_step_limit) {
            Ok(handle) => handle,
            Err(_) => return PortState::Error,
        };
        if !blocking {
            return before;
        }
        match handle.wait() {
            Ok(state) => state,
            Err(e) => {
                tracing::error!("Port selector '{}': {}", self.shared.name, e);
                self.get_state()
            }
        }
    }
}

impl<A, G> PortShared<A, G>
where
    A: Actuator,
    G: Gpio,
{
    fn state(&self) -> PortState {
        let (sw1, sw2) = self.limits.read();
        PortState::from_levels(sw1, sw2, self.switch_1_is_port_a)
    }

    fn direction_to(&self, target: PortState) -> MotorDirection {
        let toward_switch_1 = (target == PortState::PortA) == self.switch_1_is_port_a;
        if toward_switch_1 {
            self.direction_1
        } else {
            self.direction_2
        }
    }

    fn drive(&self, guard: BusyGuard, target: PortState, enforce_step_limit: bool) -> PortState {
        let direction = self.direction_to(target);
        let mut actuator = self.actuator.lock();
        let mut state = self.state();
        let mut steps = 0u32;

        self.moving.store(true, Ordering::Release);
        tracing::info!("Port selector '{}': {} -> {}", self.name, state, target);
        while state != target {
            if enforce_step_limit && steps >= self.step_budget {
                tracing::warn!(
                    "Port selector '{}': {} not reached after {} steps",
                    self.name,
                    target,
                    steps
                );
                break;
            }
            if guard.stop_requested() || self.cancel.is_cancelled() {
                tracing::info!("Port selector '{}': stopped after {} steps", self.name, steps);
                break;
            }
            if state == PortState::Error {
                tracing::error!("Port selector '{}': both switches closed while moving", self.name);
                break;
            }
            if let Err(e) = actuator.step_once(direction, self.style) {
                tracing::error!("Port selector '{}': step failed: {}", self.name, e);
                break;
            }
            steps += 1;
            state = self.state();
        }
        self.moving.store(false, Ordering::Release);

        if state == target {
            tracing::info!("Port selector '{}': at {} after {} steps", self.name, state, steps);
        }
        state
    }
}
