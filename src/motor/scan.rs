//! Scanning stage: absolute position, backlash-compensated moves and scans.

use core::time::Duration;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use crate::error::{ConfigError, Error, RejectedRequest, Result, WiringError};
use crate::hal::{Actuator, Edge, Gpio, Level, MotorDirection, Pull, StepStyle};
use crate::motion::{BusyFlag, BusyGuard, CancellationToken, MotionHandle};
use crate::scanlog::{ScanEvent, ScanLog};

use super::limits::LimitSwitchPair;
use super::position::AbsolutePosition;
use super::scanning::{ScanJob, ScanOutcome};
use super::state::ScanState;

/// Hook run before the first physical step of the process lifetime.
///
/// Used to mark the persisted position untrustworthy while the stage moves.
pub type InvalidateHook = Box<dyn FnMut() -> Result<()> + Send>;

/// Whether the stage has taken a step since start-up.
enum FirstStep {
    NotYetMoved(Option<InvalidateHook>),
    Moved,
}

/// Actuator plus the one-shot first-step transition, both behind one lock.
struct Motion<A> {
    actuator: A,
    first_step: FirstStep,
}

impl<A> Motion<A> {
    fn mark_moved(&mut self) -> Result<()> {
        if let FirstStep::NotYetMoved(hook) = &mut self.first_step {
            if let Some(hook) = hook.as_mut() {
                hook()?;
            }
            self.first_step = FirstStep::Moved;
        }
        Ok(())
    }
}

/// Everything [`ScanStage::new`] needs, assembled by the builder.
pub(crate) struct ScanParts<A, G: Gpio> {
    pub name: heapless::String<32>,
    pub actuator: A,
    pub gpio: Arc<G>,
    pub switch_1: u32,
    pub direction_1: MotorDirection,
    pub switch_2: u32,
    pub direction_2: MotorDirection,
    pub style: StepStyle,
    pub backlash_steps: i32,
    pub start_position: i32,
    pub invalidate: Option<InvalidateHook>,
    pub trigger_in: Option<u32>,
    pub trigger_out: Option<u32>,
    pub cancel: CancellationToken,
    pub log: Arc<dyn ScanLog>,
}

pub(super) struct ScanShared<A, G: Gpio> {
    pub(super) name: heapless::String<32>,
    limits: LimitSwitchPair<G>,
    direction_1: MotorDirection,
    direction_2: MotorDirection,
    style: StepStyle,
    backlash_steps: i32,
    pub(super) trigger_in: Option<u32>,
    pub(super) trigger_out: Option<u32>,
    motion: Mutex<Motion<A>>,
    position: AbsolutePosition,
    busy: BusyFlag,
    moving: AtomicBool,
    pub(super) scanning: AtomicBool,
    pub(super) current_scan: AtomicI32,
    pub(super) job: Mutex<Option<ScanJob>>,
    pub(super) cancel: CancellationToken,
    pub(super) log: Arc<dyn ScanLog>,
}

/// Grating stage driven between two limit switches.
///
/// Moves and scans run on background threads; at most one of them drives the
/// stage at a time; overlapping requests are rejected with [`RejectedRequest::Busy`].
pub struct ScanStage<A, G: Gpio> {
    shared: Arc<ScanShared<A, G>>,
}

impl<A, G> ScanStage<A, G>
where
    A: Actuator + 'static,
    G: Gpio + 'static,
{
    pub(crate) fn new(parts: ScanParts<A, G>) -> Result<Self> {
        if parts.direction_1 == parts.direction_2 {
            return Err(Error::Config(ConfigError::SameSwitchDirection));
        }
        if !parts.direction_1.is_travel() {
            return Err(Error::Config(ConfigError::NonTravelDirection { switch: 1 }));
        }
        if !parts.direction_2.is_travel() {
            return Err(Error::Config(ConfigError::NonTravelDirection { switch: 2 }));
        }
        check_trigger_lines(parts.switch_1, parts.switch_2, parts.trigger_in, parts.trigger_out)?;

        let limits = LimitSwitchPair::configure(Arc::clone(&parts.gpio), parts.switch_1, parts.switch_2)?;

        if let Some(line) = parts.trigger_in {
            parts.gpio.configure_input(line, Pull::Up)?;
            parts.gpio.configure_interrupt(line, Edge::Rising)?;
        }
        if let Some(line) = parts.trigger_out {
            parts.gpio.configure_output(line)?;
            parts.gpio.write(line, Level::Low);
        }

        let (sw1, sw2) = limits.read();
        if ScanState::from_levels(sw1, sw2) == ScanState::Error {
            return Err(Error::Wiring(WiringError {
                switch_1: parts.switch_1,
                switch_2: parts.switch_2,
            }));
        }

        tracing::info!(
            "Scan stage '{}' ready at position {} (limits on lines {} and {})",
            parts.name,
            parts.start_position,
            parts.switch_1,
            parts.switch_2
        );

        Ok(Self {
            shared: Arc::new(ScanShared {
                name: parts.name,
                limits,
                direction_1: parts.direction_1,
                direction_2: parts.direction_2,
                style: parts.style,
                backlash_steps: parts.backlash_steps,
                trigger_in: parts.trigger_in,
                trigger_out: parts.trigger_out,
                motion: Mutex::new(Motion {
                    actuator: parts.actuator,
                    first_step: FirstStep::NotYetMoved(parts.invalidate),
                }),
                position: AbsolutePosition::new(parts.start_position),
                busy: BusyFlag::new(),
                moving: AtomicBool::new(false),
                scanning: AtomicBool::new(false),
                current_scan: AtomicI32::new(0),
                job: Mutex::new(None),
                cancel: parts.cancel,
                log: parts.log,
            }),
        })
    }

    /// Stage name.
    pub fn name(&self) -> &str {
        self.shared.name.as_str()
    }

    /// Re-sample the limit switches.
    pub fn get_state(&self) -> ScanState {
        self.shared.state()
    }

    /// Re-sample the limit switches and render `Error`, `At-Limit-1`, `At-Limit-2`,
    /// `Moving` or `Ready`.
    pub fn get_state_text(&self) -> &'static str {
        self.shared.state().text(self.is_moving())
    }

    /// Absolute position in steps.
    #[inline]
    pub fn get_position(&self) -> i32 {
        self.shared.position.get()
    }

    /// Whether a step loop is running.
    #[inline]
    pub fn is_moving(&self) -> bool {
        self.shared.moving.load(Ordering::Acquire)
    }

    /// Whether a move or scan holds the stage.
    #[inline]
    pub fn is_busy(&self) -> bool {
        self.shared.busy.is_busy()
    }

    /// Whether a scan is running.
    #[inline]
    pub fn is_scanning(&self) -> bool {
        self.shared.scanning.load(Ordering::Acquire)
    }

    /// Most recently reached scan point.
    #[inline]
    pub fn current_scan_position(&self) -> i32 {
        self.shared.current_scan.load(Ordering::Acquire)
    }

    /// Parameters of the running scan, if any.
    pub fn current_job(&self) -> Option<ScanJob> {
        self.shared.job.lock().clone()
    }

    /// Stop the in-flight step loop before its next step.
    pub fn emergency_stop(&self) {
        self.shared.emergency_stop();
    }

    /// Step up to `count` times toward `direction`, stopping early at a limit
    /// (unless `override_limits`) or on cancellation. Runs on the caller's thread.
    ///
    /// Returns the number of steps actually taken.
    pub fn step_n(
        &self,
        count: u32,
        direction: MotorDirection,
        override_limits: bool,
        style: StepStyle,
    ) -> core::result::Result<u32, RejectedRequest> {
        let guard = self.shared.claim()?;
        Ok(self.shared.step_n(&guard, count, direction, override_limits, style))
    }

    /// Start a move to `target` on a background thread.
    ///
    /// Approaching switch 1 overshoots by the backlash margin and re-approaches from
    /// the switch 2 side, so the final position does not depend on the approach.
    pub fn start_move(
        &self,
        target: i32,
        override_limits: bool,
    ) -> core::result::Result<MotionHandle<i32>, RejectedRequest> {
        let guard = self.shared.claim()?;
        let stop = guard.stopper();
        let shared = Arc::clone(&self.shared);
        let thread = thread::spawn(move || {
            let from = shared.position.get();
            let reached = shared.move_to(&guard, target, override_limits);
            shared.log.record(&ScanEvent::Moved {
                from,
                target,
                to: reached,
            });
            reached
        });
        Ok(MotionHandle::new(thread, stop))
    }

    /// Move to `target`, optionally waiting. Returns the position at return time,
    /// which is only final when `blocking`.
    pub fn move_to(&self, target: i32, override_limits: bool, blocking: bool) -> i32 {
        match self.start_move(target, override_limits) {
            Ok(handle) if blocking => match handle.wait() {
                Ok(position) => position,
                Err(e) => {
                    tracing::error!("Scan stage '{}': {}", self.shared.name, e);
                    self.get_position()
                }
            },
            _ => self.get_position(),
        }
    }

    /// Start a scan. See [`ScanJob`] for the parameters and their validation.
    pub fn start_scan(
        &self,
        job: ScanJob,
    ) -> core::result::Result<MotionHandle<ScanOutcome>, RejectedRequest> {
        let shared = &self.shared;
        if shared.scanning.load(Ordering::Acquire) {
            tracing::warn!("Scan stage '{}': scan already running, request ignored", shared.name);
            return Err(RejectedRequest::AlreadyScanning);
        }
        if let Err(e) = job.validate() {
            tracing::warn!("Scan stage '{}': {}", shared.name, e);
            return Err(e);
        }
        let guard = shared.claim()?;
        if shared
            .scanning
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(RejectedRequest::AlreadyScanning);
        }
        *shared.job.lock() = Some(job.clone());
        shared.log.record(&ScanEvent::Started(job.clone()));
        tracing::info!(
            "Scan stage '{}': scanning {}..{} by {}",
            shared.name,
            job.start,
            job.stop,
            job.step
        );

        let stop = guard.stopper();
        let shared = Arc::clone(&self.shared);
        let thread = thread::spawn(move || shared.run_scan(guard, job));
        Ok(MotionHandle::new(thread, stop))
    }

    /// Console-style scan request: dwell in whole seconds, pulse width in milliseconds.
    pub fn start_scan_seconds(
        &self,
        start: i32,
        stop: i32,
        step: i32,
        dwell_seconds: i32,
        pulse_width_ms: i32,
    ) -> core::result::Result<MotionHandle<ScanOutcome>, RejectedRequest> {
        if dwell_seconds <= 0 {
            tracing::warn!("Scan stage '{}': dwell must be positive", self.shared.name);
            return Err(RejectedRequest::InvalidScan("dwell must be positive"));
        }
        let job = ScanJob::new(
            start,
            stop,
            step,
            Duration::from_secs(dwell_seconds as u64),
            Duration::from_millis(pulse_width_ms.max(1) as u64),
        );
        self.start_scan(job)
    }

    /// Stop the running scan and the move it is making.
    pub fn cancel_scan(&self) {
        if self.shared.scanning.swap(false, Ordering::AcqRel) {
            tracing::info!("Scan stage '{}': scan cancelled", self.shared.name);
        }
        self.shared.emergency_stop();
    }
}

impl<A, G> ScanShared<A, G>
where
    A: Actuator,
    G: Gpio,
{
    pub(super) fn state(&self) -> ScanState {
        let (sw1, sw2) = self.limits.read();
        ScanState::from_levels(sw1, sw2)
    }

    pub(super) fn position(&self) -> i32 {
        self.position.get()
    }

    pub(super) fn gpio(&self) -> &Arc<G> {
        self.limits.gpio()
    }

    fn emergency_stop(&self) {
        self.busy.stop_current();
        self.moving.store(false, Ordering::Release);
    }

    pub(super) fn interrupted(&self, guard: &BusyGuard) -> bool {
        guard.stop_requested() || self.cancel.is_cancelled()
    }

    fn claim(&self) -> core::result::Result<BusyGuard, RejectedRequest> {
        match self.busy.try_acquire() {
            Some(guard) => Ok(guard),
            None => {
                tracing::warn!("Scan stage '{}': busy, request ignored", self.name);
                Err(RejectedRequest::Busy)
            }
        }
    }

    fn step_n(
        &self,
        guard: &BusyGuard,
        count: u32,
        direction: MotorDirection,
        override_limits: bool,
        style: StepStyle,
    ) -> u32 {
        if count == 0 {
            return 0;
        }
        let delta = if direction == self.direction_2 {
            1
        } else if direction == self.direction_1 {
            -1
        } else {
            0
        };

        let mut motion = self.motion.lock();
        let mut state = self.state();
        self.moving.store(true, Ordering::Release);
        let mut taken = 0;
        while taken < count {
            if self.interrupted(guard) {
                break;
            }
            if !override_limits && state != ScanState::Good {
                tracing::warn!("Scan stage '{}': stopped at {:?}", self.name, state);
                break;
            }
            self.position.move_steps(delta);
            if let Err(e) = motion.mark_moved() {
                tracing::error!("Scan stage '{}': could not invalidate position: {}", self.name, e);
                self.position.move_steps(-delta);
                break;
            }
            if let Err(e) = motion.actuator.step_once(direction, style) {
                tracing::error!("Scan stage '{}': step failed: {}", self.name, e);
                self.position.move_steps(-delta);
                break;
            }
            taken += 1;
            state = self.state();
        }
        self.moving.store(false, Ordering::Release);
        tracing::trace!("Scan stage '{}': {} of {} steps", self.name, taken, count);
        taken
    }

    pub(super) fn move_to(&self, guard: &BusyGuard, target: i32, override_limits: bool) -> i32 {
        if target <= 0 {
            // A stored position of 0 is refused at the next start-up.
            tracing::warn!("Scan stage '{}': target {} is not positive", self.name, target);
        }
        let current = self.position.get();
        let (direction, leg_target) = if target > current {
            (self.direction_2, target)
        } else if target < current {
            let compensated = if override_limits {
                target
            } else {
                target.saturating_sub(self.backlash_steps)
            };
            (self.direction_1, compensated)
        } else {
            return current;
        };

        let steps = leg_target.abs_diff(current);
        self.step_n(guard, steps, direction, override_limits, self.style);

        let landed = self.position.get();
        if direction == self.direction_1 && !override_limits && landed < target {
            self.step_n(guard, target.abs_diff(landed), self.direction_2, false, self.style);
        }

        let reached = self.position.get();
        if reached == target {
            tracing::debug!("Scan stage '{}': reached {}", self.name, reached);
        } else {
            tracing::warn!(
                "Scan stage '{}': stopped at {} short of target {}",
                self.name,
                reached,
                target
            );
        }
        reached
    }

    pub(super) fn log_event(&self, event: ScanEvent) {
        self.log.record(&event);
    }
}

fn check_trigger_lines(
    switch_1: u32,
    switch_2: u32,
    trigger_in: Option<u32>,
    trigger_out: Option<u32>,
) -> Result<()> {
    for line in [trigger_in, trigger_out].into_iter().flatten() {
        if line == switch_1 || line == switch_2 {
            return Err(Error::Config(ConfigError::DuplicateTriggerLine(line)));
        }
    }
    if let (Some(a), Some(b)) = (trigger_in, trigger_out) {
        if a == b {
            return Err(Error::Config(ConfigError::DuplicateTriggerLine(a)));
        }
    }
    Ok(())
}
