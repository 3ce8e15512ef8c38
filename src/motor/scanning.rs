//! Scan jobs and the scanning loop.

use core::time::Duration;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Instant;

use crate::error::RejectedRequest;
use crate::hal::{Actuator, Gpio, Level};
use crate::motion::BusyGuard;
use crate::scanlog::ScanEvent;

use super::scan::ScanShared;

/// Longest uninterrupted wait while dwelling.
const DWELL_SLICE: Duration = Duration::from_millis(10);

/// Parameters of one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanJob {
    /// First scan point (absolute steps).
    pub start: i32,
    /// Exclusive end of the scan.
    pub stop: i32,
    /// Distance between scan points.
    pub step: i32,
    /// Time spent at each point, or the longest wait for the trigger input.
    pub dwell: Duration,
    /// Width of the trigger output pulse.
    pub pulse_width: Duration,
}

/// How a scan ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Every point was visited.
    Completed,
    /// Stopped by `cancel_scan`, a handle, or the cancellation token.
    Cancelled,
    /// The stage could not reach the first point.
    StartNotReached {
        /// Where it stopped instead.
        position: i32,
    },
    /// The stage could not reach a later point.
    StepNotReached {
        /// Point that was requested.
        target: i32,
        /// Where it stopped instead.
        position: i32,
    },
}

impl ScanJob {
    /// Create a job. Pulse widths under one millisecond are raised to one.
    pub fn new(start: i32, stop: i32, step: i32, dwell: Duration, pulse_width: Duration) -> Self {
        Self {
            start,
            stop,
            step,
            dwell,
            pulse_width: pulse_width.max(Duration::from_millis(1)),
        }
    }

    /// Check the job describes at least two points on an increasing range.
    pub fn validate(&self) -> Result<(), RejectedRequest> {
        if self.stop < self.start {
            return Err(RejectedRequest::InvalidScan("stop is below start"));
        }
        if self.step <= 0 {
            return Err(RejectedRequest::InvalidScan("step must be positive"));
        }
        if (i64::from(self.stop) - i64::from(self.start)) / i64::from(self.step) < 2 {
            return Err(RejectedRequest::InvalidScan("fewer than two scan points"));
        }
        if self.dwell.is_zero() {
            return Err(RejectedRequest::InvalidScan("dwell must be positive"));
        }
        Ok(())
    }

    /// Every scan point, `start` included, `stop` excluded.
    ///
    /// Empty for a non-positive step.
    pub fn targets(&self) -> impl Iterator<Item = i32> {
        let step = usize::try_from(self.step).unwrap_or(0);
        let points = if step == 0 { 0 } else { usize::MAX };
        (self.start..self.stop).step_by(step.max(1)).take(points)
    }
}

impl<A, G> ScanShared<A, G>
where
    A: Actuator,
    G: Gpio,
{
    /// Body of the scan thread. Always clears the scanning flag and the job on exit.
    pub(super) fn run_scan(&self, guard: BusyGuard, job: ScanJob) -> ScanOutcome {
        let outcome = self.scan_points(&guard, &job);

        self.scanning.store(false, Ordering::Release);
        *self.job.lock() = None;

        let position = self.position();
        match outcome {
            ScanOutcome::Completed => {
                self.log_event(ScanEvent::Completed);
                tracing::info!("Scan stage '{}': scan complete at {}", self.name, position);
            }
            ScanOutcome::Cancelled => {
                self.log_event(ScanEvent::Aborted {
                    reason: "cancelled",
                    position,
                });
                tracing::info!("Scan stage '{}': scan cancelled at {}", self.name, position);
            }
            ScanOutcome::StartNotReached { .. } => {
                self.log_event(ScanEvent::Aborted {
                    reason: "start position not reached",
                    position,
                });
                tracing::warn!("Scan stage '{}': start {} not reached", self.name, job.start);
            }
            ScanOutcome::StepNotReached { target, .. } => {
                self.log_event(ScanEvent::Aborted {
                    reason: "scan point not reached",
                    position,
                });
                tracing::warn!("Scan stage '{}': scan point {} not reached", self.name, target);
            }
        }
        // Busy until the outcome is logged.
        drop(guard);
        outcome
    }

    fn scan_points(&self, guard: &BusyGuard, job: &ScanJob) -> ScanOutcome {
        let position = self.move_to(guard, job.start, false);
        if position != job.start {
            return if self.stop_requested(guard) {
                ScanOutcome::Cancelled
            } else {
                ScanOutcome::StartNotReached { position }
            };
        }
        self.point_reached(job, position);

        for target in job.targets().skip(1) {
            if self.stop_requested(guard) {
                return ScanOutcome::Cancelled;
            }
            self.dwell(guard, job.dwell);
            if self.stop_requested(guard) {
                return ScanOutcome::Cancelled;
            }

            let position = self.move_to(guard, target, false);
            if position != target {
                return if self.stop_requested(guard) {
                    ScanOutcome::Cancelled
                } else {
                    ScanOutcome::StepNotReached { target, position }
                };
            }
            self.point_reached(job, position);
        }
        ScanOutcome::Completed
    }

    fn stop_requested(&self, guard: &BusyGuard) -> bool {
        !self.scanning.load(Ordering::Acquire) || self.interrupted(guard)
    }

    fn point_reached(&self, job: &ScanJob, position: i32) {
        self.pulse(job.pulse_width);
        self.current_scan.store(position, Ordering::Release);
        self.log_event(ScanEvent::Reached { position });
        tracing::debug!("Scan stage '{}': scan point {}", self.name, position);
    }

    fn pulse(&self, width: Duration) {
        if let Some(line) = self.trigger_out {
            let gpio = self.gpio();
            gpio.write(line, Level::High);
            thread::sleep(width);
            gpio.write(line, Level::Low);
        }
    }

    /// Wait for the trigger input, or sleep out `dwell` without one. Either wait is
    /// bounded by `dwell` and taken in short slices so a cancelled scan stops promptly.
    fn dwell(&self, guard: &BusyGuard, dwell: Duration) {
        let deadline = Instant::now() + dwell;
        loop {
            let now = Instant::now();
            if now >= deadline || self.stop_requested(guard) {
                break;
            }
            let slice = (deadline - now).min(DWELL_SLICE);
            match self.trigger_in {
                Some(line) => {
                    if self.gpio().wait_for_edge(line, slice) {
                        return;
                    }
                }
                None => {
                    if self.cancel.wait_timeout(slice) {
                        break;
                    }
                }
            }
        }
        if self.trigger_in.is_some() && !self.stop_requested(guard) {
            tracing::debug!("Scan stage '{}': no trigger within {:?}", self.name, dwell);
        }
    }
}
