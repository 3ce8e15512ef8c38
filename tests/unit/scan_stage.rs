//! Unit tests for scanning stage moves.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use proptest::prelude::*;

use monochromator_motion::error::{ConfigError, Error, PersistenceError, RejectedRequest};
use monochromator_motion::hal::{Edge, Level, MotorDirection, Pull, StepStyle};
use monochromator_motion::ScanState;

use super::{sim_stage, SWITCH_1, SWITCH_2};

/// Moving toward switch 2 goes straight to the target.
#[test]
fn test_move_up_is_direct() {
    let (builder, mech, _gpio) = sim_stage(1_000, -10_000, 10_000);
    let stage = builder.build().unwrap();

    assert_eq!(stage.move_to(1_500, false, true), 1_500);
    assert_eq!(stage.get_position(), 1_500);
    assert_eq!(mech.position(), 1_500);
    assert_eq!(mech.steps_taken(), 500);
    assert_eq!(stage.get_state_text(), "Ready");
}

/// Moving toward switch 1 overshoots by the backlash and comes back.
#[test]
fn test_move_down_compensates_backlash() {
    let (builder, mech, _gpio) = sim_stage(1_000, -10_000, 10_000);
    let stage = builder.build().unwrap();

    assert_eq!(stage.move_to(500, false, true), 500);
    assert_eq!(mech.position(), 500);
    // 500 down plus 200 overshoot, then 200 back up.
    assert_eq!(mech.steps_taken(), 900);
}

/// With limits overridden no backlash leg is taken.
#[test]
fn test_override_moves_down_directly() {
    let (builder, mech, _gpio) = sim_stage(1_000, -10_000, 10_000);
    let stage = builder.build().unwrap();

    assert_eq!(stage.move_to(500, true, true), 500);
    assert_eq!(mech.steps_taken(), 500);
}

/// Custom backlash margin.
#[test]
fn test_custom_backlash() {
    let (builder, mech, _gpio) = sim_stage(1_000, -10_000, 10_000);
    let stage = builder.backlash_steps(50).build().unwrap();

    assert_eq!(stage.move_to(900, false, true), 900);
    assert_eq!(mech.steps_taken(), 200);
}

/// Moving to the current position takes no steps.
#[test]
fn test_move_to_current_position() {
    let (builder, mech, _gpio) = sim_stage(1_000, -10_000, 10_000);
    let stage = builder.build().unwrap();

    assert_eq!(stage.move_to(1_000, false, true), 1_000);
    assert_eq!(mech.steps_taken(), 0);
}

/// A limit switch stops the move; only an override moves off it.
#[test]
fn test_limit_stops_move() {
    let (builder, mech, _gpio) = sim_stage(100, 0, 10_000);
    let stage = builder.build().unwrap();

    assert_eq!(stage.move_to(50, false, true), 0);
    assert_eq!(stage.get_state(), ScanState::AtLimit1);
    assert_eq!(stage.get_state_text(), "At-Limit-1");
    assert_eq!(mech.position(), 0);

    // Still at the limit: a normal move does nothing.
    assert_eq!(stage.move_to(50, false, true), 0);

    assert_eq!(stage.move_to(50, true, true), 50);
    assert_eq!(stage.get_state(), ScanState::Good);
}

/// The upper limit stops a move too.
#[test]
fn test_upper_limit_stops_move() {
    let (builder, _mech, _gpio) = sim_stage(100, -10_000, 200);
    let stage = builder.build().unwrap();

    assert_eq!(stage.move_to(300, false, true), 200);
    assert_eq!(stage.get_state_text(), "At-Limit-2");
}

/// The raw stepping primitive reports the steps actually taken.
#[test]
fn test_step_n_counts_steps() {
    let (builder, _mech, _gpio) = sim_stage(100, 0, 10_000);
    let stage = builder.build().unwrap();

    assert_eq!(stage.step_n(10, MotorDirection::Forward, false, StepStyle::Double), Ok(10));
    assert_eq!(stage.get_position(), 110);

    assert_eq!(stage.step_n(500, MotorDirection::Backward, false, StepStyle::Single), Ok(110));
    assert_eq!(stage.get_position(), 0);

    assert_eq!(stage.step_n(0, MotorDirection::Forward, false, StepStyle::Double), Ok(0));
}

/// Both switches closed at construction is a wiring fault.
#[test]
fn test_wiring_error() {
    let (builder, _mech, gpio) = sim_stage(100, 0, 10_000);
    gpio.force_level(SWITCH_1, Level::High);
    gpio.force_level(SWITCH_2, Level::High);

    assert!(matches!(builder.build(), Err(Error::Wiring(_))));
}

/// A trigger line may not reuse a limit line.
#[test]
fn test_trigger_line_collision() {
    let (builder, _mech, _gpio) = sim_stage(100, 0, 10_000);
    let result = builder.trigger_in(SWITCH_1).build();

    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::DuplicateTriggerLine(SWITCH_1)))
    ));
}

/// Trigger lines are configured at construction.
#[test]
fn test_trigger_lines_configured() {
    let (builder, _mech, gpio) = sim_stage(100, 0, 10_000);
    let _stage = builder.trigger_in(18).trigger_out(16).build().unwrap();

    assert_eq!(gpio.input_pull(SWITCH_1), Some(Pull::Up));
    assert_eq!(gpio.input_pull(18), Some(Pull::Up));
    assert_eq!(gpio.interrupt_edge(18), Some(Edge::Rising));
    assert!(gpio.is_output(16));
    assert_eq!(gpio.writes(), vec![(16, Level::Low)]);
}

/// Failing GPIO configuration is a config error.
#[test]
fn test_gpio_configuration_failure() {
    let (builder, _mech, gpio) = sim_stage(100, 0, 10_000);
    gpio.fail_configuration(16);

    assert!(matches!(
        builder.trigger_out(16).build(),
        Err(Error::Config(ConfigError::Gpio { line: 16, .. }))
    ));
}

/// The invalidate hook runs once, on the first step only.
#[test]
fn test_invalidate_hook_runs_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let (builder, _mech, _gpio) = sim_stage(1_000, -10_000, 10_000);
    let stage = builder
        .invalidate_hook(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .build()
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    stage.move_to(1_000, false, true);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    stage.move_to(1_100, false, true);
    stage.move_to(900, false, true);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// A failing hook blocks the step and is retried by the next move.
#[test]
fn test_invalidate_hook_failure_blocks_step() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let (builder, mech, _gpio) = sim_stage(1_000, -10_000, 10_000);
    let stage = builder
        .invalidate_hook(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(PersistenceError::Missing.into())
            } else {
                Ok(())
            }
        })
        .build()
        .unwrap();

    assert_eq!(stage.move_to(1_100, false, true), 1_000);
    assert_eq!(mech.steps_taken(), 0);

    assert_eq!(stage.move_to(1_100, false, true), 1_100);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// A failing actuator leaves the tracked position where the carriage is.
#[test]
fn test_actuator_failure_keeps_position() {
    let (builder, mech, _gpio) = sim_stage(1_000, -10_000, 10_000);
    let stage = builder.build().unwrap();
    mech.fail_steps(true);

    assert_eq!(stage.move_to(1_200, false, true), 1_000);
    assert_eq!(stage.get_position(), 1_000);
}

/// Emergency stop halts a move and the tracked position follows the carriage.
#[test]
fn test_emergency_stop_mid_move() {
    let (builder, mech, _gpio) = sim_stage(1_000, -10_000, 10_000);
    let stage = builder.build().unwrap();
    mech.set_step_delay(Duration::from_millis(1));

    let handle = stage.start_move(5_000, false).unwrap();
    thread::sleep(Duration::from_millis(20));
    stage.emergency_stop();
    let reached = handle.wait().unwrap();

    assert!(reached > 1_000 && reached < 5_000);
    assert_eq!(i64::from(stage.get_position()), mech.position());
    assert!(!stage.is_moving());
}

/// Cancelling through the handle stops the move.
#[test]
fn test_handle_cancel() {
    let (builder, mech, _gpio) = sim_stage(1_000, -10_000, 10_000);
    let stage = builder.build().unwrap();
    mech.set_step_delay(Duration::from_millis(1));

    let handle = stage.start_move(5_000, false).unwrap();
    thread::sleep(Duration::from_millis(10));
    handle.cancel();
    assert!(handle.wait().unwrap() < 5_000);

    // The next request clears the stop.
    mech.set_step_delay(Duration::ZERO);
    assert_eq!(stage.move_to(5_000, false, true), 5_000);
}

/// A second move while one is running is refused.
#[test]
fn test_overlapping_move_is_busy() {
    let (builder, mech, _gpio) = sim_stage(1_000, -10_000, 10_000);
    let stage = builder.build().unwrap();
    mech.set_step_delay(Duration::from_micros(500));

    let handle = stage.start_move(1_200, false).unwrap();
    assert_eq!(stage.start_move(900, false).unwrap_err(), RejectedRequest::Busy);
    assert_eq!(handle.wait().unwrap(), 1_200);
}

/// Non-blocking move returns at once and completes in the background.
#[test]
fn test_non_blocking_move() {
    let (builder, mech, _gpio) = sim_stage(1_000, -10_000, 10_000);
    let stage = builder.build().unwrap();
    mech.set_step_delay(Duration::from_micros(100));

    let returned = stage.move_to(1_300, false, false);
    assert!(returned >= 1_000 && returned <= 1_300);
    for _ in 0..5_000 {
        if !stage.is_busy() {
            break;
        }
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(stage.get_position(), 1_300);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// The final position does not depend on the approach direction.
    #[test]
    fn prop_move_lands_on_target(start in 1_000i32..4_000, target in 1_000i32..4_000) {
        let (builder, mech, _gpio) = sim_stage(start, -10_000, 10_000);
        let stage = builder.build().unwrap();

        prop_assert_eq!(stage.move_to(target, false, true), target);
        prop_assert_eq!(mech.position(), i64::from(target));

        let expected_steps = if target < start {
            (start - target + 400) as u64
        } else {
            (target - start) as u64
        };
        prop_assert_eq!(mech.steps_taken(), expected_steps);
    }
}
