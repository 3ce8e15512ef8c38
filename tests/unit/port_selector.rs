//! Unit tests for the port selector.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use monochromator_motion::config::StepBudget;
use monochromator_motion::error::{ConfigError, Error, RejectedRequest};
use monochromator_motion::hal::sim::{SimActuator, SimGpio, SimMechanism};
use monochromator_motion::hal::Level;
use monochromator_motion::{CancellationToken, PortSelectorBuilder, PortState};

const PORT_A: u32 = 11;
const PORT_B: u32 = 13;

/// Carriage with Port A at 0 and Port B at 1000. `Forward` drives toward Port A.
fn selector_at(position: i64) -> (PortSelectorBuilder<SimActuator, SimGpio>, Arc<SimMechanism>, Arc<SimGpio>) {
    let mech = SimMechanism::new(position, 0, 1000);
    let gpio = Arc::new(SimGpio::new(mech.clone()).limit_switches(PORT_A, PORT_B));
    let builder = PortSelectorBuilder::new()
        .name("output")
        .actuator(SimActuator::reversed(mech.clone()))
        .gpio(gpio.clone())
        .limit_switches(PORT_A, PORT_B);
    (builder, mech, gpio)
}

fn wait_idle(is_busy: impl Fn() -> bool) {
    for _ in 0..5_000 {
        if !is_busy() {
            return;
        }
        thread::sleep(Duration::from_millis(1));
    }
    panic!("stage did not come to rest");
}

/// A carriage found between ports settles on Port A during construction.
#[test]
fn test_construction_drives_to_port_a() {
    let (builder, mech, _gpio) = selector_at(500);
    let selector = builder.build().unwrap();

    assert_eq!(selector.get_state(), PortState::PortA);
    assert_eq!(mech.position(), 0);
    assert_eq!(mech.steps_taken(), 500);
    assert_eq!(selector.get_state_text(), "Port A");
}

/// A carriage already on a port does not move during construction.
#[test]
fn test_construction_at_port_b_stays() {
    let (builder, mech, _gpio) = selector_at(1000);
    let selector = builder.build().unwrap();

    assert_eq!(selector.get_state(), PortState::PortB);
    assert_eq!(mech.steps_taken(), 0);
}

/// Not reaching Port A within the budget during construction is a config error.
#[test]
fn test_construction_fails_when_budget_too_small() {
    let (builder, _mech, _gpio) = selector_at(500);
    let result = builder.step_budget(StepBudget::new(100).unwrap()).build();

    match result {
        Err(Error::Config(ConfigError::InitialPort(state))) => assert_eq!(state.as_str(), "Moving"),
        _ => panic!("expected InitialPort error"),
    }
}

/// Both switches closed is a wiring fault.
#[test]
fn test_both_switches_closed_is_wiring_error() {
    let (builder, mech, gpio) = selector_at(500);
    gpio.force_level(PORT_A, Level::High);
    gpio.force_level(PORT_B, Level::High);

    assert!(matches!(builder.build(), Err(Error::Wiring(_))));
    assert_eq!(mech.steps_taken(), 0);
}

/// Swapped port mapping changes which switch is Port A.
#[test]
fn test_switch_1_as_port_b() {
    let (builder, mech, _gpio) = selector_at(500);
    let selector = builder.switch_1_is_port_a(false).build().unwrap();

    // Port A is now the switch 2 end.
    assert_eq!(mech.position(), 1000);
    assert_eq!(selector.get_state(), PortState::PortA);

    assert_eq!(selector.set_state(PortState::PortB, true, true), PortState::PortB);
    assert_eq!(mech.position(), 0);
}

/// Blocking request returns the final state.
#[test]
fn test_blocking_switch() {
    let (builder, mech, _gpio) = selector_at(0);
    let selector = builder.build().unwrap();

    assert_eq!(selector.set_state(PortState::PortB, true, true), PortState::PortB);
    assert_eq!(mech.position(), 1000);
    assert!(!selector.is_moving());

    assert_eq!(selector.set_state(PortState::PortA, true, true), PortState::PortA);
    assert_eq!(mech.position(), 0);
}

/// Non-blocking request returns the state before the move.
#[test]
fn test_non_blocking_switch() {
    let (builder, _mech, _gpio) = selector_at(0);
    let selector = builder.build().unwrap();

    assert_eq!(selector.set_state(PortState::PortB, false, true), PortState::PortA);
    wait_idle(|| selector.is_busy());
    assert_eq!(selector.get_state(), PortState::PortB);
}

/// Requesting a non-port state is refused without moving.
#[test]
fn test_non_commandable_target_rejected() {
    let (builder, mech, _gpio) = selector_at(0);
    let selector = builder.build().unwrap();

    assert_eq!(selector.set_state(PortState::Moving, true, true), PortState::Error);
    assert_eq!(
        selector.request(PortState::Error, true).unwrap_err(),
        RejectedRequest::NotTravelState
    );
    assert_eq!(mech.steps_taken(), 0);
    assert_eq!(selector.get_state(), PortState::PortA);
}

/// The step budget ends a request short of the port unless it is waived.
#[test]
fn test_step_budget() {
    let (builder, mech, _gpio) = selector_at(0);
    let selector = builder.step_budget(StepBudget::new(100).unwrap()).build().unwrap();

    assert_eq!(selector.set_state(PortState::PortB, true, true), PortState::Moving);
    assert_eq!(mech.position(), 100);

    assert_eq!(selector.set_state(PortState::PortB, true, false), PortState::PortB);
    assert_eq!(mech.position(), 1000);
}

/// A second request while one is in flight is refused.
#[test]
fn test_overlapping_request_is_busy() {
    let (builder, mech, _gpio) = selector_at(0);
    let selector = builder.build().unwrap();
    mech.set_step_delay(Duration::from_micros(200));

    let handle = selector.request(PortState::PortB, true).unwrap();
    assert_eq!(
        selector.request(PortState::PortA, true).unwrap_err(),
        RejectedRequest::Busy
    );
    assert_eq!(handle.wait().unwrap(), PortState::PortB);
}

/// Emergency stop halts the carriage between ports.
#[test]
fn test_emergency_stop() {
    let (builder, mech, _gpio) = selector_at(0);
    let selector = builder.build().unwrap();
    mech.set_step_delay(Duration::from_millis(1));

    let handle = selector.request(PortState::PortB, true).unwrap();
    thread::sleep(Duration::from_millis(20));
    selector.emergency_stop();

    assert_eq!(handle.wait().unwrap(), PortState::Moving);
    assert!(mech.position() > 0 && mech.position() < 1000);
}

/// Cancelling the shared token halts the carriage.
#[test]
fn test_cancellation_token() {
    let token = CancellationToken::new();
    let (builder, mech, _gpio) = selector_at(0);
    let selector = builder.cancellation(token.clone()).build().unwrap();
    mech.set_step_delay(Duration::from_millis(1));

    let handle = selector.request(PortState::PortB, true).unwrap();
    thread::sleep(Duration::from_millis(20));
    token.cancel();

    assert_eq!(handle.wait().unwrap(), PortState::Moving);
    assert!(mech.position() < 1000);
}

/// A failing actuator ends the request where it is.
#[test]
fn test_actuator_failure() {
    let (builder, mech, _gpio) = selector_at(0);
    let selector = builder.build().unwrap();
    mech.fail_steps(true);

    assert_eq!(selector.set_state(PortState::PortB, true, true), PortState::PortA);
    assert_eq!(mech.steps_taken(), 0);
}

/// Cancelling through the handle stops its own request.
#[test]
fn test_handle_cancel_stops_request() {
    let (builder, mech, _gpio) = selector_at(0);
    let selector = builder.build().unwrap();
    mech.set_step_delay(Duration::from_millis(1));

    let handle = selector.request(PortState::PortB, true).unwrap();
    thread::sleep(Duration::from_millis(20));
    handle.cancel();

    assert_eq!(handle.wait().unwrap(), PortState::Moving);
    assert!(mech.position() < 1000);
}

/// A handle kept after its request finished does not stop the next one.
#[test]
fn test_finished_handle_spares_next_request() {
    let (builder, mech, _gpio) = selector_at(0);
    let selector = builder.build().unwrap();

    let old = selector.request(PortState::PortB, true).unwrap();
    wait_idle(|| !old.is_finished() || selector.is_busy());
    assert_eq!(selector.get_state(), PortState::PortB);

    mech.set_step_delay(Duration::from_millis(1));
    let handle = selector.request(PortState::PortA, true).unwrap();
    thread::sleep(Duration::from_millis(20));
    old.cancel();

    assert_eq!(handle.wait().unwrap(), PortState::PortA);
    assert_eq!(mech.position(), 0);
}
