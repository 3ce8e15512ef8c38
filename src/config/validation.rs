//! Configuration validation.

use crate::error::{ConfigError, Error, Result};
use crate::hal::MotorDirection;

use super::{MonochromatorConfig, PortSelectorConfig, ScanMotorConfig};

/// Validate an instrument configuration.
///
/// Checks:
/// - Each stage has two distinct limit switch lines
/// - Switch directions differ and both move the carriage
/// - Trigger lines do not collide with limit lines or each other
/// - Backlash compensation is not negative
pub fn validate_config(config: &MonochromatorConfig) -> Result<()> {
    validate_scan_motor(&config.scan_motor)?;

    for (_name, selector) in config.port_selectors.iter() {
        validate_port_selector(selector)?;
    }

    Ok(())
}

fn validate_switches(switch_1: u32, switch_2: u32) -> Result<()> {
    if switch_1 == switch_2 {
        return Err(Error::Config(ConfigError::DuplicateLimitSwitch(switch_1)));
    }
    Ok(())
}

fn validate_directions(direction_1: MotorDirection, direction_2: MotorDirection) -> Result<()> {
    if direction_1 == direction_2 {
        return Err(Error::Config(ConfigError::SameSwitchDirection));
    }
    if !direction_1.is_travel() {
        return Err(Error::Config(ConfigError::NonTravelDirection { switch: 1 }));
    }
    if !direction_2.is_travel() {
        return Err(Error::Config(ConfigError::NonTravelDirection { switch: 2 }));
    }
    Ok(())
}

fn validate_scan_motor(config: &ScanMotorConfig) -> Result<()> {
    validate_switches(config.limit_switch_1, config.limit_switch_2)?;
    validate_directions(config.direction_1, config.direction_2)?;

    if config.backlash_steps < 0 {
        return Err(Error::Config(ConfigError::NegativeBacklash(
            config.backlash_steps,
        )));
    }

    let limits = [config.limit_switch_1, config.limit_switch_2];
    for line in [config.trigger_in, config.trigger_out].into_iter().flatten() {
        if limits.contains(&line) {
            return Err(Error::Config(ConfigError::DuplicateTriggerLine(line)));
        }
    }
    if let (Some(input), Some(output)) = (config.trigger_in, config.trigger_out) {
        if input == output {
            return Err(Error::Config(ConfigError::DuplicateTriggerLine(input)));
        }
    }

    Ok(())
}

fn validate_port_selector(config: &PortSelectorConfig) -> Result<()> {
    validate_switches(config.limit_switch_1, config.limit_switch_2)?;
    validate_directions(config.direction_1, config.direction_2)
}
