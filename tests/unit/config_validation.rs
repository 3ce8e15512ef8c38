//! Unit tests for configuration validation.

use monochromator_motion::config::{parse_config, validate_config, MonochromatorConfig};
use monochromator_motion::error::{ConfigError, Error};

fn with_scan_motor(scan_motor: &str) -> String {
    format!(
        "[scan_motor]\nname = \"grating\"\n{}\n\n[persistence]\npath = \"posinfo.bin\"\n",
        scan_motor
    )
}

/// Test validation of a valid configuration.
#[test]
fn test_valid_config_passes_validation() {
    let toml_str = with_scan_motor("limit_switch_1 = 36\nlimit_switch_2 = 37\ntrigger_in = 18\ntrigger_out = 16");
    let config: MonochromatorConfig = toml::from_str(&toml_str).expect("Failed to parse TOML");
    assert!(validate_config(&config).is_ok());
}

/// Test validation fails when both limit switches share a line.
#[test]
fn test_duplicate_limit_switch() {
    let result = parse_config(&with_scan_motor("limit_switch_1 = 36\nlimit_switch_2 = 36"));
    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::DuplicateLimitSwitch(36)))
    ));
}

/// Test validation fails when a trigger line reuses a limit switch line.
#[test]
fn test_trigger_collides_with_limit() {
    let result = parse_config(&with_scan_motor(
        "limit_switch_1 = 36\nlimit_switch_2 = 37\ntrigger_out = 37",
    ));
    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::DuplicateTriggerLine(37)))
    ));
}

/// Test validation fails when trigger in and out share a line.
#[test]
fn test_trigger_lines_collide() {
    let result = parse_config(&with_scan_motor(
        "limit_switch_1 = 36\nlimit_switch_2 = 37\ntrigger_in = 18\ntrigger_out = 18",
    ));
    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::DuplicateTriggerLine(18)))
    ));
}

/// Test validation fails for identical switch directions.
#[test]
fn test_same_direction() {
    let result = parse_config(&with_scan_motor(
        "limit_switch_1 = 36\nlimit_switch_2 = 37\ndirection_1 = \"forward\"\ndirection_2 = \"forward\"",
    ));
    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::SameSwitchDirection))
    ));
}

/// Test validation fails for a brake direction.
#[test]
fn test_brake_direction() {
    let result = parse_config(&with_scan_motor(
        "limit_switch_1 = 36\nlimit_switch_2 = 37\ndirection_2 = \"brake\"",
    ));
    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::NonTravelDirection { switch: 2 }))
    ));
}

/// Test validation fails for negative backlash.
#[test]
fn test_negative_backlash() {
    let result = parse_config(&with_scan_motor(
        "limit_switch_1 = 36\nlimit_switch_2 = 37\nbacklash_steps = -5",
    ));
    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::NegativeBacklash(-5)))
    ));
}

/// Test a zero step budget is refused while parsing.
#[test]
fn test_zero_step_budget() {
    let toml_str = r#"
[scan_motor]
name = "grating"
limit_switch_1 = 36
limit_switch_2 = 37

[port_selectors.input]
name = "input"
limit_switch_1 = 11
limit_switch_2 = 13
step_budget = 0

[persistence]
path = "posinfo.bin"
"#;
    assert!(matches!(
        parse_config(toml_str),
        Err(Error::Config(ConfigError::ParseError(_)))
    ));
}

/// Test a zero counter factor is refused while parsing.
#[test]
fn test_zero_steps_per_count() {
    let toml_str = r#"
[scan_motor]
name = "grating"
limit_switch_1 = 36
limit_switch_2 = 37

[persistence]
path = "posinfo.bin"
steps_per_count = 0
"#;
    assert!(parse_config(toml_str).is_err());
}

/// Test port selector switches are checked too.
#[test]
fn test_port_selector_duplicate_switch() {
    let toml_str = r#"
[scan_motor]
name = "grating"
limit_switch_1 = 36
limit_switch_2 = 37

[port_selectors.input]
name = "input"
limit_switch_1 = 11
limit_switch_2 = 11

[persistence]
path = "posinfo.bin"
"#;
    assert!(matches!(
        parse_config(toml_str),
        Err(Error::Config(ConfigError::DuplicateLimitSwitch(11)))
    ));
}
