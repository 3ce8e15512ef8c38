//! Example: configuration-driven instrument.
//!
//! This example demonstrates how to:
//! - Load stage and persistence configuration from TOML
//! - Restore the grating position from the position file
//! - Switch a port selector by name
//! - Store the final position at shutdown
//!
//! Run with: `cargo run --example config_driven`

use std::sync::Arc;

use monochromator_motion::hal::sim::{SimActuator, SimGpio, SimMechanism};
use monochromator_motion::{parse_config, Monochromator, PortState, ReadoutSource};
use tracing_subscriber::EnvFilter;

/// Operator who always reads the same value off the counter.
struct FixedReadout(&'static str);

impl ReadoutSource for FixedReadout {
    fn next_line(&mut self, prompt: &str) -> Option<String> {
        println!("{}{}", prompt, self.0);
        Some(self.0.to_string())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Configuration-Driven Instrument Example ===\n");

    let state_dir = std::env::temp_dir().join("monochromator-config-demo");
    let toml_content = format!(
        r#"
[scan_motor]
name = "grating"
limit_switch_1 = 36
limit_switch_2 = 37
backlash_steps = 200
step_style = "double"
trigger_in = 18
trigger_out = 16

[port_selectors.input]
name = "input"
limit_switch_1 = 5
limit_switch_2 = 6

[port_selectors.output]
name = "output"
limit_switch_1 = 11
limit_switch_2 = 13
switch_1_is_port_a = false
step_budget = 5000

[persistence]
path = "{dir}/posinfo.bin"
steps_per_count = 250

[scan_log]
path = "{dir}/motion.log"
"#,
        dir = state_dir.display()
    );

    let config = parse_config(&toml_content)?;
    println!("Scan motor: {}", config.scan_motor.name);
    println!("  Backlash: {} steps", config.scan_motor.backlash_steps);
    println!("  Step style: {:?}", config.scan_motor.step_style);
    println!("Port selectors:");
    for name in config.port_selector_names() {
        if let Some(selector) = config.port_selector(name) {
            println!(
                "  - {} on lines {}/{} (budget {} steps)",
                name,
                selector.limit_switch_1,
                selector.limit_switch_2,
                selector.step_budget.value()
            );
        }
    }
    println!();

    // Simulated carriages: grating, then the two port selectors.
    let grating = SimMechanism::new(12_500, 0, 200_000);
    let input = SimMechanism::new(300, 0, 800);
    let output = SimMechanism::new(700, 0, 800);
    let gpio = Arc::new(
        SimGpio::new(grating.clone())
            .limit_switches(36, 37)
            .carriage(input.clone(), 5, 6)
            .carriage(output.clone(), 11, 13),
    );

    let mut mono = Monochromator::from_config(
        config,
        gpio,
        SimActuator::new(grating.clone()),
        &mut FixedReadout("50.00"),
    )?;
    println!("Grating at {} (counter {})", mono.scan().get_position(), mono.counter_readout());

    mono.register_port_selector("input", SimActuator::reversed(input))?;
    mono.register_port_selector("output", SimActuator::reversed(output))?;
    for name in ["input", "output"] {
        if let Some(selector) = mono.port_selector(name) {
            println!("Port selector '{}': {}", name, selector.get_state_text());
        }
    }

    if let Some(selector) = mono.port_selector("output") {
        let state = selector.set_state(PortState::PortB, true, true);
        println!("Port selector 'output' switched to {}", state);
    }

    mono.scan().move_to(13_000, false, true);
    mono.set_home();
    mono.scan().move_to(12_750, false, true);
    println!(
        "Grating at {} ({} from home, counter {})",
        mono.scan().get_position(),
        mono.position_from_home(),
        mono.counter_readout()
    );

    let store = mono.store().clone();
    mono.shutdown()?;
    let record = store.read_record()?;
    println!(
        "\nStored position {} (home {}), valid: {}",
        record.current_pos,
        record.home_pos,
        record.is_valid()
    );

    // Leave no position file behind so the next run asks again.
    std::fs::remove_file(store.path())?;

    println!("\n=== Example Complete ===");
    Ok(())
}
