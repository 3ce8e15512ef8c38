//! Example: a scan on a simulated grating stage.
//!
//! This example demonstrates how to:
//! - Wire a scanning stage to simulated hardware
//! - Run a scan with trigger pulses and cancel another one mid-way
//! - Read the scan log
//!
//! Run with: `RUST_LOG=debug cargo run --example simulated_scan`

use std::sync::Arc;
use std::time::Duration;

use monochromator_motion::hal::sim::{SimActuator, SimGpio, SimMechanism};
use monochromator_motion::{FileScanLog, ScanJob, ScanStageBuilder};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Simulated Scan Example ===\n");

    // Grating carriage with its limit switches at 0 and 50 000 steps.
    let mech = SimMechanism::new(12_000, 0, 50_000);
    mech.set_step_delay(Duration::from_micros(50));
    let gpio = Arc::new(SimGpio::new(mech.clone()).limit_switches(36, 37));

    let log_dir = std::env::temp_dir().join("monochromator-demo");
    let log = Arc::new(FileScanLog::open(log_dir.join("motion.log"))?);

    let stage = ScanStageBuilder::new()
        .name("grating")
        .actuator(SimActuator::new(mech.clone()))
        .gpio(gpio.clone())
        .limit_switches(36, 37)
        .trigger_out(16)
        .start_position(12_000)
        .scan_log(log.clone())
        .build()?;

    println!("Stage '{}' at {} ({})", stage.name(), stage.get_position(), stage.get_state_text());

    // A backlash-compensated move toward switch 1.
    let reached = stage.move_to(10_000, false, true);
    println!("Moved to {} using {} physical steps", reached, mech.steps_taken());

    let job = ScanJob::new(
        10_000,
        10_500,
        100,
        Duration::from_millis(50),
        Duration::from_millis(5),
    );
    println!("\nScanning {:?}", job.targets().collect::<Vec<_>>());
    let outcome = stage.start_scan(job)?.wait()?;
    println!("Outcome: {:?}", outcome);
    println!("Trigger pulses: {}", gpio.pulses(16));

    // A long scan, cancelled while it dwells.
    let handle = stage.start_scan_seconds(10_400, 20_000, 400, 2, 10)?;
    std::thread::sleep(Duration::from_millis(300));
    println!("\nCancelling scan at {}", stage.current_scan_position());
    handle.cancel();
    println!("Outcome: {:?}", handle.wait()?);

    println!("\nScan log ({}):", log.path().display());
    let text = std::fs::read_to_string(log.path())?;
    for line in text.lines() {
        println!("  {}", line);
    }

    println!("\n=== Example Complete ===");
    Ok(())
}
