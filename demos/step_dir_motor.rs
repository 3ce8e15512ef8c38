//! Example: a scanning stage on a STEP/DIR driver.
//!
//! Demonstrates plugging embedded-hal 1.0 pins into the stage through
//! [`StepDirActuator`]. The pins here only count pulses; on a board they would be
//! GPIO outputs from the platform's HAL crate.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use monochromator_motion::hal::sim::{SimGpio, SimMechanism};
use monochromator_motion::hal::StepDirActuator;
use monochromator_motion::ScanStageBuilder;
use tracing_subscriber::EnvFilter;

/// STEP pin counting rising edges.
struct CountingPin {
    pulses: Arc<AtomicU32>,
}

impl embedded_hal::digital::ErrorType for CountingPin {
    type Error = core::convert::Infallible;
}

impl embedded_hal::digital::OutputPin for CountingPin {
    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.pulses.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// DIR pin remembering its level.
struct DirPin {
    high: Arc<AtomicU32>,
}

impl embedded_hal::digital::ErrorType for DirPin {
    type Error = core::convert::Infallible;
}

impl embedded_hal::digital::OutputPin for DirPin {
    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.high.store(1, Ordering::Relaxed);
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.high.store(0, Ordering::Relaxed);
        Ok(())
    }
}

/// Delay provider backed by the OS scheduler.
struct ThreadDelay;

impl embedded_hal::delay::DelayNs for ThreadDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(std::time::Duration::from_nanos(u64::from(ns)));
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== STEP/DIR Stage Example ===\n");

    let pulses = Arc::new(AtomicU32::new(0));
    let dir_level = Arc::new(AtomicU32::new(0));

    // 20 µs per step.
    let actuator = StepDirActuator::new(
        CountingPin {
            pulses: pulses.clone(),
        },
        DirPin {
            high: dir_level.clone(),
        },
        ThreadDelay,
        20_000,
    );

    // No carriage on the limit lines, they read open.
    let gpio = Arc::new(SimGpio::new(SimMechanism::new(0, i64::MIN, i64::MAX)));

    let stage = ScanStageBuilder::new()
        .name("grating")
        .actuator(actuator)
        .gpio(gpio)
        .limit_switches(36, 37)
        .start_position(1_000)
        .build()?;

    for target in [1_200, 900, 1_000] {
        let before = pulses.load(Ordering::Relaxed);
        let reached = stage.move_to(target, false, true);
        println!(
            "Move to {:>5}: reached {:>5}, {:>4} pulses, DIR {}",
            target,
            reached,
            pulses.load(Ordering::Relaxed) - before,
            if dir_level.load(Ordering::Relaxed) == 1 { "high" } else { "low" }
        );
    }

    println!("\n=== Example Complete ===");
    Ok(())
}
