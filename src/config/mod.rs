//! Configuration module for monochromator-motion.
//!
//! Provides types for loading and validating the stage configuration of an
//! instrument from TOML files or pre-parsed data.

mod loader;
mod motor;
mod system;
pub mod units;
mod validation;

pub use motor::{PortSelectorConfig, ScanMotorConfig, DEFAULT_BACKLASH_STEPS};
pub use system::{MonochromatorConfig, PersistenceConfig, ScanLogConfig};
pub use validation::validate_config;

pub use loader::{load_config, parse_config};

pub use units::{StepBudget, StepsPerCount};
