//! Instrument facade.
//!
//! Ties the scanning stage to its position file and owns the port selectors.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use heapless::{FnvIndexMap, String};

use crate::config::MonochromatorConfig;
use crate::error::{truncated, ConfigError, Error, Result};
use crate::hal::{Actuator, Gpio};
use crate::motion::CancellationToken;
use crate::persist::{CounterReadout, PositionStore, ReadoutSource};
use crate::scanlog::{FileScanLog, NullScanLog, ScanLog};

use super::builder::{PortSelectorBuilder, ScanStageBuilder};
use super::port::PortSelector;
use super::scan::ScanStage;

/// Poll interval while waiting for stages to come to rest.
const SETTLE_POLL: Duration = Duration::from_millis(1);

/// A monochromator built from configuration.
///
/// `Monochromator` provides a high-level API for:
/// - Restoring the grating position from the position file
/// - Invalidating that file before the first step of a run
/// - Accessing port selectors by name
/// - Storing the final position at shutdown
///
/// # Example
///
/// ```rust,ignore
/// use monochromator_motion::{load_config, Monochromator, StdinReadout};
///
/// let config = load_config("monochromator.toml")?;
/// let mut mono = Monochromator::from_config(config, gpio, grating, &mut StdinReadout)?;
/// mono.register_port_selector("output", output_actuator)?;
///
/// mono.scan().move_to(12_000, false, true);
/// mono.shutdown()?;
/// ```
pub struct Monochromator<A, G: Gpio> {
    config: MonochromatorConfig,
    store: PositionStore,
    gpio: Arc<G>,
    scan: ScanStage<A, G>,
    ports: FnvIndexMap<String<32>, PortSelector<A, G>, 4>,
    home: AtomicI32,
    cancel: CancellationToken,
}

impl<A, G> Monochromator<A, G>
where
    A: Actuator + 'static,
    G: Gpio + 'static,
{
    /// Load the stored position and build the scanning stage.
    ///
    /// Port selectors are added with [`Monochromator::register_port_selector`].
    ///
    /// # Errors
    ///
    /// Returns an error if the position file is unusable, the scan log can not be
    /// opened or the stage can not be configured.
    pub fn from_config(
        config: MonochromatorConfig,
        gpio: Arc<G>,
        actuator: A,
        readout: &mut dyn ReadoutSource,
    ) -> Result<Self> {
        let store = PositionStore::new(&config.persistence.path, config.persistence.steps_per_count);
        let record = store.load(readout)?;

        let log: Arc<dyn ScanLog> = match &config.scan_log {
            Some(log) => Arc::new(FileScanLog::open(&log.path)?),
            None => Arc::new(NullScanLog),
        };

        let cancel = CancellationToken::new();
        let hook_store = store.clone();
        let scan = ScanStageBuilder::new()
            .from_config(&config.scan_motor)
            .actuator(actuator)
            .gpio(Arc::clone(&gpio))
            .start_position(record.current_pos)
            .invalidate_hook(move || hook_store.invalidate())
            .cancellation(cancel.clone())
            .scan_log(log)
            .build()?;

        Ok(Self {
            config,
            store,
            gpio,
            scan,
            ports: FnvIndexMap::new(),
            home: AtomicI32::new(record.home_pos),
            cancel,
        })
    }

    /// Build the configured port selector `name` around `actuator`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not configured, is already registered, or the
    /// selector can not be brought to a port.
    pub fn register_port_selector(&mut self, name: &str, actuator: A) -> Result<&PortSelector<A, G>> {
        let key: String<32> = truncated(name);
        let selector_config = self
            .config
            .port_selector(name)
            .ok_or_else(|| Error::Config(ConfigError::SelectorNotFound(key.clone())))?;
        if self.ports.contains_key(&key) {
            tracing::warn!("Port selector '{}' already registered", key);
            return Err(Error::Config(ConfigError::DuplicateSelector(key)));
        }

        let selector = PortSelectorBuilder::new()
            .from_config(selector_config)
            .actuator(actuator)
            .gpio(Arc::clone(&self.gpio))
            .cancellation(self.cancel.clone())
            .build()?;

        if !matches!(self.ports.insert(key.clone(), selector), Ok(None)) {
            return Err(Error::Config(ConfigError::DuplicateSelector(key)));
        }
        self.port_selector(name)
            .ok_or(Error::Config(ConfigError::SelectorNotFound(key)))
    }

    /// Get a registered port selector by name.
    pub fn port_selector(&self, name: &str) -> Option<&PortSelector<A, G>> {
        self.ports
            .iter()
            .find(|(k, _)| k.as_str() == name)
            .map(|(_, v)| v)
    }

    /// List registered port selector names.
    pub fn port_selector_names(&self) -> impl Iterator<Item = &str> {
        self.ports.keys().map(|s| s.as_str())
    }

    /// The grating stage.
    pub fn scan(&self) -> &ScanStage<A, G> {
        &self.scan
    }

    /// The position file.
    pub fn store(&self) -> &PositionStore {
        &self.store
    }

    /// The configuration the instrument was built from.
    pub fn config(&self) -> &MonochromatorConfig {
        &self.config
    }

    /// Token that halts every stage of this instrument.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Make the current grating position the home position.
    pub fn set_home(&self) {
        let position = self.scan.get_position();
        self.home.store(position, Ordering::Release);
        tracing::info!("Home set at {}", position);
    }

    /// Home position in absolute steps.
    pub fn home(&self) -> i32 {
        self.home.load(Ordering::Acquire)
    }

    /// Grating position relative to home.
    pub fn position_from_home(&self) -> i32 {
        self.scan.get_position().wrapping_sub(self.home())
    }

    /// What the mechanical counter should read at the current position.
    pub fn counter_readout(&self) -> CounterReadout {
        CounterReadout::from_steps(self.scan.get_position(), self.store.steps_per_count())
    }

    /// Stop all motion, wait for the stages to come to rest and store the final
    /// position as trustworthy.
    ///
    /// # Errors
    ///
    /// Returns an error if the position file can not be written.
    pub fn shutdown(self) -> Result<()> {
        self.scan.cancel_scan();
        for (_, selector) in self.ports.iter() {
            selector.emergency_stop();
        }
        while self.scan.is_busy() || self.ports.values().any(|p| p.is_busy()) {
            thread::sleep(SETTLE_POLL);
        }

        let position = self.scan.get_position();
        tracing::info!(
            "Final position: {} == {}",
            position,
            self.counter_readout()
        );
        self.store.validate_and_store(position, self.home())
    }
}
