//! Simulated device: records what the core asked of it.

use super::{Device, Reading};

pub(super) const DEFAULT_SIGNAL_STRENGTH: i32 = -60;
const DEFAULT_FREE_MEMORY: u64 = 180 * 1024;

/// In-memory device for tests and demos.
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    indicator: bool,
    indicator_history: Vec<bool>,
    reading: Reading,
    samples: usize,
    reboots: usize,
    free_memory: u64,
    signal_strength: i32,
}

impl SimulatedDevice {
    /// Create a device reporting the default reading.
    pub fn new() -> Self {
        Self {
            indicator: false,
            indicator_history: Vec::new(),
            reading: Reading::default(),
            samples: 0,
            reboots: 0,
            free_memory: DEFAULT_FREE_MEMORY,
            signal_strength: DEFAULT_SIGNAL_STRENGTH,
        }
    }

    /// Set the value returned by [`Device::sample`].
    pub fn with_reading(mut self, reading: Reading) -> Self {
        self.reading = reading;
        self
    }

    /// Set the reported free memory.
    pub fn with_free_memory(mut self, bytes: u64) -> Self {
        self.free_memory = bytes;
        self
    }

    /// Set the reported signal strength.
    pub fn with_signal_strength(mut self, dbm: i32) -> Self {
        self.signal_strength = dbm;
        self
    }

    /// Current indicator state.
    pub fn indicator(&self) -> bool {
        self.indicator
    }

    /// Every indicator write, in order.
    pub fn indicator_history(&self) -> &[bool] {
        &self.indicator_history
    }

    /// Number of samples taken.
    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Number of reboot requests.
    pub fn reboots(&self) -> usize {
        self.reboots
    }
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for SimulatedDevice {
    fn set_indicator(&mut self, on: bool) {
        self.indicator = on;
        self.indicator_history.push(on);
    }

    fn sample(&mut self) -> Reading {
        self.samples += 1;
        self.reading
    }

    fn reboot(&mut self) {
        tracing::info!("Simulated reboot");
        self.reboots += 1;
        self.indicator = false;
    }

    fn free_memory(&mut self) -> u64 {
        self.free_memory
    }

    fn link_signal_strength(&self) -> i32 {
        self.signal_strength
    }
}
