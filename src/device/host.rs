//! Device backed by the host machine.
//!
//! Memory comes from sysinfo. There is no sensor or radio, so readings are
//! the defaults and signal strength is 0. The indicator is a log line, and
//! reboot exits the process so a supervisor can start it again.

use sysinfo::System;

use super::{Device, Reading};

/// Host-machine device.
pub struct HostDevice {
    system: System,
    indicator: bool,
    reading: Reading,
}

impl HostDevice {
    /// Create a host device.
    pub fn new() -> Self {
        Self {
            system: System::new(),
            indicator: false,
            reading: Reading::default(),
        }
    }

    /// Report a fixed reading instead of the defaults.
    pub fn with_reading(mut self, reading: Reading) -> Self {
        self.reading = reading;
        self
    }

    /// Current indicator state.
    pub fn indicator(&self) -> bool {
        self.indicator
    }
}

impl Default for HostDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for HostDevice {
    fn set_indicator(&mut self, on: bool) {
        if self.indicator != on {
            tracing::info!(ready = on, "Indicator");
        }
        self.indicator = on;
    }

    fn sample(&mut self) -> Reading {
        self.reading
    }

    fn reboot(&mut self) {
        tracing::warn!("Restart requested, exiting");
        std::process::exit(0);
    }

    fn free_memory(&mut self) -> u64 {
        self.system.refresh_memory();
        self.system.available_memory()
    }

    fn link_signal_strength(&self) -> i32 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_readings() {
        let mut device = HostDevice::new();
        assert_eq!(device.sample(), Reading::default());
        assert_eq!(device.link_signal_strength(), 0);

        device.set_indicator(true);
        assert!(device.indicator());
    }
}
