//! Device platform abstraction.
//!
//! The session core drives the hardware through [`Device`]: the "ready"
//! indicator, sensor sampling, reboot, and the two health figures carried in
//! every telemetry report.

mod host;
mod simulated;

pub use host::HostDevice;
pub use simulated::SimulatedDevice;

use serde::{Deserialize, Serialize};

/// Reported when the device has no temperature sensor (°C)
pub const DEFAULT_TEMPERATURE: f32 = 25.5;

/// Reported when the device has no humidity sensor (%)
pub const DEFAULT_HUMIDITY: f32 = 60.0;

/// One environmental sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Temperature in °C
    pub temperature: f32,
    /// Relative humidity in %
    pub humidity: f32,
}

impl Reading {
    /// Create a reading
    pub const fn new(temperature: f32, humidity: f32) -> Self {
        Self {
            temperature,
            humidity,
        }
    }
}

impl Default for Reading {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPERATURE, DEFAULT_HUMIDITY)
    }
}

/// Hardware the session core controls.
pub trait Device {
    /// Drive the "ready" indicator.
    fn set_indicator(&mut self, on: bool);

    /// Take a sensor reading.
    fn sample(&mut self) -> Reading;

    /// Reboot the device. On real hardware this does not return.
    fn reboot(&mut self);

    /// Free memory in bytes.
    fn free_memory(&mut self) -> u64;

    /// Link signal strength in dBm (0 when unknown).
    fn link_signal_strength(&self) -> i32;
}

impl<D: Device + ?Sized> Device for Box<D> {
    fn set_indicator(&mut self, on: bool) {
        (**self).set_indicator(on);
    }

    fn sample(&mut self) -> Reading {
        (**self).sample()
    }

    fn reboot(&mut self) {
        (**self).reboot();
    }

    fn free_memory(&mut self) -> u64 {
        (**self).free_memory()
    }

    fn link_signal_strength(&self) -> i32 {
        (**self).link_signal_strength()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_reading() {
        let reading = Reading::default();
        assert_eq!(reading.temperature, 25.5);
        assert_eq!(reading.humidity, 60.0);
    }

    #[test]
    fn test_boxed_device_forwards() {
        let mut device: Box<dyn Device> = Box::new(SimulatedDevice::new());
        device.set_indicator(true);
        assert_eq!(device.sample(), Reading::default());
        assert_eq!(device.link_signal_strength(), simulated::DEFAULT_SIGNAL_STRENGTH);
    }
}
