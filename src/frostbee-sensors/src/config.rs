//! Device configuration.
//!
//! The configuration is fixed at build time: [`Config::from_env()`] reads the following
//! environment variables when the crate using it is compiled, falling back to defaults for the
//! ones not set.
//!
//! | Variable | Default | |
//! |---|---|---|
//! | `FROSTBEE_SENSOR_ADDR` | `68` (`0x44`) | Sensor address, in decimal |
//! | `FROSTBEE_BUS_400K` | `false` | Run the bus at 400 kHz instead of 100 kHz |
//! | `FROSTBEE_READ_INTERVAL_MS` | `3000` | Period of the measurement cycle |
//! | `FROSTBEE_SCAN_INTERVAL_MS` | `5000` | Period of diagnostic bus scans |
//! | `FROSTBEE_BATTERY_EMPTY_MV` | `2200` | Battery voltage reported as 0 % |
//! | `FROSTBEE_BATTERY_FULL_MV` | `3000` | Battery voltage reported as 100 % |
//! | `FROSTBEE_LONG_PRESS_MS` | `5000` | Hold time triggering a factory reset |

use embassy_time::Duration;
use frostbee_utils::{bool_from_env_or, u32_from_env_or, u8_from_env_or};

use crate::{
    address::Address,
    battery::BatteryConfig,
    button::ButtonConfig,
    diagnostics::DiagnosticMode,
    recovery::RetryPolicy,
    sht4x::Precision,
    transport::{BackendKind, Frequency, Pin, PinPair},
};

/// Bus pins wired on the board.
pub const PRIMARY_PINS: PinPair = PinPair {
    sda: Pin::new(0, 24),
    scl: Pin::new(1, 0),
};

/// Alternate bus pins, for boards where the primary ones are unusable.
pub const ALTERNATE_PINS: PinPair = PinPair {
    sda: Pin::new(0, 26),
    scl: Pin::new(0, 27),
};

/// Device configuration.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Address of the sensor.
    pub sensor_address: Address,
    /// Bus backend.
    pub backend: BackendKind,
    /// Pins used by [`BackendKind::DriverMediated`] and [`BackendKind::DirectRegister`].
    pub primary_pins: PinPair,
    /// Pins used by [`BackendKind::AlternateMapping`].
    pub alternate_pins: PinPair,
    /// Bus frequency.
    pub frequency: Frequency,
    /// Forced diagnostic mode; `None` in normal operation.
    pub diagnostic: Option<DiagnosticMode>,
    /// Measurement precision.
    pub precision: Precision,
    /// Period of the measurement cycle.
    pub read_interval: Duration,
    /// Period of diagnostic bus scans.
    pub scan_interval: Duration,
    /// Retries of sensor requests.
    pub retry: RetryPolicy,
    /// Button thresholds.
    pub button: ButtonConfig,
    /// Battery measurement.
    pub battery: BatteryConfig,
}

impl Config {
    /// Reads the configuration from the build environment.
    ///
    /// # Panics
    ///
    /// Panics if `FROSTBEE_SENSOR_ADDR` is a reserved address.
    /// Evaluate this in a `const` item so that this fails the build instead.
    #[must_use]
    pub const fn from_env() -> Self {
        let Some(sensor_address) = Address::new(u8_from_env_or!("FROSTBEE_SENSOR_ADDR", 0x44))
        else {
            panic!("FROSTBEE_SENSOR_ADDR must be within 3..=119");
        };

        let frequency = if bool_from_env_or!("FROSTBEE_BUS_400K", false) {
            Frequency::_400k
        } else {
            Frequency::_100k
        };

        let mut battery = BatteryConfig::DEFAULT;
        battery.empty_mv = u32_from_env_or!("FROSTBEE_BATTERY_EMPTY_MV", 2200);
        battery.full_mv = u32_from_env_or!("FROSTBEE_BATTERY_FULL_MV", 3000);

        let mut button = ButtonConfig::DEFAULT;
        button.long_press = millis(u32_from_env_or!("FROSTBEE_LONG_PRESS_MS", 5000));

        Self {
            sensor_address,
            backend: BackendKind::DriverMediated,
            primary_pins: PRIMARY_PINS,
            alternate_pins: ALTERNATE_PINS,
            frequency,
            diagnostic: None,
            precision: Precision::High,
            read_interval: millis(u32_from_env_or!("FROSTBEE_READ_INTERVAL_MS", 3000)),
            scan_interval: millis(u32_from_env_or!("FROSTBEE_SCAN_INTERVAL_MS", 5000)),
            retry: RetryPolicy::RECOVERY,
            button,
            battery,
        }
    }

    /// Selects the bus backend.
    #[must_use]
    pub const fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Forces a diagnostic mode.
    #[must_use]
    pub const fn with_diagnostic(mut self, mode: Option<DiagnosticMode>) -> Self {
        self.diagnostic = mode;
        self
    }

    /// Returns the pins of the selected backend.
    #[must_use]
    pub const fn pins(&self) -> PinPair {
        match self.backend {
            BackendKind::DriverMediated | BackendKind::DirectRegister => self.primary_pins,
            BackendKind::AlternateMapping => self.alternate_pins,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

const fn millis(ms: u32) -> Duration {
    Duration::from_millis(ms as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: Config = Config::from_env();

    #[test]
    fn test_defaults() {
        assert_eq!(CONFIG.sensor_address, Address::SHT4X_A);
        assert_eq!(CONFIG.frequency, Frequency::_100k);
        assert_eq!(CONFIG.read_interval, Duration::from_secs(3));
        assert_eq!(CONFIG.retry.max_attempts, 3);
        assert_eq!(CONFIG.button.long_press, Duration::from_secs(5));
        assert_eq!(CONFIG.battery.full_mv, 3000);
        assert_eq!(CONFIG.diagnostic, None);
    }

    #[test]
    fn test_backend_pins() {
        let config = CONFIG.with_backend(BackendKind::AlternateMapping);
        assert_eq!(config.pins(), ALTERNATE_PINS);

        let config = CONFIG.with_backend(BackendKind::DirectRegister);
        assert_eq!(config.pins(), PRIMARY_PINS);
    }

    #[test]
    fn test_forced_diagnostic() {
        const SCAN: Config = Config::from_env().with_diagnostic(Some(DiagnosticMode::Scan));
        assert_eq!(SCAN.diagnostic, Some(DiagnosticMode::Scan));
    }
}
