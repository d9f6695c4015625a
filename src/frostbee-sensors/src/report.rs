//! Boundary with the reporting collaborator (the radio stack).
//!
//! The collaborator decides when and whether values are transmitted; this crate only supplies
//! them, and forwards the button actions.

use crate::sht4x::Measurement;

/// A measurement, in reporting units.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MeasurementReport {
    /// Temperature, in hundredths of a degree Celsius.
    pub temperature: i16,
    /// Relative humidity, in hundredths of a percent.
    pub humidity: u16,
    /// Whether the measurement passed its checksums.
    pub valid: bool,
}

impl From<Measurement> for MeasurementReport {
    fn from(measurement: Measurement) -> Self {
        Self {
            temperature: measurement.temperature,
            humidity: measurement.humidity,
            valid: measurement.valid,
        }
    }
}

/// A battery state, in reporting units.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BatteryReport {
    /// Battery voltage, in units of 100 mV.
    pub voltage: u8,
    /// Remaining charge, in half-percents (`0..=200`).
    pub percentage: u8,
}

/// Receives reports and button-triggered signals.
///
/// Every method is fire-and-forget: it must not block on the network.
pub trait Collaborator {
    /// A fresh measurement is available.
    fn report_measurement(&mut self, report: MeasurementReport);

    /// A fresh battery state is available.
    fn report_battery(&mut self, report: BatteryReport);

    /// The user asked for an immediate read; fresh values have just been reported.
    fn immediate_read(&mut self);

    /// The user asked for a factory reset (leaving the network, erasing persistent state).
    fn factory_reset(&mut self);
}

impl<C: Collaborator + ?Sized> Collaborator for &mut C {
    fn report_measurement(&mut self, report: MeasurementReport) {
        C::report_measurement(self, report);
    }

    fn report_battery(&mut self, report: BatteryReport) {
        C::report_battery(self, report);
    }

    fn immediate_read(&mut self) {
        C::immediate_read(self);
    }

    fn factory_reset(&mut self) {
        C::factory_reset(self);
    }
}
