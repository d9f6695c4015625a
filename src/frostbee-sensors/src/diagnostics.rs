//! Bus diagnostics, used to track down wiring faults.
//!
//! A forced [`DiagnosticMode`] replaces the normal operation of the device:
//!
//! - [`DiagnosticMode::Scan`] repeatedly probes every address of the bus and logs which ones
//!   answer;
//! - [`DiagnosticMode::ContinuousRead`] reads the sensor identity once, then measures
//!   repeatedly, logging the values without reporting them.

use embedded_hal_async::delay::DelayNs;

use crate::{
    address::{Address, AddressSet},
    recovery::Recovering,
    sht4x::{Identity, Measurement, Precision},
    transport::{self, Transport},
};

/// A forced diagnostic mode.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiagnosticMode {
    /// Repeated bus scans.
    Scan,
    /// Repeated sensor reads.
    ContinuousRead,
}

/// Probes every non-reserved address with a zero-length write.
///
/// An address is reported present if and only if its probe is acknowledged; failed probes are
/// not retried.
/// Probes do not change the state of the devices, so scanning can be repeated safely.
///
/// An unavailable backend is reported as an empty bus.
pub async fn scan<T: Transport>(transport: &mut T) -> AddressSet {
    let mut found = AddressSet::new();

    for address in Address::all() {
        match transport.write(address, &[]).await {
            Ok(()) => found.insert(address),
            Err(transport::Error::BackendUnavailable) => {
                frostbee_log::error!("bus backend unavailable");
                return AddressSet::new();
            }
            Err(transport::Error::Timeout) => {
                frostbee_log::warn!("probe of {:#x} timed out; is a line held low?", address.get());
            }
            Err(_) => {}
        }
    }

    found
}

/// Logs the outcome of a [`scan()`].
pub fn log_scan(found: &AddressSet) {
    if found.is_empty() {
        frostbee_log::warn!("no device found, check:");
        frostbee_log::warn!("- SDA and SCL are not swapped");
        frostbee_log::warn!("- the sensor is powered (VDD 1.08 V to 3.6 V)");
        frostbee_log::warn!("- SDA and SCL have pull-ups to VDD");
        frostbee_log::warn!("- GND is shared with the board");
        return;
    }

    frostbee_log::info!("{} device(s) found", found.len());
    for address in found.iter() {
        match address.variant_name() {
            Some(variant) => frostbee_log::info!("- {:#x}: {}", address.get(), variant),
            None => frostbee_log::info!("- {:#x}", address.get()),
        }
    }
}

/// Reads the sensor identity, logging the outcome.
pub async fn log_identity<T: Transport, D: DelayNs>(
    sensor: &mut Recovering<T, D>,
) -> Option<Identity> {
    match sensor.read_identity().await {
        Ok(identity) => {
            frostbee_log::info!("sensor serial number: {:#x}", identity.serial);
            Some(identity)
        }
        Err(err) => {
            frostbee_log::error!("could not read the serial number: {}", err);
            None
        }
    }
}

/// Measures once, logging the outcome.
pub async fn log_measurement<T: Transport, D: DelayNs>(
    sensor: &mut Recovering<T, D>,
    precision: Precision,
) -> Option<Measurement> {
    match sensor.measure(precision).await {
        Ok(measurement) => {
            frostbee_log::info!(
                "T: {} cC, RH: {} c%",
                measurement.temperature,
                measurement.humidity
            );
            Some(measurement)
        }
        Err(err) => {
            frostbee_log::error!("{}", err);
            None
        }
    }
}
