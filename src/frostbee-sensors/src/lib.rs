//! Sensor acquisition core of the Frostbee temperature and humidity node.
//!
//! The crate talks to a Sensirion SHT4x over an I2C bus that may be electrically unreliable,
//! and exposes the values a reporting collaborator (the radio stack) needs:
//!
//! - [`transport`]: interchangeable bus backends behind a single [`Transport`](transport::Transport)
//!   trait, with exclusive ownership of the bus pins.
//! - [`diagnostics`]: bus scanning, used when hunting wiring faults.
//! - [`sht4x`]: the command/response protocol, checksums and unit conversion.
//! - [`recovery`]: bounded retries with soft resets around the protocol client.
//! - [`battery`]: noise-rejecting battery voltage sampling.
//! - [`button`]: debounced short/long press classification.
//! - [`context`]: the device context and scheduler tying everything to the [`Collaborator`].
//!
//! All hardware access goes through [`embedded_hal`] and [`embedded_hal_async`] traits, so
//! everything here runs on the host as well as on the device.

#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]
#![allow(async_fn_in_trait)]

pub mod address;
pub mod battery;
pub mod button;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod endpoint;
pub mod events;
pub mod recovery;
pub mod report;
pub mod sht4x;
pub mod transport;

#[cfg(test)]
mod testing;

pub use address::{Address, AddressSet};
pub use report::{BatteryReport, Collaborator, MeasurementReport};
