use core::future::Future;

use embassy_futures::select::{select, Either};
use embassy_time::Timer;
use embedded_hal_async::i2c::I2c;

use super::{Claim, Error, Transport, I2C_TIMEOUT};
use crate::address::Address;

/// Backend delegating to an [`I2c`] driver.
///
/// Despite the driver interface being `async`, the driver may block during operations.
/// It cannot block indefinitely however, as every operation is bounded by [`I2C_TIMEOUT`].
pub struct DriverBackend<I> {
    i2c: I,
    claim: Claim,
}

impl<I: I2c> DriverBackend<I> {
    /// Wraps a driver whose peripheral has been given exclusive ownership of its pins.
    ///
    /// The claim must have been obtained before the driver was set up, so that no other
    /// peripheral still drives the pins once the driver connects to them.
    pub fn new(i2c: I, claim: Claim) -> Self {
        frostbee_log::info!(
            "{} drives the bus (SDA P{}.{}, SCL P{}.{})",
            claim.peripheral().0,
            claim.pins().sda.port,
            claim.pins().sda.pin,
            claim.pins().scl.port,
            claim.pins().scl.pin
        );
        Self { i2c, claim }
    }

    /// Returns the claim held on the bus pins.
    pub fn claim(&self) -> &Claim {
        &self.claim
    }
}

impl<I: I2c> Transport for DriverBackend<I> {
    async fn exchange(
        &mut self,
        address: Address,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Error> {
        let address = address.get();

        match (write.is_empty(), read.is_empty()) {
            (false, false) => bounded(self.i2c.write_read(address, write, read)).await,
            (true, false) => bounded(self.i2c.read(address, read)).await,
            (_, true) => bounded(self.i2c.write(address, write)).await,
        }
    }
}

async fn bounded<E, F>(op: F) -> Result<(), Error>
where
    E: embedded_hal::i2c::Error,
    F: Future<Output = Result<(), E>>,
{
    match select(op, Timer::after(I2C_TIMEOUT)).await {
        Either::First(res) => res.map_err(|err| Error::from_kind(err.kind())),
        Either::Second(()) => Err(Error::Timeout),
    }
}
