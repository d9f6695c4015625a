use embedded_hal_async::delay::DelayNs;

use super::{Claim, Error, Frequency, PinPair, Transport};
use crate::address::Address;

/// Delay between two polls of the peripheral events, in microseconds.
pub const POLL_INTERVAL_US: u32 = 100;

/// Maximum number of polls before a transfer is reported as timed out.
///
/// Together with [`POLL_INTERVAL_US`] this bounds a transfer to 100 ms.
pub const POLL_LIMIT: u32 = 1000;

/// Terminal event of a register-level transfer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegisterEvent {
    /// The transfer completed and the peripheral stopped.
    Done,
    /// The target did not acknowledge its address.
    AddressNack,
    /// The target did not acknowledge a data byte.
    DataNack,
    /// The peripheral reported another error (e.g., overrun).
    Error,
}

/// Register-level access to an I2C controller peripheral.
///
/// Implementations own the DMA buffers the peripheral reads from and writes to, so that these
/// live in RAM for the whole transfer.
/// Every transfer ends with a STOP condition.
pub trait RegisterBlock {
    /// Selects the pins and the frequency, then enables the peripheral.
    fn enable(&mut self, pins: PinPair, frequency: Frequency);

    /// Disables the peripheral and disconnects it from its pins.
    fn disable(&mut self);

    /// Returns whether the peripheral is enabled.
    fn is_enabled(&self) -> bool;

    /// Starts transmitting `bytes` to `address`; `bytes` may be empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendUnavailable`] if the transfer cannot be started, e.g., because
    /// `bytes` does not fit the peripheral buffer.
    fn start_write(&mut self, address: u8, bytes: &[u8]) -> Result<(), Error>;

    /// Starts receiving `len` bytes from `address`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendUnavailable`] if the transfer cannot be started.
    fn start_read(&mut self, address: u8, len: usize) -> Result<(), Error>;

    /// Returns and clears the terminal event of the current transfer, if one occurred.
    fn event(&mut self) -> Option<RegisterEvent>;

    /// Returns the bytes received by the last completed read.
    fn received(&self) -> &[u8];

    /// Requests a STOP condition as soon as the target is addressed, keeping the events.
    ///
    /// An empty write has no last byte to end it, so it only completes after this call.
    fn request_stop(&mut self);

    /// Aborts the current transfer.
    fn stop(&mut self);
}

impl<R: RegisterBlock + ?Sized> RegisterBlock for &mut R {
    fn enable(&mut self, pins: PinPair, frequency: Frequency) {
        R::enable(self, pins, frequency);
    }

    fn disable(&mut self) {
        R::disable(self);
    }

    fn is_enabled(&self) -> bool {
        R::is_enabled(self)
    }

    fn start_write(&mut self, address: u8, bytes: &[u8]) -> Result<(), Error> {
        R::start_write(self, address, bytes)
    }

    fn start_read(&mut self, address: u8, len: usize) -> Result<(), Error> {
        R::start_read(self, address, len)
    }

    fn event(&mut self) -> Option<RegisterEvent> {
        R::event(self)
    }

    fn received(&self) -> &[u8] {
        R::received(self)
    }

    fn request_stop(&mut self) {
        R::request_stop(self);
    }

    fn stop(&mut self) {
        R::stop(self);
    }
}

/// Backend driving the peripheral registers directly, bypassing the driver stack.
///
/// Completion is polled every [`POLL_INTERVAL_US`], at most [`POLL_LIMIT`] times.
pub struct RegisterBackend<R: RegisterBlock, D> {
    regs: R,
    delay: D,
    claim: Claim,
}

impl<R: RegisterBlock, D: DelayNs> RegisterBackend<R, D> {
    /// Enables the peripheral on the claimed pins.
    pub fn new(mut regs: R, delay: D, claim: Claim, frequency: Frequency) -> Self {
        regs.enable(claim.pins(), frequency);
        frostbee_log::info!(
            "{} registers enabled at {} kHz",
            claim.peripheral().0,
            frequency.khz()
        );
        Self { regs, delay, claim }
    }

    /// Returns the claim held on the bus pins.
    pub fn claim(&self) -> &Claim {
        &self.claim
    }

    async fn wait_for_completion(&mut self) -> Result<(), Error> {
        for _ in 0..POLL_LIMIT {
            if let Some(event) = self.regs.event() {
                return match event {
                    RegisterEvent::Done => Ok(()),
                    RegisterEvent::AddressNack => Err(Error::AddressNotAcknowledged),
                    RegisterEvent::DataNack => Err(Error::DataNotAcknowledged),
                    RegisterEvent::Error => Err(Error::Bus),
                };
            }
            self.delay.delay_us(POLL_INTERVAL_US).await;
        }

        frostbee_log::error!("{} transfer timed out", self.claim.peripheral().0);
        self.regs.stop();
        Err(Error::Timeout)
    }
}

impl<R: RegisterBlock, D: DelayNs> Transport for RegisterBackend<R, D> {
    async fn exchange(
        &mut self,
        address: Address,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Error> {
        if !self.regs.is_enabled() {
            return Err(Error::BackendUnavailable);
        }

        let address = address.get();

        if !write.is_empty() || read.is_empty() {
            self.regs.start_write(address, write)?;
            if write.is_empty() {
                self.regs.request_stop();
            }
            self.wait_for_completion().await?;
        }

        if !read.is_empty() {
            self.regs.start_read(address, read.len())?;
            self.wait_for_completion().await?;

            let received = self.regs.received().get(..read.len()).ok_or(Error::Bus)?;
            read.copy_from_slice(received);
        }

        Ok(())
    }
}

impl<R: RegisterBlock, D> Drop for RegisterBackend<R, D> {
    fn drop(&mut self) {
        self.regs.disable();
    }
}
