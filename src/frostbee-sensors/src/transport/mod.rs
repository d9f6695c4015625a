//! Provides the bus transport the sensor protocol runs over.
//!
//! A transport executes write-then-read exchanges against a target [`Address`].
//! It does not own any timing policy: callers needing a delay between the write and the read
//! phases issue them as two separate exchanges, see [`Transport::write()`] and
//! [`Transport::read()`].
//!
//! Three interchangeable backends are provided, gathered in the [`Backend`] enum:
//!
//! - [`DriverBackend`] delegates to an [`embedded_hal_async::i2c::I2c`] driver, either on the
//!   primary pins ([`Backend::DriverMediated`]) or on the alternate pins
//!   ([`Backend::AlternateMapping`]).
//! - [`RegisterBackend`] drives the peripheral registers directly through a [`RegisterBlock`],
//!   bypassing the driver stack ([`Backend::DirectRegister`]).
//!
//! Every backend holds a [`Claim`] on its pins for its whole lifetime, see [`claim`].

pub mod claim;
mod driver;
mod register;

use embassy_time::Duration;
use embedded_hal_async::{delay::DelayNs, i2c::Operation};

use crate::address::Address;

pub use claim::{Claim, ClaimError, PeripheralId, Pin, PinClaims, PinPair, PIN_CLAIMS};
pub use driver::DriverBackend;
pub use register::{RegisterBackend, RegisterBlock, RegisterEvent, POLL_INTERVAL_US, POLL_LIMIT};

/// Timeout value for bus operations.
///
/// Backends are allowed to timeout earlier.
pub const I2C_TIMEOUT: Duration = Duration::from_millis(100);

/// I2C bus frequency.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Frequency {
    /// Standard mode: 100 kHz.
    _100k,
    /// Fast mode: 400 kHz.
    _400k,
}

impl Frequency {
    /// Returns the frequency in kilohertz.
    #[must_use]
    pub const fn khz(self) -> u32 {
        match self {
            Self::_100k => 100,
            Self::_400k => 400,
        }
    }
}

/// A transport error.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The target did not acknowledge its address.
    AddressNotAcknowledged,
    /// The target did not acknowledge a data byte.
    DataNotAcknowledged,
    /// The exchange did not complete in time; most likely a target is holding the bus.
    Timeout,
    /// The backend peripheral is not initialized or not claimed.
    BackendUnavailable,
    /// An other electrical-layer error occurred (arbitration loss, overrun...).
    Bus,
}

impl Error {
    /// Maps a driver error onto a transport error.
    ///
    /// Drivers unable to tell which step was not acknowledged are assumed to have seen an
    /// address NACK, as that is what an absent or busy target produces.
    #[must_use]
    pub fn from_kind(kind: embedded_hal::i2c::ErrorKind) -> Self {
        use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};

        match kind {
            ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data) => Self::DataNotAcknowledged,
            ErrorKind::NoAcknowledge(_) => Self::AddressNotAcknowledged,
            _ => Self::Bus,
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AddressNotAcknowledged => write!(f, "address not acknowledged"),
            Self::DataNotAcknowledged => write!(f, "data not acknowledged"),
            Self::Timeout => write!(f, "bus timeout"),
            Self::BackendUnavailable => write!(f, "bus backend unavailable"),
            Self::Bus => write!(f, "bus error"),
        }
    }
}

impl core::error::Error for Error {}

/// Executes exchanges against a target on the bus.
///
/// Implementations must not be used concurrently: exchanges take `&mut self`.
pub trait Transport {
    /// Writes `write` to the target, then fills `read` from it.
    ///
    /// The write phase is skipped when `write` is empty and `read` is not; a call with both
    /// empty is a zero-length write, which only checks that the target acknowledges its
    /// address.
    async fn exchange(
        &mut self,
        address: Address,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Error>;

    /// Writes `bytes` to the target.
    async fn write(&mut self, address: Address, bytes: &[u8]) -> Result<(), Error> {
        self.exchange(address, bytes, &mut []).await
    }

    /// Fills `buffer` from the target.
    async fn read(&mut self, address: Address, buffer: &mut [u8]) -> Result<(), Error> {
        self.exchange(address, &[], buffer).await
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    async fn exchange(
        &mut self,
        address: Address,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Error> {
        (**self).exchange(address, write, read).await
    }
}

/// Identifies a [`Backend`] variant.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BackendKind {
    /// The peripheral driver on the primary pins.
    DriverMediated,
    /// Register-level access, bypassing the driver.
    DirectRegister,
    /// The peripheral driver of another instance, on the alternate pins.
    AlternateMapping,
}

/// The bus backend selected for the lifetime of the device.
pub enum Backend<I, R: RegisterBlock, D> {
    /// Driver on the primary pins.
    DriverMediated(DriverBackend<I>),
    /// Register-level access.
    DirectRegister(RegisterBackend<R, D>),
    /// Driver on the alternate pins.
    AlternateMapping(DriverBackend<I>),
}

impl<I, R: RegisterBlock, D> Backend<I, R, D> {
    /// Returns which variant this is.
    #[must_use]
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::DriverMediated(_) => BackendKind::DriverMediated,
            Self::DirectRegister(_) => BackendKind::DirectRegister,
            Self::AlternateMapping(_) => BackendKind::AlternateMapping,
        }
    }
}

impl<I, R, D> Transport for Backend<I, R, D>
where
    I: embedded_hal_async::i2c::I2c,
    R: RegisterBlock,
    D: DelayNs,
{
    async fn exchange(
        &mut self,
        address: Address,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Error> {
        match self {
            Self::DriverMediated(backend) | Self::AlternateMapping(backend) => {
                backend.exchange(address, write, read).await
            }
            Self::DirectRegister(backend) => backend.exchange(address, write, read).await,
        }
    }
}

/// Placeholder for the [`Backend`] type parameters a build does not use.
///
/// It cannot be instantiated.
#[derive(Debug)]
pub enum NoDriver {}

impl embedded_hal_async::i2c::ErrorType for NoDriver {
    type Error = core::convert::Infallible;
}

impl embedded_hal_async::i2c::I2c for NoDriver {
    async fn transaction(
        &mut self,
        _address: u8,
        _operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        match *self {}
    }
}

impl RegisterBlock for NoDriver {
    fn enable(&mut self, _pins: PinPair, _frequency: Frequency) {
        match *self {}
    }

    fn disable(&mut self) {
        match *self {}
    }

    fn is_enabled(&self) -> bool {
        match *self {}
    }

    fn start_write(&mut self, _address: u8, _bytes: &[u8]) -> Result<(), Error> {
        match *self {}
    }

    fn start_read(&mut self, _address: u8, _len: usize) -> Result<(), Error> {
        match *self {}
    }

    fn event(&mut self) -> Option<RegisterEvent> {
        match *self {}
    }

    fn received(&self) -> &[u8] {
        match *self {}
    }

    fn request_stop(&mut self) {
        match *self {}
    }

    fn stop(&mut self) {
        match *self {}
    }
}

impl DelayNs for NoDriver {
    async fn delay_ns(&mut self, _ns: u32) {
        match *self {}
    }
}
