//! Sensirion SHT4x command/response protocol.
//!
//! Every command is a single opcode byte.
//! Commands returning data are answered with two words, each made of two data bytes followed
//! by a [CRC-8](crc) of these, once the device has finished processing the command.
//! Reading earlier than that is not acknowledged by the device, so callers wait for a
//! command-specific settle delay between the write and the read.
//!
//! Checksum mismatches do not fail an operation: they are reported through the `valid` flag of
//! the result, the disposition being left to the caller (see [`recovery`](crate::recovery)).

pub mod crc;

use embassy_time::Duration;
use embedded_hal_async::delay::DelayNs;

use crate::{
    address::Address,
    transport::{self, Transport},
};

/// Reads the 32-bit serial number.
pub const CMD_READ_SERIAL: u8 = 0x89;
/// Resets the device.
pub const CMD_SOFT_RESET: u8 = 0x94;

/// Settle delay after [`CMD_READ_SERIAL`].
pub const IDENTITY_SETTLE: Duration = Duration::from_millis(1);
/// Settle delay after [`CMD_SOFT_RESET`], before any further command.
pub const RESET_SETTLE: Duration = Duration::from_millis(10);

/// Length of a response: two words of two data bytes and a checksum each.
pub const RESPONSE_LEN: usize = 6;

/// Measurement repeatability.
///
/// Higher precision averages more samples in the device, and takes longer.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Precision {
    /// High repeatability.
    #[default]
    High,
    /// Medium repeatability.
    Medium,
    /// Low repeatability.
    Low,
}

impl Precision {
    /// Returns the measurement opcode.
    #[must_use]
    pub const fn command(self) -> u8 {
        match self {
            Self::High => 0xfd,
            Self::Medium => 0xf6,
            Self::Low => 0xe0,
        }
    }

    /// Returns the delay to wait between the command and reading the result.
    ///
    /// These include some slack over the datasheet maximum durations (8.3 ms, 4.5 ms and
    /// 1.6 ms respectively).
    #[must_use]
    pub const fn settle(self) -> Duration {
        match self {
            Self::High => Duration::from_millis(10),
            Self::Medium => Duration::from_millis(5),
            Self::Low => Duration::from_millis(2),
        }
    }
}

/// A temperature and humidity sample.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Measurement {
    /// Temperature, in hundredths of a degree Celsius.
    pub temperature: i16,
    /// Relative humidity, in hundredths of a percent, within `0..=10000`.
    pub humidity: u16,
    /// Whether both response words passed their checksum.
    pub valid: bool,
}

impl Measurement {
    /// Converts raw response words.
    #[must_use]
    pub fn from_raw(raw_temperature: u16, raw_humidity: u16, valid: bool) -> Self {
        Self {
            temperature: temperature_centi(raw_temperature),
            humidity: humidity_centi(raw_humidity),
            valid,
        }
    }
}

/// Serial number of the device.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Identity {
    /// Serial number; the first response word is the most significant.
    pub serial: u32,
    /// Whether both response words passed their checksum.
    pub valid: bool,
}

/// Converts a raw temperature word to hundredths of a degree Celsius.
///
/// Computes `-45 + 175 * raw / 65535`; the result spans `-4500..=13000`.
#[must_use]
pub fn temperature_centi(raw: u16) -> i16 {
    let scaled = 17_500 * i32::from(raw) / 65_535;
    // Always within `-4500..=13000`.
    (scaled - 4_500) as i16
}

/// Converts a raw humidity word to hundredths of a percent.
///
/// Computes `-6 + 125 * raw / 65535`, clamped to `0..=10000` as values out of that range are
/// not physical.
#[must_use]
pub fn humidity_centi(raw: u16) -> u16 {
    let scaled = 12_500 * i32::from(raw) / 65_535;
    // Clamped to `0..=10000`.
    (scaled - 600).clamp(0, 10_000) as u16
}

/// Splits a response into its two data words, and checks their checksums.
fn parse(response: [u8; RESPONSE_LEN]) -> ([u16; 2], bool) {
    let [a0, a1, a_crc, b0, b1, b_crc] = response;
    let a_valid = crc::verify([a0, a1], a_crc);
    let b_valid = crc::verify([b0, b1], b_crc);
    (
        [u16::from_be_bytes([a0, a1]), u16::from_be_bytes([b0, b1])],
        a_valid && b_valid,
    )
}

fn as_micros(duration: Duration) -> u32 {
    u32::try_from(duration.as_micros()).unwrap_or(u32::MAX)
}

/// Protocol client for an SHT4x at a fixed address.
pub struct Sht4x<T, D> {
    transport: T,
    delay: D,
    address: Address,
}

impl<T: Transport, D: DelayNs> Sht4x<T, D> {
    /// Creates a client for the device at `address`.
    ///
    /// No command is sent.
    pub fn new(transport: T, delay: D, address: Address) -> Self {
        Self {
            transport,
            delay,
            address,
        }
    }

    /// Returns the address of the device.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Waits for `duration`, using the client's delay provider.
    pub async fn wait(&mut self, duration: Duration) {
        self.delay.delay_us(as_micros(duration)).await;
    }

    /// Reads the serial number.
    ///
    /// # Errors
    ///
    /// Returns the transport error if either the command or the read fails.
    pub async fn read_identity(&mut self) -> Result<Identity, transport::Error> {
        let ([high, low], valid) = self.command(CMD_READ_SERIAL, IDENTITY_SETTLE).await?;
        if !valid {
            frostbee_log::warn!("checksum mismatch in serial number");
        }

        Ok(Identity {
            serial: (u32::from(high) << 16) | u32::from(low),
            valid,
        })
    }

    /// Measures temperature and humidity.
    ///
    /// # Errors
    ///
    /// Returns the transport error if either the command or the read fails.
    pub async fn measure(&mut self, precision: Precision) -> Result<Measurement, transport::Error> {
        let ([raw_temperature, raw_humidity], valid) =
            self.command(precision.command(), precision.settle()).await?;
        if !valid {
            frostbee_log::warn!("checksum mismatch in measurement");
        }

        Ok(Measurement::from_raw(raw_temperature, raw_humidity, valid))
    }

    /// Resets the device.
    ///
    /// A stuck device frequently fails to acknowledge the command, so the outcome is ignored.
    /// The device is given [`RESET_SETTLE`] to restart in any case.
    pub async fn soft_reset(&mut self) {
        if let Err(err) = self.transport.write(self.address, &[CMD_SOFT_RESET]).await {
            frostbee_log::debug!("soft reset not acknowledged: {}", err);
        }
        self.wait(RESET_SETTLE).await;
    }

    /// Gives back the transport and the delay provider.
    pub fn release(self) -> (T, D) {
        (self.transport, self.delay)
    }

    async fn command(
        &mut self,
        opcode: u8,
        settle: Duration,
    ) -> Result<([u16; 2], bool), transport::Error> {
        self.transport.write(self.address, &[opcode]).await?;
        self.wait(settle).await;

        let mut response = [0; RESPONSE_LEN];
        self.transport.read(self.address, &mut response).await?;

        Ok(parse(response))
    }
}

#[cfg(test)]
mod tests {
    use embassy_futures::block_on;

    use super::*;
    use crate::testing::{RecordingDelay, SensorSim};

    #[test]
    fn test_conversion_bounds() {
        assert_eq!(temperature_centi(0), -4500);
        assert_eq!(humidity_centi(0), 0);
        assert_eq!(temperature_centi(u16::MAX), 13000);
        assert_eq!(humidity_centi(u16::MAX), 10000);
    }

    #[test]
    fn test_conversion_truncates() {
        // 175 * 100 / 65535 = 0.267...
        assert_eq!(temperature_centi(100), -4474);
        assert_eq!(temperature_centi(0x6666), 2500);
        // 125 * 0x8000 / 65535 = 62.5009...
        assert_eq!(humidity_centi(0x8000), 5650);
        // 125 * 0x0c49 / 65535 = 5.998...
        assert_eq!(humidity_centi(0x0c49), 0);
    }

    #[test]
    fn test_measure_bounds() {
        let mut sim = SensorSim::new(Address::SHT4X_A);

        sim.raw = [0, 0];
        let mut sensor = Sht4x::new(&mut sim, RecordingDelay::new(), Address::SHT4X_A);
        let sample = block_on(sensor.measure(Precision::High)).unwrap();
        assert_eq!(
            sample,
            Measurement {
                temperature: -4500,
                humidity: 0,
                valid: true
            }
        );
        drop(sensor);

        sim.raw = [u16::MAX, u16::MAX];
        let mut sensor = Sht4x::new(&mut sim, RecordingDelay::new(), Address::SHT4X_A);
        let sample = block_on(sensor.measure(Precision::High)).unwrap();
        assert_eq!(
            sample,
            Measurement {
                temperature: 13000,
                humidity: 10000,
                valid: true
            }
        );
    }

    #[test]
    fn test_measure_waits_for_precision() {
        for (precision, opcode, settle_us) in [
            (Precision::High, 0xfd, 10_000),
            (Precision::Medium, 0xf6, 5_000),
            (Precision::Low, 0xe0, 2_000),
        ] {
            let mut sim = SensorSim::new(Address::SHT4X_A);
            let mut sensor = Sht4x::new(&mut sim, RecordingDelay::new(), Address::SHT4X_A);
            block_on(sensor.measure(precision)).unwrap();

            let (_, delay) = sensor.release();
            assert_eq!(delay.total_us(), settle_us);
            assert_eq!(sim.commands, [opcode]);
        }
    }

    #[test]
    fn test_checksum_mismatch_is_not_an_error() {
        let mut sim = SensorSim::new(Address::SHT4X_A);
        sim.raw = [0x6666, 0x8000];
        sim.corrupt_next = 1;

        let mut sensor = Sht4x::new(&mut sim, RecordingDelay::new(), Address::SHT4X_A);
        let sample = block_on(sensor.measure(Precision::High)).unwrap();

        assert!(!sample.valid);
        assert_eq!(sample.temperature, 2500);

        let sample = block_on(sensor.measure(Precision::High)).unwrap();
        assert!(sample.valid);
    }

    #[test]
    fn test_read_identity() {
        let mut sim = SensorSim::new(Address::SHT4X_A);
        sim.serial = 0x1234_abcd;

        let mut sensor = Sht4x::new(&mut sim, RecordingDelay::new(), Address::SHT4X_A);
        let identity = block_on(sensor.read_identity()).unwrap();

        assert_eq!(
            identity,
            Identity {
                serial: 0x1234_abcd,
                valid: true
            }
        );
        let (_, delay) = sensor.release();
        assert_eq!(delay.total_us(), 1_000);
    }

    #[test]
    fn test_absent_device() {
        let mut sim = SensorSim::new(Address::SHT4X_B);

        let mut sensor = Sht4x::new(&mut sim, RecordingDelay::new(), Address::SHT4X_A);

        assert_eq!(
            block_on(sensor.read_identity()),
            Err(transport::Error::AddressNotAcknowledged)
        );
    }

    #[test]
    fn test_soft_reset_always_settles() {
        let mut sim = SensorSim::new(Address::SHT4X_A);
        sim.present = false;

        let mut sensor = Sht4x::new(&mut sim, RecordingDelay::new(), Address::SHT4X_A);
        block_on(sensor.soft_reset());

        let (_, delay) = sensor.release();
        assert_eq!(delay.total_us(), 10_000);
        assert_eq!(sim.resets, 0);
    }
}
