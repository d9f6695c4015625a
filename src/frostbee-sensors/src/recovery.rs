//! Bounded retries around the [`Sht4x`] protocol client.
//!
//! The sensor bus can get stuck: a device interrupted mid-transfer may keep holding the data
//! line, or stop answering until it is reset.
//! [`Recovering`] turns transport errors and checksum mismatches into a bounded decision: the
//! request is retried, with a soft reset and an extra settle delay before each retry, until
//! either it succeeds or the [`RetryPolicy`] is exhausted.

use embassy_time::Duration;
use embedded_hal_async::delay::DelayNs;

use crate::{
    sht4x::{Identity, Measurement, Precision, Sht4x},
    transport::{self, Transport},
};

/// How requests are retried.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u8,
    /// Settle delay between a failed attempt and the next one, on top of the reset delay.
    pub recovery_delay: Duration,
    /// Whether to soft reset the device before every attempt but the first.
    pub reset_before_retry: bool,
}

impl RetryPolicy {
    /// The policy of the measurement path.
    pub const RECOVERY: Self = Self {
        max_attempts: 3,
        recovery_delay: Duration::from_millis(50),
        reset_before_retry: true,
    };
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::RECOVERY
    }
}

/// Why a single attempt failed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Failure {
    /// The exchange failed.
    Transport(transport::Error),
    /// The response did not pass its checksum.
    ChecksumMismatch,
}

impl From<transport::Error> for Failure {
    fn from(err: transport::Error) -> Self {
        Self::Transport(err)
    }
}

impl core::fmt::Display for Failure {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Transport(err) => write!(f, "{err}"),
            Self::ChecksumMismatch => write!(f, "checksum mismatch"),
        }
    }
}

impl core::error::Error for Failure {}

/// Every attempt failed.
///
/// This is not fatal: the next scheduled cycle tries again.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MeasurementUnavailable {
    /// Number of attempts made.
    pub attempts: u8,
    /// Reason the last attempt failed.
    pub last: Failure,
}

impl core::fmt::Display for MeasurementUnavailable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "measurement unavailable after {} attempts: {}",
            self.attempts, self.last
        )
    }
}

impl core::error::Error for MeasurementUnavailable {}

/// A request that can be attempted several times.
trait Attempt: Sized {
    type Args: Copy;

    async fn attempt<T: Transport, D: DelayNs>(
        sensor: &mut Sht4x<T, D>,
        args: Self::Args,
    ) -> Result<Self, transport::Error>;

    fn is_valid(&self) -> bool;
}

impl Attempt for Measurement {
    type Args = Precision;

    async fn attempt<T: Transport, D: DelayNs>(
        sensor: &mut Sht4x<T, D>,
        precision: Precision,
    ) -> Result<Self, transport::Error> {
        sensor.measure(precision).await
    }

    fn is_valid(&self) -> bool {
        self.valid
    }
}

impl Attempt for Identity {
    type Args = ();

    async fn attempt<T: Transport, D: DelayNs>(
        sensor: &mut Sht4x<T, D>,
        (): (),
    ) -> Result<Self, transport::Error> {
        sensor.read_identity().await
    }

    fn is_valid(&self) -> bool {
        self.valid
    }
}

/// Protocol client with retries.
pub struct Recovering<T, D> {
    sensor: Sht4x<T, D>,
    policy: RetryPolicy,
}

impl<T: Transport, D: DelayNs> Recovering<T, D> {
    /// Wraps `sensor`.
    pub fn new(sensor: Sht4x<T, D>, policy: RetryPolicy) -> Self {
        Self { sensor, policy }
    }

    /// Returns the wrapped client, for requests that must not be retried.
    pub fn sensor(&mut self) -> &mut Sht4x<T, D> {
        &mut self.sensor
    }

    /// Measures temperature and humidity.
    ///
    /// The returned measurement is always valid.
    ///
    /// # Errors
    ///
    /// Returns [`MeasurementUnavailable`] once every attempt failed.
    pub async fn measure(
        &mut self,
        precision: Precision,
    ) -> Result<Measurement, MeasurementUnavailable> {
        self.run(precision).await
    }

    /// Reads the serial number.
    ///
    /// The returned identity is always valid.
    ///
    /// # Errors
    ///
    /// Returns [`MeasurementUnavailable`] once every attempt failed.
    pub async fn read_identity(&mut self) -> Result<Identity, MeasurementUnavailable> {
        self.run(()).await
    }

    async fn run<A: Attempt>(&mut self, args: A::Args) -> Result<A, MeasurementUnavailable> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last = Failure::ChecksumMismatch;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                if self.policy.reset_before_retry {
                    self.sensor.soft_reset().await;
                }
                self.sensor.wait(self.policy.recovery_delay).await;
            }

            match A::attempt(&mut self.sensor, args).await {
                Ok(output) if output.is_valid() => return Ok(output),
                Ok(_) => last = Failure::ChecksumMismatch,
                Err(err) => last = Failure::Transport(err),
            }
            frostbee_log::warn!("attempt {}/{} failed: {}", attempt, max_attempts, last);
        }

        frostbee_log::error!("giving up after {} attempts", max_attempts);
        Err(MeasurementUnavailable {
            attempts: max_attempts,
            last,
        })
    }
}
