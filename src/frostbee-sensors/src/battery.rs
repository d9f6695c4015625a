//! Battery voltage sampling.
//!
//! The battery is measured through a resistive divider that is only powered while a sample is
//! in progress, as it would otherwise drain the battery continuously.
//! A sample is a burst of [`SAMPLE_COUNT`] readings; the lowest and the highest are discarded
//! and the others averaged, which rejects the transients caused by the radio.

use embassy_time::Duration;
use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;

use crate::report::BatteryReport;

/// Number of readings per sample.
pub const SAMPLE_COUNT: usize = 5;

/// A single-channel ADC.
pub trait AnalogInput {
    /// Error type.
    type Error;

    /// Converts the channel, returning the raw code; negative codes are returned as 0.
    async fn read(&mut self) -> Result<u16, Self::Error>;
}

impl<A: AnalogInput + ?Sized> AnalogInput for &mut A {
    type Error = A::Error;

    async fn read(&mut self) -> Result<u16, Self::Error> {
        A::read(self).await
    }
}

/// Scale and range of the battery measurement.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BatteryConfig {
    /// ADC reference voltage, in millivolts.
    pub reference_mv: u32,
    /// Inverse of the ADC input gain (e.g., 6 for a gain of 1/6).
    pub gain_inverse: u32,
    /// ADC resolution, in bits.
    pub resolution_bits: u8,
    /// Battery voltage over divider output voltage, as a fraction.
    pub divider_ratio: (u32, u32),
    /// Voltage reported as 0 %.
    pub empty_mv: u32,
    /// Voltage reported as 100 %.
    pub full_mv: u32,
    /// RC settling time of the divider once powered.
    pub settle: Duration,
    /// Delay between two readings.
    pub spacing: Duration,
}

impl BatteryConfig {
    /// nRF52 SAADC with the internal 0.6 V reference and a 1/6 gain, behind a 1:2 divider, for
    /// a 2xAAA pack.
    pub const DEFAULT: Self = Self {
        reference_mv: 600,
        gain_inverse: 6,
        resolution_bits: 12,
        divider_ratio: (2, 1),
        empty_mv: 2200,
        full_mv: 3000,
        settle: Duration::from_millis(5),
        spacing: Duration::from_micros(50),
    };

    /// Converts an averaged code, in hundredths of a code, to the battery voltage in
    /// millivolts.
    #[must_use]
    pub fn to_millivolts(&self, centi_code: u32) -> u32 {
        let (num, den) = self.divider_ratio;
        let scaled = u64::from(centi_code)
            * u64::from(self.reference_mv)
            * u64::from(self.gain_inverse)
            * u64::from(num);
        let full_scale = 100 * (1u64 << self.resolution_bits) * u64::from(den.max(1));
        u32::try_from(scaled / full_scale).unwrap_or(u32::MAX)
    }

    /// Maps a battery voltage onto `0..=200` half-percents, linearly between
    /// [`empty_mv`](Self::empty_mv) and [`full_mv`](Self::full_mv).
    #[must_use]
    pub fn half_percent(&self, millivolts: u32) -> u8 {
        if millivolts >= self.full_mv {
            200
        } else if millivolts <= self.empty_mv {
            0
        } else {
            // Below 200 as `millivolts < full_mv`.
            ((millivolts - self.empty_mv) * 200 / (self.full_mv - self.empty_mv)) as u8
        }
    }
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Averages the readings, discarding the lowest and the highest.
///
/// The result is in hundredths of a code, rounded half up.
#[must_use]
pub fn middle_mean_centi(mut codes: [u16; SAMPLE_COUNT]) -> u32 {
    codes.sort_unstable();
    let kept = codes.iter().skip(1).take(SAMPLE_COUNT - 2);
    let sum: u32 = kept.clone().map(|code| u32::from(*code)).sum();
    let count = kept.count() as u32;
    (sum * 100 + count / 2) / count
}

/// Result of a battery sample.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BatteryReading {
    /// Battery voltage, in millivolts.
    pub millivolts: u32,
    /// Remaining charge, in half-percents (`0..=200`).
    pub half_percent: u8,
}

impl BatteryReading {
    /// Returns the values in reporting units.
    #[must_use]
    pub fn report(&self) -> BatteryReport {
        BatteryReport {
            voltage: u8::try_from(self.millivolts / 100).unwrap_or(u8::MAX),
            percentage: self.half_percent,
        }
    }
}

/// A battery sampling error.
///
/// The divider is disabled before any error is returned.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<A, P> {
    /// A reading failed.
    Adc(A),
    /// The divider could not be switched.
    Divider(P),
}

impl<A, P> core::fmt::Display for Error<A, P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Adc(_) => write!(f, "battery reading failed"),
            Self::Divider(_) => write!(f, "battery divider could not be switched"),
        }
    }
}

impl<A: core::fmt::Debug, P: core::fmt::Debug> core::error::Error for Error<A, P> {}

/// Samples the battery through a switched divider.
pub struct BatterySampler<A, P, D> {
    adc: A,
    divider: P,
    delay: D,
    config: BatteryConfig,
}

impl<A: AnalogInput, P: OutputPin, D: DelayNs> BatterySampler<A, P, D> {
    /// Creates a sampler, making sure the divider is disabled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Divider`] if the divider cannot be disabled.
    pub fn new(
        adc: A,
        mut divider: P,
        delay: D,
        config: BatteryConfig,
    ) -> Result<Self, Error<A::Error, P::Error>> {
        divider.set_low().map_err(Error::Divider)?;
        Ok(Self {
            adc,
            divider,
            delay,
            config,
        })
    }

    /// Returns the configuration in use.
    pub fn config(&self) -> &BatteryConfig {
        &self.config
    }

    /// Takes a sample.
    ///
    /// # Errors
    ///
    /// Returns an error if a reading fails or if the divider cannot be switched.
    pub async fn sample(&mut self) -> Result<BatteryReading, Error<A::Error, P::Error>> {
        self.divider.set_high().map_err(Error::Divider)?;
        self.delay.delay_us(micros(self.config.settle)).await;

        let readings = self.read_burst().await;
        // Disabled whatever the outcome of the burst.
        let disabled = self.divider.set_low().map_err(Error::Divider);
        let codes = readings.map_err(Error::Adc)?;
        disabled?;

        let centi_code = middle_mean_centi(codes);
        let millivolts = self.config.to_millivolts(centi_code);
        let reading = BatteryReading {
            millivolts,
            half_percent: self.config.half_percent(millivolts),
        };
        frostbee_log::debug!(
            "battery: {} mV, {}/200 (codes {:?})",
            reading.millivolts,
            reading.half_percent,
            codes
        );

        Ok(reading)
    }

    async fn read_burst(&mut self) -> Result<[u16; SAMPLE_COUNT], A::Error> {
        let mut codes = [0; SAMPLE_COUNT];
        for (i, code) in codes.iter_mut().enumerate() {
            if i > 0 {
                self.delay.delay_us(micros(self.config.spacing)).await;
            }
            *code = self.adc.read().await?;
        }
        Ok(codes)
    }
}

fn micros(duration: Duration) -> u32 {
    u32::try_from(duration.as_micros()).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use embassy_futures::block_on;

    use super::*;
    use crate::testing::{AdcFault, FakeAdc, FakePin, Journal, RecordingDelay, Step};

    #[test]
    fn test_outliers_are_rejected() {
        // 10 and 1000 are discarded, (15 + 20 + 30) / 3 = 21.666...
        assert_eq!(middle_mean_centi([10, 20, 30, 1000, 15]), 2167);
        assert_eq!(middle_mean_centi([7, 7, 7, 7, 7]), 700);
        assert_eq!(middle_mean_centi([0, 0, 1, 4095, 4095]), 136_533);
    }

    #[test]
    fn test_to_millivolts() {
        let config = BatteryConfig::DEFAULT;

        assert_eq!(config.to_millivolts(0), 0);
        // Full scale: 0.6 V * 6 * 2.
        assert_eq!(config.to_millivolts(4096_00), 7200);
        assert_eq!(config.to_millivolts(1707_00), 3000);
    }

    #[test]
    fn test_half_percent_is_clamped() {
        let config = BatteryConfig::DEFAULT;

        assert_eq!(config.half_percent(1800), 0);
        assert_eq!(config.half_percent(2200), 0);
        assert_eq!(config.half_percent(2600), 100);
        assert_eq!(config.half_percent(2999), 199);
        assert_eq!(config.half_percent(3000), 200);
        assert_eq!(config.half_percent(3300), 200);
    }

    #[test]
    fn test_report_units() {
        let reading = BatteryReading {
            millivolts: 2987,
            half_percent: 196,
        };
        assert_eq!(
            reading.report(),
            BatteryReport {
                voltage: 29,
                percentage: 196
            }
        );

        let reading = BatteryReading {
            millivolts: 40_000,
            half_percent: 200,
        };
        assert_eq!(reading.report().voltage, u8::MAX);
    }

    #[test]
    fn test_divider_only_powered_during_burst() {
        let journal: Journal = Rc::new(RefCell::new(Vec::new()));
        let adc = FakeAdc::new(&[1707, 1706, 3000, 1708, 12], journal.clone());
        let mut pin = FakePin::new(journal.clone());
        let mut delay = RecordingDelay::new();

        let mut sampler =
            BatterySampler::new(adc, &mut pin, &mut delay, BatteryConfig::DEFAULT).unwrap();
        let reading = block_on(sampler.sample()).unwrap();
        drop(sampler);

        assert_eq!(reading.millivolts, 3000);
        assert_eq!(reading.half_percent, 200);
        assert!(!pin.high);
        assert_eq!(
            *journal.borrow(),
            [
                Step::DividerOff,
                Step::DividerOn,
                Step::Read,
                Step::Read,
                Step::Read,
                Step::Read,
                Step::Read,
                Step::DividerOff,
            ]
        );
        // Settling, then four gaps between five readings.
        assert_eq!(delay.total_us(), 5_000 + 4 * 50);
    }

    #[test]
    fn test_divider_disabled_on_failure() {
        let journal: Journal = Rc::new(RefCell::new(Vec::new()));
        let mut adc = FakeAdc::new(&[1707; 5], journal.clone());
        adc.fail_at = Some(2);
        let mut pin = FakePin::new(journal.clone());

        let mut sampler =
            BatterySampler::new(adc, &mut pin, RecordingDelay::new(), BatteryConfig::DEFAULT)
                .unwrap();
        let res = block_on(sampler.sample());
        drop(sampler);

        assert_eq!(res, Err(Error::Adc(AdcFault)));
        assert!(!pin.high);
        assert_eq!(journal.borrow().last(), Some(&Step::DividerOff));
        assert_eq!(
            journal.borrow().iter().filter(|step| **step == Step::Read).count(),
            3
        );
    }
}
