//! Battery sense input.

use core::convert::Infallible;

use embassy_nrf::{
    peripherals,
    saadc::{self, ChannelConfig, Gain, Reference, Resolution, Saadc},
};
use frostbee_sensors::battery::{AnalogInput, BatteryConfig};

/// The SAADC, converting the battery divider output on a single channel.
pub struct SaadcInput {
    saadc: Saadc<'static, 1>,
}

impl SaadcInput {
    /// Sets up and calibrates the SAADC to match `config`.
    pub async fn new(
        saadc: peripherals::SAADC,
        sense: peripherals::P0_31,
        config: &BatteryConfig,
    ) -> Self {
        // Only the default scale is wired; the configuration must agree with it.
        debug_assert_eq!(config.reference_mv, 600);
        debug_assert_eq!(config.gain_inverse, 6);
        debug_assert_eq!(config.resolution_bits, 12);

        let mut adc_config = saadc::Config::default();
        adc_config.resolution = Resolution::_12BIT;

        let mut channel = ChannelConfig::single_ended(sense);
        channel.reference = Reference::INTERNAL;
        channel.gain = Gain::GAIN1_6;

        let saadc = Saadc::new(saadc, crate::Irqs, adc_config, [channel]);
        saadc.calibrate().await;

        Self { saadc }
    }
}

impl AnalogInput for SaadcInput {
    type Error = Infallible;

    async fn read(&mut self) -> Result<u16, Self::Error> {
        let mut buf = [0; 1];
        self.saadc.sample(&mut buf).await;
        let [code] = buf;
        // Single-ended inputs can read slightly below ground.
        Ok(u16::try_from(code).unwrap_or(0))
    }
}
