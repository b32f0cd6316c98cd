use std::sync::Arc;

use anyhow::Result;
use esp_idf_hal::adc::attenuation::DB_11;
use esp_idf_hal::adc::oneshot::config::AdcChannelConfig;
use esp_idf_hal::adc::oneshot::{AdcChannelDriver, AdcDriver};
use esp_idf_hal::adc::ADC1;
use esp_idf_hal::gpio::{Gpio34, Gpio35};
use esp_idf_hal::peripheral::Peripheral;

use greenhouse_node::gas::{AnalogSource, GasChannel, GasError};

type SharedAdc<'d> = Arc<AdcDriver<'d, ADC1>>;

/// ADC1 with one channel per gas sensor. Owned by the estimator.
pub struct GasAdc<'d> {
    methane: AdcChannelDriver<'d, Gpio34, SharedAdc<'d>>,
    co2: AdcChannelDriver<'d, Gpio35, SharedAdc<'d>>,
}

impl<'d> GasAdc<'d> {
    pub fn new(
        adc: impl Peripheral<P = ADC1> + 'd,
        methane_pin: impl Peripheral<P = Gpio34> + 'd,
        co2_pin: impl Peripheral<P = Gpio35> + 'd,
    ) -> Result<Self> {
        let adc = Arc::new(AdcDriver::new(adc)?);
        // 11dB attenuation covers the full 0..3.3V midpoint range.
        let config = AdcChannelConfig {
            attenuation: DB_11,
            ..Default::default()
        };
        let methane = AdcChannelDriver::new(adc.clone(), methane_pin, &config)?;
        let co2 = AdcChannelDriver::new(adc, co2_pin, &config)?;
        Ok(Self { methane, co2 })
    }
}

impl AnalogSource for GasAdc<'_> {
    fn read_raw(&mut self, channel: GasChannel) -> Result<u16, GasError> {
        let raw = match channel {
            GasChannel::Methane => self.methane.read_raw(),
            GasChannel::CarbonDioxide => self.co2.read_raw(),
        };
        raw.map_err(|err| GasError::Adc {
            channel,
            reason: err.to_string(),
        })
    }
}
