//! MQ-series gas concentration estimation.
//!
//! Each sensor sits in a voltage divider with a load resistor. The ADC samples
//! the divider midpoint through a 1:2 divider, so the sensor output voltage is
//! twice the measured one. Concentration follows a log-log calibration curve
//! against the clean-air resistance R0.

use core::fmt;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use log::{debug, info};

/// Full-scale value of the 12-bit ADC.
pub const ADC_MAX: u16 = 4095;
const ADC_RESOLUTION: f32 = 4095.0;

/// ADC reference voltage.
pub const V_REF: f32 = 3.3;
/// Heater/divider supply voltage.
pub const V_SUPPLY: f32 = 5.0;

pub const BASELINE_SAMPLES: u32 = 50;
pub const BASELINE_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GasChannel {
    /// MQ-4
    Methane,
    /// MQ-135
    CarbonDioxide,
}

impl GasChannel {
    pub const ALL: [GasChannel; 2] = [GasChannel::Methane, GasChannel::CarbonDioxide];

    pub const fn calibration(self) -> GasCalibration {
        match self {
            GasChannel::Methane => MQ4,
            GasChannel::CarbonDioxide => MQ135,
        }
    }
}

impl fmt::Display for GasChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GasChannel::Methane => f.write_str("CH4"),
            GasChannel::CarbonDioxide => f.write_str("CO2"),
        }
    }
}

/// Offline-determined constants for one sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasCalibration {
    /// R_L, ohms.
    pub load_resistance: f32,
    /// R0 in clean air, ohms.
    pub baseline_resistance: f32,
    pub slope: f32,
    pub intercept: f32,
}

pub const MQ4: GasCalibration = GasCalibration {
    load_resistance: 20_000.0,
    baseline_resistance: 61_000.0,
    slope: -4.51,
    intercept: 3.0,
};

pub const MQ135: GasCalibration = GasCalibration {
    load_resistance: 20_000.0,
    baseline_resistance: 80_000.0,
    slope: -2.1,
    intercept: 2.0,
};

/// One conversion result. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    pub channel: GasChannel,
    pub value: u16,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GasError {
    #[error("ADC read failed on {channel} channel: {reason}")]
    Adc { channel: GasChannel, reason: String },
    #[error("raw sample {0} exceeds the 12-bit ADC range")]
    SampleOutOfRange(u16),
    #[error("zero voltage sample, sensor resistance is undefined")]
    ZeroSample,
    #[error("resistance ratio {0} is not positive, log10 undefined")]
    NonPositiveRatio(f32),
    #[error("concentration {0} ppm is not finite")]
    OutOfRange(f32),
}

/// Source of raw 12-bit conversions, one per channel.
pub trait AnalogSource {
    fn read_raw(&mut self, channel: GasChannel) -> Result<u16, GasError>;
}

impl<T: AnalogSource + ?Sized> AnalogSource for &mut T {
    fn read_raw(&mut self, channel: GasChannel) -> Result<u16, GasError> {
        (**self).read_raw(channel)
    }
}

pub fn voltage_from_raw(raw: u16, v_ref: f32) -> Result<f32, GasError> {
    if raw > ADC_MAX {
        return Err(GasError::SampleOutOfRange(raw));
    }
    Ok(f32::from(raw) / ADC_RESOLUTION * v_ref)
}

/// Invert the divider: `R_s = R_L * (V_supply - 2V) / 2V`.
pub fn resistance_from_voltage(v_measured: f32, v_supply: f32, r_load: f32) -> Result<f32, GasError> {
    let v_out = 2.0 * v_measured;
    if v_out == 0.0 || !v_out.is_finite() {
        return Err(GasError::ZeroSample);
    }
    Ok(r_load * ((v_supply - v_out) / v_out))
}

/// `ppm = 10^(slope * log10(rs / r0) + intercept)`.
pub fn ppm_from_resistance(rs: f32, r0: f32, slope: f32, intercept: f32) -> Result<f32, GasError> {
    let ratio = rs / r0;
    if ratio <= 0.0 || !ratio.is_finite() {
        return Err(GasError::NonPositiveRatio(ratio));
    }
    let log_ppm = slope * ratio.log10() + intercept;
    let ppm = 10f32.powf(log_ppm);
    if !ppm.is_finite() {
        return Err(GasError::OutOfRange(ppm));
    }
    Ok(ppm)
}

/// Converts samples from an owned ADC source into concentrations.
pub struct GasEstimator<A> {
    adc: A,
    v_ref: f32,
    v_supply: f32,
}

impl<A: AnalogSource> GasEstimator<A> {
    pub fn new(adc: A) -> Self {
        Self::with_references(adc, V_REF, V_SUPPLY)
    }

    pub fn with_references(adc: A, v_ref: f32, v_supply: f32) -> Self {
        Self { adc, v_ref, v_supply }
    }

    pub fn sample(&mut self, channel: GasChannel) -> Result<RawSample, GasError> {
        let value = self.adc.read_raw(channel)?;
        Ok(RawSample { channel, value })
    }

    pub fn read_voltage(&mut self, channel: GasChannel) -> Result<f32, GasError> {
        let sample = self.sample(channel)?;
        voltage_from_raw(sample.value, self.v_ref)
    }

    pub fn read_resistance(&mut self, channel: GasChannel, r_load: f32) -> Result<f32, GasError> {
        let volts = self.read_voltage(channel)?;
        resistance_from_voltage(volts, self.v_supply, r_load)
    }

    /// Steady-state single-shot concentration using the channel's calibration.
    pub fn read_ppm(&mut self, channel: GasChannel) -> Result<f32, GasError> {
        let cal = channel.calibration();
        let rs = self.read_resistance(channel, cal.load_resistance)?;
        let ppm = ppm_from_resistance(rs, cal.baseline_resistance, cal.slope, cal.intercept)?;
        debug!("{channel}: rs={rs:.0} ohm, {ppm:.2} ppm");
        Ok(ppm)
    }

    /// Mean sensor resistance over [`BASELINE_SAMPLES`] samples taken
    /// [`BASELINE_INTERVAL`] apart. Blocks for about ten seconds.
    pub fn estimate_baseline<D: DelayNs>(
        &mut self,
        channel: GasChannel,
        r_load: f32,
        delay: &mut D,
    ) -> Result<f32, GasError> {
        let interval_ms = u32::try_from(BASELINE_INTERVAL.as_millis()).unwrap_or(u32::MAX);
        let mut sum = 0.0f32;
        for i in 0..BASELINE_SAMPLES {
            if i > 0 {
                delay.delay_ms(interval_ms);
            }
            sum += self.read_resistance(channel, r_load)?;
        }
        let baseline = sum / BASELINE_SAMPLES as f32;
        info!("{channel}: baseline resistance {baseline:.0} ohm over {BASELINE_SAMPLES} samples");
        Ok(baseline)
    }

    pub fn into_inner(self) -> A {
        self.adc
    }
}
