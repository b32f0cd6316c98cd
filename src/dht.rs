//! DHT11/DHT22 single-wire temperature and humidity sensor.
//!
//! The data line needs a pull-up (internal or external ~4.7k). The host drives
//! it low for the start signal and releases it; the sensor then answers with a
//! low/high preamble and 40 pulse-width encoded bits.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{Error as _, ErrorKind, InputPin, OutputPin};
use log::debug;

use crate::signal::{Level, MicrosClock, SignalError, SignalTimer};

const START_LOW_MS: u32 = 20;
const START_RELEASE_US: u32 = 30;
const RESPONSE_TIMEOUT_US: u32 = 100;
const BIT_TIMEOUT_US: u32 = 100;
// High pulse ~26-28us => 0, ~70us => 1.
const ONE_THRESHOLD_US: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensorModel {
    /// Integer bytes, fractional bytes always zero.
    #[default]
    Dht11,
    /// 16-bit tenths, temperature sign in bit 15.
    Dht22,
}

/// Whole-degree temperature and whole-percent humidity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading {
    pub temperature: i32,
    pub humidity: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SensorError {
    #[error("timed out waiting for {stage}")]
    Timeout { stage: &'static str },
    #[error("checksum mismatch: computed {computed:#04x}, received {received:#04x}")]
    ChecksumMismatch { computed: u8, received: u8 },
    #[error("GPIO error: {0:?}")]
    Pin(ErrorKind),
}

impl SensorError {
    fn at(stage: &'static str, err: SignalError) -> Self {
        match err {
            SignalError::Timeout { .. } => SensorError::Timeout { stage },
            SignalError::Pin(kind) => SensorError::Pin(kind),
        }
    }
}

pub struct SingleWireSensor<P, C, D> {
    pin: P,
    timer: SignalTimer<C>,
    delay: D,
    model: SensorModel,
}

impl<P, C, D> SingleWireSensor<P, C, D>
where
    P: InputPin + OutputPin,
    C: MicrosClock,
    D: DelayNs,
{
    /// `pin` must be open-drain: high releases the line to the pull-up.
    pub fn new(mut pin: P, clock: C, delay: D, model: SensorModel) -> Result<Self, SensorError> {
        pin.set_high().map_err(|e| SensorError::Pin(e.kind()))?;
        Ok(Self {
            pin,
            timer: SignalTimer::new(clock),
            delay,
            model,
        })
    }

    pub fn model(&self) -> SensorModel {
        self.model
    }

    pub fn read(&mut self) -> Result<Reading, SensorError> {
        let frame = self.read_frame()?;
        debug!("{:?} frame: {:02X?}", self.model, frame);
        decode(self.model, frame)
    }

    fn read_frame(&mut self) -> Result<[u8; 5], SensorError> {
        self.start_signal()?;

        // Sensor response: low -> high -> low before data bits.
        self.wait(Level::Low, RESPONSE_TIMEOUT_US, "response low")?;
        self.wait(Level::High, RESPONSE_TIMEOUT_US, "response high")?;
        self.wait(Level::Low, RESPONSE_TIMEOUT_US, "data preamble")?;

        let mut data = [0u8; 5];
        for byte in data.iter_mut() {
            let mut value = 0u8;
            for _ in 0..8 {
                self.wait(Level::High, BIT_TIMEOUT_US, "bit high")?;
                let high_len = self.wait(Level::Low, BIT_TIMEOUT_US, "bit low")?;
                value <<= 1;
                if high_len > ONE_THRESHOLD_US {
                    value |= 1;
                }
            }
            *byte = value;
        }
        Ok(data)
    }

    fn start_signal(&mut self) -> Result<(), SensorError> {
        self.pin.set_low().map_err(|e| SensorError::Pin(e.kind()))?;
        self.delay.delay_ms(START_LOW_MS);
        self.pin.set_high().map_err(|e| SensorError::Pin(e.kind()))?;
        self.timer.busy_wait_us(START_RELEASE_US);
        Ok(())
    }

    fn wait(&mut self, level: Level, timeout_us: u32, stage: &'static str) -> Result<u32, SensorError> {
        self.timer
            .wait_for_level(&mut self.pin, level, timeout_us)
            .map_err(|e| SensorError::at(stage, e))
    }
}

/// Validate the checksum of a raw 5-byte frame and convert it to whole units.
pub fn decode(model: SensorModel, data: [u8; 5]) -> Result<Reading, SensorError> {
    // Checksum is the low byte of the sum of the first 4 data bytes.
    let computed = data[..4].iter().fold(0u8, |sum, b| sum.wrapping_add(*b));
    if computed != data[4] {
        return Err(SensorError::ChecksumMismatch {
            computed,
            received: data[4],
        });
    }

    let reading = match model {
        SensorModel::Dht11 => Reading {
            humidity: i32::from(data[0]),
            temperature: i32::from(data[2]),
        },
        SensorModel::Dht22 => {
            let raw_humidity = u16::from_be_bytes([data[0], data[1]]);
            let raw_temp = u16::from_be_bytes([data[2], data[3]]);
            let mut temperature = f32::from(raw_temp & 0x7FFF) / 10.0;
            if raw_temp & 0x8000 != 0 {
                temperature = -temperature;
            }
            Reading {
                humidity: (f32::from(raw_humidity) / 10.0).round() as i32,
                temperature: temperature.round() as i32,
            }
        }
    };
    Ok(reading)
}
