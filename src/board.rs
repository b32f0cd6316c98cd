use std::time::Duration;

use anyhow::Result;
use esp_idf_hal::gpio::{AnyIOPin, AnyOutputPin, InputOutput, Output, PinDriver, Pull};
use esp_idf_hal::modem::Modem;
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_sys as sys;
use log::info;

use greenhouse_node::signal::MicrosClock;

use crate::adc::GasAdc;

// Pin map (ESP32 DevKit):
// Sensor supply NPN base = GPIO27, DHT11 data = GPIO25,
// MQ-4 = ADC1 channel 6 (GPIO34), MQ-135 = ADC1 channel 7 (GPIO35)
pub const POWER_GPIO: i32 = 27;
pub const DHT_GPIO: i32 = 25;

pub struct Board {
    pub power: PinDriver<'static, AnyOutputPin, Output>,
    pub dht: PinDriver<'static, AnyIOPin, InputOutput>,
    pub adc: GasAdc<'static>,
}

impl Board {
    /// Claim the peripherals. The modem is handed back separately because the
    /// Wi-Fi driver takes it by value.
    pub fn init() -> Result<(Self, Modem)> {
        let Peripherals {
            pins, adc1, modem, ..
        } = Peripherals::take()?;

        let power = PinDriver::output(AnyOutputPin::from(pins.gpio27))?;
        // DHT11 requires open-drain I/O with pull-up; we drive low and release high.
        let mut dht = PinDriver::input_output_od(AnyIOPin::from(pins.gpio25))?;
        dht.set_pull(Pull::Up)?;
        let adc = GasAdc::new(adc1, pins.gpio34, pins.gpio35)?;

        Ok((Self { power, dht, adc }, modem))
    }

    pub fn power_on_sensors(&mut self) -> Result<()> {
        info!("Sensor supply on (GPIO{POWER_GPIO})");
        self.power.set_high()?;
        Ok(())
    }

    pub fn power_off_sensors(&mut self) {
        if let Err(err) = self.power.set_low() {
            log::warn!("Sensor supply off failed: {err}");
        }
    }
}

/// ESP high-resolution timer in microseconds for tight pulse timing.
pub struct EspClock;

impl MicrosClock for EspClock {
    fn now_us(&mut self) -> u64 {
        unsafe { sys::esp_timer_get_time() as u64 }
    }
}

pub fn deep_sleep(duration: Duration) -> ! {
    info!("Entering deep sleep for {} seconds.", duration.as_secs());
    unsafe { sys::esp_deep_sleep(duration.as_micros() as u64) };
    #[allow(unreachable_code)]
    loop {
        std::thread::sleep(Duration::from_secs(1));
    }
}
