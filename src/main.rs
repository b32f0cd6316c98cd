// main.rs
// Greenhouse node: ESP32 + DHT11 + MQ-4 + MQ-135, one signed TCP packet per wake.
//
// Duty cycle:
//   power sensors -> Wi-Fi + SNTP -> read (retry) -> sign -> send (retry)
//   -> power sensors off -> deep sleep
//
// Notes:
// - The DHT11 line is bit-banged with busy-wait timing (esp_timer).
// - Every failure ends the cycle early; the node still goes back to sleep.
// - Build with `--features calibrate` to log the clean-air R0 of both gas
//   sensors instead of sending telemetry.

#[cfg(target_os = "espidf")]
mod adc;
#[cfg(target_os = "espidf")]
mod board;
#[cfg(target_os = "espidf")]
mod nvs;
#[cfg(target_os = "espidf")]
mod sntp;
#[cfg(target_os = "espidf")]
mod wifi;

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    use esp_idf_svc::log::EspLogger;
    use esp_idf_sys as sys;
    use greenhouse_node::config::NodeConfig;
    use log::{error, info, warn};

    sys::link_patches();
    EspLogger::initialize_default();

    let config = NodeConfig::from_env();
    if config.uses_default_key() {
        warn!("GH_HMAC_KEY not set, signing with the default key");
    }

    let (mut board, modem) = board::Board::init()?;
    board.power_on_sensors()?;
    if !config.warm_up.is_zero() {
        info!("Warming up sensors for {}s", config.warm_up.as_secs());
        std::thread::sleep(config.warm_up);
    }

    if let Err(err) = firmware::run(&config, &mut board, modem) {
        error!("Cycle aborted: {err:#}");
    }

    board.power_off_sensors();
    board::deep_sleep(config.deep_sleep)
}

#[cfg(target_os = "espidf")]
mod firmware {
    use anyhow::Result;
    use esp_idf_hal::delay::FreeRtos;
    use esp_idf_hal::modem::Modem;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use log::info;

    use greenhouse_node::config::NodeConfig;
    use greenhouse_node::cycle::{unix_now, MeasurementCycle, TcpUplink};
    use greenhouse_node::dht::{SensorModel, SingleWireSensor};
    use greenhouse_node::gas::{AnalogSource, GasChannel, GasEstimator};
    use greenhouse_node::link::Link;

    use crate::board::{Board, EspClock};
    use crate::nvs::NvsSequence;
    use crate::{sntp, wifi};

    pub fn run(config: &NodeConfig, board: &mut Board, modem: Modem) -> Result<()> {
        let Board { dht, adc, .. } = board;
        let mut estimator = GasEstimator::new(adc);

        if cfg!(feature = "calibrate") {
            return calibrate(&mut estimator);
        }

        let sys_loop = EspSystemEventLoop::take()?;
        let nvs = EspDefaultNvsPartition::take()?;

        let link = Link::new();
        let _wifi = wifi::start(modem, sys_loop, nvs.clone(), config, link.clone())?;
        link.await_connected(config.wifi_timeout)?;
        let _sntp = sntp::sync(config.sntp_timeout)?;

        let mut sequence = NvsSequence::open(nvs)?;
        let mut sensor = SingleWireSensor::new(dht, EspClock, FreeRtos, SensorModel::Dht11)?;
        let mut uplink = TcpUplink::new(config.collector_host, config.collector_port, config.connect_timeout);
        let mut cycle = MeasurementCycle::new(config.policy, FreeRtos, config.hmac_key);

        let frame = cycle.run(|| sensor.read(), &mut estimator, &mut sequence, unix_now, &mut uplink)?;
        info!("Cycle complete: seq={}", frame.sequence);
        Ok(())
    }

    fn calibrate<A: AnalogSource>(estimator: &mut GasEstimator<A>) -> Result<()> {
        let mut delay = FreeRtos;
        for channel in GasChannel::ALL {
            let cal = channel.calibration();
            let r0 = estimator.estimate_baseline(channel, cal.load_resistance, &mut delay)?;
            info!(
                "{channel}: R0 estimate {r0:.0} ohm (configured {:.0})",
                cal.baseline_resistance
            );
        }
        Ok(())
    }
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    eprintln!(
        "greenhouse-node is firmware for ESP-IDF targets; build with e.g. --target xtensa-esp32-espidf. \
         The protocol core is exercised on the host through `cargo test`."
    );
}
