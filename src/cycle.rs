//! One wake-up worth of work: read, estimate, sign, deliver.
//!
//! Failures never escape the cycle as panics. Sensor and network steps are
//! retried a fixed number of times with a fixed delay; once the attempts are
//! used up the measurement is dropped, not queued.

use core::fmt::Display;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use embedded_hal::delay::DelayNs;
use log::{error, info, warn};

use crate::auth::build_authenticated_frame;
use crate::dht::{Reading, SensorError};
use crate::error::Result;
use crate::frame::TelemetryFrame;
use crate::gas::{AnalogSource, GasChannel, GasEstimator};
use crate::sequence::SequenceStore;
use crate::transport::{connect, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CyclePolicy {
    pub attempts: u32,
    pub retry_delay: Duration,
}

impl Default for CyclePolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            retry_delay: Duration::from_secs(2),
        }
    }
}

/// Run `op` up to `policy.attempts` times, sleeping `policy.retry_delay`
/// between failures. Returns the last error once attempts are exhausted.
pub fn retry<T, E, D>(
    policy: &CyclePolicy,
    delay: &mut D,
    what: &str,
    mut op: impl FnMut() -> core::result::Result<T, E>,
) -> core::result::Result<T, E>
where
    E: Display,
    D: DelayNs,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if attempt < attempts => {
                warn!("{what}: attempt {attempt}/{attempts} failed ({err}), retrying...");
                delay.delay_ms(u32::try_from(policy.retry_delay.as_millis()).unwrap_or(u32::MAX));
                attempt += 1;
            }
            Err(err) => {
                error!("{what}: all {attempts} attempts failed, last error: {err}");
                return Err(err);
            }
        }
    }
}

/// Where signed packets go.
pub trait Uplink {
    fn deliver(&mut self, packet: &[u8]) -> core::result::Result<(), TransportError>;
}

/// Fresh TCP connection per delivery attempt, closed right after the write.
#[derive(Debug, Clone)]
pub struct TcpUplink {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpUplink {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }
}

impl Uplink for TcpUplink {
    fn deliver(&mut self, packet: &[u8]) -> core::result::Result<(), TransportError> {
        let mut conn = connect(&self.host, self.port, self.timeout)?;
        let result = conn.send_all(packet);
        conn.close();
        result
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub reading: Reading,
    pub methane_ppm: f32,
    pub co2_ppm: f32,
}

pub struct MeasurementCycle<'k, D> {
    policy: CyclePolicy,
    delay: D,
    key: &'k [u8],
}

impl<'k, D: DelayNs> MeasurementCycle<'k, D> {
    pub fn new(policy: CyclePolicy, delay: D, key: &'k [u8]) -> Self {
        Self { policy, delay, key }
    }

    /// Read the climate sensor (with retries) and both gas channels.
    pub fn measure<A: AnalogSource>(
        &mut self,
        read_climate: impl FnMut() -> core::result::Result<Reading, SensorError>,
        gas: &mut GasEstimator<A>,
    ) -> Result<Measurement> {
        let reading = retry(&self.policy, &mut self.delay, "Sensor read", read_climate)?;
        let methane_ppm = gas.read_ppm(GasChannel::Methane)?;
        let co2_ppm = gas.read_ppm(GasChannel::CarbonDioxide)?;
        info!(
            "Sensor read: Temp={} Humidity={} CH4={:.2} CO2={:.2}",
            reading.temperature, reading.humidity, methane_ppm, co2_ppm
        );
        Ok(Measurement {
            reading,
            methane_ppm,
            co2_ppm,
        })
    }

    /// Number, sign and deliver one measurement.
    ///
    /// The sequence number is taken before anything goes on the wire, so a
    /// lost packet leaves a gap instead of a reused number.
    pub fn transmit(
        &mut self,
        measurement: &Measurement,
        sequence: &mut impl SequenceStore,
        timestamp: i64,
        uplink: &mut impl Uplink,
    ) -> Result<TelemetryFrame> {
        let seq = sequence.next()?;
        let frame = TelemetryFrame::new(
            seq,
            measurement.reading,
            measurement.methane_ppm,
            measurement.co2_ppm,
            timestamp,
        );
        let packet = build_authenticated_frame(&frame, self.key)?;
        retry(&self.policy, &mut self.delay, "Send", || uplink.deliver(&packet))?;
        info!("Data sent: seq={seq} ts={timestamp}");
        Ok(frame)
    }

    pub fn run<A: AnalogSource>(
        &mut self,
        read_climate: impl FnMut() -> core::result::Result<Reading, SensorError>,
        gas: &mut GasEstimator<A>,
        sequence: &mut impl SequenceStore,
        clock: impl FnOnce() -> i64,
        uplink: &mut impl Uplink,
    ) -> Result<TelemetryFrame> {
        let measurement = self.measure(read_climate, gas)?;
        self.transmit(&measurement, sequence, clock(), uplink)
    }
}

/// Wall-clock Unix seconds; zero if the clock was never set.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
