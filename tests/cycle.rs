use std::io::Read;
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use greenhouse_node::auth::{verify, AuthError, PACKET_LEN};
use greenhouse_node::cycle::{CyclePolicy, MeasurementCycle, TcpUplink, Uplink};
use greenhouse_node::dht::{SensorError, SensorModel, SingleWireSensor};
use greenhouse_node::gas::{AnalogSource, GasChannel, GasError, GasEstimator};
use greenhouse_node::sequence::{MemorySequence, SequenceStore};
use greenhouse_node::signal::Level;
use greenhouse_node::sim::{SimClock, SimLine};
use greenhouse_node::transport::TransportError;
use greenhouse_node::Error;

const KEY: &[u8] = b"greenhouse-test-key";
const NOW: i64 = 1_760_000_000;

struct FixedAdc {
    methane: u16,
    co2: u16,
}

impl AnalogSource for FixedAdc {
    fn read_raw(&mut self, channel: GasChannel) -> Result<u16, GasError> {
        Ok(match channel {
            GasChannel::Methane => self.methane,
            GasChannel::CarbonDioxide => self.co2,
        })
    }
}

/// Records packets; fails the first `failures` deliveries.
#[derive(Default)]
struct RecordingUplink {
    failures: usize,
    attempts: usize,
    packets: Vec<Vec<u8>>,
}

impl Uplink for RecordingUplink {
    fn deliver(&mut self, packet: &[u8]) -> Result<(), TransportError> {
        self.attempts += 1;
        if self.attempts <= self.failures {
            return Err(TransportError::Closed);
        }
        self.packets.push(packet.to_vec());
        Ok(())
    }
}

fn policy() -> CyclePolicy {
    CyclePolicy {
        attempts: 3,
        retry_delay: Duration::from_millis(2000),
    }
}

fn gas() -> GasEstimator<FixedAdc> {
    GasEstimator::new(FixedAdc {
        methane: 2048,
        co2: 1800,
    })
}

fn sensor(clock: &SimClock, line: SimLine) -> SingleWireSensor<SimLine, SimClock, SimClock> {
    SingleWireSensor::new(line, clock.clone(), clock.clone(), SensorModel::Dht11).unwrap()
}

#[test]
fn delivers_signed_reading_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let collector = thread::spawn(move || {
        let (mut sock, _) = listener.accept().unwrap();
        let mut buf = Vec::new();
        sock.read_to_end(&mut buf).unwrap();
        buf
    });

    let clock = SimClock::new();
    let mut dht = sensor(&clock, SimLine::dht_response(&clock, [45, 0, 22, 0, 67]));
    let mut estimator = gas();
    let mut sequence = MemorySequence::starting_at(7);
    let mut uplink = TcpUplink::new("127.0.0.1", port, Duration::from_secs(2));
    let mut cycle = MeasurementCycle::new(policy(), clock.clone(), KEY);

    let sent = cycle
        .run(|| dht.read(), &mut estimator, &mut sequence, || NOW, &mut uplink)
        .unwrap();

    let packet = collector.join().unwrap();
    assert_eq!(packet.len(), PACKET_LEN);
    let frame = verify(&packet, KEY).unwrap();
    assert_eq!(frame, sent);
    assert_eq!(frame.sequence, 7);
    assert_eq!(frame.temperature, 22);
    assert_eq!(frame.humidity, 45);
    assert_eq!(frame.timestamp, NOW);
    assert_eq!(sequence.peek(), 8);

    let mut reference = gas();
    assert_eq!(
        frame.methane_ppm.to_bits(),
        reference.read_ppm(GasChannel::Methane).unwrap().to_bits()
    );
    assert_eq!(
        frame.co2_ppm.to_bits(),
        reference.read_ppm(GasChannel::CarbonDioxide).unwrap().to_bits()
    );
    assert!(matches!(verify(&packet, b"wrong"), Err(AuthError::TagMismatch)));
}

#[test]
fn sensor_failure_skips_transmission() {
    let clock = SimClock::new();
    let mut dht = sensor(&clock, SimLine::stuck(&clock, Level::High));
    let mut reads = 0;
    let mut sequence = MemorySequence::default();
    let mut uplink = RecordingUplink::default();
    let mut cycle = MeasurementCycle::new(policy(), clock.clone(), KEY);

    let err = cycle
        .run(
            || {
                reads += 1;
                dht.read()
            },
            &mut gas(),
            &mut sequence,
            || NOW,
            &mut uplink,
        )
        .unwrap_err();

    assert!(matches!(err, Error::Sensor(SensorError::Timeout { .. })));
    assert_eq!(reads, 3);
    assert_eq!(uplink.attempts, 0);
    assert_eq!(sequence.peek(), 0);
}

#[test]
fn checksum_failure_is_retried_like_timeout() {
    let clock = SimClock::new();
    let mut dht = sensor(&clock, SimLine::dht_response(&clock, [45, 0, 22, 0, 0]));
    let mut uplink = RecordingUplink::default();
    let mut cycle = MeasurementCycle::new(policy(), clock.clone(), KEY);

    let err = cycle
        .run(|| dht.read(), &mut gas(), &mut MemorySequence::default(), || NOW, &mut uplink)
        .unwrap_err();

    assert!(matches!(err, Error::Sensor(SensorError::ChecksumMismatch { .. })));
    assert!(uplink.packets.is_empty());
}

#[test]
fn saturated_gas_sensor_skips_transmission() {
    let clock = SimClock::new();
    let mut dht = sensor(&clock, SimLine::dht_response(&clock, [45, 0, 22, 0, 67]));
    let mut estimator = GasEstimator::new(FixedAdc {
        methane: 4000,
        co2: 1800,
    });
    let mut uplink = RecordingUplink::default();
    let mut cycle = MeasurementCycle::new(policy(), clock.clone(), KEY);

    let err = cycle
        .run(|| dht.read(), &mut estimator, &mut MemorySequence::default(), || NOW, &mut uplink)
        .unwrap_err();

    assert!(matches!(err, Error::Gas(GasError::NonPositiveRatio(_))));
    assert_eq!(uplink.attempts, 0);
}

#[test]
fn transient_send_failures_are_retried() {
    let clock = SimClock::new();
    let mut dht = sensor(&clock, SimLine::dht_response(&clock, [45, 0, 22, 0, 67]));
    let mut uplink = RecordingUplink {
        failures: 2,
        ..Default::default()
    };
    let mut cycle = MeasurementCycle::new(policy(), clock.clone(), KEY);

    let frame = cycle
        .run(|| dht.read(), &mut gas(), &mut MemorySequence::default(), || NOW, &mut uplink)
        .unwrap();

    assert_eq!(uplink.attempts, 3);
    assert_eq!(uplink.packets.len(), 1);
    assert_eq!(verify(&uplink.packets[0], KEY).unwrap(), frame);
}

#[test]
fn exhausted_sends_discard_the_measurement_but_burn_the_number() {
    let clock = SimClock::new();
    let mut dht = sensor(&clock, SimLine::dht_response(&clock, [45, 0, 22, 0, 67]));
    let mut sequence = MemorySequence::starting_at(100);
    let mut uplink = RecordingUplink {
        failures: usize::MAX,
        ..Default::default()
    };
    let mut cycle = MeasurementCycle::new(policy(), clock.clone(), KEY);

    let err = cycle
        .run(|| dht.read(), &mut gas(), &mut sequence, || NOW, &mut uplink)
        .unwrap_err();

    assert!(matches!(err, Error::Transport(TransportError::Closed)));
    assert_eq!(uplink.attempts, 3);
    assert_eq!(sequence.next().unwrap(), 101);
}

#[test]
fn empty_key_ends_cycle_without_sending() {
    let clock = SimClock::new();
    let mut dht = sensor(&clock, SimLine::dht_response(&clock, [45, 0, 22, 0, 67]));
    let mut uplink = RecordingUplink::default();
    let mut cycle = MeasurementCycle::new(policy(), clock.clone(), b"");

    let err = cycle
        .run(|| dht.read(), &mut gas(), &mut MemorySequence::default(), || NOW, &mut uplink)
        .unwrap_err();

    assert!(matches!(err, Error::Auth(AuthError::EmptyKey)));
    assert_eq!(uplink.attempts, 0);
}
