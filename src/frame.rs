//! Fixed-layout telemetry record.
//!
//! Wire format (32 bytes, little-endian, no padding):
//! ```text
//! ┌───────┬─────┬─────┬──────────┬──────┬──────────┬─────────┬─────────┬───────────┐
//! │ magic │ ver │ rsv │ sequence │ temp │ humidity │ CH4 ppm │ CO2 ppm │ timestamp │
//! │ u16   │ u8  │ u8  │ u32      │ i32  │ i32      │ f32     │ f32     │ i64       │
//! │ 0     │ 2   │ 3   │ 4        │ 8    │ 12       │ 16      │ 20      │ 24        │
//! └───────┴─────┴─────┴──────────┴──────┴──────────┴─────────┴─────────┴───────────┘
//! ```

use bytes::{Buf, BufMut};

use crate::dht::Reading;

/// "GH"
pub const MAGIC: u16 = 0x4748;
pub const VERSION: u8 = 1;
pub const FRAME_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("frame is {actual} bytes, expected {expected}")]
    Length { expected: usize, actual: usize },
    #[error("invalid frame magic {0:#06x} (expected 0x4748 \"GH\")")]
    InvalidMagic(u16),
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),
    #[error("reserved byte is {0:#04x}, must be zero")]
    NonZeroReserved(u8),
}

/// One measurement. Magic, version and the reserved byte are implied by the
/// encoding and checked on decode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryFrame {
    pub sequence: u32,
    pub temperature: i32,
    pub humidity: i32,
    pub methane_ppm: f32,
    pub co2_ppm: f32,
    /// Unix seconds.
    pub timestamp: i64,
}

impl TelemetryFrame {
    pub fn new(sequence: u32, reading: Reading, methane_ppm: f32, co2_ppm: f32, timestamp: i64) -> Self {
        Self {
            sequence,
            temperature: reading.temperature,
            humidity: reading.humidity,
            methane_ppm,
            co2_ppm,
            timestamp,
        }
    }

    pub fn encode(&self) -> [u8; FRAME_LEN] {
        let mut out = [0u8; FRAME_LEN];
        {
            let mut dst = &mut out[..];
            dst.put_u16_le(MAGIC);
            dst.put_u8(VERSION);
            dst.put_u8(0);
            dst.put_u32_le(self.sequence);
            dst.put_i32_le(self.temperature);
            dst.put_i32_le(self.humidity);
            dst.put_f32_le(self.methane_ppm);
            dst.put_f32_le(self.co2_ppm);
            dst.put_i64_le(self.timestamp);
            debug_assert!(dst.is_empty());
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() != FRAME_LEN {
            return Err(FrameError::Length {
                expected: FRAME_LEN,
                actual: bytes.len(),
            });
        }

        let mut src = bytes;
        let magic = src.get_u16_le();
        if magic != MAGIC {
            return Err(FrameError::InvalidMagic(magic));
        }
        let version = src.get_u8();
        if version != VERSION {
            return Err(FrameError::UnsupportedVersion(version));
        }
        let reserved = src.get_u8();
        if reserved != 0 {
            return Err(FrameError::NonZeroReserved(reserved));
        }

        Ok(Self {
            sequence: src.get_u32_le(),
            temperature: src.get_i32_le(),
            humidity: src.get_i32_le(),
            methane_ppm: src.get_f32_le(),
            co2_ppm: src.get_f32_le(),
            timestamp: src.get_i64_le(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TelemetryFrame {
        TelemetryFrame {
            sequence: 0x0102_0304,
            temperature: -5,
            humidity: 45,
            methane_ppm: 1.5,
            co2_ppm: 400.0,
            timestamp: 1_700_000_001,
        }
    }

    #[test]
    fn field_offsets_match_wire_contract() {
        let bytes = sample().encode();
        assert_eq!(&bytes[0..2], &[0x48, 0x47]);
        assert_eq!(bytes[2], VERSION);
        assert_eq!(bytes[3], 0);
        assert_eq!(&bytes[4..8], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&bytes[8..12], &(-5i32).to_le_bytes());
        assert_eq!(&bytes[12..16], &45i32.to_le_bytes());
        assert_eq!(&bytes[16..20], &1.5f32.to_le_bytes());
        assert_eq!(&bytes[20..24], &400.0f32.to_le_bytes());
        assert_eq!(&bytes[24..32], &1_700_000_001i64.to_le_bytes());
    }

    #[test]
    fn decode_inverts_encode() {
        let frame = sample();
        assert_eq!(TelemetryFrame::decode(&frame.encode()).unwrap(), frame);
    }

    #[test]
    fn extreme_field_values_survive_decode() {
        let subnormal = f32::from_bits(1);
        let frames = [
            TelemetryFrame {
                sequence: u32::MAX,
                temperature: i32::MIN,
                humidity: i32::MAX,
                methane_ppm: f32::MAX,
                co2_ppm: subnormal,
                timestamp: -1,
            },
            TelemetryFrame {
                sequence: 0,
                temperature: i32::MAX,
                humidity: i32::MIN,
                methane_ppm: subnormal,
                co2_ppm: f32::MAX,
                timestamp: i64::MIN,
            },
            TelemetryFrame {
                sequence: 1,
                temperature: 0,
                humidity: 0,
                methane_ppm: 0.0,
                co2_ppm: f32::MIN_POSITIVE,
                timestamp: i64::MAX,
            },
        ];
        for frame in frames {
            let decoded = TelemetryFrame::decode(&frame.encode()).unwrap();
            assert_eq!(decoded, frame);
            assert_eq!(decoded.methane_ppm.to_bits(), frame.methane_ppm.to_bits());
            assert_eq!(decoded.co2_ppm.to_bits(), frame.co2_ppm.to_bits());
        }
    }

    #[test]
    fn header_is_checked() {
        let mut bytes = sample().encode();
        bytes[0] = 0x00;
        assert_eq!(TelemetryFrame::decode(&bytes), Err(FrameError::InvalidMagic(0x4700)));

        let mut bytes = sample().encode();
        bytes[2] = 2;
        assert_eq!(TelemetryFrame::decode(&bytes), Err(FrameError::UnsupportedVersion(2)));

        let mut bytes = sample().encode();
        bytes[3] = 0xAA;
        assert_eq!(TelemetryFrame::decode(&bytes), Err(FrameError::NonZeroReserved(0xAA)));
    }

    #[test]
    fn wrong_length_is_rejected() {
        let bytes = sample().encode();
        assert_eq!(
            TelemetryFrame::decode(&bytes[..31]),
            Err(FrameError::Length {
                expected: FRAME_LEN,
                actual: 31
            })
        );
    }
}
