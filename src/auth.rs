//! HMAC-SHA256 signed telemetry packets.
//!
//! A packet is the encoded [`TelemetryFrame`] followed by a 32-byte tag over
//! exactly those bytes, keyed with the pre-shared secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::frame::{FrameError, TelemetryFrame, FRAME_LEN};

type HmacSha256 = Hmac<Sha256>;

pub const TAG_LEN: usize = 32;
pub const PACKET_LEN: usize = FRAME_LEN + TAG_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("shared secret is empty")]
    EmptyKey,
    #[error("HMAC key rejected")]
    InvalidKey,
    #[error("packet is {actual} bytes, expected {expected}")]
    Length { expected: usize, actual: usize },
    #[error("HMAC verification failed")]
    TagMismatch,
    #[error("authenticated frame rejected: {0}")]
    Frame(#[from] FrameError),
}

fn keyed(key: &[u8]) -> Result<HmacSha256, AuthError> {
    if key.is_empty() {
        return Err(AuthError::EmptyKey);
    }
    HmacSha256::new_from_slice(key).map_err(|_| AuthError::InvalidKey)
}

pub fn sign(bytes: &[u8], key: &[u8]) -> Result<[u8; TAG_LEN], AuthError> {
    let mut mac = keyed(key)?;
    mac.update(bytes);
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&mac.finalize().into_bytes());
    Ok(tag)
}

pub fn build_authenticated_frame(frame: &TelemetryFrame, key: &[u8]) -> Result<[u8; PACKET_LEN], AuthError> {
    let body = frame.encode();
    let tag = sign(&body, key)?;
    let mut packet = [0u8; PACKET_LEN];
    packet[..FRAME_LEN].copy_from_slice(&body);
    packet[FRAME_LEN..].copy_from_slice(&tag);
    Ok(packet)
}

/// Check the tag in constant time, then the frame header. Nothing is decoded
/// from a packet whose tag does not match.
pub fn verify(packet: &[u8], key: &[u8]) -> Result<TelemetryFrame, AuthError> {
    if packet.len() != PACKET_LEN {
        return Err(AuthError::Length {
            expected: PACKET_LEN,
            actual: packet.len(),
        });
    }
    let (body, tag) = packet.split_at(FRAME_LEN);

    let mut mac = keyed(key)?;
    mac.update(body);
    mac.verify_slice(tag).map_err(|_| AuthError::TagMismatch)?;

    Ok(TelemetryFrame::decode(body)?)
}
