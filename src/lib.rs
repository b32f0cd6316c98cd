// lib.rs
// Greenhouse telemetry node: protocol and measurement core.
//
// Everything in here builds on the host. The ESP-IDF glue (Wi-Fi, SNTP, ADC unit,
// NVS, deep sleep) lives next to main.rs and is only compiled for espidf targets.

pub mod auth;
pub mod config;
pub mod cycle;
pub mod dht;
pub mod error;
pub mod frame;
pub mod gas;
pub mod link;
pub mod sequence;
pub mod signal;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
pub mod transport;

pub use error::{Error, Result};
