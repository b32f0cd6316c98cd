//! Simulated clock and single-wire line for host tests and bench runs.
//!
//! Time only moves when somebody looks at it: every `now_us()` call advances the
//! shared clock by one microsecond, and delays advance it by their full length.
//! The line replays a scripted list of `(duration_us, level)` segments measured
//! from the moment the host releases it.

use std::cell::Cell;
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

use crate::signal::{Level, MicrosClock};

#[derive(Debug, Clone, Default)]
pub struct SimClock {
    now: Rc<Cell<u64>>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elapsed_us(&self) -> u64 {
        self.now.get()
    }

    pub fn advance_us(&self, us: u64) {
        self.now.set(self.now.get().saturating_add(us));
    }
}

impl MicrosClock for SimClock {
    fn now_us(&mut self) -> u64 {
        self.advance_us(1);
        self.now.get()
    }
}

impl DelayNs for SimClock {
    fn delay_ns(&mut self, ns: u32) {
        self.advance_us(u64::from(ns).div_ceil(1_000));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.advance_us(u64::from(ms) * 1_000);
    }
}

#[derive(Debug)]
pub struct SimLine {
    now: Rc<Cell<u64>>,
    driven_low: bool,
    released_at: Option<u64>,
    segments: Vec<(u32, Level)>,
    idle: Level,
}

impl SimLine {
    /// Line that plays `segments` after release, then idles high (pull-up).
    pub fn scripted(clock: &SimClock, segments: Vec<(u32, Level)>) -> Self {
        Self {
            now: clock.now.clone(),
            driven_low: false,
            released_at: None,
            segments,
            idle: Level::High,
        }
    }

    /// Line that never changes level on its own.
    pub fn stuck(clock: &SimClock, level: Level) -> Self {
        Self {
            idle: level,
            ..Self::scripted(clock, Vec::new())
        }
    }

    /// A DHT-class sensor answering a start signal with `bytes`.
    ///
    /// Bit zero is a 27us high pulse, bit one 70us, each preceded by 50us low.
    pub fn dht_response(clock: &SimClock, bytes: [u8; 5]) -> Self {
        let mut segments = vec![(40, Level::High), (80, Level::Low), (80, Level::High)];
        for byte in bytes {
            for bit in (0..8).rev() {
                let high_us = if (byte >> bit) & 1 == 1 { 70 } else { 27 };
                segments.push((50, Level::Low));
                segments.push((high_us, Level::High));
            }
        }
        segments.push((50, Level::Low));
        Self::scripted(clock, segments)
    }

    /// Let go of the line as the host does after the start signal.
    pub fn release(&mut self) {
        self.driven_low = false;
        self.released_at = Some(self.now.get());
    }

    fn level(&self) -> Level {
        if self.driven_low {
            return Level::Low;
        }
        let Some(released_at) = self.released_at else {
            return self.idle;
        };
        let offset = self.now.get().saturating_sub(released_at);
        let mut end = 0u64;
        for &(duration, level) in &self.segments {
            end += u64::from(duration);
            if offset < end {
                return level;
            }
        }
        self.idle
    }
}

impl ErrorType for SimLine {
    type Error = Infallible;
}

impl InputPin for SimLine {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.level().is_high())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.level().is_high())
    }
}

impl OutputPin for SimLine {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.driven_low = true;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.release();
        Ok(())
    }
}
