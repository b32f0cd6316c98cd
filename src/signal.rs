//! Microsecond timing primitives for pulse-width decoded signals.
//!
//! Both operations spin on the clock and never yield: the pulses measured here
//! are tens of microseconds wide, far below the scheduler tick.

use core::fmt;

use embedded_hal::digital::{Error as _, ErrorKind, InputPin};

/// Monotonic microsecond clock.
pub trait MicrosClock {
    fn now_us(&mut self) -> u64;
}

impl<T: MicrosClock + ?Sized> MicrosClock for &mut T {
    fn now_us(&mut self) -> u64 {
        (**self).now_us()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub fn is_high(self) -> bool {
        matches!(self, Level::High)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Low => f.write_str("low"),
            Level::High => f.write_str("high"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SignalError {
    #[error("line did not go {level} within {timeout_us}us")]
    Timeout { level: Level, timeout_us: u32 },
    #[error("GPIO read failed: {0:?}")]
    Pin(ErrorKind),
}

pub struct SignalTimer<C> {
    clock: C,
}

impl<C: MicrosClock> SignalTimer<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    pub fn now_us(&mut self) -> u64 {
        self.clock.now_us()
    }

    /// Spin for roughly `duration_us` microseconds.
    pub fn busy_wait_us(&mut self, duration_us: u32) {
        let start = self.clock.now_us();
        while self.clock.now_us().saturating_sub(start) < u64::from(duration_us) {
            core::hint::spin_loop();
        }
    }

    /// Poll `pin` until it reads `level`. Returns the microseconds spent waiting.
    pub fn wait_for_level<P: InputPin>(
        &mut self,
        pin: &mut P,
        level: Level,
        timeout_us: u32,
    ) -> Result<u32, SignalError> {
        let start = self.clock.now_us();
        loop {
            let high = pin.is_high().map_err(|e| SignalError::Pin(e.kind()))?;
            let elapsed = self.clock.now_us().saturating_sub(start);
            if high == level.is_high() {
                return Ok(u32::try_from(elapsed).unwrap_or(u32::MAX));
            }
            if elapsed > u64::from(timeout_us) {
                return Err(SignalError::Timeout { level, timeout_us });
            }
        }
    }

    pub fn into_inner(self) -> C {
        self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimClock, SimLine};

    #[test]
    fn busy_wait_spins_for_requested_duration() {
        let clock = SimClock::new();
        let mut timer = SignalTimer::new(clock.clone());
        let before = clock.elapsed_us();
        timer.busy_wait_us(30);
        let spent = clock.elapsed_us() - before;
        assert!((30..=32).contains(&spent), "spent {spent}us");
    }

    #[test]
    fn wait_returns_time_until_level_change() {
        let clock = SimClock::new();
        let mut line = SimLine::scripted(&clock, vec![(40, Level::High), (80, Level::Low)]);
        line.release();
        let mut timer = SignalTimer::new(clock.clone());

        let waited = timer.wait_for_level(&mut line, Level::Low, 100).unwrap();
        assert!((39..=42).contains(&waited), "waited {waited}us");
    }

    #[test]
    fn wait_on_matching_level_returns_immediately() {
        let clock = SimClock::new();
        let mut line = SimLine::stuck(&clock, Level::High);
        let mut timer = SignalTimer::new(clock);
        assert!(timer.wait_for_level(&mut line, Level::High, 10).unwrap() <= 1);
    }

    #[test]
    fn stuck_line_times_out_within_bound() {
        let clock = SimClock::new();
        let mut line = SimLine::stuck(&clock, Level::High);
        let mut timer = SignalTimer::new(clock.clone());

        let before = clock.elapsed_us();
        let err = timer.wait_for_level(&mut line, Level::Low, 100).unwrap_err();
        assert_eq!(
            err,
            SignalError::Timeout {
                level: Level::Low,
                timeout_us: 100
            }
        );
        assert!(clock.elapsed_us() - before <= 105);
    }
}
