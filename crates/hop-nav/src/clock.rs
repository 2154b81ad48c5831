//! Session clock
//!
//! Timestamps are milliseconds; tests drive a [`ManualClock`].

use std::cell::Cell;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use smol::Timer;

pub trait Clock {
    fn now_ms(&self) -> u64;

    /// Timer firing after `ms` on this clock
    fn sleep(&self, ms: u64) -> Timer;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    fn sleep(&self, ms: u64) -> Timer {
        Timer::after(Duration::from_millis(ms))
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<u64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Cell::new(start_ms),
        }
    }

    pub fn set(&self, ms: u64) {
        self.now.set(ms);
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }

    /// Jumps the clock forward and fires on the next poll
    fn sleep(&self, ms: u64) -> Timer {
        self.advance(ms);
        Timer::after(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_sleep_advances() {
        let clock = ManualClock::new(100);
        smol::block_on(clock.sleep(50));
        assert_eq!(clock.now_ms(), 150);
    }

    #[test]
    fn test_system_clock_moves() {
        let clock = SystemClock;
        let start = clock.now_ms();
        smol::block_on(clock.sleep(5));
        assert!(clock.now_ms() >= start);
    }
}
