//! # Scheduler
//!
//! Time base and periodic cadences. Two tick sources drive the beacon:
//!
//! - **Fine tick** (1 ms): advances the clock, samples the button and runs
//!   the status LED flash countdown
//! - **Coarse tick** (`message_loop_hz`): advances the watchdogs, emits the
//!   heartbeat, steps the parameter transmitter and fetches GPS data
//!
//! Every step is bounded and never blocks. Steps never overlap; the host
//! runner calls them one at a time from a single task.

pub mod button;
pub mod watchdog;

pub use button::{ButtonMonitor, ButtonTick, ButtonTiming, Flasher, OperatorAction};
pub use watchdog::{HealthEvents, LinkHealth, Watchdog};

/// Millisecond and microsecond time base advanced by the fine tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Clock {
    sys_ms: u64,
    sys_us: u64,
}

impl Clock {
    pub fn fine_tick(&mut self) {
        self.sys_ms += 1;
        self.sys_us += 1000;
    }

    pub fn sys_ms(&self) -> u64 {
        self.sys_ms
    }

    pub fn sys_us(&self) -> u64 {
        self.sys_us
    }
}

/// Work due on one coarse tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoarseDue {
    pub heartbeat: bool,
    pub gps_fetch: bool,
}

/// Coarse-tick cadence counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoarseSchedule {
    heartbeat_every: u32,
    gps_fetch_every: u32,
    heartbeat_counter: u32,
    gps_fetch_counter: u32,
}

impl CoarseSchedule {
    /// Heartbeat every `heartbeat_every` ticks; GPS fetch once the counter
    /// exceeds `gps_fetch_every`
    pub fn new(heartbeat_every: u32, gps_fetch_every: u32) -> Self {
        Self {
            heartbeat_every,
            gps_fetch_every,
            heartbeat_counter: 0,
            gps_fetch_counter: 0,
        }
    }

    pub fn tick(&mut self) -> CoarseDue {
        let mut due = CoarseDue::default();

        self.heartbeat_counter += 1;
        if self.heartbeat_counter >= self.heartbeat_every {
            self.heartbeat_counter = 0;
            due.heartbeat = true;
        }

        self.gps_fetch_counter += 1;
        if self.gps_fetch_counter > self.gps_fetch_every {
            self.gps_fetch_counter = 0;
            due.gps_fetch = true;
        }

        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advances_both_bases() {
        let mut clock = Clock::default();
        for _ in 0..250 {
            clock.fine_tick();
        }
        assert_eq!(clock.sys_ms(), 250);
        assert_eq!(clock.sys_us(), 250_000);
    }

    #[test]
    fn test_heartbeat_once_per_second() {
        let mut schedule = CoarseSchedule::new(25, 2);
        let beats: Vec<usize> = (1..=75)
            .filter(|_| schedule.tick().heartbeat)
            .collect();
        assert_eq!(beats, vec![25, 50, 75]);
    }

    #[test]
    fn test_gps_fetch_cadence() {
        let mut schedule = CoarseSchedule::new(25, 2);
        let fetches: Vec<usize> = (1..=9).filter(|_| schedule.tick().gps_fetch).collect();
        // counter must exceed 2, so every third tick
        assert_eq!(fetches, vec![3, 6, 9]);
    }
}
