//! # Link Watchdogs
//!
//! Two saturating staleness counters, advanced once per coarse tick and reset
//! by fresh data:
//!
//! - **Link**: reset by every heartbeat from the bound craft. Reaching the
//!   threshold means the craft link is lost.
//! - **GPS**: reset by every position received while the receiver reports a
//!   valid 3D fix. Reaching the threshold means the fix is lost.
//!
//! Counters clamp one past their threshold and never wrap.
//!
//! ## Usage
//!
//! ```
//! use xbee_beacon::scheduler::watchdog::Watchdog;
//!
//! let mut link = Watchdog::new(3);
//! assert!(!link.tick());
//! assert!(!link.tick());
//! assert!(link.tick()); // expired on this tick
//! assert!(!link.tick()); // already expired
//! assert_eq!(link.count(), 4);
//! ```

use crate::gps::NavStatus;
use tracing::{info, warn};

/// Saturating staleness counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watchdog {
    count: u32,
    threshold: u32,
}

impl Watchdog {
    #[must_use]
    pub fn new(threshold: u32) -> Self {
        Self { count: 0, threshold }
    }

    /// Advance one tick; returns true on the tick that crosses the threshold
    pub fn tick(&mut self) -> bool {
        let was_expired = self.is_expired();
        self.count = self.count.saturating_add(1).min(self.threshold.saturating_add(1));
        !was_expired && self.is_expired()
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn is_expired(&self) -> bool {
        self.count >= self.threshold
    }
}

/// Edges raised by one coarse tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealthEvents {
    pub link_lost: bool,
    pub fix_lost: bool,
}

/// Failure-detector state for the craft link and the local GPS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkHealth {
    pub link: Watchdog,
    pub gps: Watchdog,
    /// Local GPS reports a valid 3D fix
    pub fixed: bool,
}

impl LinkHealth {
    pub fn new(link_threshold: u32, gps_threshold: u32) -> Self {
        Self {
            link: Watchdog::new(link_threshold),
            gps: Watchdog::new(gps_threshold),
            fixed: false,
        }
    }

    /// Advance both watchdogs; an expired GPS watchdog clears the fix
    pub fn coarse_tick(&mut self) -> HealthEvents {
        let events = HealthEvents {
            link_lost: self.link.tick(),
            fix_lost: self.gps.tick(),
        };
        if self.gps.is_expired() {
            self.fixed = false;
        }

        if events.link_lost {
            warn!("Heartbeat lost for {} ticks", self.link.threshold());
        }
        if events.fix_lost {
            warn!("GPS fix lost for {} ticks", self.gps.threshold());
        }
        events
    }

    /// A heartbeat arrived from the bound craft
    pub fn heartbeat(&mut self) {
        self.link.reset();
    }

    /// Apply a fix status record
    pub fn fix_status(&mut self, status: &NavStatus) {
        let fixed = status.is_3d_valid();
        if fixed && !self.fixed {
            info!("GPS 3D fix acquired");
        }
        self.fixed = fixed;
    }

    /// A position arrived; returns true if it counts as fresh fixed data
    pub fn position(&mut self) -> bool {
        if self.fixed {
            self.gps.reset();
        }
        self.fixed
    }

    pub fn link_lost(&self) -> bool {
        self.link.is_expired()
    }

    pub fn fix_lost(&self) -> bool {
        self.gps.is_expired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watchdog_saturates() {
        let threshold = 125;
        let mut watchdog = Watchdog::new(threshold);
        for _ in 0..threshold + 1000 {
            watchdog.tick();
        }
        assert_eq!(watchdog.count(), threshold + 1);
    }

    #[test]
    fn test_watchdog_monotonic_until_reset() {
        let mut watchdog = Watchdog::new(10);
        let mut last = 0;
        for _ in 0..50 {
            watchdog.tick();
            assert!(watchdog.count() >= last);
            last = watchdog.count();
        }
        watchdog.reset();
        assert_eq!(watchdog.count(), 0);
        assert!(!watchdog.is_expired());
    }

    #[test]
    fn test_watchdog_edge_fires_once() {
        let mut watchdog = Watchdog::new(5);
        let edges = (0..20).filter(|_| watchdog.tick()).count();
        assert_eq!(edges, 1);

        watchdog.reset();
        let edges = (0..20).filter(|_| watchdog.tick()).count();
        assert_eq!(edges, 1);
    }

    #[test]
    fn test_watchdog_max_threshold_does_not_overflow() {
        let mut watchdog = Watchdog::new(u32::MAX);
        watchdog.count = u32::MAX - 1;
        assert!(watchdog.tick());
        watchdog.tick();
        assert_eq!(watchdog.count(), u32::MAX);
    }

    #[test]
    fn test_gps_expiry_clears_fix() {
        let mut health = LinkHealth::new(100, 3);
        health.fix_status(&NavStatus { gps_fix: 3, flags: 1 });
        assert!(health.fixed);

        health.coarse_tick();
        health.coarse_tick();
        assert!(health.fixed);
        let events = health.coarse_tick();
        assert!(events.fix_lost);
        assert!(!events.link_lost);
        assert!(!health.fixed);
    }

    #[test]
    fn test_position_resets_only_while_fixed() {
        let mut health = LinkHealth::new(100, 30);
        health.coarse_tick();
        assert!(!health.position());
        assert_eq!(health.gps.count(), 1);

        health.fix_status(&NavStatus { gps_fix: 4, flags: 1 });
        assert!(health.position());
        assert_eq!(health.gps.count(), 0);
    }

    #[test]
    fn test_invalid_status_drops_fix() {
        let mut health = LinkHealth::new(100, 30);
        health.fix_status(&NavStatus { gps_fix: 3, flags: 1 });
        health.fix_status(&NavStatus { gps_fix: 2, flags: 1 });
        assert!(!health.fixed);
    }

    #[test]
    fn test_heartbeat_resets_link() {
        let mut health = LinkHealth::new(2, 100);
        health.coarse_tick();
        assert!(health.coarse_tick().link_lost);
        assert!(health.link_lost());

        health.heartbeat();
        assert!(!health.link_lost());
    }
}
