//! Program button long-press detection and status LED flashing.
//!
//! The button is sampled every fine tick (1 ms). While held, a press timer
//! counts up; on release the accumulated time is latched and classified.
//! After an action fires, sampling is blanked for a short period so contact
//! bounce cannot retrigger it.

use crate::indicator::{Indicators, Led};
use tracing::info;

/// Status LED half-period while flashing
pub const FLASH_INTERVAL_MS: u64 = 100;

/// One-shot action selected by a long press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorAction {
    /// Open a timed join window for a new craft
    OpenJoin,
    /// Factory reset the radio module
    FactoryReset,
}

/// Press thresholds in fine ticks (milliseconds)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonTiming {
    pub join_press_ms: u32,
    pub reset_press_ms: u32,
    pub blank_ms: u32,
    pub hold_feedback_ms: u32,
}

/// What the button did on one fine tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonTick {
    pub action: Option<OperatorAction>,
    /// Held long enough that the operator should see solid feedback
    pub holding: bool,
}

/// Long-press detector for the program button
#[derive(Debug, Clone)]
pub struct ButtonMonitor {
    timing: ButtonTiming,
    blank: u32,
    held_ms: u32,
    was_held: bool,
    /// Press duration latched on release, not yet classified
    latched_ms: Option<u32>,
}

impl ButtonMonitor {
    /// New monitor, blanked for `blank_ms` so the startup level is ignored
    pub fn new(timing: ButtonTiming) -> Self {
        Self {
            timing,
            blank: timing.blank_ms,
            held_ms: 0,
            was_held: false,
            latched_ms: None,
        }
    }

    /// Sample the raw line level (low = pressed) and classify any release
    pub fn tick(&mut self, level: bool) -> ButtonTick {
        if self.blank > 0 {
            self.blank -= 1;
            return ButtonTick::default();
        }

        let held = !level;
        if held {
            self.held_ms = self.held_ms.saturating_add(1);
        } else {
            if self.was_held {
                self.latched_ms = Some(self.held_ms);
            }
            self.held_ms = 0;
        }
        self.was_held = held;

        let holding = self.held_ms > self.timing.hold_feedback_ms;
        let action = match self.latched_ms.take() {
            Some(ms) if ms > self.timing.reset_press_ms => Some(OperatorAction::FactoryReset),
            Some(ms) if ms > self.timing.join_press_ms => Some(OperatorAction::OpenJoin),
            _ => None,
        };

        if let Some(action) = action {
            info!("Button action {:?}", action);
            self.held_ms = 0;
            self.blank = self.timing.blank_ms;
        }

        ButtonTick { action, holding }
    }

    pub fn is_blanked(&self) -> bool {
        self.blank > 0
    }
}

/// Status LED flash countdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flasher {
    remaining: u32,
}

impl Flasher {
    /// Flash for `toggles` half-periods, replacing any countdown in progress
    pub fn start(&mut self, toggles: u32) {
        self.remaining = toggles;
    }

    pub fn cancel(&mut self) {
        self.remaining = 0;
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Fine tick at time `sys_ms`: toggle on each interval, off when done
    pub fn tick<I: Indicators + ?Sized>(&mut self, sys_ms: u64, leds: &mut I) {
        if sys_ms % FLASH_INTERVAL_MS != 0 || self.remaining == 0 {
            return;
        }
        self.remaining -= 1;
        leds.led_toggle(Led::Status);
        if self.remaining == 0 {
            leds.led_off(Led::Status);
        }
    }
}
