//! LED and button interface.

use tracing::{debug, trace};

/// Indicator LEDs on the beacon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Led {
    /// Lit during startup
    Power,
    /// Flashes to acknowledge operator actions and pairing
    Status,
}

/// LED outputs and the program button input
pub trait Indicators {
    fn led_on(&mut self, led: Led);

    fn led_off(&mut self, led: Led);

    fn led_toggle(&mut self, led: Led);

    /// Raw button line level; the button pulls the line low when pressed
    fn button_level(&mut self) -> bool;
}

/// Host stand-in: LED changes go to the log, the button is never pressed
#[derive(Debug, Default)]
pub struct LogIndicators {
    status_on: bool,
    power_on: bool,
}

impl LogIndicators {
    pub fn new() -> Self {
        Self::default()
    }

    fn state_mut(&mut self, led: Led) -> &mut bool {
        match led {
            Led::Power => &mut self.power_on,
            Led::Status => &mut self.status_on,
        }
    }

    pub fn is_on(&self, led: Led) -> bool {
        match led {
            Led::Power => self.power_on,
            Led::Status => self.status_on,
        }
    }
}

impl Indicators for LogIndicators {
    fn led_on(&mut self, led: Led) {
        *self.state_mut(led) = true;
        debug!("{:?} LED on", led);
    }

    fn led_off(&mut self, led: Led) {
        *self.state_mut(led) = false;
        debug!("{:?} LED off", led);
    }

    fn led_toggle(&mut self, led: Led) {
        let state = self.state_mut(led);
        *state = !*state;
        trace!("{:?} LED toggled", led);
    }

    fn button_level(&mut self) -> bool {
        true
    }
}
