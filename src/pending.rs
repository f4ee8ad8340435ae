//! Consume-once update slot.
//!
//! Records written from the receive path (modem status, AT responses, GPS
//! fixes, status text) are read exactly once by whoever services them. A
//! `Pending<T>` holds the latest unread value; reading takes it out, so a
//! record can never be acted on twice.

/// Latest unread value of a record, if any
#[derive(Debug, Clone, PartialEq)]
pub struct Pending<T> {
    slot: Option<T>,
}

impl<T> Default for Pending<T> {
    fn default() -> Self {
        Self { slot: None }
    }
}

impl<T> Pending<T> {
    /// Empty slot
    pub const fn new() -> Self {
        Self { slot: None }
    }

    /// Publish a new value, replacing any unread one
    pub fn publish(&mut self, value: T) {
        self.slot = Some(value);
    }

    /// Take the unread value, leaving the slot empty
    pub fn take(&mut self) -> Option<T> {
        self.slot.take()
    }

    #[cfg(test)]
    pub fn is_pending(&self) -> bool {
        self.slot.is_some()
    }
}
