//! Debounced edit buffer.
//!
//! Text fields edit a local copy. The copy is handed back to the canonical sheet only once the
//! user pauses for the debounce interval or leaves the field, and a canonical refresh never
//! overwrites a value the user is still typing.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct EditBuffer<T> {
    value: T,
    debounce: Duration,
    dirty_since: Option<Instant>,
    focused: bool,
}

impl<T: Clone + PartialEq> EditBuffer<T> {
    pub fn new(value: T, debounce: Duration) -> Self {
        EditBuffer {
            value,
            debounce,
            dirty_since: None,
            focused: false,
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty_since.is_some()
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn set(&mut self, value: T, now: Instant) {
        if value != self.value {
            self.value = value;
            self.dirty_since = Some(now);
        }
    }

    pub fn edit(&mut self, now: Instant, f: impl FnOnce(&mut T)) {
        let mut next = self.value.clone();
        f(&mut next);
        self.set(next, now);
    }

    pub fn focus(&mut self) {
        self.focused = true;
    }

    /// Leaving the field flushes immediately.
    pub fn blur(&mut self) -> Option<T> {
        self.focused = false;
        self.flush_now()
    }

    pub fn poll_flush(&mut self, now: Instant) -> Option<T> {
        match self.dirty_since {
            Some(since) if now.saturating_duration_since(since) >= self.debounce => self.flush_now(),
            _ => None,
        }
    }

    pub fn flush_now(&mut self) -> Option<T> {
        self.dirty_since.take().map(|_| self.value.clone())
    }

    /// Returns false when the canonical value was ignored.
    pub fn sync_from(&mut self, canonical: &T) -> bool {
        if self.focused || self.is_dirty() {
            return false;
        }
        if self.value != *canonical {
            self.value = canonical.clone();
        }
        true
    }
}
