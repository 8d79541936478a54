//! Cooldown Gate
//!
//! Suppresses repeat narration for the same logical event. A check only
//! commits a new timestamp when it succeeds, so a refused caller can retry
//! later without having consumed the window.

use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Default number of tags remembered before the oldest is evicted
pub const DEFAULT_CAPACITY: usize = 256;

/// Tag -> last permitted instant, bounded by least-recently-permitted eviction
#[derive(Debug)]
pub struct CooldownGate {
    entries: HashMap<String, Instant>,
    capacity: usize,
}

impl Default for CooldownGate {
    fn default() -> Self {
        Self::new()
    }
}

impl CooldownGate {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Returns `true` and records now if `tag` never fired or its window has
    /// elapsed; returns `false` and leaves the table untouched otherwise.
    pub fn may_proceed(&mut self, tag: &str, window: Duration) -> bool {
        let now = Instant::now();

        if let Some(last) = self.entries.get_mut(tag) {
            if now.duration_since(*last) < window {
                debug!(tag, "Cooldown active, suppressing");
                return false;
            }
            *last = now;
            return true;
        }

        if self.entries.len() >= self.capacity {
            self.evict_oldest();
        }
        self.entries.insert(tag.to_string(), now);
        true
    }

    /// Drop every entry last permitted more than `max_age` ago
    pub fn sweep(&mut self, max_age: Duration) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries
            .retain(|_, last| now.duration_since(*last) < max_age);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, last)| **last)
            .map(|(tag, _)| tag.clone());

        if let Some(tag) = oldest {
            debug!(tag = %tag, "Cooldown table full, evicting");
            self.entries.remove(&tag);
        }
    }
}
