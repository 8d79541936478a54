//! Observability for the narration queue
//!
//! Failures are absorbed by the scheduler, so this is where they surface:
//! a broadcast stream of events, counters and a short ordering log.

use super::queue::RequestId;
use crate::voice::Persona;
use chrono::{DateTime, Local};
use serde::Serialize;

/// Scheduler state; at most one request is ever outside `Idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    Idle,
    Synthesizing,
    Decoding,
    Playing,
}

/// How a request left the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Played to the end; callback fired
    Played,
    /// Synthesis, decode or output failed; callback fired anyway
    Failed,
    /// Stopped while active; callback not fired
    Interrupted,
    /// Flushed by disabling audio or shutdown; callback not fired
    Discarded,
}

impl Outcome {
    pub fn fires_callback(&self) -> bool {
        matches!(self, Outcome::Played | Outcome::Failed)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NarrationEvent {
    Queued {
        id: RequestId,
        persona: Persona,
        priority: i32,
    },
    StateChanged {
        id: RequestId,
        state: PlaybackState,
    },
    Finished {
        id: RequestId,
        outcome: Outcome,
    },
    Failed {
        id: RequestId,
        stage: &'static str,
        error: String,
    },
    VoiceUnavailable {
        persona: Persona,
    },
    Flushed {
        discarded: usize,
    },
    Dropped {
        reason: &'static str,
    },
    Suppressed {
        tag: String,
    },
}

/// One line of the in-memory ordering log
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub id: RequestId,
    pub at: DateTime<Local>,
    pub text: String,
    pub persona: Persona,
    pub priority: i32,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NarratorStats {
    pub queued: u64,
    pub played: u64,
    pub failed: u64,
    pub interrupted: u64,
    pub discarded: u64,
    pub dropped: u64,
    pub suppressed: u64,
}

impl NarratorStats {
    pub(crate) fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Played => self.played += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::Interrupted => self.interrupted += 1,
            Outcome::Discarded => self.discarded += 1,
        }
    }
}
