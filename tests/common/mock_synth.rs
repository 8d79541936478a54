//! Mock synthesizer for testing
//!
//! Records every request and can be scripted to fail, return junk, or hang.

use async_trait::async_trait;
use narrator::error::{NarrationError, NarrationResult};
use narrator::tts::Synthesizer;
use narrator::voice::VoiceProfile;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
pub struct MockSynth {
    spoken: Mutex<Vec<String>>,
    profiles: Mutex<Vec<VoiceProfile>>,
    fail_on: Mutex<HashSet<String>>,
    garbage_on: Mutex<HashSet<String>>,
    delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    cancelled: AtomicUsize,
}

/// Tracks a running call; a call dropped before completing counts as cancelled
struct InFlight<'a> {
    synth: &'a MockSynth,
    done: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.synth.in_flight.fetch_sub(1, Ordering::SeqCst);
        if !self.done {
            self.synth.cancelled.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl MockSynth {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every call takes this long (honouring cancellation)
    pub fn with_delay(delay: Duration) -> Arc<Self> {
        let synth = Self::default();
        *synth.delay.lock().unwrap() = delay;
        Arc::new(synth)
    }

    pub fn fail_on(&self, text: &str) {
        self.fail_on.lock().unwrap().insert(text.to_string());
    }

    pub fn garbage_on(&self, text: &str) {
        self.garbage_on.lock().unwrap().insert(text.to_string());
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn profiles(&self) -> Vec<VoiceProfile> {
        self.profiles.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Synthesizer for MockSynth {
    async fn synthesize(
        &self,
        text: &str,
        profile: &VoiceProfile,
        cancel: &CancellationToken,
    ) -> NarrationResult<Vec<u8>> {
        self.spoken.lock().unwrap().push(text.to_string());
        self.profiles.lock().unwrap().push(profile.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let mut guard = InFlight {
            synth: self,
            done: false,
        };

        let delay = *self.delay.lock().unwrap();
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => return Err(NarrationError::Cancelled),
        }
        guard.done = true;

        if self.fail_on.lock().unwrap().contains(text) {
            return Err(NarrationError::SynthesisFailed("HTTP 500: mock outage".into()));
        }
        if self.garbage_on.lock().unwrap().contains(text) {
            return Ok(b"<html>definitely not audio</html>".to_vec());
        }
        // 100ms of speech
        Ok(super::wav_bytes(24_000, 2_400))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
