//! Narration coordinator
//!
//! Serializes spoken feedback from both personas onto the one audio output.
//! A [`Narrator`] is an owned handle created by [`NarratorBuilder::start`];
//! clones share the same queue and worker. Failures never reach callers:
//! a failed request still completes, and the queue moves on.
//!
//! ```ignore
//! let narrator = Narrator::from_config(&config)?;
//! narrator.request_narration("Well done!", Persona::Buddy, 1, Some("correct"), Duration::from_secs(2));
//! ```

pub mod events;
pub mod queue;
mod worker;

pub use events::{HistoryEntry, NarrationEvent, NarratorStats, Outcome, PlaybackState};
pub use queue::{Completion, RequestId, SpeechQueue, SpeechRequest};

use crate::audio::{AudioOutput, RodioOutput};
use crate::config::Config;
use crate::cooldown::CooldownGate;
use crate::error::{NarrationError, NarrationResult};
use crate::tts::ssml::collapse_whitespace;
use crate::tts::{create_synthesizer, EspeakCatalog, Synthesizer};
use crate::voice::{FallbackRules, Persona, VoiceResolver};
use chrono::Local;
use queue::Queued;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 256;

/// Why the active request's token was cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CancelReason {
    Stopped,
    Flushed,
}

#[derive(Debug)]
struct Active {
    id: RequestId,
    cancel: CancellationToken,
    reason: Option<CancelReason>,
}

struct Inner {
    queue: SpeechQueue,
    state: PlaybackState,
    enabled: bool,
    /// Set by `stop()`; the worker leaves the queue alone until woken
    parked: bool,
    active: Option<Active>,
    cooldowns: CooldownGate,
    history: VecDeque<HistoryEntry>,
    history_len: usize,
    stats: NarratorStats,
}

/// State shared between the handle and the worker task
pub(crate) struct Shared {
    inner: Mutex<Inner>,
    pub(crate) wake: Notify,
    pub(crate) shutdown: CancellationToken,
    pub(crate) voices_stale: AtomicBool,
    pub(crate) output: Arc<dyn AudioOutput>,
    pub(crate) inter_item_delay: Duration,
    events: broadcast::Sender<NarrationEvent>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn emit(&self, event: NarrationEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Pop the head of the queue and mark it active, unless muted or parked
    pub(crate) fn begin_next(&self) -> Option<(Queued, CancellationToken)> {
        let next = {
            let mut inner = self.lock();
            if !inner.enabled
                || inner.parked
                || inner.active.is_some()
                || self.shutdown.is_cancelled()
            {
                return None;
            }
            let queued = inner.queue.pop()?;
            let cancel = self.shutdown.child_token();
            inner.active = Some(Active {
                id: queued.id,
                cancel: cancel.clone(),
                reason: None,
            });
            inner.state = PlaybackState::Synthesizing;
            (queued, cancel)
        };

        self.emit(NarrationEvent::StateChanged {
            id: next.0.id,
            state: PlaybackState::Synthesizing,
        });
        Some(next)
    }

    /// Advance the active request's state; fails once it has been cancelled
    pub(crate) fn transition(&self, id: RequestId, state: PlaybackState) -> NarrationResult<()> {
        {
            let mut inner = self.lock();
            let current = inner
                .active
                .as_ref()
                .is_some_and(|active| active.id == id && !active.cancel.is_cancelled());
            if !current {
                return Err(NarrationError::Cancelled);
            }
            inner.state = state;
        }
        self.emit(NarrationEvent::StateChanged { id, state });
        Ok(())
    }

    /// Release the active slot and record how the request ended
    pub(crate) fn finish(
        &self,
        id: RequestId,
        request: &SpeechRequest,
        result: NarrationResult<()>,
    ) -> Outcome {
        let outcome = {
            let mut inner = self.lock();
            // A stop or flush decides the outcome even if the step it raced
            // came back with its own result
            let reason = inner.active.take().and_then(|active| active.reason);
            let outcome = match reason {
                Some(CancelReason::Flushed) => Outcome::Discarded,
                Some(CancelReason::Stopped) => Outcome::Interrupted,
                None => match worker::classify(id, &result) {
                    Outcome::Interrupted if self.shutdown.is_cancelled() => Outcome::Discarded,
                    outcome => outcome,
                },
            };
            inner.state = PlaybackState::Idle;
            inner.stats.record(outcome);

            let history_len = inner.history_len;
            if history_len > 0 {
                if inner.history.len() == history_len {
                    inner.history.pop_front();
                }
                inner.history.push_back(HistoryEntry {
                    id,
                    at: Local::now(),
                    text: request.text.clone(),
                    persona: request.persona,
                    priority: request.priority,
                    outcome,
                });
            }
            outcome
        };

        if outcome == Outcome::Failed {
            if let Some(event) = worker::failure_event(id, &result) {
                self.emit(event);
            }
        }
        self.emit(NarrationEvent::StateChanged {
            id,
            state: PlaybackState::Idle,
        });
        outcome
    }
}

/// Builder for a [`Narrator`]
pub struct NarratorBuilder {
    synthesizer: Option<Arc<dyn Synthesizer>>,
    output: Option<Arc<dyn AudioOutput>>,
    resolver: Option<VoiceResolver>,
    inter_item_delay: Duration,
    history_len: usize,
    cooldown_capacity: usize,
    enabled: bool,
}

impl Default for NarratorBuilder {
    fn default() -> Self {
        Self {
            synthesizer: None,
            output: None,
            resolver: None,
            inter_item_delay: Duration::from_millis(300),
            history_len: 32,
            cooldown_capacity: crate::cooldown::DEFAULT_CAPACITY,
            enabled: true,
        }
    }
}

impl NarratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn synthesizer(mut self, synthesizer: Arc<dyn Synthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub fn output(mut self, output: Arc<dyn AudioOutput>) -> Self {
        self.output = Some(output);
        self
    }

    pub fn resolver(mut self, resolver: VoiceResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn inter_item_delay(mut self, delay: Duration) -> Self {
        self.inter_item_delay = delay;
        self
    }

    pub fn history_len(mut self, len: usize) -> Self {
        self.history_len = len;
        self
    }

    pub fn cooldown_capacity(mut self, capacity: usize) -> Self {
        self.cooldown_capacity = capacity;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Spawn the worker task. Must be called from within a Tokio runtime.
    pub fn start(self) -> NarrationResult<Narrator> {
        let synthesizer = self
            .synthesizer
            .ok_or_else(|| NarrationError::Config("no synthesizer configured".to_string()))?;
        let output = self
            .output
            .ok_or_else(|| NarrationError::Config("no audio output configured".to_string()))?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| NarrationError::Config(format!("narrator needs a Tokio runtime: {}", e)))?;

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                queue: SpeechQueue::new(),
                state: PlaybackState::Idle,
                enabled: self.enabled,
                parked: false,
                active: None,
                cooldowns: CooldownGate::with_capacity(self.cooldown_capacity),
                history: VecDeque::with_capacity(self.history_len),
                history_len: self.history_len,
                stats: NarratorStats::default(),
            }),
            wake: Notify::new(),
            shutdown: CancellationToken::new(),
            voices_stale: AtomicBool::new(false),
            output,
            inter_item_delay: self.inter_item_delay,
            events,
        });

        let worker = worker::Worker {
            shared: shared.clone(),
            synthesizer,
            resolver: self.resolver.unwrap_or_default(),
        };
        let handle = runtime.spawn(worker.run());

        Ok(Narrator {
            shared,
            worker: Arc::new(Mutex::new(Some(handle))),
        })
    }
}

/// Handle to the narration coordinator
#[derive(Clone)]
pub struct Narrator {
    shared: Arc<Shared>,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl std::fmt::Debug for Narrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Narrator")
            .field("state", &self.state())
            .field("queued", &self.queue_len())
            .field("output", &self.shared.output)
            .finish()
    }
}

impl Narrator {
    pub fn builder() -> NarratorBuilder {
        NarratorBuilder::new()
    }

    /// Wire the real backends from configuration
    pub fn from_config(config: &Config) -> NarrationResult<Self> {
        info!("🎙️ Initializing narrator...");
        let synthesizer = create_synthesizer(config)?;

        let mut resolver = VoiceResolver::from_config(config);
        if config.fallback.enabled {
            resolver = resolver.with_catalog(
                Arc::new(EspeakCatalog::new(&config.fallback.espeak_bin)),
                FallbackRules::from(&config.fallback),
            );
        }

        NarratorBuilder::new()
            .synthesizer(synthesizer)
            .output(Arc::new(RodioOutput::new()))
            .resolver(resolver)
            .inter_item_delay(Duration::from_millis(config.inter_item_delay_ms))
            .history_len(config.history_len)
            .cooldown_capacity(config.cooldown_capacity)
            .enabled(config.audio_enabled)
            .start()
    }

    /// Queue a request. Never blocks; safe to call from a completion callback.
    ///
    /// Returns `None` when the request was dropped instead (empty text,
    /// audio disabled or shut down); its callback has then already fired.
    pub fn enqueue(&self, mut request: SpeechRequest) -> Option<RequestId> {
        request.text = collapse_whitespace(&request.text);
        let persona = request.persona;
        let priority = request.priority;

        let queued = {
            let mut inner = self.shared.lock();
            if request.text.is_empty() {
                inner.stats.dropped += 1;
                Err((request, "empty text"))
            } else if self.shared.shutdown.is_cancelled() {
                inner.stats.dropped += 1;
                Err((request, "shut down"))
            } else if !inner.enabled {
                inner.stats.dropped += 1;
                Err((request, "audio disabled"))
            } else {
                let id = inner.queue.push(request);
                inner.parked = false;
                inner.stats.queued += 1;
                Ok(id)
            }
        };

        match queued {
            Ok(id) => {
                debug!(id, priority, "Queued narration for {}", persona);
                self.shared.emit(NarrationEvent::Queued {
                    id,
                    persona,
                    priority,
                });
                self.shared.wake.notify_one();
                Some(id)
            }
            Err((mut request, reason)) => {
                debug!("Dropping narration request: {}", reason);
                // Outside the lock so the callback may enqueue again
                request.complete();
                self.shared.emit(NarrationEvent::Dropped { reason });
                None
            }
        }
    }

    /// Cooldown check (when tagged) composed with an enqueue
    pub fn request_narration(
        &self,
        text: &str,
        persona: Persona,
        priority: i32,
        tag: Option<&str>,
        window: Duration,
    ) -> Option<RequestId> {
        if let Some(tag) = tag {
            let allowed = {
                let mut inner = self.shared.lock();
                let allowed = inner.cooldowns.may_proceed(tag, window);
                if !allowed {
                    inner.stats.suppressed += 1;
                }
                allowed
            };
            if !allowed {
                debug!("🤫 '{}' is cooling down", tag);
                self.shared.emit(NarrationEvent::Suppressed {
                    tag: tag.to_string(),
                });
                return None;
            }
        }

        self.enqueue(SpeechRequest::new(text, persona).with_priority(priority))
    }

    /// Interrupt the active request without touching the queue.
    ///
    /// The interrupted request's callback does not fire. Pending requests
    /// resume on the next enqueue or [`Narrator::wake`]. Returns whether
    /// anything was active.
    pub fn stop(&self) -> bool {
        let stopped = {
            let mut inner = self.shared.lock();
            match inner.active.as_mut() {
                Some(active) => {
                    active.reason = Some(CancelReason::Stopped);
                    active.cancel.cancel();
                    let id = active.id;
                    inner.state = PlaybackState::Idle;
                    inner.parked = true;
                    Some(id)
                }
                None => None,
            }
        };

        match stopped {
            Some(id) => {
                info!("🛑 Narration stopped (request {})", id);
                true
            }
            None => false,
        }
    }

    /// Resume draining the queue after a `stop()`
    pub fn wake(&self) {
        self.shared.lock().parked = false;
        self.shared.wake.notify_one();
    }

    /// Toggle audio. Disabling flushes the queue and silences the active
    /// request; no pending callback fires.
    pub fn set_enabled(&self, enabled: bool) {
        let discarded = {
            let mut inner = self.shared.lock();
            if inner.enabled == enabled {
                return;
            }
            inner.enabled = enabled;
            if enabled {
                inner.parked = false;
                None
            } else {
                let discarded = inner.queue.clear();
                if let Some(active) = inner.active.as_mut() {
                    active.reason = Some(CancelReason::Flushed);
                    active.cancel.cancel();
                }
                inner.state = PlaybackState::Idle;
                inner.stats.discarded += discarded as u64;
                Some(discarded)
            }
        };

        match discarded {
            Some(discarded) => {
                info!("🔇 Narration disabled, {} pending requests discarded", discarded);
                self.shared.emit(NarrationEvent::Flushed { discarded });
            }
            None => {
                info!("🔊 Narration enabled");
                self.shared.wake.notify_one();
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.lock().enabled
    }

    /// Re-run fallback voice selection before the next request
    pub fn refresh_voices(&self) {
        self.shared.voices_stale.store(true, Ordering::SeqCst);
    }

    /// Resume the output device, e.g. in response to a user interaction
    pub async fn resume_output(&self) -> NarrationResult<()> {
        self.shared.output.resume().await
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.lock().state
    }

    pub fn queue_len(&self) -> usize {
        self.shared.lock().queue.len()
    }

    pub fn stats(&self) -> NarratorStats {
        self.shared.lock().stats.clone()
    }

    /// Most recent finished requests, oldest first
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.shared.lock().history.iter().cloned().collect()
    }

    /// Drop cooldown entries idle for longer than `max_age`
    pub fn sweep_cooldowns(&self, max_age: Duration) -> usize {
        self.shared.lock().cooldowns.sweep(max_age)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NarrationEvent> {
        self.shared.events.subscribe()
    }

    /// Cancel the active request and stop the worker. Queued requests are
    /// discarded without callbacks; later requests are dropped.
    pub async fn shutdown(&self) {
        self.shared.shutdown.cancel();
        let discarded = self.shared.lock().queue.clear();
        if discarded > 0 {
            debug!("Discarded {} queued requests on shutdown", discarded);
        }

        let handle = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("⚠️ Narration worker ended abnormally: {}", e);
            }
        }
    }
}
