//! The single coordinating loop that drains the narration queue
//!
//! Only this task ever moves a request out of `Idle`, so at most one
//! request is synthesizing, decoding or playing at any time.

use super::events::{NarrationEvent, Outcome, PlaybackState};
use super::queue::{Queued, RequestId};
use super::Shared;
use crate::audio::Clip;
use crate::error::{NarrationError, NarrationResult};
use crate::tts::Synthesizer;
use crate::voice::{Persona, VoiceProfile, VoiceResolver};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub(crate) struct Worker {
    pub(crate) shared: Arc<Shared>,
    pub(crate) synthesizer: Arc<dyn Synthesizer>,
    pub(crate) resolver: VoiceResolver,
}

impl Worker {
    pub(crate) async fn run(mut self) {
        info!(
            "🎙️ Narration worker started ({} → {})",
            self.synthesizer.name(),
            self.shared.output.name()
        );

        loop {
            if self.shared.shutdown.is_cancelled() {
                break;
            }

            let Some((queued, cancel)) = self.shared.begin_next() else {
                tokio::select! {
                    _ = self.shared.wake.notified() => continue,
                    _ = self.shared.shutdown.cancelled() => break,
                }
            };

            let Queued { id, mut request } = queued;
            debug!(id, persona = %request.persona, "Processing: {}", request.text);

            let result = self.process(id, request.persona, &request.text, &cancel).await;
            let outcome = self.shared.finish(id, &request, result);

            if outcome.fires_callback() {
                request.complete();
                self.shared.emit(NarrationEvent::Finished { id, outcome });

                let delay = self.shared.inter_item_delay;
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = self.shared.shutdown.cancelled() => break,
                }
            } else {
                self.shared.emit(NarrationEvent::Finished { id, outcome });
            }
        }

        info!("🎙️ Narration worker stopped");
    }

    /// resolve voice → synthesize → decode → play, strictly in sequence
    async fn process(
        &mut self,
        id: RequestId,
        persona: Persona,
        text: &str,
        cancel: &CancellationToken,
    ) -> NarrationResult<()> {
        let profile = self.resolve_voice(persona, cancel).await?;

        let audio = tokio::select! {
            result = self.synthesizer.synthesize(text, &profile, cancel) => result?,
            _ = cancel.cancelled() => return Err(NarrationError::Cancelled),
        };

        self.shared.transition(id, PlaybackState::Decoding)?;
        let clip = Clip::decode(audio)?;
        debug!(id, "Decoded {:.2}s of audio", clip.duration().as_secs_f32());

        let output = self.shared.output.clone();
        if !output.is_active() {
            tokio::select! {
                result = output.resume() => result?,
                _ = cancel.cancelled() => return Err(NarrationError::Cancelled),
            }
        }

        self.shared.transition(id, PlaybackState::Playing)?;
        let mut handle = output.play(clip)?;

        tokio::select! {
            result = handle.finished() => result,
            _ = cancel.cancelled() => {
                handle.halt();
                Err(NarrationError::Cancelled)
            }
        }
    }

    async fn resolve_voice(
        &mut self,
        persona: Persona,
        cancel: &CancellationToken,
    ) -> NarrationResult<VoiceProfile> {
        if self.shared.voices_stale.swap(false, Ordering::SeqCst) {
            self.resolver.invalidate();
        }

        let (profile, failure) = tokio::select! {
            resolved = self.resolver.resolve(persona) => resolved,
            _ = cancel.cancelled() => return Err(NarrationError::Cancelled),
        };
        if let Some(e) = failure {
            error!("❌ No fallback voice for {}: {}", persona, e);
            self.shared.emit(NarrationEvent::VoiceUnavailable { persona });
        }
        Ok(profile)
    }
}

/// Map a pipeline result to its outcome, logging failures
pub(crate) fn classify(id: RequestId, result: &NarrationResult<()>) -> Outcome {
    match result {
        Ok(()) => Outcome::Played,
        Err(NarrationError::Cancelled) => Outcome::Interrupted,
        Err(e @ NarrationError::ResourceUnavailable(_)) => {
            error!(id, "❌ Narration output unavailable: {}", e);
            Outcome::Failed
        }
        Err(e) => {
            warn!(id, stage = e.kind(), "⚠️ Narration skipped: {}", e);
            Outcome::Failed
        }
    }
}

pub(crate) fn failure_event(id: RequestId, result: &NarrationResult<()>) -> Option<NarrationEvent> {
    match result {
        Err(e) if !matches!(e, NarrationError::Cancelled) => Some(NarrationEvent::Failed {
            id,
            stage: e.kind(),
            error: e.to_string(),
        }),
        _ => None,
    }
}
