//! TTS (Text-to-Speech) Module
//!
//! Turns text plus a persona's voice profile into encoded audio bytes.
//! Backends: the cloud SSML service and an on-device espeak-ng fallback.

use crate::config::Config;
use crate::error::{NarrationError, NarrationResult};
use crate::voice::VoiceProfile;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub mod cloud;
pub mod ssml;
pub mod system;

pub use cloud::CloudSynthesizer;
pub use system::{EspeakCatalog, SystemSynthesizer};

/// Trait for speech synthesis backends
#[async_trait]
pub trait Synthesizer: Send + Sync + std::fmt::Debug {
    /// Synthesize `text` as the given voice, returning encoded audio.
    ///
    /// Every failure is reported as `SynthesisFailed`; a fired `cancel`
    /// token yields `Cancelled`.
    async fn synthesize(
        &self,
        text: &str,
        profile: &VoiceProfile,
        cancel: &CancellationToken,
    ) -> NarrationResult<Vec<u8>>;

    /// Get the engine name
    fn name(&self) -> &str;
}

/// Tries `primary`, then `fallback` when the primary fails to synthesize
#[derive(Debug)]
pub struct FallbackChain {
    primary: Arc<dyn Synthesizer>,
    fallback: Arc<dyn Synthesizer>,
    name: String,
}

impl FallbackChain {
    pub fn new(primary: Arc<dyn Synthesizer>, fallback: Arc<dyn Synthesizer>) -> Self {
        let name = format!("{}+{}", primary.name(), fallback.name());
        Self {
            primary,
            fallback,
            name,
        }
    }
}

#[async_trait]
impl Synthesizer for FallbackChain {
    async fn synthesize(
        &self,
        text: &str,
        profile: &VoiceProfile,
        cancel: &CancellationToken,
    ) -> NarrationResult<Vec<u8>> {
        match self.primary.synthesize(text, profile, cancel).await {
            Ok(audio) => Ok(audio),
            Err(NarrationError::Cancelled) => Err(NarrationError::Cancelled),
            Err(e) => {
                warn!(
                    "⚠️ {} failed ({}), trying {}",
                    self.primary.name(),
                    e,
                    self.fallback.name()
                );
                self.fallback.synthesize(text, profile, cancel).await
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Factory to create the configured synthesizer
pub fn create_synthesizer(config: &Config) -> NarrationResult<Arc<dyn Synthesizer>> {
    let cloud: Arc<dyn Synthesizer> = Arc::new(CloudSynthesizer::from_config(&config.speech)?);
    if config.speech.access_key.is_none() {
        warn!("⚠️ No speech service key configured, cloud narration will be silent");
    }

    let engine: Arc<dyn Synthesizer> = if config.fallback.enabled {
        info!(
            "  - On-device fallback enabled ({})",
            config.fallback.espeak_bin
        );
        let system = Arc::new(SystemSynthesizer::new(&config.fallback.espeak_bin));
        Arc::new(FallbackChain::new(cloud, system))
    } else {
        cloud
    };

    info!("✅ TTS engine '{}' initialized", engine.name());
    Ok(engine)
}
