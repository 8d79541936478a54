//! Cloud TTS backend speaking SSML over HTTPS
//!
//! POST https://{region}.tts.speech.microsoft.com/cognitiveservices/v1
//! Request: SSML document, `application/ssml+xml`
//! Response: encoded audio in the requested output format

use super::ssml::render_ssml;
use super::Synthesizer;
use crate::config::SpeechConfig;
use crate::error::{NarrationError, NarrationResult};
use crate::voice::VoiceProfile;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const FORMAT_HEADER: &str = "X-Microsoft-OutputFormat";

#[derive(Debug)]
pub struct CloudSynthesizer {
    client: Client,
    endpoint: String,
    access_key: Option<String>,
    language: String,
    output_format: String,
}

impl CloudSynthesizer {
    pub fn from_config(config: &SpeechConfig) -> NarrationResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .user_agent(concat!("narrator/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NarrationError::Config(format!("HTTP client: {}", e)))?;

        let endpoint = config.endpoint.clone().unwrap_or_else(|| {
            format!(
                "https://{}.tts.speech.microsoft.com/cognitiveservices/v1",
                config.region
            )
        });

        Ok(Self {
            client,
            endpoint,
            access_key: config
                .access_key
                .clone()
                .filter(|key| !key.trim().is_empty()),
            language: config.language.clone(),
            output_format: config.output_format.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn is_configured(&self) -> bool {
        self.access_key.is_some()
    }

    async fn request(&self, key: &str, ssml: String) -> NarrationResult<Vec<u8>> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(KEY_HEADER, key)
            .header(reqwest::header::CONTENT_TYPE, "application/ssml+xml")
            .header(FORMAT_HEADER, &self.output_format)
            .body(ssml)
            .send()
            .await
            .map_err(|e| {
                warn!("⚠️ Speech service unreachable: {}", e);
                NarrationError::SynthesisFailed(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("⚠️ Speech service returned {}: {}", status, body);
            return Err(NarrationError::SynthesisFailed(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| NarrationError::SynthesisFailed(format!("reading audio: {}", e)))?;
        Ok(audio.to_vec())
    }
}

#[async_trait]
impl Synthesizer for CloudSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        profile: &VoiceProfile,
        cancel: &CancellationToken,
    ) -> NarrationResult<Vec<u8>> {
        let key = self.access_key.as_deref().ok_or_else(|| {
            NarrationError::SynthesisFailed("speech service credentials missing".to_string())
        })?;

        let ssml = render_ssml(text, profile, &self.language);
        debug!(
            url = %self.endpoint,
            voice = %profile.synthesis_voice_id,
            text_len = text.len(),
            "Sending synthesis request"
        );

        let audio = tokio::select! {
            result = self.request(key, ssml) => result?,
            _ = cancel.cancelled() => {
                debug!("Synthesis request cancelled");
                return Err(NarrationError::Cancelled);
            }
        };

        info!(
            voice = %profile.synthesis_voice_id,
            audio_size = audio.len(),
            "🗣️ Synthesis completed"
        );
        Ok(audio)
    }

    fn name(&self) -> &str {
        "cloud"
    }
}
