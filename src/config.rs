use crate::voice::Persona;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variables that override the speech service credentials
pub const ENV_SPEECH_KEY: &str = "NARRATOR_SPEECH_KEY";
pub const ENV_SPEECH_REGION: &str = "NARRATOR_SPEECH_REGION";
pub const ENV_SPEECH_ENDPOINT: &str = "NARRATOR_SPEECH_ENDPOINT";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Playback
    pub audio_enabled: bool,
    pub inter_item_delay_ms: u64,
    pub cooldown_capacity: usize,
    pub history_len: usize,

    // Speech
    pub speech: SpeechConfig,
    pub personas: PersonaVoices,
    #[serde(default)]
    pub fallback: FallbackConfig,

    // Audio
    #[serde(default)]
    pub effects_dir: String,

    // Meta
    pub log_level: String,
}

/// Cloud synthesis service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    pub region: String,
    /// Absent key is a valid configuration: every request fails fast
    #[serde(default)]
    pub access_key: Option<String>,
    /// Full URL, overrides the region-derived endpoint
    #[serde(default)]
    pub endpoint: Option<String>,
    pub language: String,
    pub output_format: String,
    pub timeout_secs: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            region: "eastus".to_string(),
            access_key: None,
            endpoint: None,
            language: "en-US".to_string(),
            output_format: "riff-24khz-16bit-mono-pcm".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Voice identity and prosody of one persona
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersonaVoice {
    pub voice: String,
    pub rate: f32,
    pub pitch: f32,
}

impl PersonaVoice {
    pub fn for_persona(persona: Persona) -> Self {
        match persona {
            // Slower and calmer, neutral pitch
            Persona::Guide => Self {
                voice: "en-US-JennyNeural".to_string(),
                rate: 0.85,
                pitch: 1.0,
            },
            Persona::Buddy => Self {
                voice: "en-US-GuyNeural".to_string(),
                rate: 0.97,
                pitch: 1.0,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaVoices {
    pub guide: PersonaVoice,
    pub buddy: PersonaVoice,
}

impl Default for PersonaVoices {
    fn default() -> Self {
        Self {
            guide: PersonaVoice::for_persona(Persona::Guide),
            buddy: PersonaVoice::for_persona(Persona::Buddy),
        }
    }
}

impl PersonaVoices {
    pub fn get(&self, persona: Persona) -> &PersonaVoice {
        match persona {
            Persona::Guide => &self.guide,
            Persona::Buddy => &self.buddy,
        }
    }
}

/// On-device fallback synthesis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    pub enabled: bool,
    pub espeak_bin: String,
    pub language: String,
    pub secondary_language: String,
    pub name_hints: Vec<String>,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            espeak_bin: "espeak-ng".to_string(),
            language: "en-US".to_string(),
            secondary_language: "es".to_string(),
            name_hints: [
                "male", "david", "daniel", "guy", "james", "george", "mark", "alex", "fred",
                "jorge", "diego", "pablo",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            audio_enabled: true,
            inter_item_delay_ms: 300,
            cooldown_capacity: crate::cooldown::DEFAULT_CAPACITY,
            history_len: 32,
            speech: SpeechConfig::default(),
            personas: PersonaVoices::default(),
            fallback: FallbackConfig::default(),
            effects_dir: dirs::data_dir()
                .unwrap_or_default()
                .join("narrator/effects")
                .to_string_lossy()
                .to_string(),
            log_level: "INFO".to_string(),
        }
    }
}

impl Config {
    /// Load config from the default path, or defaults
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&config_path())?;
        config.apply_env();
        Ok(config)
    }

    /// Load config from a file; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        match serde_json::from_str(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                // Graceful degradation: log warning and use defaults
                tracing::warn!("⚠️ Config file corrupted or invalid, using defaults: {}", e);
                let backup_path = path.with_extension("json.corrupt");
                let _ = std::fs::rename(path, &backup_path);
                Ok(Self::default())
            }
        }
    }

    /// Save config to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Credentials from the environment win over the file
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(ENV_SPEECH_KEY) {
            if !key.trim().is_empty() {
                self.speech.access_key = Some(key.trim().to_string());
            }
        }
        if let Ok(region) = std::env::var(ENV_SPEECH_REGION) {
            if !region.trim().is_empty() {
                self.speech.region = region.trim().to_string();
            }
        }
        if let Ok(endpoint) = std::env::var(ENV_SPEECH_ENDPOINT) {
            if !endpoint.trim().is_empty() {
                self.speech.endpoint = Some(endpoint.trim().to_string());
            }
        }
    }

    /// Reject values the coordinator cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.cooldown_capacity == 0 {
            anyhow::bail!("cooldown_capacity must be at least 1");
        }
        for persona in Persona::all() {
            let voice = self.personas.get(persona);
            if !(0.5..=2.0).contains(&voice.rate) || !(0.5..=2.0).contains(&voice.pitch) {
                anyhow::bail!(
                    "{} prosody out of range (rate {}, pitch {}), expected 0.5-2.0",
                    persona,
                    voice.rate,
                    voice.pitch
                );
            }
            if voice.voice.trim().is_empty() {
                anyhow::bail!("{} voice cannot be empty", persona);
            }
        }
        if self.speech.region.trim().is_empty() && self.speech.endpoint.is_none() {
            anyhow::bail!("speech.region or speech.endpoint is required");
        }
        Ok(())
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("narrator")
        .join("config.json")
}
