//! Voice profiles for the two narrating personas
//!
//! Cloud personas carry a fixed voice identity and prosody. When the
//! on-device synthesizer is in play, a device voice is picked by a
//! prioritized search and cached per persona until invalidated.

use crate::config::{Config, FallbackConfig, PersonaVoice};
use crate::error::{NarrationError, NarrationResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// The two characters narration is spoken for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    /// Slow, calm, soothing register
    Guide,
    /// Near-natural, upbeat register
    Buddy,
}

impl std::str::FromStr for Persona {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "guide" | "a" => Ok(Persona::Guide),
            "buddy" | "b" => Ok(Persona::Buddy),
            other => Err(format!("Unknown persona '{}'. Available: guide, buddy", other)),
        }
    }
}

impl std::fmt::Display for Persona {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

impl Persona {
    pub fn id(&self) -> &'static str {
        match self {
            Persona::Guide => "guide",
            Persona::Buddy => "buddy",
        }
    }

    pub fn all() -> [Persona; 2] {
        [Persona::Guide, Persona::Buddy]
    }
}

/// Rate and pitch as multipliers of the voice's natural delivery (1.0 = natural)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prosody {
    pub rate: f32,
    pub pitch: f32,
}

impl Default for Prosody {
    fn default() -> Self {
        Self {
            rate: 1.0,
            pitch: 1.0,
        }
    }
}

impl Prosody {
    /// Rate as a signed percentage offset, e.g. `-15%`
    pub fn rate_percent(&self) -> String {
        signed_percent(self.rate)
    }

    /// Pitch as a signed percentage offset, e.g. `+0%`
    pub fn pitch_percent(&self) -> String {
        signed_percent(self.pitch)
    }
}

fn signed_percent(multiplier: f32) -> String {
    let offset = ((multiplier - 1.0) * 100.0).round() as i32;
    format!("{:+}%", offset)
}

/// Everything a synthesizer needs to speak as a persona
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceProfile {
    pub persona: Persona,
    pub prosody: Prosody,
    /// Voice identity understood by the cloud service
    pub synthesis_voice_id: String,
    /// Device voice for the on-device fallback, once resolved
    pub device_voice: Option<String>,
}

impl VoiceProfile {
    pub fn new(persona: Persona, voice: &PersonaVoice) -> Self {
        Self {
            persona,
            prosody: Prosody {
                rate: voice.rate,
                pitch: voice.pitch,
            },
            synthesis_voice_id: voice.voice.clone(),
            device_voice: None,
        }
    }
}

/// A voice installed on this machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceVoice {
    /// Identifier handed back to the device synthesizer
    pub id: String,
    pub name: String,
    /// BCP-47-ish locale, `en-US` or `en_us` both accepted
    pub locale: String,
}

impl DeviceVoice {
    pub fn new(id: &str, name: &str, locale: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            locale: locale.to_string(),
        }
    }
}

/// Source of the voices the device exposes
#[async_trait]
pub trait VoiceCatalog: Send + Sync + std::fmt::Debug {
    /// List the installed voices; the list may change over time
    async fn voices(&self) -> NarrationResult<Vec<DeviceVoice>>;

    fn name(&self) -> &str;
}

/// Parameters of the fallback voice search
#[derive(Debug, Clone)]
pub struct FallbackRules {
    /// Target language-region, e.g. `en-US`
    pub language: String,
    /// Secondary language family searched with the name heuristic
    pub secondary_language: String,
    /// Lowercase name substrings marking the register we want
    pub name_hints: Vec<String>,
}

impl From<&FallbackConfig> for FallbackRules {
    fn from(config: &FallbackConfig) -> Self {
        Self {
            language: config.language.clone(),
            secondary_language: config.secondary_language.clone(),
            name_hints: config.name_hints.iter().map(|h| h.to_lowercase()).collect(),
        }
    }
}

impl Default for FallbackRules {
    fn default() -> Self {
        Self::from(&FallbackConfig::default())
    }
}

impl FallbackRules {
    fn matches_name(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        // "female" contains "male"
        if name.contains("female") {
            return false;
        }
        self.name_hints.iter().any(|hint| name.contains(hint.as_str()))
    }
}

fn normalize_locale(locale: &str) -> String {
    locale.trim().replace('_', "-").to_lowercase()
}

fn language_family(locale: &str) -> String {
    normalize_locale(locale)
        .split('-')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Prioritized best-voice search; the first rule that matches wins
pub fn select_fallback_voice<'a>(
    voices: &'a [DeviceVoice],
    rules: &FallbackRules,
) -> Option<&'a DeviceVoice> {
    let target = normalize_locale(&rules.language);
    let family = language_family(&rules.language);
    let secondary = language_family(&rules.secondary_language);

    let exact = |v: &DeviceVoice| normalize_locale(&v.locale) == target;
    let in_family = |v: &DeviceVoice, fam: &str| language_family(&v.locale) == fam;

    voices
        .iter()
        .find(|v| exact(v) && rules.matches_name(&v.name))
        .or_else(|| voices.iter().find(|v| exact(v)))
        .or_else(|| voices.iter().find(|v| in_family(v, &family)))
        .or_else(|| {
            voices
                .iter()
                .find(|v| in_family(v, &secondary) && rules.matches_name(&v.name))
        })
        .or_else(|| voices.first())
}

/// Resolves personas to voice profiles, caching fallback device voices
#[derive(Debug)]
pub struct VoiceResolver {
    profiles: HashMap<Persona, VoiceProfile>,
    catalog: Option<Arc<dyn VoiceCatalog>>,
    rules: FallbackRules,
    /// `None` remembers a failed search until `invalidate()`
    cache: HashMap<Persona, Option<DeviceVoice>>,
}

impl Default for VoiceResolver {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl VoiceResolver {
    /// Static cloud profiles from config, no device catalog
    pub fn from_config(config: &Config) -> Self {
        let mut profiles = HashMap::new();
        profiles.insert(
            Persona::Guide,
            VoiceProfile::new(Persona::Guide, &config.personas.guide),
        );
        profiles.insert(
            Persona::Buddy,
            VoiceProfile::new(Persona::Buddy, &config.personas.buddy),
        );

        Self {
            profiles,
            catalog: None,
            rules: FallbackRules::from(&config.fallback),
            cache: HashMap::new(),
        }
    }

    /// Enable fallback device voice resolution
    pub fn with_catalog(mut self, catalog: Arc<dyn VoiceCatalog>, rules: FallbackRules) -> Self {
        info!("🗣️ Fallback voice catalog: {}", catalog.name());
        self.catalog = Some(catalog);
        self.rules = rules;
        self
    }

    pub fn has_catalog(&self) -> bool {
        self.catalog.is_some()
    }

    /// The static profile for a persona, without any device voice
    pub fn profile(&self, persona: Persona) -> VoiceProfile {
        self.profiles
            .get(&persona)
            .cloned()
            .unwrap_or_else(|| VoiceProfile::new(persona, &PersonaVoice::for_persona(persona)))
    }

    /// Full profile. A missing device voice is left empty; the search error
    /// is returned alongside only when this call ran the failing search.
    pub async fn resolve(&mut self, persona: Persona) -> (VoiceProfile, Option<NarrationError>) {
        let mut profile = self.profile(persona);
        if self.catalog.is_none() {
            return (profile, None);
        }

        let fresh = !self.cache.contains_key(&persona);
        match self.resolve_device_voice(persona).await {
            Ok(voice) => {
                profile.device_voice = Some(voice.id);
                (profile, None)
            }
            Err(e) if fresh => (profile, Some(e)),
            Err(_) => (profile, None),
        }
    }

    /// Search (or recall) the device voice for a persona. Both outcomes
    /// are remembered until `invalidate()`.
    pub async fn resolve_device_voice(&mut self, persona: Persona) -> NarrationResult<DeviceVoice> {
        if let Some(cached) = self.cache.get(&persona) {
            return cached.clone().ok_or(NarrationError::NoVoiceAvailable);
        }

        let searched = self.search(persona).await;
        self.cache.insert(persona, searched.as_ref().ok().cloned());
        searched
    }

    async fn search(&self, persona: Persona) -> NarrationResult<DeviceVoice> {
        let catalog = self
            .catalog
            .as_ref()
            .ok_or(NarrationError::NoVoiceAvailable)?;
        let voices = catalog.voices().await?;
        debug!("{} device voices listed by {}", voices.len(), catalog.name());

        let voice = select_fallback_voice(&voices, &self.rules)
            .cloned()
            .ok_or(NarrationError::NoVoiceAvailable)?;

        info!(
            "🗣️ Fallback voice for {}: {} ({})",
            persona, voice.name, voice.locale
        );
        Ok(voice)
    }

    /// Forget cached device voices, e.g. after the device voice list changed
    pub fn invalidate(&mut self) {
        if !self.cache.is_empty() {
            debug!("Invalidating {} cached fallback voices", self.cache.len());
        }
        self.cache.clear();
    }
}
