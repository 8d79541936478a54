//! On-device fallback TTS using espeak-ng

use super::Synthesizer;
use crate::error::{NarrationError, NarrationResult};
use crate::voice::{DeviceVoice, VoiceCatalog, VoiceProfile};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// espeak-ng's natural speaking rate in words per minute
const BASE_WPM: f32 = 175.0;
/// espeak-ng's neutral pitch on its 0-99 scale
const BASE_PITCH: f32 = 50.0;

lazy_static! {
    // " 5  en-us           --/M      English_(America)  gmw/en-US  (en 10)"
    static ref VOICE_LINE: Regex =
        Regex::new(r"^\s*\d+\s+(\S+)\s+\S*/([MF-])\s+(\S+)\s+\S+").expect("valid voice regex");
}

#[derive(Debug)]
pub struct SystemSynthesizer {
    bin: String,
}

impl SystemSynthesizer {
    pub fn new(bin: &str) -> Self {
        Self {
            bin: bin.to_string(),
        }
    }

    /// espeak-ng arguments for a profile; text goes through stdin
    fn args(profile: &VoiceProfile, voice: &str) -> Vec<String> {
        let wpm = (BASE_WPM * profile.prosody.rate).round().clamp(80.0, 450.0) as u32;
        let pitch = (BASE_PITCH * profile.prosody.pitch).round().clamp(0.0, 99.0) as u32;
        vec![
            "--stdout".to_string(),
            "-v".to_string(),
            voice.to_string(),
            "-s".to_string(),
            wpm.to_string(),
            "-p".to_string(),
            pitch.to_string(),
        ]
    }

    async fn run(&self, text: &str, args: Vec<String>) -> NarrationResult<Vec<u8>> {
        let mut child = Command::new(&self.bin)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| NarrationError::SynthesisFailed(format!("spawn {}: {}", self.bin, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(NarrationError::SynthesisFailed(format!(
                "{} exited with {}",
                self.bin, output.status
            )));
        }
        if output.stdout.is_empty() {
            return Err(NarrationError::SynthesisFailed(format!(
                "{} produced no audio",
                self.bin
            )));
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl Synthesizer for SystemSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        profile: &VoiceProfile,
        cancel: &CancellationToken,
    ) -> NarrationResult<Vec<u8>> {
        let voice = profile.device_voice.as_deref().ok_or_else(|| {
            NarrationError::SynthesisFailed("no device voice resolved".to_string())
        })?;
        debug!("System speaking as {} ({}): {}", profile.persona, voice, text);

        let args = Self::args(profile, voice);
        tokio::select! {
            result = self.run(text, args) => result.map_err(|e| match e {
                NarrationError::Io(io) => NarrationError::SynthesisFailed(io.to_string()),
                other => other,
            }),
            _ = cancel.cancelled() => Err(NarrationError::Cancelled),
        }
    }

    fn name(&self) -> &str {
        "espeak-ng"
    }
}

/// Device voices as listed by `espeak-ng --voices`
#[derive(Debug)]
pub struct EspeakCatalog {
    bin: String,
}

impl EspeakCatalog {
    pub fn new(bin: &str) -> Self {
        Self {
            bin: bin.to_string(),
        }
    }
}

/// Parse the `--voices` table; the header and malformed lines are skipped
pub fn parse_voice_list(output: &str) -> Vec<DeviceVoice> {
    output
        .lines()
        .filter_map(|line| VOICE_LINE.captures(line))
        .map(|caps| {
            let language = &caps[1];
            let gender = match &caps[2] {
                "M" => " male",
                "F" => " female",
                _ => "",
            };
            let name = format!("{}{}", caps[3].replace('_', " "), gender);
            DeviceVoice::new(language, &name, language)
        })
        .collect()
}

#[async_trait]
impl VoiceCatalog for EspeakCatalog {
    async fn voices(&self) -> NarrationResult<Vec<DeviceVoice>> {
        let output = match Command::new(&self.bin).arg("--voices").output().await {
            Ok(output) => output,
            Err(e) => {
                warn!("⚠️ Could not list {} voices: {}", self.bin, e);
                return Err(NarrationError::NoVoiceAvailable);
            }
        };

        let voices = parse_voice_list(&String::from_utf8_lossy(&output.stdout));
        if voices.is_empty() {
            return Err(NarrationError::NoVoiceAvailable);
        }
        Ok(voices)
    }

    fn name(&self) -> &str {
        "espeak-ng"
    }
}
