//! Decoded narration audio

use crate::error::{NarrationError, NarrationResult};
use rodio::{Decoder, Source};
use std::io::Cursor;
use std::time::Duration;

/// Interleaved f32 PCM ready for the output device
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    pub channels: u16,
    pub sample_rate: u32,
    pub samples: Vec<f32>,
}

impl Clip {
    /// Decode WAV/MP3/FLAC/Vorbis bytes as returned by a synthesizer
    pub fn decode(audio: Vec<u8>) -> NarrationResult<Self> {
        if audio.is_empty() {
            return Err(NarrationError::DecodeFailed("empty payload".to_string()));
        }

        let decoder = Decoder::new(Cursor::new(audio))
            .map_err(|e| NarrationError::DecodeFailed(e.to_string()))?;
        let channels = decoder.channels();
        let sample_rate = decoder.sample_rate();
        let samples: Vec<f32> = decoder.convert_samples::<f32>().collect();

        if channels == 0 || sample_rate == 0 || samples.is_empty() {
            return Err(NarrationError::DecodeFailed(
                "no audio frames in payload".to_string(),
            ));
        }

        Ok(Self {
            channels,
            sample_rate,
            samples,
        })
    }

    pub fn duration(&self) -> Duration {
        let frames = self.samples.len() as u64 / self.channels.max(1) as u64;
        Duration::from_micros(frames * 1_000_000 / self.sample_rate.max(1) as u64)
    }

    pub(crate) fn into_source(self) -> rodio::buffer::SamplesBuffer<f32> {
        rodio::buffer::SamplesBuffer::new(self.channels, self.sample_rate, self.samples)
    }
}
