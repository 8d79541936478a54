//! Narrator Library
//!
//! Spoken feedback for two game personas, serialized onto one audio output:
//! cooldown filtering, voice resolution, cloud synthesis with an on-device
//! fallback, and a priority playback queue.

pub mod audio;
pub mod config;
pub mod cooldown;
pub mod error;
pub mod narrator;
pub mod tts;
pub mod voice;

pub use error::{NarrationError, NarrationResult};
pub use narrator::{Narrator, NarratorBuilder, SpeechRequest};
pub use voice::Persona;
