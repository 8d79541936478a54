//! Narrator Error Types
//!
//! One error enum for every stage of a narration: synthesis, decoding,
//! the output device and fallback voice resolution.

use thiserror::Error;

/// Central error type for the narration coordinator
#[derive(Error, Debug)]
pub enum NarrationError {
    /// Missing credentials, non-success service response or transport failure.
    #[error("Synthesis failed: {0}")]
    SynthesisFailed(String),

    #[error("Audio decode failed: {0}")]
    DecodeFailed(String),

    #[error("Audio output unavailable: {0}")]
    ResourceUnavailable(String),

    #[error("No device voice available for fallback synthesis")]
    NoVoiceAvailable,

    #[error("Narration cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl NarrationError {
    /// Short stage label used in events and the history log
    pub fn kind(&self) -> &'static str {
        match self {
            NarrationError::SynthesisFailed(_) => "synthesis",
            NarrationError::DecodeFailed(_) => "decode",
            NarrationError::ResourceUnavailable(_) => "output",
            NarrationError::NoVoiceAvailable => "voice",
            NarrationError::Cancelled => "cancelled",
            NarrationError::Config(_) => "config",
            NarrationError::Io(_) | NarrationError::Json(_) | NarrationError::Other(_) => "other",
        }
    }
}

/// Result type alias for narration operations
pub type NarrationResult<T> = Result<T, NarrationError>;
