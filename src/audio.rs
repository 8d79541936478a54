//! Audio: decoding synthesized speech, the narration output device and
//! the uncoordinated sound effects path.

pub mod clip;
pub mod effects;
pub mod output;

pub use clip::Clip;
pub use effects::{PlaybackMode, SoundEffects};
pub use output::{AudioOutput, PlaybackHandle, RodioOutput};
