//! Error types shared by the audio primitives.

use thiserror::Error;

/// Failures raised while decoding, resampling or stitching audio.
#[derive(Debug, Error)]
pub enum AudioError {
    /// The caller handed over something the operation cannot work with,
    /// e.g. an empty segment list.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Audio bytes or parameters could not be read (corrupt WAV, zero sample
    /// rate, resampler failure).
    #[error("audio decode failed: {0}")]
    AudioDecode(String),
}

impl From<hound::Error> for AudioError {
    fn from(e: hound::Error) -> Self {
        AudioError::AudioDecode(e.to_string())
    }
}
