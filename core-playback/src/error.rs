//! # Playback Error Types
//!
//! Error types for audio decoding and sequence playback.

use thiserror::Error;

/// Errors that can occur during decode and playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Format/Codec Errors
    // ========================================================================
    /// Audio payload is not recognized or cannot be parsed.
    #[error("Unsupported or invalid audio format: {0}")]
    InvalidFormat(String),

    /// Payload was recognized but contains no decodable audio track.
    #[error("Cannot decode audio payload: {0}")]
    FormatNotDecodable(String),

    // ========================================================================
    // Decoding Errors
    // ========================================================================
    /// Error occurred during audio decoding.
    #[error("Decoding error: {0}")]
    DecodingError(String),

    /// Audio payload is corrupted or contains invalid data.
    #[error("Corrupted audio payload: {0}")]
    CorruptedPayload(String),

    /// Decoder encountered an internal error.
    #[error("Decoder internal error: {0}")]
    DecoderError(String),

    // ========================================================================
    // Playback Control Errors
    // ========================================================================
    /// Platform audio output is unavailable.
    #[error("Audio output unavailable: {0}")]
    AudioOutputUnavailable(String),

    /// Playback operation failed.
    #[error("Playback operation failed: {0}")]
    PlaybackFailed(String),

    /// Invalid playback speed (must be finite and greater than zero).
    #[error("Invalid playback speed: {0}")]
    InvalidSpeed(f32),
}

impl PlaybackError {
    /// Returns `true` if this error means the platform cannot play audio at
    /// all, as opposed to one payload being bad.
    pub fn is_output_error(&self) -> bool {
        matches!(self, PlaybackError::AudioOutputUnavailable(_))
    }

    /// Returns `true` if this error is related to the audio payload itself.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::InvalidFormat(_)
                | PlaybackError::FormatNotDecodable(_)
                | PlaybackError::DecodingError(_)
                | PlaybackError::CorruptedPayload(_)
                | PlaybackError::DecoderError(_)
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
