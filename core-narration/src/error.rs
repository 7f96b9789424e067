//! # Narration Error Types
//!
//! Errors surfaced by the narration session. Per-paragraph synthesis and
//! decode failures are absorbed into the session's failure report rather
//! than returned; only aggregate conditions reach the caller.

use bridge_traits::error::BridgeError;
use core_playback::PlaybackError;
use thiserror::Error;

/// Errors that can occur while preparing or controlling a narration session.
#[derive(Error, Debug)]
pub enum NarrationError {
    /// Speech synthesis failed for a paragraph.
    #[error("Synthesis failed for paragraph {index}: {message}")]
    Synthesis { index: usize, message: String },

    /// Decoding a synthesized payload failed for a paragraph.
    #[error("Decode failed for paragraph {index}: {message}")]
    Decode { index: usize, message: String },

    /// Every paragraph failed to produce a playable buffer.
    #[error("No playable audio could be prepared for this story")]
    NoPlayableAudio,

    /// The platform cannot play audio at all.
    #[error("Audio playback is not supported on this platform: {0}")]
    UnsupportedPlatform(String),

    /// The session was invalidated while work was in flight.
    #[error("Narration session was invalidated")]
    Cancelled,

    /// Invalid playback speed (must be finite and greater than zero).
    #[error("Invalid playback speed: {0}")]
    InvalidSpeed(f32),

    /// Error from the playback engine.
    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),

    /// Error from a platform bridge.
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

/// Result type for narration operations.
pub type Result<T> = std::result::Result<T, NarrationError>;
