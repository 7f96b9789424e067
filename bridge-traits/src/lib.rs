//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the narration core and
//! platform-specific implementations. Each trait represents a capability the
//! core requires but that must be implemented differently per platform
//! (desktop, web):
//!
//! - [`SpeechSynthesizer`](speech::SpeechSynthesizer): narration service
//!   client turning paragraph text into encoded audio
//! - [`AudioOutput`](audio::AudioOutput) / [`ActiveHandle`](audio::ActiveHandle):
//!   platform audio engine driving decoded PCM buffers
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Platform
//! implementations should convert platform-specific errors to `BridgeError`
//! and provide actionable messages.
//!
//! ## Thread Safety
//!
//! On native targets all bridge traits require `Send + Sync`; WebAssembly
//! builds relax the bounds through the markers in [`platform`].

pub mod audio;
pub mod error;
pub mod platform;
pub mod speech;

pub use error::BridgeError;

// Re-export commonly used types
pub use audio::{ActiveHandle, AudioOutput, EndNotifier, HandleTag, PcmBuffer};
pub use speech::{
    SpeechRequest, SpeechSynthesizer, SynthesizedSpeech, VoiceId, VoicePreset, VOICE_PRESETS,
};
