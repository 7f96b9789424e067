//! # Audio Decoder Module
//!
//! Decodes narration payloads (encoded bytes from the text-to-speech service)
//! into playable PCM buffers using the Symphonia library.
//!
//! Unlike a streaming decoder, narration paragraphs are short, so the whole
//! payload is decoded up front into one [`PcmBuffer`]. A decode failure for
//! one paragraph must never abort decoding of the others; callers absorb the
//! per-payload `Result` and treat a failed entry as "skip" during playback.

mod symphonia;

pub use self::symphonia::SymphoniaDecoder;

use crate::error::Result;
use bridge_traits::platform::PlatformSendSync;
use bridge_traits::{PcmBuffer, SynthesizedSpeech};

/// Trait for decoders turning an opaque encoded payload into PCM.
///
/// The payload's `mime_type`, when present, is only a probing hint; the
/// decoder must cope with it being absent or wrong.
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait PayloadDecoder: PlatformSendSync {
    /// Decode an entire payload into one PCM buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is malformed, uses an unsupported
    /// codec, or decodes to zero audio frames.
    async fn decode(&self, payload: SynthesizedSpeech) -> Result<PcmBuffer>;
}
