//! Narration service bridge trait and supporting speech types.
//!
//! The narration collaborator turns one paragraph of story text into an
//! encoded audio payload. The wire contract is deliberately small: the core
//! sends `{text, voiceId}` and receives opaque encoded bytes plus an optional
//! MIME hint. Host applications provide a concrete implementation that talks
//! to their text-to-speech backend (HTTP service, on-device engine, ...).

use crate::{error::Result, platform::PlatformSendSync};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a synthesis voice, as understood by the narration service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoiceId(String);

impl VoiceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for VoiceId {
    fn default() -> Self {
        Self::new(VOICE_PRESETS[0].id)
    }
}

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A voice the product exposes to users, with its display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoicePreset {
    /// Identifier sent to the narration service.
    pub id: &'static str,
    /// Human-readable name shown in voice pickers.
    pub name: &'static str,
}

/// Voices offered by the story reader, first entry is the default.
pub const VOICE_PRESETS: &[VoicePreset] = &[
    VoicePreset { id: "Algenib", name: "Standard" },
    VoicePreset { id: "Umbriel", name: "Calm" },
    VoicePreset { id: "Rasalgethi", name: "Warm" },
    VoicePreset { id: "Zubenelgenubi", name: "Deep" },
    VoicePreset { id: "Schedar", name: "Clear" },
];

/// Request for narration of a single paragraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechRequest {
    /// Paragraph text to narrate.
    pub text: String,
    /// Voice to synthesize with.
    #[serde(rename = "voiceId")]
    pub voice: VoiceId,
}

impl SpeechRequest {
    pub fn new(text: impl Into<String>, voice: VoiceId) -> Self {
        Self {
            text: text.into(),
            voice,
        }
    }
}

/// Encoded audio produced by the narration service.
///
/// The payload encoding (container/codec) is opaque to the core and handed
/// unmodified to the decoder; `mime_type` is only a probing hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedSpeech {
    /// Encoded audio bytes.
    pub data: Bytes,
    /// MIME type reported by the service (e.g., `audio/wav`), when known.
    pub mime_type: Option<String>,
}

impl SynthesizedSpeech {
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            mime_type: None,
        }
    }

    /// Attach a MIME type hint.
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Returns `true` if the service produced no audio bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Trait for narration service clients.
///
/// One call per paragraph. Callers issue these concurrently for every
/// paragraph in a story and wait for all of them to settle; a failure for one
/// paragraph must therefore be reported through the `Result`, never by
/// panicking or by blocking the sibling requests.
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait SpeechSynthesizer: PlatformSendSync {
    /// Synthesize narration audio for one paragraph.
    ///
    /// # Errors
    ///
    /// Returns an error if the network call fails, the service reports an
    /// error, or the returned payload is empty.
    async fn synthesize(&self, request: SpeechRequest) -> Result<SynthesizedSpeech>;
}
