//! Story content types and per-paragraph narration assets.

use bridge_traits::PcmBuffer;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One page of a generated story: an illustration plus its paragraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryPart {
    /// Illustration for this page, as an image URL or data URI, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub illustration: Option<String>,
    /// Paragraph text narrated for this page.
    pub paragraph: String,
}

impl StoryPart {
    pub fn new(paragraph: impl Into<String>) -> Self {
        Self {
            illustration: None,
            paragraph: paragraph.into(),
        }
    }

    pub fn with_illustration(mut self, illustration: impl Into<String>) -> Self {
        self.illustration = Some(illustration.into());
        self
    }
}

/// A generated story: ordered pages narrated one paragraph at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub parts: Vec<StoryPart>,
}

impl Story {
    pub fn new(parts: Vec<StoryPart>) -> Self {
        Self { title: None, parts }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn paragraph_count(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// Stage of the narration pipeline where a paragraph failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureStage {
    Synthesis,
    Decode,
}

/// A recorded per-paragraph failure. The session keeps playing the other
/// paragraphs; this exists so hosts can show which pages have no narration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParagraphFailure {
    pub index: usize,
    pub stage: FailureStage,
    pub message: String,
}

/// Narration assets for one paragraph, index-aligned with the story parts.
///
/// `payload` holds the encoded bytes from the narration service; `buffer`
/// the decoded PCM. Either may be absent after a failure, recorded in
/// `failure`.
#[derive(Debug, Clone)]
pub struct ParagraphAudio {
    pub index: usize,
    pub payload: Option<Bytes>,
    pub buffer: Option<Arc<PcmBuffer>>,
    pub failure: Option<ParagraphFailure>,
}

impl ParagraphAudio {
    pub fn ready(index: usize, payload: Bytes, buffer: PcmBuffer) -> Self {
        Self {
            index,
            payload: Some(payload),
            buffer: Some(Arc::new(buffer)),
            failure: None,
        }
    }

    pub fn failed(index: usize, stage: FailureStage, message: impl Into<String>) -> Self {
        Self {
            index,
            payload: None,
            buffer: None,
            failure: Some(ParagraphFailure {
                index,
                stage,
                message: message.into(),
            }),
        }
    }

    /// A synthesis succeeded but the payload would not decode.
    pub fn undecodable(
        index: usize,
        payload: Bytes,
        message: impl Into<String>,
    ) -> Self {
        Self {
            index,
            payload: Some(payload),
            buffer: None,
            failure: Some(ParagraphFailure {
                index,
                stage: FailureStage::Decode,
                message: message.into(),
            }),
        }
    }

    pub fn is_playable(&self) -> bool {
        self.buffer.is_some()
    }
}

/// Observable lifecycle state of a narration session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    /// No narration assets prepared.
    #[default]
    Idle,
    /// Fetch and decode in flight for every paragraph.
    Synthesizing,
    /// Assets cached, nothing sounding.
    Ready,
    Playing,
    Paused,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn story_wire_shape() {
        let story = Story::new(vec![
            StoryPart::new("Once upon a time.").with_illustration("data:image/png;base64,AAAA"),
            StoryPart::new("The end."),
        ])
        .with_title("A Tale");

        let json = serde_json::to_value(&story).unwrap();
        assert_eq!(json["title"], "A Tale");
        assert_eq!(json["parts"][0]["paragraph"], "Once upon a time.");
        assert_eq!(json["parts"][0]["illustration"], "data:image/png;base64,AAAA");
        assert!(json["parts"][1].get("illustration").is_none());
    }

    #[test]
    fn paragraph_audio_playability() {
        let ready = ParagraphAudio::ready(
            0,
            Bytes::from_static(b"RIFF"),
            PcmBuffer::new(vec![0.0; 8], 1, 8000),
        );
        assert!(ready.is_playable());
        assert!(ready.failure.is_none());

        let failed = ParagraphAudio::failed(1, FailureStage::Synthesis, "HTTP 500");
        assert!(!failed.is_playable());
        assert_eq!(failed.failure.as_ref().unwrap().stage, FailureStage::Synthesis);
    }

    #[test]
    fn session_state_serializes_camel_case() {
        assert_eq!(
            serde_json::to_string(&SessionState::Synthesizing).unwrap(),
            "\"synthesizing\""
        );
    }
}
