//! # Narration Pipeline
//!
//! Fetches and decodes narration audio for every paragraph of a story.
//!
//! All paragraphs are requested concurrently and the pipeline waits for all
//! of them to settle; results come back index-aligned with the input
//! regardless of completion order. A failed paragraph yields an entry with
//! its failure recorded instead of aborting the siblings.

use crate::error::{NarrationError, Result};
use crate::story::{FailureStage, ParagraphAudio};
use bridge_traits::{SpeechRequest, SpeechSynthesizer, VoiceId};
use core_playback::PayloadDecoder;
use futures::future::join_all;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Concurrent fetch+decode pipeline over the narration service and decoder.
pub struct NarrationPipeline {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    decoder: Arc<dyn PayloadDecoder>,
}

impl NarrationPipeline {
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>, decoder: Arc<dyn PayloadDecoder>) -> Self {
        Self {
            synthesizer,
            decoder,
        }
    }

    /// Prepare narration for every paragraph, waiting for all to settle.
    ///
    /// Returns index-aligned [`ParagraphAudio`] entries. Cancellation via
    /// `cancel` abandons the whole run; partially settled results are
    /// discarded, never applied.
    #[instrument(skip_all, fields(paragraphs = texts.len()))]
    pub async fn prepare(
        &self,
        texts: &[String],
        voice: &VoiceId,
        cancel: &CancellationToken,
    ) -> Result<Vec<ParagraphAudio>> {
        let jobs = texts
            .iter()
            .enumerate()
            .map(|(index, text)| self.prepare_one(index, text.clone(), voice.clone()));

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(NarrationError::Cancelled),
            results = join_all(jobs) => Ok(results),
        }
    }

    async fn prepare_one(&self, index: usize, text: String, voice: VoiceId) -> ParagraphAudio {
        let request = SpeechRequest::new(text, voice);
        let speech = match self.synthesizer.synthesize(request).await {
            Ok(speech) => speech,
            Err(e) => {
                warn!(index, error = %e, "paragraph synthesis failed");
                return ParagraphAudio::failed(index, FailureStage::Synthesis, e.to_string());
            }
        };

        let payload = speech.data.clone();
        match self.decoder.decode(speech).await {
            Ok(buffer) => {
                debug!(index, frames = buffer.frames(), "paragraph narration ready");
                ParagraphAudio::ready(index, payload, buffer)
            }
            Err(e) => {
                warn!(index, error = %e, "paragraph decode failed");
                ParagraphAudio::undecodable(index, payload, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::{PcmBuffer, SynthesizedSpeech};
    use bytes::Bytes;
    use std::time::Duration;

    /// Synthesizer that echoes the paragraph text back as the payload, with
    /// a per-index artificial delay so completion order differs from index
    /// order. Texts containing "fail" error out.
    struct EchoSynth;

    #[async_trait::async_trait]
    impl SpeechSynthesizer for EchoSynth {
        async fn synthesize(
            &self,
            request: SpeechRequest,
        ) -> bridge_traits::error::Result<SynthesizedSpeech> {
            if request.text.contains("fail") {
                return Err(bridge_traits::BridgeError::OperationFailed(
                    "synthesis down".to_string(),
                ));
            }
            // First paragraph finishes last.
            let delay = if request.text.starts_with("first") { 50 } else { 1 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(SynthesizedSpeech::new(Bytes::from(request.text.into_bytes())))
        }
    }

    /// Decoder producing one frame per payload byte. Payloads containing
    /// "bad" fail to decode.
    struct LenDecoder;

    #[async_trait::async_trait]
    impl PayloadDecoder for LenDecoder {
        async fn decode(
            &self,
            payload: SynthesizedSpeech,
        ) -> core_playback::Result<PcmBuffer> {
            if payload.data.windows(3).any(|w| w == b"bad") {
                return Err(core_playback::PlaybackError::DecodingError(
                    "undecodable".to_string(),
                ));
            }
            Ok(PcmBuffer::new(vec![0.0; payload.data.len()], 1, 8000))
        }
    }

    fn pipeline() -> NarrationPipeline {
        NarrationPipeline::new(Arc::new(EchoSynth), Arc::new(LenDecoder))
    }

    #[tokio::test]
    async fn results_are_index_aligned_regardless_of_completion_order() {
        let texts = vec!["first paragraph".to_string(), "second".to_string()];
        let results = pipeline()
            .prepare(&texts, &VoiceId::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].index, 0);
        assert_eq!(&results[0].payload.as_ref().unwrap()[..], b"first paragraph");
        assert_eq!(results[1].index, 1);
        assert_eq!(results[0].buffer.as_ref().unwrap().frames(), 15);
    }

    #[tokio::test]
    async fn failed_paragraphs_settle_without_aborting_siblings() {
        let texts = vec![
            "ok one".to_string(),
            "this will fail".to_string(),
            "bad payload".to_string(),
            "ok two".to_string(),
        ];
        let results = pipeline()
            .prepare(&texts, &VoiceId::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(results[0].is_playable());
        assert!(results[3].is_playable());

        let synth_failure = results[1].failure.as_ref().unwrap();
        assert_eq!(synth_failure.stage, FailureStage::Synthesis);
        assert!(results[1].payload.is_none());

        // Decode failures keep the fetched payload around.
        let decode_failure = results[2].failure.as_ref().unwrap();
        assert_eq!(decode_failure.stage, FailureStage::Decode);
        assert!(results[2].payload.is_some());
        assert!(!results[2].is_playable());
    }

    #[tokio::test]
    async fn cancellation_abandons_the_run() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let texts = vec!["first paragraph".to_string()];
        let result = pipeline()
            .prepare(&texts, &VoiceId::default(), &cancel)
            .await;
        assert!(matches!(result, Err(NarrationError::Cancelled)));
    }
}
