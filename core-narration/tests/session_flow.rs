//! End-to-end session tests over scripted bridge implementations: a
//! synthesizer that echoes paragraph text, a decoder producing one frame per
//! payload byte, and an audio output whose natural ends the tests trigger by
//! hand.

use bridge_traits::{
    ActiveHandle, AudioOutput, BridgeError, EndNotifier, PcmBuffer, SpeechRequest,
    SpeechSynthesizer, SynthesizedSpeech, VoiceId,
};
use bytes::Bytes;
use core_narration::{
    FailureStage, NarrationError, PlaybackSessionController, SessionState, Story, StoryPart,
};
use core_playback::PayloadDecoder;
use mockall::mock;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

#[derive(Default)]
struct OutputState {
    /// (tag, frames, rate) per started handle.
    started: Vec<(u64, usize, f32)>,
    live: Option<(u64, EndNotifier)>,
    rates: Vec<f32>,
    closed: usize,
}

/// Audio output whose completions are driven by the test.
#[derive(Default)]
struct ScriptedOutput {
    state: Arc<Mutex<OutputState>>,
}

struct ScriptedHandle {
    tag: u64,
    state: Arc<Mutex<OutputState>>,
}

impl AudioOutput for ScriptedOutput {
    fn start(
        &self,
        buffer: Arc<PcmBuffer>,
        rate: f32,
        on_end: EndNotifier,
    ) -> bridge_traits::error::Result<Box<dyn ActiveHandle>> {
        let mut state = self.state.lock().unwrap();
        let tag = on_end.tag().raw();
        state.started.push((tag, buffer.frames(), rate));
        state.live = Some((tag, on_end));
        Ok(Box::new(ScriptedHandle {
            tag,
            state: Arc::clone(&self.state),
        }))
    }

    fn close(&self) {
        self.state.lock().unwrap().closed += 1;
    }
}

impl ActiveHandle for ScriptedHandle {
    fn set_rate(&mut self, rate: f32) {
        self.state.lock().unwrap().rates.push(rate);
    }

    fn clear_end_notify(&mut self) {
        let mut state = self.state.lock().unwrap();
        if state.live.as_ref().map(|(tag, _)| *tag) == Some(self.tag) {
            state.live = None;
        }
    }

    fn stop(&mut self) {}
}

/// Report the live handle as naturally finished, as a platform engine would.
fn finish_current(state: &Arc<Mutex<OutputState>>) {
    let notifier = state
        .lock()
        .unwrap()
        .live
        .take()
        .map(|(_, notifier)| notifier)
        .expect("no live handle to finish");
    notifier.notify();
}

/// Synthesizer echoing the paragraph text as the payload. Texts containing
/// "[synth-fail]" error out; an optional delay simulates a slow service.
struct EchoSynth {
    delay: Duration,
}

impl EchoSynth {
    fn instant() -> Self {
        Self {
            delay: Duration::ZERO,
        }
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for EchoSynth {
    async fn synthesize(
        &self,
        request: SpeechRequest,
    ) -> bridge_traits::error::Result<SynthesizedSpeech> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if request.text.contains("[synth-fail]") {
            return Err(BridgeError::OperationFailed("service down".to_string()));
        }
        Ok(SynthesizedSpeech::new(Bytes::from(request.text.into_bytes())))
    }
}

/// Decoder producing one frame per payload byte; payloads containing
/// "[decode-fail]" do not decode.
struct LenDecoder;

#[async_trait::async_trait]
impl PayloadDecoder for LenDecoder {
    async fn decode(&self, payload: SynthesizedSpeech) -> core_playback::Result<PcmBuffer> {
        if payload.data.windows(13).any(|w| w == b"[decode-fail]") {
            return Err(core_playback::PlaybackError::DecodingError(
                "undecodable".to_string(),
            ));
        }
        Ok(PcmBuffer::new(vec![0.0; payload.data.len()], 1, 8000))
    }
}

mock! {
    Synth {}

    #[async_trait::async_trait]
    impl SpeechSynthesizer for Synth {
        async fn synthesize(
            &self,
            request: SpeechRequest,
        ) -> bridge_traits::error::Result<SynthesizedSpeech>;
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn story(paragraphs: &[&str]) -> Story {
    Story::new(paragraphs.iter().map(|p| StoryPart::new(*p)).collect())
}

fn controller_with(
    synthesizer: Arc<dyn SpeechSynthesizer>,
) -> (Arc<PlaybackSessionController>, Arc<Mutex<OutputState>>) {
    init_tracing();
    let output = Arc::new(ScriptedOutput::default());
    let state = Arc::clone(&output.state);
    let controller = Arc::new(PlaybackSessionController::new(
        synthesizer,
        Arc::new(LenDecoder),
        output,
    ));
    let pump = Arc::clone(&controller);
    tokio::spawn(async move { pump.run().await });
    (controller, state)
}

async fn wait_for<T: PartialEq + Clone + Send + Sync + 'static>(
    rx: &mut watch::Receiver<T>,
    expected: T,
) {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if *rx.borrow() == expected {
                return;
            }
            rx.changed().await.expect("watch sender dropped");
        }
    })
    .await
    .expect("timed out waiting for observed value");
}

#[tokio::test]
async fn plays_the_whole_story_skipping_failed_paragraphs() {
    let (controller, output) = controller_with(Arc::new(EchoSynth::instant()));
    let mut now_playing = controller.subscribe_now_playing();
    let mut state = controller.subscribe_state();

    controller.load_story(story(&["One.", "Two [synth-fail].", "Three!"]));
    controller.request_playback().await.unwrap();

    assert_eq!(controller.state(), SessionState::Playing);
    wait_for(&mut now_playing, Some(0)).await;

    // Paragraph 1 failed synthesis, so finishing 0 jumps straight to 2.
    finish_current(&output);
    wait_for(&mut now_playing, Some(2)).await;

    finish_current(&output);
    wait_for(&mut now_playing, None).await;
    wait_for(&mut state, SessionState::Ready).await;

    let failures = controller.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].index, 1);
    assert_eq!(failures[0].stage, FailureStage::Synthesis);

    // Payload sizes confirm which paragraphs actually sounded.
    let started: Vec<usize> = output
        .lock()
        .unwrap()
        .started
        .iter()
        .map(|(_, frames, _)| *frames)
        .collect();
    assert_eq!(started, vec!["One.".len(), "Three!".len()]);
}

#[tokio::test]
async fn replay_after_completion_reuses_the_cache() {
    let (controller, output) = controller_with(Arc::new(EchoSynth::instant()));
    let mut now_playing = controller.subscribe_now_playing();
    let mut state = controller.subscribe_state();

    controller.load_story(story(&["Only paragraph."]));
    controller.request_playback().await.unwrap();
    wait_for(&mut now_playing, Some(0)).await;

    finish_current(&output);
    wait_for(&mut state, SessionState::Ready).await;

    // Second request starts from index 0 without another synthesis run.
    controller.request_playback().await.unwrap();
    wait_for(&mut now_playing, Some(0)).await;
    assert_eq!(output.lock().unwrap().started.len(), 2);
}

#[tokio::test]
async fn toggle_pauses_and_resumes_at_the_same_index() {
    let (controller, output) = controller_with(Arc::new(EchoSynth::instant()));
    let mut now_playing = controller.subscribe_now_playing();

    controller.load_story(story(&["One.", "Two."]));
    controller.request_playback().await.unwrap();
    wait_for(&mut now_playing, Some(0)).await;

    finish_current(&output);
    wait_for(&mut now_playing, Some(1)).await;

    controller.request_playback().await.unwrap();
    assert_eq!(controller.state(), SessionState::Paused);
    assert_eq!(controller.current_index(), Some(1));

    controller.request_playback().await.unwrap();
    assert_eq!(controller.state(), SessionState::Playing);
    assert_eq!(controller.current_index(), Some(1));

    // Index 0 once, index 1 twice (initial + resume).
    let starts = output.lock().unwrap().started.len();
    assert_eq!(starts, 3);
}

#[tokio::test]
async fn completion_racing_a_pause_does_not_advance() {
    let (controller, output) = controller_with(Arc::new(EchoSynth::instant()));
    let mut now_playing = controller.subscribe_now_playing();

    controller.load_story(story(&["One.", "Two."]));
    controller.request_playback().await.unwrap();
    wait_for(&mut now_playing, Some(0)).await;

    // Pause clears the end notification before stopping, so there is no
    // live notifier left to fire.
    controller.request_playback().await.unwrap();
    assert_eq!(controller.state(), SessionState::Paused);
    assert!(output.lock().unwrap().live.is_none());
    assert_eq!(controller.current_index(), Some(0));
}

#[tokio::test]
async fn all_failed_paragraphs_reports_no_playable_audio() {
    let (controller, _output) = controller_with(Arc::new(EchoSynth::instant()));

    controller.load_story(story(&["[synth-fail] a", "b [decode-fail]"]));
    let result = controller.request_playback().await;
    assert!(matches!(result, Err(NarrationError::NoPlayableAudio)));
    assert_eq!(controller.state(), SessionState::Idle);
    assert_eq!(controller.failures().len(), 2);
}

#[tokio::test]
async fn invalidation_discards_in_flight_synthesis() {
    let (controller, output) = controller_with(Arc::new(EchoSynth {
        delay: Duration::from_secs(30),
    }));

    controller.load_story(story(&["Slow paragraph."]));
    let requester = Arc::clone(&controller);
    let request = tokio::spawn(async move { requester.request_playback().await });

    let mut state = controller.subscribe_state();
    wait_for(&mut state, SessionState::Synthesizing).await;

    controller.invalidate();
    assert_eq!(controller.state(), SessionState::Idle);

    let result = tokio::time::timeout(Duration::from_secs(2), request)
        .await
        .expect("request did not observe the cancellation")
        .unwrap();
    assert!(matches!(result, Err(NarrationError::Cancelled)));

    // Nothing was applied, nothing ever played.
    assert!(controller.failures().is_empty());
    assert!(output.lock().unwrap().started.is_empty());
    assert!(output.lock().unwrap().closed >= 1);
}

#[tokio::test]
async fn speed_changes_apply_in_place_while_playing() {
    let (controller, output) = controller_with(Arc::new(EchoSynth::instant()));
    let mut now_playing = controller.subscribe_now_playing();

    controller.load_story(story(&["One.", "Two."]));
    controller.request_playback().await.unwrap();
    wait_for(&mut now_playing, Some(0)).await;

    controller.set_speed(1.5).unwrap();
    assert_eq!(output.lock().unwrap().rates, vec![1.5]);
    // Still on the same handle: no restart happened.
    assert_eq!(output.lock().unwrap().started.len(), 1);

    // The next paragraph starts at the new rate.
    finish_current(&output);
    wait_for(&mut now_playing, Some(1)).await;
    let state = output.lock().unwrap();
    assert_eq!(state.started[1].2, 1.5);
}

#[tokio::test]
async fn synthesizer_receives_one_request_per_paragraph_with_the_voice() {
    let mut synth = MockSynth::new();
    synth
        .expect_synthesize()
        .withf(|request: &SpeechRequest| request.voice.as_str() == "Umbriel")
        .times(2)
        .returning(|request| {
            Ok(SynthesizedSpeech::new(Bytes::from(request.text.into_bytes())))
        });

    let (controller, _output) = controller_with(Arc::new(synth));
    controller.set_voice(VoiceId::new("Umbriel"));
    controller.load_story(story(&["One.", "Two."]));
    controller.request_playback().await.unwrap();
    assert_eq!(controller.state(), SessionState::Playing);
}
