//! # Playback Session Controller
//!
//! Owns narration playback for one loaded story: caches fetched and decoded
//! paragraph audio, drives the sequence player, and exposes observable
//! session state to the host UI.
//!
//! ## Threading model
//!
//! The controller is pure async and spawns nothing; the host runs the
//! [`run`](PlaybackSessionController::run) event pump on its executor. All
//! other operations are short lock-and-mutate calls, with the single
//! exception of the synthesis run inside
//! [`request_playback`](PlaybackSessionController::request_playback), which
//! awaits the settle-all pipeline without holding any lock.
//!
//! ## Invalidation
//!
//! Every synthesis run captures the session's current `CancellationToken`.
//! [`invalidate`](PlaybackSessionController::invalidate) cancels it and
//! installs a fresh one, so a run that was in flight discards its results
//! instead of applying them to the newer session.

use crate::error::{NarrationError, Result};
use crate::fetch::NarrationPipeline;
use crate::story::{ParagraphAudio, ParagraphFailure, SessionState, Story};
use bridge_traits::{AudioOutput, HandleTag, SpeechSynthesizer, VoiceId};
use core_playback::{PayloadDecoder, PlaybackError, PlayerState, SequencePlayer};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct SessionInner {
    story: Option<Story>,
    voice: VoiceId,
    paragraphs: Vec<ParagraphAudio>,
    cancel: CancellationToken,
    /// Set once the platform reported it cannot play audio; playback stays
    /// disabled until the next invalidation.
    output_unavailable: Option<String>,
}

/// Controller for the narration playback of one story session.
pub struct PlaybackSessionController {
    pipeline: NarrationPipeline,
    output: Arc<dyn AudioOutput>,
    player: Mutex<SequencePlayer>,
    end_rx: Mutex<Option<mpsc::UnboundedReceiver<HandleTag>>>,
    inner: Mutex<SessionInner>,
    state_tx: watch::Sender<SessionState>,
    shutdown: CancellationToken,
}

impl PlaybackSessionController {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        decoder: Arc<dyn PayloadDecoder>,
        output: Arc<dyn AudioOutput>,
    ) -> Self {
        let (player, end_rx) = SequencePlayer::new(Arc::clone(&output));
        let (state_tx, _) = watch::channel(SessionState::Idle);
        Self {
            pipeline: NarrationPipeline::new(synthesizer, decoder),
            output,
            player: Mutex::new(player),
            end_rx: Mutex::new(Some(end_rx)),
            inner: Mutex::new(SessionInner {
                story: None,
                voice: VoiceId::default(),
                paragraphs: Vec::new(),
                cancel: CancellationToken::new(),
                output_unavailable: None,
            }),
            state_tx,
            shutdown: CancellationToken::new(),
        }
    }

    /// Observe the session lifecycle state.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Observe which paragraph index is currently sounding.
    pub fn subscribe_now_playing(&self) -> watch::Receiver<Option<usize>> {
        self.player.lock().subscribe_now_playing()
    }

    pub fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.player.lock().current_index()
    }

    pub fn speed(&self) -> f32 {
        self.player.lock().speed()
    }

    pub fn voice(&self) -> VoiceId {
        self.inner.lock().voice.clone()
    }

    /// Per-paragraph failures recorded during the last synthesis run.
    pub fn failures(&self) -> Vec<ParagraphFailure> {
        self.inner
            .lock()
            .paragraphs
            .iter()
            .filter_map(|p| p.failure.clone())
            .collect()
    }

    /// Load a story, invalidating any previous session.
    pub fn load_story(&self, story: Story) {
        self.invalidate();
        info!(paragraphs = story.paragraph_count(), "story loaded");
        self.inner.lock().story = Some(story);
    }

    /// Change the narration voice. Cached audio belongs to the old voice, so
    /// a voice change invalidates the session (the story stays loaded).
    pub fn set_voice(&self, voice: VoiceId) {
        {
            let inner = self.inner.lock();
            if inner.voice == voice {
                return;
            }
        }
        let story = self.inner.lock().story.clone();
        self.invalidate();
        let mut inner = self.inner.lock();
        inner.voice = voice;
        inner.story = story;
    }

    /// Request playback, the single entry point behind the host's play
    /// button.
    ///
    /// From `Idle` this synthesizes and decodes every paragraph (waiting for
    /// all to settle), then starts playback at the first playable index.
    /// From `Ready` it starts at index 0; from `Playing` it pauses; from
    /// `Paused` it resumes at the retained index.
    pub async fn request_playback(&self) -> Result<()> {
        match self.state() {
            SessionState::Synthesizing => {
                debug!("playback requested while synthesis in flight, ignored");
                Ok(())
            }
            SessionState::Playing => {
                // The sequence may have finished in the instant before the
                // pause landed; follow the player's actual state.
                let mut player = self.player.lock();
                player.pause();
                let paused = player.state() == PlayerState::Paused;
                drop(player);
                self.set_state(if paused {
                    SessionState::Paused
                } else {
                    SessionState::Ready
                });
                Ok(())
            }
            SessionState::Paused => self.start_playing(|player| {
                if player.state() == PlayerState::Paused {
                    player.resume()
                } else {
                    player.start(0)
                }
            }),
            SessionState::Ready => self.start_playing(|player| player.start(0)),
            SessionState::Idle => self.synthesize_and_play().await,
        }
    }

    /// Change playback speed, applied in place without restarting the
    /// current paragraph.
    pub fn set_speed(&self, speed: f32) -> Result<()> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(NarrationError::InvalidSpeed(speed));
        }
        self.player.lock().set_speed(speed)?;
        debug!(speed, "playback speed changed");
        Ok(())
    }

    /// Tear down the current session: cancel in-flight synthesis, stop the
    /// active handle, drop cached audio, and release the platform output.
    ///
    /// Safe to call at any point and from any state.
    pub fn invalidate(&self) {
        {
            let mut inner = self.inner.lock();
            inner.cancel.cancel();
            inner.cancel = CancellationToken::new();
            inner.paragraphs.clear();
            inner.output_unavailable = None;
        }
        self.player.lock().clear();
        self.output.close();
        self.set_state(SessionState::Idle);
        debug!("session invalidated");
    }

    /// Invalidate and shut down the event pump. The controller is inert
    /// afterwards.
    pub fn dispose(&self) {
        self.invalidate();
        self.shutdown.cancel();
        info!("narration controller disposed");
    }

    /// Event pump forwarding natural-end notifications into the player.
    ///
    /// The host runs this future on its executor for the controller's whole
    /// lifetime; it completes after [`dispose`](Self::dispose).
    pub async fn run(&self) {
        let mut end_rx = match self.end_rx.lock().take() {
            Some(rx) => rx,
            None => {
                warn!("event pump is already running");
                return;
            }
        };

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                tag = end_rx.recv() => match tag {
                    Some(tag) => self.on_handle_ended(tag),
                    None => break,
                },
            }
        }
        debug!("event pump stopped");
    }

    fn on_handle_ended(&self, tag: HandleTag) {
        let mut player = self.player.lock();
        if let Err(e) = player.handle_ended(tag) {
            warn!(error = %e, "failed to advance after natural end");
        }
        let finished = player.current_index().is_none();
        drop(player);

        // Natural exhaustion: audio stays cached, next request replays.
        if finished && self.state() == SessionState::Playing {
            self.set_state(SessionState::Ready);
            info!("sequence finished");
        }
    }

    async fn synthesize_and_play(&self) -> Result<()> {
        let (texts, voice, cancel) = {
            let inner = self.inner.lock();
            // Re-check under the lock so two racing requests cannot both
            // kick off a synthesis run.
            if self.state() == SessionState::Synthesizing {
                return Ok(());
            }
            let Some(story) = &inner.story else {
                warn!("playback requested with no story loaded");
                return Ok(());
            };
            self.set_state(SessionState::Synthesizing);
            (
                story.parts.iter().map(|p| p.paragraph.clone()).collect::<Vec<_>>(),
                inner.voice.clone(),
                inner.cancel.clone(),
            )
        };

        let paragraphs = match self.pipeline.prepare(&texts, &voice, &cancel).await {
            Ok(paragraphs) => paragraphs,
            Err(e) => {
                if !cancel.is_cancelled() {
                    self.set_state(SessionState::Idle);
                }
                return Err(e);
            }
        };

        // The session may have been invalidated while we were synthesizing;
        // a stale run must never touch the newer session.
        let mut inner = self.inner.lock();
        if cancel.is_cancelled() {
            debug!("discarding settled results for an invalidated session");
            return Err(NarrationError::Cancelled);
        }

        let playable = paragraphs.iter().filter(|p| p.is_playable()).count();
        info!(
            total = paragraphs.len(),
            playable,
            failed = paragraphs.len() - playable,
            "narration prepared"
        );

        let buffers: Vec<_> = paragraphs.iter().map(|p| p.buffer.clone()).collect();
        inner.paragraphs = paragraphs;
        drop(inner);

        if playable == 0 {
            self.set_state(SessionState::Idle);
            return Err(NarrationError::NoPlayableAudio);
        }

        self.player.lock().load(buffers);
        self.start_playing(|player| player.start(0))
    }

    /// Run a player operation expected to leave audio sounding, mapping the
    /// outcome onto the session state.
    fn start_playing(
        &self,
        op: impl FnOnce(&mut SequencePlayer) -> core_playback::Result<()>,
    ) -> Result<()> {
        {
            let inner = self.inner.lock();
            if let Some(message) = &inner.output_unavailable {
                return Err(NarrationError::UnsupportedPlatform(message.clone()));
            }
        }

        let result = op(&mut self.player.lock());
        match result {
            Ok(()) => {
                self.set_state(SessionState::Playing);
                Ok(())
            }
            Err(PlaybackError::AudioOutputUnavailable(message)) => {
                warn!("audio output unavailable, playback disabled for this session");
                self.inner.lock().output_unavailable = Some(message.clone());
                self.set_state(SessionState::Ready);
                Err(NarrationError::UnsupportedPlatform(message))
            }
            Err(e) => {
                self.set_state(SessionState::Ready);
                Err(e.into())
            }
        }
    }

    fn set_state(&self, state: SessionState) {
        self.state_tx.send_if_modified(|value| {
            if *value == state {
                false
            } else {
                *value = state;
                true
            }
        });
    }
}

impl Drop for PlaybackSessionController {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
