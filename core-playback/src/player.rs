//! # Sequence Player
//!
//! Plays an ordered list of decoded narration buffers back-to-back with no
//! gap, tracking which index is currently sounding.
//!
//! ## State machine
//!
//! `Idle -> Playing -> Paused -> Playing (resume) -> ... -> Idle` (terminal,
//! reached when the sequence is exhausted or stop is called). All transitions
//! go through the operations below; nothing else mutates playback state.
//!
//! ## The natural-end race
//!
//! Platform engines report "buffer finished" asynchronously, so a completion
//! can arrive after an explicit stop or pause already happened. Every started
//! handle therefore gets a fresh [`HandleTag`], and [`handle_ended`]
//! (`SequencePlayer::handle_ended`) only advances when the reported tag is
//! the live one AND the player is still `Playing`. Additionally, every
//! transition that stops a handle clears its end notification before issuing
//! the stop, so a stop is never reported back as natural completion.

use crate::error::{PlaybackError, Result};
use bridge_traits::{ActiveHandle, AudioOutput, BridgeError, EndNotifier, HandleTag, PcmBuffer};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::debug;

/// Playback lifecycle state of the sequence player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    Playing,
    Paused,
}

/// Sequential, gapless player over an index-aligned buffer list.
///
/// Entries may be absent (failed fetch or decode); they are skipped during
/// playback. At most one platform handle is live at any instant.
pub struct SequencePlayer {
    output: Arc<dyn AudioOutput>,
    buffers: Vec<Option<Arc<PcmBuffer>>>,
    state: PlayerState,
    current: Option<usize>,
    speed: f32,
    next_tag: u64,
    active: Option<(HandleTag, Box<dyn ActiveHandle>)>,
    end_tx: mpsc::UnboundedSender<HandleTag>,
    now_playing: watch::Sender<Option<usize>>,
}

impl SequencePlayer {
    /// Create a player over the given platform output.
    ///
    /// The returned receiver delivers natural-end tags; the owner must pump
    /// it into [`handle_ended`](Self::handle_ended).
    pub fn new(output: Arc<dyn AudioOutput>) -> (Self, mpsc::UnboundedReceiver<HandleTag>) {
        let (end_tx, end_rx) = mpsc::unbounded_channel();
        let (now_playing, _) = watch::channel(None);
        (
            Self {
                output,
                buffers: Vec::new(),
                state: PlayerState::Idle,
                current: None,
                speed: 1.0,
                next_tag: 0,
                active: None,
                end_tx,
                now_playing,
            },
            end_rx,
        )
    }

    /// Observe which index is currently sounding (for highlight/auto-scroll).
    pub fn subscribe_now_playing(&self) -> watch::Receiver<Option<usize>> {
        self.now_playing.subscribe()
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Replace the buffer list. Stops any current playback first.
    ///
    /// Only the session controller calls this, and only once the full list
    /// for the session has settled.
    pub fn load(&mut self, buffers: Vec<Option<Arc<PcmBuffer>>>) {
        self.stop();
        self.buffers = buffers;
    }

    /// Stop playback and discard the buffer list.
    pub fn clear(&mut self) {
        self.stop();
        self.buffers.clear();
    }

    /// Begin playback at the first present buffer at or after `from`.
    ///
    /// Valid from `Idle` or `Paused`; also invoked internally on natural end
    /// to auto-advance. Absent entries are skipped synchronously; if no
    /// present entry remains, the player transitions to terminal `Idle` with
    /// no handle created.
    pub fn start(&mut self, from: usize) -> Result<()> {
        self.stop_active();

        let Some((index, buffer)) = self.next_present(from) else {
            self.finish();
            return Ok(());
        };

        let tag = HandleTag::new(self.next_tag);
        self.next_tag += 1;
        let notifier = EndNotifier::new(tag, self.end_tx.clone());

        let handle = match self.output.start(buffer, self.speed, notifier) {
            Ok(handle) => handle,
            Err(BridgeError::NotAvailable(message)) => {
                self.finish();
                return Err(PlaybackError::AudioOutputUnavailable(message));
            }
            Err(e) => {
                self.finish();
                return Err(PlaybackError::PlaybackFailed(e.to_string()));
            }
        };

        self.active = Some((tag, handle));
        self.current = Some(index);
        self.state = PlayerState::Playing;
        self.set_now_playing(Some(index));
        debug!(index, tag = tag.raw(), speed = self.speed, "now playing");
        Ok(())
    }

    /// React to a natural end-of-buffer notification.
    ///
    /// Stale notifications (wrong tag, or the player already left `Playing`)
    /// are no-ops. A live notification auto-advances to the next present
    /// index, or finishes the sequence.
    pub fn handle_ended(&mut self, tag: HandleTag) -> Result<()> {
        if self.state != PlayerState::Playing {
            debug!(tag = tag.raw(), "end notification after leaving Playing, ignored");
            return Ok(());
        }
        match &self.active {
            Some((active_tag, _)) if *active_tag == tag => {}
            _ => {
                debug!(tag = tag.raw(), "stale end notification, ignored");
                return Ok(());
            }
        }

        // The handle finished on its own; no stop needed.
        self.active = None;
        let next = self.current.map(|i| i + 1).unwrap_or(0);
        self.start(next)
    }

    /// Pause playback, retaining the current index.
    pub fn pause(&mut self) {
        if self.state != PlayerState::Playing {
            debug!(state = ?self.state, "pause ignored");
            return;
        }
        self.stop_active();
        self.state = PlayerState::Paused;
        debug!(index = ?self.current, "paused");
    }

    /// Resume playback at the paused index.
    pub fn resume(&mut self) -> Result<()> {
        if self.state != PlayerState::Paused {
            debug!(state = ?self.state, "resume ignored");
            return Ok(());
        }
        let from = self.current.unwrap_or(0);
        self.start(from)
    }

    /// Stop playback from any state. Terminal: clears the current index.
    pub fn stop(&mut self) {
        self.stop_active();
        self.state = PlayerState::Idle;
        self.current = None;
        self.set_now_playing(None);
    }

    /// Change playback speed, applied in place to the active handle and used
    /// for all subsequent starts.
    pub fn set_speed(&mut self, speed: f32) -> Result<()> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(PlaybackError::InvalidSpeed(speed));
        }
        self.speed = speed;
        if let Some((_, handle)) = &mut self.active {
            handle.set_rate(speed);
        }
        Ok(())
    }

    /// Stop the live handle, clearing its end notification first so the stop
    /// cannot be mistaken for natural completion.
    fn stop_active(&mut self) {
        if let Some((tag, mut handle)) = self.active.take() {
            handle.clear_end_notify();
            handle.stop();
            debug!(tag = tag.raw(), "stopped active handle");
        }
    }

    /// Transition to terminal Idle after exhaustion (or a failed start).
    fn finish(&mut self) {
        self.state = PlayerState::Idle;
        self.current = None;
        self.set_now_playing(None);
    }

    fn next_present(&self, from: usize) -> Option<(usize, Arc<PcmBuffer>)> {
        self.buffers
            .iter()
            .enumerate()
            .skip(from)
            .find_map(|(index, buffer)| buffer.as_ref().map(|b| (index, Arc::clone(b))))
    }

    fn set_now_playing(&self, index: Option<usize>) {
        self.now_playing.send_if_modified(|value| {
            if *value == index {
                false
            } else {
                *value = index;
                true
            }
        });
    }
}
