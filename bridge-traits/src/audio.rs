//! Platform audio output bridge traits and shared audio types.
//!
//! The sequence player drives platform audio engines through these
//! abstractions. A host supplies an [`AudioOutput`] (one per component
//! lifetime, opened lazily on the first start and released via
//! [`AudioOutput::close`]); each started buffer is represented by an
//! [`ActiveHandle`] that can change rate in place, detach its end
//! notification, and stop.
//!
//! Natural end-of-buffer is reported through an [`EndNotifier`] handed to the
//! implementation at start time. The notifier carries a [`HandleTag`] so the
//! consumer can tell a live handle's completion apart from a stale one that
//! raced with an explicit stop.

use crate::{
    error::Result,
    platform::{PlatformSend, PlatformSendSync},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Decoded PCM audio ready for playback.
///
/// Samples are interleaved f32 in the range `[-1.0, 1.0]` (stereo is
/// LRLRLR...), matching what decoders emit and what platform engines consume.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    /// Interleaved PCM samples normalized to `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Number of audio channels.
    pub channels: u16,
    /// Sample rate in hertz.
    pub sample_rate: u32,
}

impl PcmBuffer {
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        Self {
            samples,
            channels,
            sample_rate,
        }
    }

    /// Number of frames (one sample per channel).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    /// Playback duration at the nominal rate.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Returns `true` if the buffer contains no sample data.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Tag identifying one started playback handle.
///
/// Tags are minted by the consumer and increase monotonically; an end
/// notification carrying anything but the live tag is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleTag(u64);

impl HandleTag {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// One-shot end-of-playback notification.
///
/// Implementations invoke [`EndNotifier::notify`] exactly once when playback
/// reaches the end of the buffer naturally. Dropping the notifier (which is
/// what [`ActiveHandle::clear_end_notify`] does) detaches it, so an explicit
/// stop is never mistaken for natural completion.
#[derive(Debug)]
pub struct EndNotifier {
    tag: HandleTag,
    tx: mpsc::UnboundedSender<HandleTag>,
}

impl EndNotifier {
    pub fn new(tag: HandleTag, tx: mpsc::UnboundedSender<HandleTag>) -> Self {
        Self { tag, tx }
    }

    /// Tag this notifier will report.
    pub fn tag(&self) -> HandleTag {
        self.tag
    }

    /// Report natural end of playback. Consumes the notifier.
    pub fn notify(self) {
        // The receiver may already be gone during teardown.
        let _ = self.tx.send(self.tag);
    }
}

/// Trait for platform audio outputs.
///
/// Exactly one output exists per component lifetime. Implementations open the
/// underlying platform resource lazily on the first [`start`](Self::start)
/// call and must release it in [`close`](Self::close); a closed output reopens
/// on the next start.
pub trait AudioOutput: PlatformSendSync {
    /// Begin playback of `buffer` from its start at `rate`.
    ///
    /// The returned handle is the only way to control the sounding buffer.
    /// `on_end` must be invoked exactly once on natural completion, unless the
    /// handle's end notification was cleared or the handle stopped first.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NotAvailable`](crate::BridgeError::NotAvailable)
    /// when the platform has no usable audio output, and
    /// [`BridgeError::OperationFailed`](crate::BridgeError::OperationFailed)
    /// for other engine errors.
    fn start(
        &self,
        buffer: Arc<PcmBuffer>,
        rate: f32,
        on_end: EndNotifier,
    ) -> Result<Box<dyn ActiveHandle>>;

    /// Release the platform audio resource.
    fn close(&self);
}

/// A live, stoppable playback instance bound to one buffer.
pub trait ActiveHandle: PlatformSend {
    /// Change the playback rate in place without restarting the buffer.
    fn set_rate(&mut self, rate: f32);

    /// Detach the end notification so a subsequent stop is not reported as
    /// natural completion.
    fn clear_end_notify(&mut self);

    /// Stop playback immediately.
    fn stop(&mut self);
}
