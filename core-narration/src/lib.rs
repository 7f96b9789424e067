//! # Core Narration
//!
//! Story narration for the picture-tales reader: turns a generated story's
//! paragraphs into audio through a host-provided narration service, decodes
//! the payloads, and plays them back as one gapless sequence.
//!
//! Hosts construct a [`PlaybackSessionController`] with their bridge
//! implementations, run its event pump, and wire the play button to
//! [`request_playback`](PlaybackSessionController::request_playback):
//!
//! ```no_run
//! # async fn example() -> core_narration::Result<()> {
//! use std::sync::Arc;
//! use core_narration::{PlaybackSessionController, Story, StoryPart};
//! use core_playback::SymphoniaDecoder;
//! # let synthesizer: Arc<dyn bridge_traits::SpeechSynthesizer> = todo!();
//! # let output: Arc<dyn bridge_traits::AudioOutput> = todo!();
//!
//! let controller = Arc::new(PlaybackSessionController::new(
//!     synthesizer,
//!     Arc::new(SymphoniaDecoder::new()),
//!     output,
//! ));
//!
//! let pump = Arc::clone(&controller);
//! tokio::spawn(async move { pump.run().await });
//!
//! controller.load_story(Story::new(vec![StoryPart::new("Once upon a time.")]));
//! controller.request_playback().await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod fetch;
pub mod session;
pub mod story;

pub use error::{NarrationError, Result};
pub use fetch::NarrationPipeline;
pub use session::PlaybackSessionController;
pub use story::{
    FailureStage, ParagraphAudio, ParagraphFailure, SessionState, Story, StoryPart,
};
