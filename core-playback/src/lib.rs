//! # Core Playback
//!
//! Platform-agnostic narration playback: decoding text-to-speech payloads
//! into PCM and playing a paragraph sequence gaplessly through a
//! host-provided audio output.
//!
//! ## Architecture
//!
//! - [`decoder`]: whole-payload decoding (Symphonia) behind the
//!   [`PayloadDecoder`] trait
//! - [`player`]: the [`SequencePlayer`] state machine driving sequential,
//!   index-addressed playback
//! - [`error`]: error taxonomy shared by both
//!
//! The crate never talks to an audio device itself; hosts supply an
//! implementation of `bridge_traits::AudioOutput`.

pub mod decoder;
pub mod error;
pub mod player;

pub use decoder::{PayloadDecoder, SymphoniaDecoder};
pub use error::{PlaybackError, Result};
pub use player::{PlayerState, SequencePlayer};
