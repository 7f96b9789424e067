//! # Desktop Bridge
//!
//! Desktop (native) implementations of the platform bridge traits, backed by
//! the tokio/reqwest ecosystem.
//!
//! Currently provides:
//! - [`HttpSpeechSynthesizer`]: narration service client over HTTP

pub mod speech;

pub use speech::{parse_data_uri, HttpSpeechSynthesizer, RetryPolicy};
