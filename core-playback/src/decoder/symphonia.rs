//! Symphonia-backed payload decoder.

use crate::decoder::PayloadDecoder;
use crate::error::{PlaybackError, Result};
use bridge_traits::{PcmBuffer, SynthesizedSpeech};
use std::io::Cursor;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::IntoSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use tracing::{debug, warn};

/// Corrupt packets are skipped; this caps how many in a row before giving up.
const MAX_CONSECUTIVE_ERRORS: usize = 10;

/// Whole-payload decoder implementing [`PayloadDecoder`] on top of Symphonia.
///
/// The decoder is stateless: every call probes the payload, selects the first
/// audio track, and drains all packets into a single interleaved f32 buffer.
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self
    }

    fn decode_payload(payload: SynthesizedSpeech) -> Result<PcmBuffer> {
        let mut hint = Hint::new();
        if let Some(mime) = payload.mime_type.as_deref() {
            debug!(mime, "probing payload with MIME hint");
            hint.mime_type(mime);
        }

        let media_source =
            Box::new(Cursor::new(payload.data.to_vec())) as Box<dyn MediaSource>;
        let mss = MediaSourceStream::new(media_source, Default::default());

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| PlaybackError::InvalidFormat(format!("Failed to probe format: {}", e)))?;

        let mut format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| {
                PlaybackError::FormatNotDecodable("No supported audio tracks".to_string())
            })?;
        let track_id = track.id;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| {
                PlaybackError::DecoderError(format!("Failed to create codec decoder: {}", e))
            })?;

        let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
        let mut channels = track
            .codec_params
            .channels
            .map(|ch| ch.count() as u16)
            .unwrap_or(0);

        let mut samples: Vec<f32> = Vec::new();
        let mut consecutive_errors = 0;

        loop {
            let packet = match format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => {
                    return Err(PlaybackError::DecoderError(
                        "Track list changed, reset required".to_string(),
                    ));
                }
                Err(SymphoniaError::IoError(e)) => {
                    consecutive_errors += 1;
                    warn!(
                        attempt = consecutive_errors,
                        "I/O error reading packet: {}", e
                    );
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        return Err(PlaybackError::CorruptedPayload(format!(
                            "Payload I/O failure after {} attempts: {}",
                            MAX_CONSECUTIVE_ERRORS, e
                        )));
                    }
                    continue;
                }
                Err(e) => {
                    return Err(PlaybackError::DecodingError(format!(
                        "Failed to read packet: {}",
                        e
                    )));
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    consecutive_errors = 0;
                    let spec = decoded.spec();
                    sample_rate = spec.rate;
                    channels = spec.channels.count() as u16;
                    append_interleaved_f32(&decoded, &mut samples);
                }
                Err(SymphoniaError::IoError(e)) => {
                    consecutive_errors += 1;
                    warn!(
                        attempt = consecutive_errors,
                        "skipping corrupted packet: {}", e
                    );
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        return Err(PlaybackError::CorruptedPayload(format!(
                            "Payload corruption after {} failed packets",
                            MAX_CONSECUTIVE_ERRORS
                        )));
                    }
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    consecutive_errors += 1;
                    warn!(
                        attempt = consecutive_errors,
                        "skipping packet with decode error: {}", e
                    );
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        return Err(PlaybackError::DecoderError(format!(
                            "Decoder failure after {} failed packets: {}",
                            MAX_CONSECUTIVE_ERRORS, e
                        )));
                    }
                }
                Err(e) => {
                    return Err(PlaybackError::DecoderError(format!(
                        "Failed to decode packet: {}",
                        e
                    )));
                }
            }
        }

        if samples.is_empty() || sample_rate == 0 || channels == 0 {
            return Err(PlaybackError::DecodingError(
                "Payload decoded to zero audio frames".to_string(),
            ));
        }

        let buffer = PcmBuffer::new(samples, channels, sample_rate);
        debug!(
            frames = buffer.frames(),
            sample_rate,
            channels,
            "payload decoded"
        );
        Ok(buffer)
    }
}

impl Default for SymphoniaDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
impl PayloadDecoder for SymphoniaDecoder {
    async fn decode(&self, payload: SynthesizedSpeech) -> Result<PcmBuffer> {
        Self::decode_payload(payload)
    }
}

/// Append a decoded Symphonia buffer as interleaved f32 samples.
///
/// Symphonia outputs audio in various formats (i16, i24, i32, f32, f64) and a
/// planar layout; everything is normalized here to interleaved f32 in the
/// range `[-1.0, 1.0]`.
fn append_interleaved_f32(buffer: &AudioBufferRef<'_>, out: &mut Vec<f32>) {
    match buffer {
        AudioBufferRef::F32(buf) => append_planes(buf, |s| s, out),
        AudioBufferRef::F64(buf) => append_planes(buf, |s: f64| s.into_sample(), out),
        AudioBufferRef::S32(buf) => append_planes(buf, |s: i32| s.into_sample(), out),
        AudioBufferRef::S24(buf) => append_planes(buf, |s| IntoSample::into_sample(s), out),
        AudioBufferRef::S16(buf) => append_planes(buf, |s: i16| s.into_sample(), out),
        AudioBufferRef::S8(buf) => append_planes(buf, |s: i8| s.into_sample(), out),
        AudioBufferRef::U32(buf) => append_planes(buf, |s: u32| s.into_sample(), out),
        AudioBufferRef::U24(buf) => append_planes(buf, |s| IntoSample::into_sample(s), out),
        AudioBufferRef::U16(buf) => append_planes(buf, |s: u16| s.into_sample(), out),
        AudioBufferRef::U8(buf) => append_planes(buf, |s: u8| s.into_sample(), out),
    }
}

fn append_planes<T>(buf: &AudioBuffer<T>, convert: impl Fn(T) -> f32, out: &mut Vec<f32>)
where
    T: Sample + Copy,
{
    let num_channels = buf.spec().channels.count();
    let num_frames = buf.frames();
    out.reserve(num_frames * num_channels);

    for frame_idx in 0..num_frames {
        for chan_idx in 0..num_channels {
            out.push(convert(buf.chan(chan_idx)[frame_idx]));
        }
    }
}
