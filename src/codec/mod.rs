//! The **codec** module frames encoder output into audio/video record payloads and
//! defines the seams behind which the actual encoders live.
//!
//! Encoding itself is delegated to a [`VideoEncoder`] / [`AudioEncoder`]. With the
//! `ffmpeg` feature enabled, [`ffmpeg`] provides libx264 and AAC implementations on top
//! of `ffmpeg-next`; tests plug in fixed-output doubles.

pub mod aac;
pub mod avc;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;

use crate::error::Result;
use crate::testsrc::Picture;
use bytes::Bytes;

/// Codec carried by an [`AccessUnit`], mirroring the FLV codec id nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecSubtype {
    /// H.264, FLV video codec id 7.
    Avc,
    /// AAC, FLV sound format 10.
    Aac,
}

impl CodecSubtype {
    pub fn flv_codec_id(self) -> u8 {
        match self {
            CodecSubtype::Avc => 7,
            CodecSubtype::Aac => 10,
        }
    }
}

/// One chunk of compressed data as handed out by an encoder.
///
/// For video `data` is already in length-prefixed (AVCC) form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessUnit {
    pub subtype: CodecSubtype,
    pub data: Bytes,
    pub is_keyframe: bool,
    /// PTS minus DTS in milliseconds, 0 for streams without reordering.
    pub composition_time_offset: i32,
}

impl AccessUnit {
    pub fn video(data: impl Into<Bytes>, is_keyframe: bool) -> Self {
        Self {
            subtype: CodecSubtype::Avc,
            data: data.into(),
            is_keyframe,
            composition_time_offset: 0,
        }
    }

    pub fn audio(data: impl Into<Bytes>) -> Self {
        Self {
            subtype: CodecSubtype::Aac,
            data: data.into(),
            is_keyframe: true,
            composition_time_offset: 0,
        }
    }

    pub fn with_composition_time_offset(mut self, offset: i32) -> Self {
        self.composition_time_offset = offset;
        self
    }
}

pub trait VideoEncoder {
    /// The parameter-set NAL units the encoder emits once up front, without start
    /// codes or length prefixes.
    fn header_config(&mut self) -> Result<Vec<Bytes>>;

    /// Encodes one picture. Buffering encoders may return no units at all.
    fn encode(&mut self, picture: &Picture) -> Result<Vec<AccessUnit>>;
}

pub trait AudioEncoder {
    /// Raw AudioSpecificConfig bytes for the audio sequence header.
    fn header_config(&mut self) -> Result<Bytes>;

    /// Number of samples per channel the encoder consumes per call.
    fn frame_size(&self) -> usize;

    /// Encodes one block of interleaved signed 16-bit samples.
    fn encode(&mut self, samples: &[i16]) -> Result<Vec<AccessUnit>>;
}
