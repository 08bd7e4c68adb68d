//! libx264 and AAC encoders on top of `ffmpeg-next`.
//!
//! Both encoders are opened with `GLOBAL_HEADER`, so the parameter sets (SPS/PPS,
//! AudioSpecificConfig) come out once as extradata instead of in front of every
//! keyframe. Video output is converted from Annex-B to 4-byte length prefixes.

use crate::codec::aac::{self, AOT_AAC_LC};
use crate::codec::avc::{self, NalFraming};
use crate::codec::{AccessUnit, AudioEncoder, VideoEncoder};
use crate::config::{AudioParams, VideoParams};
use crate::error::{Error, Result};
use crate::testsrc::Picture;
use bytes::Bytes;
use ffmpeg_next::format::{sample, Pixel, Sample};
use ffmpeg_next::util::error::EAGAIN;
use ffmpeg_next::{codec, encoder, frame, ChannelLayout, Dictionary, Packet, Rational};
use log::{debug, info};

/// Initialises FFmpeg once per process. Safe to call repeatedly.
pub fn init() -> Result<()> {
    ffmpeg_next::init().map_err(|e| Error::Encoder(format!("Failed to initialize FFmpeg: {e}")))
}

fn ffmpeg_error(what: &'static str) -> impl Fn(ffmpeg_next::Error) -> Error {
    move |e| Error::Encoder(format!("{what}: {e}"))
}

/// Copies the encoder's extradata out of the codec context.
fn extradata(context: &codec::Context) -> Option<Vec<u8>> {
    // SAFETY: reading extradata requires:
    // - as_ptr() returns the live AVCodecContext owned by `context`
    // - extradata points to extradata_size valid bytes when non-null, set by
    //   avcodec_open2 and not modified while we hold a shared reference
    unsafe {
        let ctx = context.as_ptr();
        let data = (*ctx).extradata;
        let size = (*ctx).extradata_size;
        if data.is_null() || size <= 0 {
            return None;
        }
        Some(std::slice::from_raw_parts(data, size as usize).to_vec())
    }
}

/// Drains every packet the encoder has ready.
fn receive_packets(
    encoder: &mut encoder::Encoder,
    mut on_packet: impl FnMut(&Packet) -> Result<()>,
) -> Result<()> {
    let mut packet = Packet::empty();
    loop {
        match encoder.receive_packet(&mut packet) {
            Ok(()) => on_packet(&packet)?,
            Err(ffmpeg_next::Error::Other { errno }) if errno == EAGAIN => return Ok(()),
            Err(ffmpeg_next::Error::Eof) => return Ok(()),
            Err(e) => return Err(ffmpeg_error("Failed to receive packet")(e)),
        }
    }
}

/// H.264 through libx264, tuned for live output: no B-frames, no lookahead.
pub struct X264Encoder {
    encoder: encoder::video::Encoder,
    frame: frame::Video,
    time_base: Rational,
    framing: NalFraming,
    pts: i64,
}

impl X264Encoder {
    pub fn open(params: &VideoParams) -> Result<Self> {
        let codec = encoder::find_by_name("libx264")
            .ok_or_else(|| Error::Encoder("libx264 encoder not found".to_string()))?;
        let mut video = codec::Context::new_with_codec(codec)
            .encoder()
            .video()
            .map_err(ffmpeg_error("Failed to create video encoder"))?;

        let (num, den) = params.frame_rate;
        let time_base = Rational::new(den as i32, num as i32);
        video.set_width(params.width);
        video.set_height(params.height);
        video.set_format(Pixel::YUV420P);
        video.set_time_base(time_base);
        video.set_frame_rate(Some(Rational::new(num as i32, den as i32)));
        video.set_gop(params.keyframe_interval);
        video.set_max_b_frames(0);
        video.set_flags(codec::Flags::GLOBAL_HEADER);
        if let Some(kbps) = params.bitrate_kbps {
            video.set_bit_rate(kbps as usize * 1000);
        }

        let mut opts = Dictionary::new();
        opts.set("preset", "veryfast");
        opts.set("tune", "zerolatency");
        opts.set("profile", "baseline");
        if params.bitrate_kbps.is_none() {
            opts.set("crf", "25");
        }
        let encoder = video
            .open_with(opts)
            .map_err(ffmpeg_error("Failed to open libx264"))?;
        let framing = extradata(&encoder)
            .map(|data| NalFraming::from_extradata(&data))
            .unwrap_or(NalFraming::AnnexB);
        info!(
            "libx264 opened: {}x{} at {}/{} fps, keyframe every {} frames, {:?} output",
            params.width, params.height, num, den, params.keyframe_interval, framing
        );

        Ok(Self {
            encoder,
            frame: frame::Video::new(Pixel::YUV420P, params.width, params.height),
            time_base,
            framing,
            pts: 0,
        })
    }

    fn fill_frame(&mut self, picture: &Picture) {
        let planes: [(&[u8], usize); 3] = [
            (&picture.y, picture.width),
            (&picture.u, picture.chroma_width()),
            (&picture.v, picture.chroma_width()),
        ];
        for (index, (source, width)) in planes.into_iter().enumerate() {
            let stride = self.frame.stride(index);
            let target = self.frame.data_mut(index);
            for (row, line) in source.chunks_exact(width).enumerate() {
                let start = row * stride;
                if let Some(dest) = target.get_mut(start..start + width) {
                    dest.copy_from_slice(line);
                }
            }
        }
    }
}

impl VideoEncoder for X264Encoder {
    fn header_config(&mut self) -> Result<Vec<Bytes>> {
        let data = extradata(&self.encoder)
            .ok_or_else(|| Error::Encoder("libx264 produced no header extradata".to_string()))?;
        let nal_units: Vec<Bytes> = match self.framing {
            NalFraming::AnnexB => avc::split_annex_b(&data)
                .into_iter()
                .map(Bytes::copy_from_slice)
                .collect(),
            NalFraming::LengthPrefixed => avc::parameter_sets_from_avcc(&data)?
                .into_iter()
                .map(Bytes::copy_from_slice)
                .collect(),
        };
        debug!("libx264 header: {} NAL units", nal_units.len());
        Ok(nal_units)
    }

    fn encode(&mut self, picture: &Picture) -> Result<Vec<AccessUnit>> {
        self.fill_frame(picture);
        self.frame.set_pts(Some(self.pts));
        self.pts += 1;
        self.encoder
            .send_frame(&self.frame)
            .map_err(ffmpeg_error("Failed to encode picture"))?;

        let time_base = self.time_base;
        let framing = self.framing;
        let mut units = Vec::new();
        receive_packets(&mut self.encoder, |packet| {
            let Some(data) = packet.data() else {
                return Ok(());
            };
            let offset = match (packet.pts(), packet.dts()) {
                (Some(pts), Some(dts)) => {
                    (pts - dts) * 1000 * time_base.numerator() as i64 / time_base.denominator().max(1) as i64
                }
                _ => 0,
            };
            units.push(
                AccessUnit::video(avc::to_length_prefixed(data, framing), packet.is_key())
                    .with_composition_time_offset(offset as i32),
            );
            Ok(())
        })?;
        Ok(units)
    }
}

/// AAC-LC through FFmpeg's native encoder, fed planar float samples.
pub struct AacEncoder {
    encoder: encoder::audio::Encoder,
    frame: frame::Audio,
    channels: usize,
    frame_size: usize,
    config: Bytes,
    pts: i64,
}

impl AacEncoder {
    pub fn open(params: &AudioParams) -> Result<Self> {
        let codec = encoder::find_by_name("aac")
            .ok_or_else(|| Error::Encoder("aac encoder not found".to_string()))?;
        let mut audio = codec::Context::new_with_codec(codec)
            .encoder()
            .audio()
            .map_err(ffmpeg_error("Failed to create audio encoder"))?;

        let layout = match params.channels {
            1 => ChannelLayout::MONO,
            _ => ChannelLayout::STEREO,
        };
        let format = Sample::F32(sample::Type::Planar);
        audio.set_rate(params.sample_rate as i32);
        audio.set_format(format);
        audio.set_bit_rate(params.bitrate_kbps as usize * 1000);
        audio.set_time_base(Rational::new(1, params.sample_rate as i32));
        audio.set_flags(codec::Flags::GLOBAL_HEADER);
        // SAFETY: av_channel_layout_default requires:
        // - a valid, writable AVChannelLayout, here the one embedded in the
        //   encoder's AVCodecContext, which is not opened yet
        // - nb_channels > 0
        unsafe {
            ffmpeg_sys_next::av_channel_layout_default(
                &mut (*audio.as_mut_ptr()).ch_layout,
                params.channels.max(1) as i32,
            );
        }

        let encoder = audio
            .open_with(Dictionary::new())
            .map_err(ffmpeg_error("Failed to open aac encoder"))?;

        let frame_size = match encoder.frame_size() {
            0 => params.block_samples as usize,
            n => n as usize,
        };
        let config = match extradata(&encoder) {
            Some(data) => Bytes::from(data),
            None => {
                let asc = aac::audio_specific_config(AOT_AAC_LC, params.sample_rate, params.channels as u8)
                    .ok_or_else(|| {
                        Error::Encoder(format!("No AAC configuration for {} Hz", params.sample_rate))
                    })?;
                Bytes::copy_from_slice(&asc)
            }
        };
        info!(
            "aac opened: {} Hz, {} channels, {} kbps, {} samples per frame",
            params.sample_rate, params.channels, params.bitrate_kbps, frame_size
        );

        let mut frame = frame::Audio::new(format, frame_size, layout);
        frame.set_rate(params.sample_rate);

        Ok(Self {
            encoder,
            frame,
            channels: params.channels as usize,
            frame_size,
            config,
            pts: 0,
        })
    }
}

impl AudioEncoder for AacEncoder {
    fn header_config(&mut self) -> Result<Bytes> {
        Ok(self.config.clone())
    }

    fn frame_size(&self) -> usize {
        self.frame_size
    }

    fn encode(&mut self, samples: &[i16]) -> Result<Vec<AccessUnit>> {
        let channels = self.channels.max(1);
        for channel in 0..channels {
            let plane = self.frame.data_mut(channel);
            for (out, frame) in plane.chunks_exact_mut(4).zip(samples.chunks_exact(channels)) {
                let value = frame[channel] as f32 / 32768.0;
                out.copy_from_slice(&value.to_ne_bytes());
            }
        }
        self.frame.set_pts(Some(self.pts));
        self.pts += self.frame_size as i64;
        self.encoder
            .send_frame(&self.frame)
            .map_err(ffmpeg_error("Failed to encode audio block"))?;

        let mut units = Vec::new();
        receive_packets(&mut self.encoder, |packet| {
            if let Some(data) = packet.data() {
                units.push(AccessUnit::audio(Bytes::copy_from_slice(data)));
            }
            Ok(())
        })?;
        Ok(units)
    }
}
