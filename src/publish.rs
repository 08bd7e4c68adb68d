//! The two publishing loops.
//!
//! - [`replay`] re-sends the records of a pre-recorded FLV file, paced by the
//!   gaps between their timestamps.
//! - [`generate`] encodes synthetic pictures and audio blocks and sends each
//!   unit when its nominal time comes due. Tracks run independently: every
//!   iteration handles whichever track is due first.
//!
//! Both check the cancellation token once per iteration and end with
//! [`Outcome::Cancelled`] after a best-effort end-of-sequence record, or with
//! [`Outcome::EndOfInput`] when a replayed file runs out.

use crate::amf0::AmfValue;
use crate::codec::avc::DecoderConfigurationRecord;
use crate::codec::{AudioEncoder, VideoEncoder};
use crate::config::{AudioParams, VideoParams};
use crate::error::{Error, Result};
use crate::flv::flv_reader::FlvReader;
use crate::pacer::{nth_tick, Pacer};
use crate::rtmp::Connection;
use crate::session::StreamSession;
use crate::testsrc::{Picture, Waveform};
use log::{debug, info, warn};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::Duration;

/// How a publishing loop ended. Every other ending is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    EndOfInput,
    Cancelled,
}

/// Opens and validates a pre-recorded file. Nothing else is touched if the
/// signature or header is wrong.
pub fn open_input(path: impl AsRef<Path>) -> Result<FlvReader<BufReader<File>>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::resource("input file", e))?;
    let reader = FlvReader::open(BufReader::new(file))?;
    let header = reader.header();
    info!(
        "Opened {}: audio {}, video {}, data offset {}",
        path.display(),
        header.has_audio,
        header.has_video,
        header.data_offset
    );
    Ok(reader)
}

/// Sends every record of `reader` in file order.
pub fn replay<R, C, P>(
    reader: &mut FlvReader<R>,
    session: &mut StreamSession<'_, C>,
    pacer: &mut P,
) -> Result<Outcome>
where
    R: Read,
    C: Connection,
    P: Pacer,
{
    loop {
        if !session.is_running() {
            if reader.header().has_video {
                session.send_end_of_stream(session.last_timestamp().unwrap_or(0));
            } else {
                debug!("Input declares no video, skipping end of sequence");
            }
            info!("Replay cancelled after {} records", session.records_sent());
            return Ok(Outcome::Cancelled);
        }

        let Some(tag) = reader.next_tag()? else {
            info!("End of input after {} records", session.records_sent());
            return Ok(Outcome::EndOfInput);
        };

        let slept = pacer.wait_for(Duration::from_millis(tag.timestamp() as u64));
        debug!(
            "Tag type {} at {} ms, {} bytes, slept {} ms",
            tag.header.tag_type,
            tag.timestamp(),
            tag.data.len(),
            slept.as_millis()
        );
        session.send_tag(&tag)?;
    }
}

/// What the video track shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictureSource {
    /// Luma bands that move with the frame index.
    TestPattern,
    /// One colour, rendered once.
    Solid { y: u8, u: u8, v: u8 },
}

pub struct VideoTrack<'e> {
    encoder: &'e mut dyn VideoEncoder,
    params: VideoParams,
    source: PictureSource,
    picture: Picture,
    frame: u64,
}

impl<'e> VideoTrack<'e> {
    pub fn new(encoder: &'e mut dyn VideoEncoder, params: VideoParams, source: PictureSource) -> Self {
        let mut picture = Picture::new(params.width as usize, params.height as usize);
        if let PictureSource::Solid { y, u, v } = source {
            picture.fill_solid(y, u, v);
        }
        Self {
            encoder,
            params,
            source,
            picture,
            frame: 0,
        }
    }

    fn next_time(&self) -> Duration {
        nth_tick(self.params.frame_duration(), self.frame)
    }
}

pub struct AudioTrack<'e> {
    encoder: &'e mut dyn AudioEncoder,
    params: AudioParams,
    waveform: Waveform,
    block: u64,
}

impl<'e> AudioTrack<'e> {
    /// The block size follows the encoder when it disagrees with `params`.
    pub fn new(encoder: &'e mut dyn AudioEncoder, mut params: AudioParams) -> Self {
        let frame_size = encoder.frame_size();
        if frame_size != 0 && frame_size != params.block_samples as usize {
            warn!(
                "Audio encoder consumes {frame_size} samples per block, not {}",
                params.block_samples
            );
            params.block_samples = frame_size as u32;
        }
        let waveform = Waveform::new(params.channels as usize, params.block_samples as usize);
        Self {
            encoder,
            params,
            waveform,
            block: 0,
        }
    }

    fn next_time(&self) -> Duration {
        nth_tick(self.params.block_duration(), self.block)
    }
}

/// `onMetaData` pairs describing the generated tracks.
pub fn stream_metadata(video: Option<&VideoParams>, audio: Option<&AudioParams>) -> Vec<(&'static str, AmfValue)> {
    let mut pairs = Vec::with_capacity(8);
    if let Some(video) = video {
        pairs.push(("width", AmfValue::Number(video.width as f64)));
        pairs.push(("height", AmfValue::Number(video.height as f64)));
        pairs.push(("framerate", AmfValue::Number(video.frames_per_second())));
        pairs.push(("videocodecid", AmfValue::Number(7.0)));
    }
    if let Some(audio) = audio {
        pairs.push(("audiocodecid", AmfValue::Number(10.0)));
        pairs.push(("audiodatarate", AmfValue::Number(audio.bitrate_kbps as f64)));
        pairs.push(("audiosamplerate", AmfValue::Number(audio.sample_rate as f64)));
        pairs.push(("stereo", AmfValue::Boolean(audio.channels == 2)));
    }
    pairs
}

/// Sends metadata and sequence headers, then encodes and sends units until
/// cancelled.
pub fn generate<C, P>(
    session: &mut StreamSession<'_, C>,
    pacer: &mut P,
    mut video: Option<VideoTrack<'_>>,
    mut audio: Option<AudioTrack<'_>>,
) -> Result<Outcome>
where
    C: Connection,
    P: Pacer,
{
    if video.is_none() && audio.is_none() {
        return Err(Error::Usage("nothing to generate, no track configured".to_string()));
    }

    let metadata = stream_metadata(
        video.as_ref().map(|track| &track.params),
        audio.as_ref().map(|track| &track.params),
    );
    session.send_metadata(&metadata)?;

    if let Some(track) = video.as_mut() {
        let nal_units = track.encoder.header_config()?;
        let config = DecoderConfigurationRecord::from_nal_units(&nal_units)?;
        debug!(
            "AVC profile {} level {}",
            config.profile_indication(),
            config.level_indication()
        );
        session.send_video_config(&config)?;
    }
    if let Some(track) = audio.as_mut() {
        let config = track.encoder.header_config()?;
        session.send_audio_config(&config)?;
    }
    info!("Stream headers sent, generating");

    loop {
        if !session.is_running() {
            match video.as_ref() {
                Some(track) => session.send_end_of_stream(ms(track.next_time())),
                None => debug!("No video track, skipping end of sequence"),
            }
            info!("Generation cancelled after {} records", session.records_sent());
            return Ok(Outcome::Cancelled);
        }

        let video_due = video.as_ref().map(VideoTrack::next_time);
        let audio_due = audio.as_ref().map(AudioTrack::next_time);

        // video goes first on a tie
        let take_video = match (video_due, audio_due) {
            (Some(v), Some(a)) => v <= a,
            (Some(_), None) => true,
            _ => false,
        };

        if take_video {
            if let Some(track) = video.as_mut() {
                video_step(session, pacer, track)?;
            }
        } else if let Some(track) = audio.as_mut() {
            audio_step(session, pacer, track)?;
        }
    }
}

fn video_step<C: Connection, P: Pacer>(
    session: &mut StreamSession<'_, C>,
    pacer: &mut P,
    track: &mut VideoTrack<'_>,
) -> Result<()> {
    let at = track.next_time();
    pacer.wait_for(at);

    if track.source == PictureSource::TestPattern {
        track.picture.fill_test_pattern(track.frame);
    }
    let units = track.encoder.encode(&track.picture)?;
    if units.is_empty() {
        debug!("Video frame {} buffered by the encoder", track.frame);
    }
    for unit in &units {
        if !session.is_running() {
            break;
        }
        session.send_access_unit(ms(at), unit)?;
    }
    track.frame += 1;
    Ok(())
}

fn audio_step<C: Connection, P: Pacer>(
    session: &mut StreamSession<'_, C>,
    pacer: &mut P,
    track: &mut AudioTrack<'_>,
) -> Result<()> {
    let at = track.next_time();
    pacer.wait_for(at);

    let samples = track.waveform.next_block(track.block);
    let units = track.encoder.encode(samples)?;
    for unit in &units {
        if !session.is_running() {
            break;
        }
        session.send_access_unit(ms(at), unit)?;
    }
    track.block += 1;
    Ok(())
}

/// Millisecond record timestamp; wraps at 2^32 ms.
fn ms(at: Duration) -> u32 {
    at.as_millis() as u32
}
