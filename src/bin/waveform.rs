use clap::Parser;
use flvcast::codec::ffmpeg::{self, AacEncoder, X264Encoder};
use flvcast::config::{AudioParams, PublishArgs, VideoParams};
use flvcast::error::{Error, Result};
use flvcast::flv::flv_header::FlvHeader;
use flvcast::flv::mirror::FlvMirror;
use flvcast::pacer::TickPacer;
use flvcast::publish::{self, AudioTrack, Outcome, PictureSource, VideoTrack};
use flvcast::{CancellationToken, RtmpConnection, RtmpUrl, SignalGuard, StreamSession};
use log::{error, info};
use std::process::ExitCode;

/// Publishes a stereo AAC test waveform with a solid-colour H.264 picture
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Destination, rtmp://host[:port]/app/stream-key
    url: String,

    #[arg(long, default_value_t = 44100, value_parser = clap::value_parser!(u32).range(1..))]
    sample_rate: u32,

    /// Audio bitrate in kbit/s
    #[arg(long, default_value_t = 128)]
    audio_bitrate: u32,

    /// Video frame rate; by default one picture per audio block
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    fps: Option<u32>,

    /// Publish audio only
    #[arg(long)]
    no_video: bool,

    #[command(flatten)]
    publish: PublishArgs,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(outcome) => {
            info!("Finished ({outcome:?})");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<Outcome> {
    let config = cli.publish.to_config();
    let url = RtmpUrl::parse(&cli.url)?;
    let audio_params = AudioParams {
        sample_rate: cli.sample_rate,
        bitrate_kbps: cli.audio_bitrate,
        ..AudioParams::default()
    };
    let video_params = match cli.fps {
        Some(fps) => VideoParams::default()
            .set_frame_rate(fps, 1)
            .set_keyframe_interval(fps * 4),
        None => audio_params.coupled_video(VideoParams::default()),
    };

    let mut mirror = config
        .debug_flv
        .as_ref()
        .map(|path| FlvMirror::create(path, FlvHeader::new(true, !cli.no_video)))
        .transpose()?;

    ffmpeg::init()?;
    let mut video_encoder = if cli.no_video {
        None
    } else {
        Some(X264Encoder::open(&video_params)?)
    };
    let mut audio_encoder = AacEncoder::open(&audio_params)?;

    let connection = RtmpConnection::connect(&url, &config)?;
    let token = CancellationToken::new();
    let mut session = StreamSession::new(connection, token.clone()).with_mirror(mirror.as_mut());
    let _signals = SignalGuard::install(&token).map_err(|e| Error::resource("signal handlers", e))?;

    let mut pacer = TickPacer::new(audio_params.block_duration());
    let video = video_encoder.as_mut().map(|encoder| {
        VideoTrack::new(
            encoder,
            video_params,
            PictureSource::Solid { y: 128, u: 64, v: 196 },
        )
    });
    let audio = AudioTrack::new(&mut audio_encoder, audio_params);
    publish::generate(&mut session, &mut pacer, video, Some(audio))
}
