use clap::Parser;
use flvcast::codec::ffmpeg::{self, X264Encoder};
use flvcast::config::{PublishArgs, VideoParams};
use flvcast::error::{Error, Result};
use flvcast::flv::flv_header::FlvHeader;
use flvcast::flv::mirror::FlvMirror;
use flvcast::pacer::TickPacer;
use flvcast::publish::{self, Outcome, PictureSource, VideoTrack};
use flvcast::{CancellationToken, RtmpConnection, RtmpUrl, SignalGuard, StreamSession};
use log::{error, info};
use std::process::ExitCode;

/// Encodes a moving H.264 test pattern and publishes it to an RTMP server
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Destination, rtmp://host[:port]/app/stream-key
    url: String,

    #[arg(long, default_value_t = 640, value_parser = clap::value_parser!(u32).range(2..))]
    width: u32,

    #[arg(long, default_value_t = 360, value_parser = clap::value_parser!(u32).range(2..))]
    height: u32,

    /// Frames per second
    #[arg(long, default_value_t = 24, value_parser = clap::value_parser!(u32).range(1..))]
    fps: u32,

    /// Maximum distance between keyframes, in frames
    #[arg(long, default_value_t = 24, value_parser = clap::value_parser!(u32).range(1..))]
    keyint: u32,

    /// Target bitrate in kbit/s, constant quality when omitted
    #[arg(long)]
    bitrate: Option<u32>,

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
    let mut params = VideoParams {
        width: cli.width,
        height: cli.height,
        ..VideoParams::default()
    }
    .set_frame_rate(cli.fps, 1)
    .set_keyframe_interval(cli.keyint);
    if let Some(kbps) = cli.bitrate {
        params = params.set_bitrate_kbps(kbps);
    }

    let mut mirror = config
        .debug_flv
        .as_ref()
        .map(|path| FlvMirror::create(path, FlvHeader::new(false, true)))
        .transpose()?;

    ffmpeg::init()?;
    let mut encoder = X264Encoder::open(&params)?;

    let connection = RtmpConnection::connect(&url, &config)?;
    let token = CancellationToken::new();
    let mut session = StreamSession::new(connection, token.clone()).with_mirror(mirror.as_mut());
    let _signals = SignalGuard::install(&token).map_err(|e| Error::resource("signal handlers", e))?;

    let mut pacer = TickPacer::new(params.frame_duration());
    let video = VideoTrack::new(&mut encoder, params, PictureSource::TestPattern);
    publish::generate(&mut session, &mut pacer, Some(video), None)
}
