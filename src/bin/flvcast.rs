use clap::Parser;
use flvcast::config::PublishArgs;
use flvcast::error::{Error, Result};
use flvcast::flv::mirror::FlvMirror;
use flvcast::pacer::SourcePacer;
use flvcast::publish::{self, Outcome};
use flvcast::{CancellationToken, RtmpConnection, RtmpUrl, SignalGuard, StreamSession};
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;

/// Publishes a pre-recorded FLV file to an RTMP server in real time
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// FLV file to publish
    input: PathBuf,

    /// Destination, rtmp://host[:port]/app/stream-key
    url: String,

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

    // the input is validated before anything touches the network
    let mut reader = publish::open_input(&cli.input)?;
    let mut mirror = config
        .debug_flv
        .as_ref()
        .map(|path| FlvMirror::create(path, *reader.header()))
        .transpose()?;

    let connection = RtmpConnection::connect(&url, &config)?;
    let token = CancellationToken::new();
    let mut session = StreamSession::new(connection, token.clone()).with_mirror(mirror.as_mut());
    let _signals = SignalGuard::install(&token).map_err(|e| Error::resource("signal handlers", e))?;

    let mut pacer = SourcePacer::new();
    publish::replay(&mut reader, &mut session, &mut pacer)
}
