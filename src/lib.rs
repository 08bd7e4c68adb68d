//! **flvcast** publishes FLV records to an RTMP server in real time.
//!
//! Records come either from a pre-recorded FLV file or from encoders fed with
//! synthetic pictures and audio. Each record is assembled by a
//! [`TagBuilder`](flv::tag_builder::TagBuilder), paced against the wall clock by a
//! [`Pacer`](pacer::Pacer) and written to the connection by a
//! [`StreamSession`](session::StreamSession), which drains at most one inbound
//! control message after every write. Everything runs on one thread.
//!
//! | Module | Role |
//! |--------|------|
//! | [`flv`] | file header, record header, record builder, reader, debug mirror |
//! | [`amf0`] | `onMetaData` encoding |
//! | [`codec`] | AVC/AAC packet framing, encoder traits, FFmpeg encoders (`ffmpeg` feature) |
//! | [`pacer`] | source-driven and tick-driven pacing |
//! | [`rtmp`] | publishing client connection |
//! | [`session`] | write-then-drain record emission |
//! | [`publish`] | replay and generation loops |
//! | [`shutdown`] | cancellation token and signal adapter |
//! | [`config`] | session, video and audio parameters |
//!
//! # Example
//!
//! ```rust,ignore
//! let mut reader = publish::open_input("input.flv")?;
//! let url = RtmpUrl::parse("rtmp://localhost/live/test")?;
//! let connection = RtmpConnection::connect(&url, &PublishConfig::new())?;
//! let token = CancellationToken::new();
//! let _signals = SignalGuard::install(&token)?;
//! let mut session = StreamSession::new(connection, token);
//! publish::replay(&mut reader, &mut session, &mut SourcePacer::new())?;
//! ```

pub mod amf0;
pub mod codec;
pub mod config;
pub mod error;
pub mod flv;
pub mod pacer;
pub mod publish;
pub mod rtmp;
pub mod session;
pub mod shutdown;
pub mod testsrc;

pub use config::{AudioParams, PublishConfig, VideoParams};
pub use error::{Error, Result};
pub use publish::Outcome;
pub use rtmp::{Connection, RtmpConnection, RtmpUrl};
pub use session::StreamSession;
pub use shutdown::{CancellationToken, SignalGuard};
