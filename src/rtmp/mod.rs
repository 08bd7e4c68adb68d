//! The **RTMP** module is the outbound side of a publishing session: a blocking
//! client connection built on `rml_rtmp`'s handshake and chunk codec.
//!
//! ## Key Components
//!
//! - `RtmpUrl`: `rtmp://host[:port]/app[/...]/stream-key` parsing
//! - `RtmpConnection`: handshake, `connect`/`createStream`/`publish`, record writes
//! - `Connection`: the three operations the stream loop needs, so tests can swap
//!   the network for an in-memory double
//! - `poller`: zero-timeout readiness check on the socket
//!
//! ## Record mapping
//!
//! | FLV tag type | RTMP message type | Payload |
//! |--------------|-------------------|---------|
//! | 8 (audio) | 8 | unchanged |
//! | 9 (video) | 9 | unchanged |
//! | 18 (script data) | 18 | `@setDataFrame` + original values |
//!
//! The 32-bit tag timestamp becomes the message timestamp; the message stream
//! id is the one returned by `createStream`.
//!
//! # Example
//!
//! ```rust,ignore
//! let url = RtmpUrl::parse("rtmp://localhost/live/test")?;
//! let mut connection = RtmpConnection::connect(&url, &PublishConfig::new())?;
//! connection.write_record(builder.record())?;
//! while connection.poll_readable()? {
//!     connection.read_and_dispatch_one()?;
//! }
//! ```

pub mod connection;
pub mod poller;
pub mod url;

pub use connection::{Connection, RtmpConnection};
pub use url::RtmpUrl;
