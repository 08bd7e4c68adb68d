use std::io;
use thiserror::Error;

/// Result type of every fallible `flvcast` operation.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error. Each variant is one failure class; none of them is
/// retried, a failure terminates the publishing session.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Usage error: {0}")]
    Usage(String),

    #[error("Failed to acquire {what}: {source}")]
    ResourceAcquisition {
        what: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("Malformed input: {0}")]
    MalformedInput(#[from] FlvError),

    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("Codec configuration error: {0}")]
    CodecConfig(#[from] CodecConfigError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] RtmpError),

    #[error("Encoder error: {0}")]
    Encoder(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Errors of the FLV decode path.
#[derive(Error, Debug)]
pub enum FlvError {
    #[error("Does not appear to be a valid FLV1 file (signature {0:02X?})")]
    BadSignature([u8; 4]),

    #[error("Short read looking for {0}")]
    ShortRead(&'static str),

    #[error("Read tag size {read} does not match calculated tag size {expected}")]
    TagSizeMismatch { read: u32, expected: u32 },

    #[error("Unknown tag type {0}")]
    UnknownTagType(u8),

    #[error("FLV header data offset {0} is smaller than the header itself")]
    BadDataOffset(u32),

    #[error("Record of {0} bytes is shorter than a tag header and trailer")]
    TruncatedRecord(usize),

    #[error("IO error while reading FLV: {0}")]
    Io(#[from] io::Error),
}

/// Errors raised while assembling records or AMF payloads.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum EncodingError {
    #[error("Payload of {0} bytes exceeds the 24-bit tag size field (max 16777215)")]
    PayloadTooLarge(usize),

    #[error("AMF string of {0} bytes exceeds 65535 bytes")]
    StringTooLong(usize),

    #[error("No record is open, call begin_tag first")]
    NoOpenTag,

    #[error("AMF data truncated")]
    AmfTruncated,

    #[error("Unsupported AMF marker 0x{0:02X}")]
    AmfUnsupportedMarker(u8),

    #[error("AMF string is not valid UTF-8")]
    AmfInvalidUtf8,
}

/// Errors building the AVC decoder configuration record or audio config.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecConfigError {
    #[error("Stream contains multiple SPS, not supported")]
    MultipleSps,

    #[error("Stream contains multiple PPS, not supported")]
    MultiplePps,

    #[error("Encoder headers missing SPS")]
    MissingSps,

    #[error("Encoder headers missing PPS")]
    MissingPps,

    #[error("SPS of {0} bytes is too short to carry profile and level")]
    SpsTooShort(usize),

    #[error("Parameter set of {0} bytes does not fit a 16-bit length")]
    ParameterSetTooLong(usize),

    #[error("Decoder configuration record is truncated or malformed")]
    TruncatedConfigRecord,

    #[error("Audio encoder did not supply a configuration")]
    MissingAudioConfig,
}

/// Errors of the RTMP connection.
#[derive(Error, Debug)]
pub enum RtmpError {
    #[error("Invalid RTMP url '{0}'")]
    InvalidUrl(String),

    #[error("Failed to connect to remote RTMP server {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("RTMP handshake failed: {0}")]
    Handshake(String),

    #[error("Failed to serialize RTMP message: {0}")]
    Serialize(String),

    #[error("Failed to deserialize RTMP message: {0}")]
    Deserialize(String),

    #[error("Server rejected '{command}': {description}")]
    Rejected { command: String, description: String },

    #[error("Connection closed by remote peer")]
    ConnectionClosed,

    #[error("Timed out waiting for {0}")]
    TimedOut(&'static str),

    #[error("Failed to write record: {0}")]
    Write(#[source] io::Error),

    #[error("Failed to read from connection: {0}")]
    Read(#[source] io::Error),

    #[error("Readiness check failed: {0}")]
    Poll(#[source] io::Error),
}

impl Error {
    pub fn resource(what: &'static str, source: io::Error) -> Self {
        Error::ResourceAcquisition { what, source }
    }
}
