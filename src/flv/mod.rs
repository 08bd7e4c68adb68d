//! The **FLV** module contains the record-level building blocks of the output container:
//! the 9-byte file header, the 11-byte tag header with its split timestamp, a growable
//! [`TagBuilder`](tag_builder::TagBuilder) that backpatches the payload size, a blocking
//! reader for pre-recorded files and the optional debug mirror.
//!
//! Record grammar (all integers big-endian):
//!
//! | Bytes | Field |
//! |-------|-------|
//! | 1 | tag type (8 audio, 9 video, 18 script data) |
//! | 3 | payload size |
//! | 3 | timestamp, low 24 bits |
//! | 1 | timestamp, high 8 bits |
//! | 3 | stream id, always 0 |
//! | n | payload |
//! | 4 | trailer, 11 + n |

pub mod flv_header;
pub mod flv_reader;
pub mod flv_tag;
pub mod flv_tag_header;
pub mod mirror;
pub mod tag_builder;

// Define constants for commonly used lengths
pub const PREVIOUS_TAG_SIZE_LENGTH: usize = 4;
pub const FLV_HEADER_LENGTH: usize = 9;
pub const FLV_TAG_HEADER_LENGTH: usize = 11;
/// Largest payload the 24-bit size field can describe.
pub const MAX_PAYLOAD_SIZE: usize = 0x00FF_FFFF;
