//! One publishing session: turns tags, metadata and access units into records,
//! writes each record to the connection (and the optional mirror), then gives
//! inbound control traffic a single non-blocking chance before returning.

use crate::amf0::{self, AmfValue};
use crate::codec::avc::DecoderConfigurationRecord;
use crate::codec::{aac, avc, AccessUnit, CodecSubtype};
use crate::error::Result;
use crate::flv::flv_tag::FlvTag;
use crate::flv::flv_tag_header::{FlvTagHeader, TagType};
use crate::flv::mirror::FlvMirror;
use crate::flv::tag_builder::TagBuilder;
use crate::rtmp::Connection;
use crate::shutdown::CancellationToken;
use log::{debug, trace, warn};

/// Name of the script-data handler carrying stream metadata.
pub const METADATA_HANDLER: &str = "onMetaData";

/// Owns the record builder and drives a [`Connection`].
///
/// Every emitted record goes through the same sequence: mirror, write, then at
/// most one inbound message if the connection reports data ready. A write error
/// ends the session; inbound errors do too, since they mean the connection is
/// no longer usable.
pub struct StreamSession<'m, C: Connection> {
    connection: C,
    builder: TagBuilder,
    mirror: Option<&'m mut FlvMirror>,
    token: CancellationToken,
    last_timestamp: Option<u32>,
    records_sent: u64,
    bytes_sent: u64,
}

impl<'m, C: Connection> StreamSession<'m, C> {
    pub fn new(connection: C, token: CancellationToken) -> Self {
        Self {
            connection,
            builder: TagBuilder::new(),
            mirror: None,
            token,
            last_timestamp: None,
            records_sent: 0,
            bytes_sent: 0,
        }
    }

    /// Copies every record sent from now on into `mirror`.
    pub fn with_mirror(mut self, mirror: Option<&'m mut FlvMirror>) -> Self {
        self.mirror = mirror;
        self
    }

    pub fn is_running(&self) -> bool {
        self.token.is_running()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.connection
    }

    pub fn records_sent(&self) -> u64 {
        self.records_sent
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Timestamp of the last record sent.
    pub fn last_timestamp(&self) -> Option<u32> {
        self.last_timestamp
    }

    /// Re-emits a tag read from a pre-recorded file.
    pub fn send_tag(&mut self, tag: &FlvTag) -> Result<usize> {
        let kind = tag.kind()?;
        self.builder.begin_tag(kind, tag.timestamp());
        self.builder.append_payload(&tag.data)?;
        self.builder.finish_tag()?;
        self.emit()
    }

    /// Sends an `onMetaData` script-data record at timestamp 0.
    pub fn send_metadata(&mut self, pairs: &[(&str, AmfValue)]) -> Result<usize> {
        self.builder.begin_tag(TagType::ScriptData, 0);
        amf0::encode_metadata(self.builder.payload()?, METADATA_HANDLER, pairs)?;
        self.builder.finish_tag()?;
        self.emit()
    }

    /// Sends the AVC sequence header at timestamp 0.
    pub fn send_video_config(&mut self, config: &DecoderConfigurationRecord) -> Result<usize> {
        avc::write_sequence_header(&mut self.builder, 0, config)?;
        self.emit()
    }

    /// Sends the AAC sequence header at timestamp 0.
    pub fn send_audio_config(&mut self, config: &[u8]) -> Result<usize> {
        aac::write_sequence_header(&mut self.builder, 0, config)?;
        self.emit()
    }

    /// Sends one access unit, framed for its codec.
    pub fn send_access_unit(&mut self, timestamp: u32, unit: &AccessUnit) -> Result<usize> {
        match unit.subtype {
            CodecSubtype::Avc => avc::write_access_unit(&mut self.builder, timestamp, unit)?,
            CodecSubtype::Aac => aac::write_access_unit(&mut self.builder, timestamp, unit)?,
        };
        self.emit()
    }

    /// Best-effort end-of-sequence marker. Failure is only logged, the session
    /// is over either way.
    pub fn send_end_of_stream(&mut self, timestamp: u32) {
        let sent = avc::write_end_of_sequence(&mut self.builder, timestamp).and_then(|_| self.emit());
        match sent {
            Ok(_) => debug!("Sent end of sequence at {timestamp} ms"),
            Err(e) => warn!("Failed to send end of sequence: {e}"),
        }
    }

    fn emit(&mut self) -> Result<usize> {
        let record = self.builder.record();

        if let Some(mirror) = self.mirror.as_deref_mut() {
            mirror.write_record(record)?;
        }

        let header = FlvTagHeader::from_record(record)?;
        let timestamp = header.full_timestamp();
        let written = self.connection.write_record(record)?;
        trace!(
            "Record {} type {} at {timestamp} ms, {written} bytes",
            self.records_sent,
            header.tag_type
        );
        self.records_sent += 1;
        self.bytes_sent += written as u64;
        self.last_timestamp = Some(timestamp);

        self.drain_one()?;
        Ok(written)
    }

    /// Zero-timeout check, then at most one inbound message.
    fn drain_one(&mut self) -> Result<()> {
        if self.connection.poll_readable()? {
            self.connection.read_and_dispatch_one()?;
        }
        Ok(())
    }
}

impl<C: Connection> Drop for StreamSession<'_, C> {
    fn drop(&mut self) {
        debug!(
            "Session finished after {} records ({} bytes)",
            self.records_sent, self.bytes_sent
        );
    }
}
