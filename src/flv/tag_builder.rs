use crate::error::EncodingError;
use crate::flv::flv_tag_header::{FlvTagHeader, TagType};
use crate::flv::{FLV_TAG_HEADER_LENGTH, MAX_PAYLOAD_SIZE, PREVIOUS_TAG_SIZE_LENGTH};
use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, BytesMut};

/// Assembles one record at a time into a reusable, growable buffer.
///
/// `begin_tag` writes the header with a placeholder size, the payload is appended
/// through [`append_payload`](Self::append_payload) or [`payload`](Self::payload),
/// and `finish_tag` backpatches the size and appends the trailer. The size is
/// always derived from what was appended, never supplied by the caller.
pub struct TagBuilder {
    buf: BytesMut,
    open: bool,
}

impl Default for TagBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TagBuilder {
    pub fn new() -> Self {
        Self::with_capacity(64 * 1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            open: false,
        }
    }

    /// Starts a new record, discarding whatever the buffer held before.
    pub fn begin_tag(&mut self, tag_type: TagType, timestamp: u32) {
        self.buf.clear();
        let mut header = [0u8; FLV_TAG_HEADER_LENGTH];
        // size stays zero until finish_tag
        FlvTagHeader::new(tag_type, 0, timestamp).write_to(&mut header);
        self.buf.put_slice(&header);
        self.open = true;
    }

    /// Copies `bytes` verbatim to the end of the open record's payload.
    pub fn append_payload(&mut self, bytes: &[u8]) -> Result<(), EncodingError> {
        self.payload()?.put_slice(bytes);
        Ok(())
    }

    /// Direct access to the payload area of the open record.
    pub fn payload(&mut self) -> Result<&mut BytesMut, EncodingError> {
        if !self.open {
            return Err(EncodingError::NoOpenTag);
        }
        Ok(&mut self.buf)
    }

    /// Bytes appended to the open record so far.
    pub fn payload_len(&self) -> usize {
        self.buf.len().saturating_sub(FLV_TAG_HEADER_LENGTH)
    }

    /// Closes the record and returns its total length (header + payload + trailer).
    ///
    /// A payload that does not fit the 24-bit size field fails the record; nothing
    /// is truncated.
    pub fn finish_tag(&mut self) -> Result<usize, EncodingError> {
        if !self.open {
            return Err(EncodingError::NoOpenTag);
        }
        self.open = false;

        let payload_size = self.payload_len();
        if payload_size > MAX_PAYLOAD_SIZE {
            self.buf.clear();
            return Err(EncodingError::PayloadTooLarge(payload_size));
        }

        BigEndian::write_u24(&mut self.buf[1..4], payload_size as u32);
        self.buf
            .put_u32((FLV_TAG_HEADER_LENGTH + payload_size) as u32);

        Ok(FLV_TAG_HEADER_LENGTH + payload_size + PREVIOUS_TAG_SIZE_LENGTH)
    }

    /// The finished record. Only meaningful after a successful `finish_tag`.
    pub fn record(&self) -> &[u8] {
        &self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flv::flv_tag::FlvTag;

    #[test]
    fn test_round_trip_recovers_type_timestamp_payload() {
        let mut builder = TagBuilder::new();
        let payload = b"some payload bytes";

        for (tag_type, ts) in [
            (TagType::Audio, 0u32),
            (TagType::Video, 41),
            (TagType::ScriptData, 0x00FF_FFFF),
            (TagType::Video, 0x0100_0000),
            (TagType::Audio, u32::MAX),
        ] {
            builder.begin_tag(tag_type, ts);
            builder.append_payload(payload).unwrap();
            let len = builder.finish_tag().unwrap();
            assert_eq!(len, 11 + payload.len() + 4);

            let record = builder.record();
            assert_eq!(record.len(), len);
            let trailer = BigEndian::read_u32(&record[len - 4..]);
            assert_eq!(trailer as usize, 11 + payload.len());

            let tag = FlvTag::from_record(record).unwrap();
            assert_eq!(tag.kind().unwrap(), tag_type);
            assert_eq!(tag.timestamp(), ts);
            assert_eq!(&tag.data[..], &payload[..]);
        }
    }

    #[test]
    fn test_empty_payload() {
        let mut builder = TagBuilder::new();
        builder.begin_tag(TagType::Video, 1000);
        assert_eq!(builder.finish_tag().unwrap(), 15);
        assert_eq!(&builder.record()[1..4], &[0, 0, 0]);
        assert_eq!(&builder.record()[11..], &[0, 0, 0, 11]);
    }

    #[test]
    fn test_builder_reuse_resets_previous_record() {
        let mut builder = TagBuilder::new();
        builder.begin_tag(TagType::Video, 0);
        builder.append_payload(&[1; 100]).unwrap();
        builder.finish_tag().unwrap();

        builder.begin_tag(TagType::Audio, 20);
        builder.append_payload(&[2, 3]).unwrap();
        assert_eq!(builder.finish_tag().unwrap(), 17);
        assert_eq!(builder.record()[0], 8);
        assert_eq!(&builder.record()[11..13], &[2, 3]);
    }

    #[test]
    fn test_max_payload_accepted() {
        let mut builder = TagBuilder::new();
        builder.begin_tag(TagType::Video, 0);
        builder.append_payload(&vec![0u8; MAX_PAYLOAD_SIZE]).unwrap();
        let len = builder.finish_tag().unwrap();
        assert_eq!(len, 11 + MAX_PAYLOAD_SIZE + 4);
        assert_eq!(&builder.record()[1..4], &[0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let mut builder = TagBuilder::new();
        builder.begin_tag(TagType::Video, 0);
        builder
            .append_payload(&vec![0u8; MAX_PAYLOAD_SIZE + 1])
            .unwrap();
        assert_eq!(
            builder.finish_tag(),
            Err(EncodingError::PayloadTooLarge(MAX_PAYLOAD_SIZE + 1))
        );
        assert!(builder.record().is_empty());
    }

    #[test]
    fn test_append_without_begin_fails() {
        let mut builder = TagBuilder::new();
        assert_eq!(builder.append_payload(&[1]), Err(EncodingError::NoOpenTag));
        assert_eq!(builder.finish_tag(), Err(EncodingError::NoOpenTag));

        builder.begin_tag(TagType::Audio, 0);
        builder.finish_tag().unwrap();
        // a finished record cannot be extended
        assert_eq!(builder.append_payload(&[1]), Err(EncodingError::NoOpenTag));
    }
}
