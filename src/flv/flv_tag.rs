use crate::error::FlvError;
use crate::flv::flv_tag_header::{FlvTagHeader, TagType};
use crate::flv::{FLV_TAG_HEADER_LENGTH, PREVIOUS_TAG_SIZE_LENGTH};
use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;

/// One complete record: header plus payload. The trailer is implied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlvTag {
    pub header: FlvTagHeader,
    pub data: Bytes,
}

impl FlvTag {
    pub fn kind(&self) -> Result<TagType, FlvError> {
        self.header.kind()
    }

    pub fn timestamp(&self) -> u32 {
        self.header.full_timestamp()
    }

    /// Splits a finished record (header, payload, trailer) back into its parts,
    /// checking the size field against the trailer.
    pub fn from_record(record: &[u8]) -> Result<Self, FlvError> {
        let (header, data) = split_record(record)?;
        Ok(Self {
            header,
            data: Bytes::copy_from_slice(data),
        })
    }
}

/// Borrowing counterpart of [`FlvTag::from_record`]: the payload stays in
/// `record`.
pub fn split_record(record: &[u8]) -> Result<(FlvTagHeader, &[u8]), FlvError> {
    let header = FlvTagHeader::from_record(record)?;

    let payload_end = FLV_TAG_HEADER_LENGTH + header.data_size as usize;
    if record.len() != payload_end + PREVIOUS_TAG_SIZE_LENGTH {
        return Err(FlvError::TruncatedRecord(record.len()));
    }

    let trailer = BigEndian::read_u32(&record[payload_end..]);
    if trailer != header.tag_size() {
        return Err(FlvError::TagSizeMismatch {
            read: trailer,
            expected: header.tag_size(),
        });
    }

    Ok((header, &record[FLV_TAG_HEADER_LENGTH..payload_end]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flv::tag_builder::TagBuilder;

    #[test]
    fn test_split_record_borrows_payload() {
        let mut builder = TagBuilder::new();
        builder.begin_tag(TagType::Audio, 0x0200_0001);
        builder.append_payload(&[0xAF, 1, 0x21]).unwrap();
        builder.finish_tag().unwrap();
        let record = builder.record();

        let (header, data) = split_record(record).unwrap();
        assert_eq!(header.full_timestamp(), 0x0200_0001);
        assert_eq!(data, &[0xAF, 1, 0x21]);
        assert_eq!(data.as_ptr(), record[FLV_TAG_HEADER_LENGTH..].as_ptr());
    }

    #[test]
    fn test_split_record_checks_trailer() {
        let mut builder = TagBuilder::new();
        builder.begin_tag(TagType::Video, 0);
        builder.append_payload(&[0x17, 2, 0, 0, 0]).unwrap();
        builder.finish_tag().unwrap();
        let mut record = builder.record().to_vec();

        let last = record.len() - 1;
        record[last] ^= 0xFF;
        assert!(matches!(
            split_record(&record),
            Err(FlvError::TagSizeMismatch { expected: 16, .. })
        ));
        assert!(matches!(
            split_record(&record[..8]),
            Err(FlvError::TruncatedRecord(8))
        ));
    }
}
