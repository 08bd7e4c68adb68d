use crate::error::FlvError;
use crate::flv::FLV_TAG_HEADER_LENGTH;
use byteorder::{BigEndian, ByteOrder};

/// Kind of record carried by a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TagType {
    Audio = 8,
    Video = 9,
    ScriptData = 18,
}

impl TagType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for TagType {
    type Error = FlvError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            8 => Ok(TagType::Audio),
            9 => Ok(TagType::Video),
            18 => Ok(TagType::ScriptData),
            other => Err(FlvError::UnknownTagType(other)),
        }
    }
}

/// Decoded 11-byte tag header.
///
/// The timestamp is stored the way it sits on the wire: the low 24 bits in
/// `timestamp` and the high 8 bits in `timestamp_ext`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlvTagHeader {
    pub tag_type: u8,
    pub data_size: u32,
    pub timestamp: u32,
    pub timestamp_ext: u8,
    pub stream_id: u32,
}

impl FlvTagHeader {
    pub fn new(tag_type: TagType, data_size: u32, timestamp: u32) -> Self {
        Self {
            tag_type: tag_type.as_u8(),
            data_size,
            timestamp: timestamp & 0x00FF_FFFF,
            timestamp_ext: (timestamp >> 24) as u8,
            stream_id: 0,
        }
    }

    pub fn parse(bytes: &[u8; FLV_TAG_HEADER_LENGTH]) -> Self {
        Self {
            tag_type: bytes[0],
            data_size: BigEndian::read_u24(&bytes[1..4]),
            timestamp: BigEndian::read_u24(&bytes[4..7]),
            timestamp_ext: bytes[7],
            stream_id: BigEndian::read_u24(&bytes[8..11]),
        }
    }

    /// Decodes the header at the front of a record, without touching the
    /// payload.
    pub fn from_record(record: &[u8]) -> Result<Self, FlvError> {
        let bytes: &[u8; FLV_TAG_HEADER_LENGTH] = record
            .get(..FLV_TAG_HEADER_LENGTH)
            .and_then(|head| head.try_into().ok())
            .ok_or(FlvError::TruncatedRecord(record.len()))?;
        Ok(Self::parse(bytes))
    }

    /// Reassembles the full 32-bit millisecond timestamp.
    pub fn full_timestamp(&self) -> u32 {
        self.timestamp | ((self.timestamp_ext as u32) << 24)
    }

    pub fn kind(&self) -> Result<TagType, FlvError> {
        TagType::try_from(self.tag_type)
    }

    /// Value the trailer of this record must carry.
    pub fn tag_size(&self) -> u32 {
        FLV_TAG_HEADER_LENGTH as u32 + self.data_size
    }

    pub fn write_to(&self, out: &mut [u8; FLV_TAG_HEADER_LENGTH]) {
        out[0] = self.tag_type;
        BigEndian::write_u24(&mut out[1..4], self.data_size);
        BigEndian::write_u24(&mut out[4..7], self.timestamp);
        out[7] = self.timestamp_ext;
        BigEndian::write_u24(&mut out[8..11], self.stream_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_split_layout() {
        let header = FlvTagHeader::new(TagType::Video, 5, 0x1234_5678);
        let mut bytes = [0u8; FLV_TAG_HEADER_LENGTH];
        header.write_to(&mut bytes);

        // low 24 bits big-endian, then the high byte on its own
        assert_eq!(&bytes[4..8], &[0x34, 0x56, 0x78, 0x12]);
        assert_eq!(&bytes[1..4], &[0, 0, 5]);
        assert_eq!(&bytes[8..11], &[0, 0, 0]);
    }

    #[test]
    fn test_parse_reassembles_full_timestamp() {
        let bytes = [9, 0, 1, 0, 0xAA, 0xBB, 0xCC, 0x01, 0, 0, 0];
        let header = FlvTagHeader::parse(&bytes);
        assert_eq!(header.kind().unwrap(), TagType::Video);
        assert_eq!(header.data_size, 256);
        assert_eq!(header.full_timestamp(), 0x01AA_BBCC);
        assert_eq!(header.tag_size(), 267);
    }

    #[test]
    fn test_unknown_tag_type() {
        assert!(matches!(TagType::try_from(7), Err(FlvError::UnknownTagType(7))));
        assert_eq!(TagType::try_from(18).unwrap(), TagType::ScriptData);
    }
}
