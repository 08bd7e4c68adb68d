use crate::error::FlvError;
use crate::flv::FLV_HEADER_LENGTH;
use byteorder::{BigEndian, ByteOrder};

const SIGNATURE: &[u8; 3] = b"FLV";
const FLAG_VIDEO: u8 = 0x01;
const FLAG_AUDIO: u8 = 0x04;

/// The 9-byte header in front of every FLV file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlvHeader {
    pub version: u8,
    pub has_audio: bool,
    pub has_video: bool,
    /// Offset of the first record's previous-tag-size field.
    pub data_offset: u32,
}

impl FlvHeader {
    pub fn new(has_audio: bool, has_video: bool) -> Self {
        Self {
            version: 1,
            has_audio,
            has_video,
            data_offset: FLV_HEADER_LENGTH as u32,
        }
    }

    /// Parses the header. Anything but an "FLV" signature is rejected.
    pub fn parse(bytes: &[u8; FLV_HEADER_LENGTH]) -> Result<Self, FlvError> {
        if &bytes[..3] != SIGNATURE {
            let mut signature = [0u8; 4];
            signature.copy_from_slice(&bytes[..4]);
            return Err(FlvError::BadSignature(signature));
        }

        let data_offset = BigEndian::read_u32(&bytes[5..9]);
        if (data_offset as usize) < FLV_HEADER_LENGTH {
            return Err(FlvError::BadDataOffset(data_offset));
        }

        Ok(Self {
            version: bytes[3],
            has_audio: bytes[4] & FLAG_AUDIO != 0,
            has_video: bytes[4] & FLAG_VIDEO != 0,
            data_offset,
        })
    }

    pub fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.has_audio {
            flags |= FLAG_AUDIO;
        }
        if self.has_video {
            flags |= FLAG_VIDEO;
        }
        flags
    }

    pub fn to_bytes(&self) -> [u8; FLV_HEADER_LENGTH] {
        let mut bytes = [0u8; FLV_HEADER_LENGTH];
        bytes[..3].copy_from_slice(SIGNATURE);
        bytes[3] = self.version;
        bytes[4] = self.flags();
        BigEndian::write_u32(&mut bytes[5..9], self.data_offset);
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_matches_reference_bytes() {
        let header = FlvHeader::new(true, true);
        assert_eq!(header.to_bytes(), [0x46, 0x4C, 0x56, 0x01, 0x05, 0, 0, 0, 9]);

        let video_only = FlvHeader::new(false, true);
        assert_eq!(video_only.to_bytes()[4], 0x01);
    }

    #[test]
    fn test_parse_flags_and_offset() {
        let header = FlvHeader::parse(&[b'F', b'L', b'V', 1, 0x04, 0, 0, 0, 13]).unwrap();
        assert!(header.has_audio);
        assert!(!header.has_video);
        assert_eq!(header.data_offset, 13);
    }

    #[test]
    fn test_bad_signature_rejected() {
        let err = FlvHeader::parse(&[b'F', b'L', b'X', 1, 5, 0, 0, 0, 9]).unwrap_err();
        assert!(matches!(err, FlvError::BadSignature(sig) if sig == [b'F', b'L', b'X', 1]));
    }

    #[test]
    fn test_offset_inside_header_rejected() {
        let err = FlvHeader::parse(&[b'F', b'L', b'V', 1, 5, 0, 0, 0, 3]).unwrap_err();
        assert!(matches!(err, FlvError::BadDataOffset(3)));
    }
}
