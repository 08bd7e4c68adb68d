use crate::error::FlvError;
use crate::flv::flv_header::FlvHeader;
use crate::flv::flv_tag::FlvTag;
use crate::flv::flv_tag_header::FlvTagHeader;
use crate::flv::{FLV_HEADER_LENGTH, FLV_TAG_HEADER_LENGTH, PREVIOUS_TAG_SIZE_LENGTH};
use byteorder::{BigEndian, ReadBytesExt};
use bytes::BytesMut;
use log::debug;
use std::io::{self, ErrorKind, Read};

/// Blocking reader over a pre-recorded FLV stream.
///
/// The header is validated on [`open`](FlvReader::open), before any other I/O
/// takes place; records are then pulled one at a time with
/// [`next_tag`](FlvReader::next_tag).
pub struct FlvReader<R> {
    inner: R,
    header: FlvHeader,
}

impl<R: Read> FlvReader<R> {
    pub fn open(mut inner: R) -> Result<Self, FlvError> {
        let mut bytes = [0u8; FLV_HEADER_LENGTH];
        read_exact_or(&mut inner, &mut bytes, "FLV header")?;
        let header = FlvHeader::parse(&bytes)?;

        // skip to the declared data offset, then past PreviousTagSize0
        let skip = (header.data_offset as u64 - FLV_HEADER_LENGTH as u64)
            + PREVIOUS_TAG_SIZE_LENGTH as u64;
        let skipped = io::copy(&mut (&mut inner).take(skip), &mut io::sink())?;
        if skipped != skip {
            return Err(FlvError::ShortRead("first tag offset"));
        }

        debug!(
            "FLV header: version {}, audio {}, video {}, data offset {}",
            header.version, header.has_audio, header.has_video, header.data_offset
        );

        Ok(Self { inner, header })
    }

    pub fn header(&self) -> &FlvHeader {
        &self.header
    }

    /// Reads the next record. `Ok(None)` means a clean end of input on a record
    /// boundary; a record cut anywhere else is a short read.
    pub fn next_tag(&mut self) -> Result<Option<FlvTag>, FlvError> {
        let mut header_bytes = [0u8; FLV_TAG_HEADER_LENGTH];
        let filled = read_up_to(&mut self.inner, &mut header_bytes)?;
        if filled == 0 {
            return Ok(None);
        }
        if filled < FLV_TAG_HEADER_LENGTH {
            return Err(FlvError::ShortRead("next tag header"));
        }

        let header = FlvTagHeader::parse(&header_bytes);

        let mut data = BytesMut::zeroed(header.data_size as usize);
        read_exact_or(&mut self.inner, &mut data, "payload")?;

        let trailer = match self.inner.read_u32::<BigEndian>() {
            Ok(trailer) => trailer,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                return Err(FlvError::ShortRead("tag size"))
            }
            Err(e) => return Err(e.into()),
        };
        if trailer != header.tag_size() {
            return Err(FlvError::TagSizeMismatch {
                read: trailer,
                expected: header.tag_size(),
            });
        }

        Ok(Some(FlvTag {
            header,
            data: data.freeze(),
        }))
    }
}

fn read_exact_or<R: Read>(reader: &mut R, buf: &mut [u8], what: &'static str) -> Result<(), FlvError> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(FlvError::ShortRead(what)),
        Err(e) => Err(e.into()),
    }
}

/// Fills as much of `buf` as the reader can supply, stopping only at end of input.
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::flv::flv_tag_header::TagType;
    use crate::flv::tag_builder::TagBuilder;
    use std::io::Cursor;

    /// Builds an FLV file image out of `(type, timestamp, payload)` triples.
    pub(crate) fn flv_file(tags: &[(TagType, u32, &[u8])]) -> Vec<u8> {
        let mut file = FlvHeader::new(true, true).to_bytes().to_vec();
        file.extend_from_slice(&[0, 0, 0, 0]);
        let mut builder = TagBuilder::new();
        for (tag_type, ts, payload) in tags {
            builder.begin_tag(*tag_type, *ts);
            builder.append_payload(payload).unwrap();
            builder.finish_tag().unwrap();
            file.extend_from_slice(builder.record());
        }
        file
    }

    #[test]
    fn test_reads_all_tags_then_none() {
        let file = flv_file(&[
            (TagType::ScriptData, 0, b"meta"),
            (TagType::Video, 0, &[0x17, 0, 0, 0, 0]),
            (TagType::Audio, 23, &[0xAF, 1, 9, 9]),
        ]);
        let mut reader = FlvReader::open(Cursor::new(file)).unwrap();
        assert!(reader.header().has_video);

        let first = reader.next_tag().unwrap().unwrap();
        assert_eq!(first.kind().unwrap(), TagType::ScriptData);
        assert_eq!(&first.data[..], b"meta");

        let second = reader.next_tag().unwrap().unwrap();
        assert_eq!(second.kind().unwrap(), TagType::Video);

        let third = reader.next_tag().unwrap().unwrap();
        assert_eq!(third.timestamp(), 23);
        assert_eq!(&third.data[..], &[0xAF, 1, 9, 9]);

        assert!(reader.next_tag().unwrap().is_none());
    }

    #[test]
    fn test_honours_data_offset() {
        let mut file = vec![b'F', b'L', b'V', 1, 1, 0, 0, 0, 12, 0xEE, 0xEE, 0xEE];
        file.extend_from_slice(&[0, 0, 0, 0]);
        let mut builder = TagBuilder::new();
        builder.begin_tag(TagType::Video, 7);
        builder.append_payload(&[1, 2]).unwrap();
        builder.finish_tag().unwrap();
        file.extend_from_slice(builder.record());

        let mut reader = FlvReader::open(Cursor::new(file)).unwrap();
        let tag = reader.next_tag().unwrap().unwrap();
        assert_eq!(tag.timestamp(), 7);
        assert_eq!(&tag.data[..], &[1, 2]);
    }

    #[test]
    fn test_bad_signature_is_rejected_on_open() {
        let mut file = flv_file(&[(TagType::Video, 0, &[1])]);
        file[0] = b'M';
        assert!(matches!(
            FlvReader::open(Cursor::new(file)),
            Err(FlvError::BadSignature(_))
        ));
    }

    #[test]
    fn test_truncated_payload_is_short_read() {
        let mut file = flv_file(&[(TagType::Video, 0, &[1, 2, 3, 4, 5, 6])]);
        file.truncate(file.len() - 7);
        let mut reader = FlvReader::open(Cursor::new(file)).unwrap();
        assert!(matches!(reader.next_tag(), Err(FlvError::ShortRead("payload"))));
    }

    #[test]
    fn test_partial_header_is_short_read() {
        let mut file = flv_file(&[]);
        file.extend_from_slice(&[9, 0, 0]);
        let mut reader = FlvReader::open(Cursor::new(file)).unwrap();
        assert!(matches!(
            reader.next_tag(),
            Err(FlvError::ShortRead("next tag header"))
        ));
    }

    #[test]
    fn test_trailer_mismatch() {
        let mut file = flv_file(&[(TagType::Audio, 0, &[1, 2])]);
        let last = file.len() - 1;
        file[last] = 99;
        let mut reader = FlvReader::open(Cursor::new(file)).unwrap();
        assert!(matches!(
            reader.next_tag(),
            Err(FlvError::TagSizeMismatch { read: 99, expected: 13 })
        ));
    }
}
