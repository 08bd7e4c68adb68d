use crate::error::{Error, Result};
use crate::flv::flv_header::FlvHeader;
use log::{debug, warn};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Sidecar FLV file receiving every record exactly as it was sent.
///
/// The file starts with the 9-byte header and a zero previous-tag-size, so
/// the result plays back in any FLV-capable tool.
pub struct FlvMirror {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl FlvMirror {
    pub fn create(path: impl AsRef<Path>, header: FlvHeader) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| Error::resource("debug mirror file", e))?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&header.to_bytes())?;
        writer.write_all(&[0, 0, 0, 0])?;
        debug!("Mirroring records to {}", path.display());
        Ok(Self { path, writer })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_record(&mut self, record: &[u8]) -> Result<()> {
        self.writer.write_all(record)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

impl Drop for FlvMirror {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            warn!("Failed to flush debug mirror {}: {e}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flv::flv_reader::FlvReader;
    use crate::flv::flv_tag_header::TagType;
    use crate::flv::tag_builder::TagBuilder;
    use std::fs;

    #[test]
    fn test_mirror_file_is_readable_flv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.flv");

        let mut builder = TagBuilder::new();
        {
            let mut mirror = FlvMirror::create(&path, FlvHeader::new(false, true)).unwrap();
            for ts in [0u32, 41, 83] {
                builder.begin_tag(TagType::Video, ts);
                builder.append_payload(&[0x27, 1, 0, 0, 0, 0xAB]).unwrap();
                builder.finish_tag().unwrap();
                mirror.write_record(builder.record()).unwrap();
            }
        }

        let bytes = fs::read(&path).unwrap();
        assert_eq!(&bytes[..13], &[0x46, 0x4C, 0x56, 1, 1, 0, 0, 0, 9, 0, 0, 0, 0]);

        let mut reader = FlvReader::open(fs::File::open(&path).unwrap()).unwrap();
        let mut timestamps = Vec::new();
        while let Some(tag) = reader.next_tag().unwrap() {
            timestamps.push(tag.timestamp());
        }
        assert_eq!(timestamps, vec![0, 41, 83]);
    }

    #[test]
    fn test_unwritable_path_is_resource_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.flv");
        assert!(matches!(
            FlvMirror::create(&path, FlvHeader::new(true, true)),
            Err(Error::ResourceAcquisition { .. })
        ));
    }
}
