use crate::codec::AccessUnit;
use crate::error::{CodecConfigError, Result};
use crate::flv::flv_tag_header::TagType;
use crate::flv::tag_builder::TagBuilder;
use bytes::BufMut;

/// Sound format 10 (AAC), 44 kHz, 16-bit, stereo. FLV requires these flags for
/// AAC regardless of the real stream parameters.
pub const AAC_AUDIO_HEADER: u8 = 0xAF;

/// MPEG-4 audio object type of AAC-LC.
pub const AOT_AAC_LC: u8 = 2;

const SAMPLING_FREQUENCIES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AacPacketType {
    SequenceHeader = 0,
    Raw = 1,
}

pub fn write_packet_header<B: BufMut>(buf: &mut B, packet_type: AacPacketType) {
    buf.put_u8(AAC_AUDIO_HEADER);
    buf.put_u8(packet_type as u8);
}

/// Two-byte AudioSpecificConfig for encoders that do not hand one out.
///
/// Returns `None` for sample rates without a frequency index.
pub fn audio_specific_config(object_type: u8, sample_rate: u32, channels: u8) -> Option<[u8; 2]> {
    let index = SAMPLING_FREQUENCIES.iter().position(|&f| f == sample_rate)? as u8;
    // 5 bits object type, 4 bits frequency index, 4 bits channel configuration
    let bits: u16 = ((object_type as u16 & 0x1F) << 11)
        | ((index as u16) << 7)
        | ((channels as u16 & 0x0F) << 3);
    Some(bits.to_be_bytes())
}

/// Emits the audio sequence header record carrying the encoder's configuration.
pub fn write_sequence_header(builder: &mut TagBuilder, timestamp: u32, config: &[u8]) -> Result<usize> {
    if config.is_empty() {
        return Err(CodecConfigError::MissingAudioConfig.into());
    }
    builder.begin_tag(TagType::Audio, timestamp);
    let payload = builder.payload()?;
    write_packet_header(payload, AacPacketType::SequenceHeader);
    payload.put_slice(config);
    Ok(builder.finish_tag()?)
}

/// Emits one raw AAC frame.
pub fn write_access_unit(builder: &mut TagBuilder, timestamp: u32, unit: &AccessUnit) -> Result<usize> {
    builder.begin_tag(TagType::Audio, timestamp);
    let payload = builder.payload()?;
    write_packet_header(payload, AacPacketType::Raw);
    payload.put_slice(&unit.data);
    Ok(builder.finish_tag()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::flv::flv_tag::FlvTag;

    #[test]
    fn test_audio_specific_config() {
        assert_eq!(audio_specific_config(AOT_AAC_LC, 44100, 2), Some([0x12, 0x10]));
        assert_eq!(audio_specific_config(AOT_AAC_LC, 48000, 1), Some([0x11, 0x88]));
        assert_eq!(audio_specific_config(AOT_AAC_LC, 44000, 2), None);
    }

    #[test]
    fn test_sequence_header_record() {
        let mut builder = TagBuilder::new();
        let len = write_sequence_header(&mut builder, 0, &[0x12, 0x10]).unwrap();
        assert_eq!(len, 11 + 4 + 4);
        let tag = FlvTag::from_record(builder.record()).unwrap();
        assert_eq!(tag.kind().unwrap(), TagType::Audio);
        assert_eq!(&tag.data[..], &[0xAF, 0, 0x12, 0x10]);
    }

    #[test]
    fn test_raw_frame_record() {
        let mut builder = TagBuilder::new();
        write_access_unit(&mut builder, 23, &AccessUnit::audio(vec![0x21, 0x10, 0x04])).unwrap();
        let tag = FlvTag::from_record(builder.record()).unwrap();
        assert_eq!(tag.timestamp(), 23);
        assert_eq!(&tag.data[..], &[0xAF, 1, 0x21, 0x10, 0x04]);
    }

    #[test]
    fn test_empty_config_rejected() {
        let mut builder = TagBuilder::new();
        assert!(matches!(
            write_sequence_header(&mut builder, 0, &[]),
            Err(Error::CodecConfig(CodecConfigError::MissingAudioConfig))
        ));
    }
}
