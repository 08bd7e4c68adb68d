use crate::codec::AccessUnit;
use crate::error::{CodecConfigError, Result};
use crate::flv::flv_tag_header::TagType;
use crate::flv::tag_builder::TagBuilder;
use bytes::{BufMut, Bytes, BytesMut};
use log::debug;

/// Frame type 1 (keyframe) in the high nibble, codec id 7 (AVC) in the low one.
pub const AVC_KEYFRAME: u8 = 0x17;
/// Frame type 2 (inter frame), codec id 7.
pub const AVC_INTERFRAME: u8 = 0x27;

pub const NAL_TYPE_IDR: u8 = 5;
pub const NAL_TYPE_SPS: u8 = 7;
pub const NAL_TYPE_PPS: u8 = 8;

/// Length of the NAL size prefix in AVCC payloads.
pub const NAL_LENGTH_SIZE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AvcPacketType {
    SequenceHeader = 0,
    Nalu = 1,
    EndOfSequence = 2,
}

/// Writes the 5-byte AVC video packet header.
///
/// The composition time offset is a signed 24-bit field.
pub fn write_packet_header<B: BufMut>(
    buf: &mut B,
    is_keyframe: bool,
    packet_type: AvcPacketType,
    composition_time_offset: i32,
) {
    buf.put_u8(if is_keyframe { AVC_KEYFRAME } else { AVC_INTERFRAME });
    buf.put_u8(packet_type as u8);
    buf.put_uint((composition_time_offset as u32 & 0x00FF_FFFF) as u64, 3);
}

pub fn nal_unit_type(nal: &[u8]) -> Option<u8> {
    nal.first().map(|header| header & 0x1F)
}

/// AVCDecoderConfigurationRecord carrying a single SPS and a single PPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfigurationRecord {
    pub sps: Bytes,
    pub pps: Bytes,
}

impl DecoderConfigurationRecord {
    /// Picks the SPS and PPS out of an encoder's header NAL units.
    ///
    /// Other NAL types (SEI, AUD) are skipped. A second SPS or PPS is an error,
    /// there is no attempt to choose between them.
    pub fn from_nal_units<N: AsRef<[u8]>>(nals: &[N]) -> Result<Self, CodecConfigError> {
        let mut sps: Option<Bytes> = None;
        let mut pps: Option<Bytes> = None;

        for nal in nals {
            let nal = nal.as_ref();
            match nal_unit_type(nal) {
                Some(NAL_TYPE_SPS) => {
                    if sps.is_some() {
                        return Err(CodecConfigError::MultipleSps);
                    }
                    sps = Some(Bytes::copy_from_slice(nal));
                }
                Some(NAL_TYPE_PPS) => {
                    if pps.is_some() {
                        return Err(CodecConfigError::MultiplePps);
                    }
                    pps = Some(Bytes::copy_from_slice(nal));
                }
                Some(other) => debug!("Skipping header NAL unit of type {other}"),
                None => {}
            }
        }

        let sps = sps.ok_or(CodecConfigError::MissingSps)?;
        let pps = pps.ok_or(CodecConfigError::MissingPps)?;
        if sps.len() < 4 {
            return Err(CodecConfigError::SpsTooShort(sps.len()));
        }
        Ok(Self { sps, pps })
    }

    pub fn profile_indication(&self) -> u8 {
        self.sps[1]
    }

    pub fn profile_compatibility(&self) -> u8 {
        self.sps[2]
    }

    pub fn level_indication(&self) -> u8 {
        self.sps[3]
    }

    /// Serialized length of the record.
    pub fn encoded_len(&self) -> usize {
        6 + 2 + self.sps.len() + 1 + 2 + self.pps.len()
    }

    pub fn write_to<B: BufMut>(&self, buf: &mut B) -> Result<(), CodecConfigError> {
        if self.sps.len() < 4 {
            return Err(CodecConfigError::SpsTooShort(self.sps.len()));
        }
        for set in [&self.sps, &self.pps] {
            if set.len() > u16::MAX as usize {
                return Err(CodecConfigError::ParameterSetTooLong(set.len()));
            }
        }

        buf.put_u8(0x01); // configurationVersion
        buf.put_u8(self.profile_indication());
        buf.put_u8(self.profile_compatibility());
        buf.put_u8(self.level_indication());
        // 6 reserved bits, lengthSizeMinusOne = 3
        buf.put_u8(0xFC | (NAL_LENGTH_SIZE as u8 - 1));
        // 3 reserved bits, one SPS
        buf.put_u8(0xE0 | 1);
        buf.put_u16(self.sps.len() as u16);
        buf.put_slice(&self.sps);
        // one PPS
        buf.put_u8(1);
        buf.put_u16(self.pps.len() as u16);
        buf.put_slice(&self.pps);
        Ok(())
    }
}

/// How an encoder delimits the NAL units it outputs.
///
/// The framing of a stream is fixed when the encoder is opened. It cannot be
/// told from a packet's leading bytes: a 4-byte length prefix of 256 to 511
/// reads as `00 00 01 xx`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NalFraming {
    /// Start codes, with parameter sets in-band or in Annex-B extradata.
    AnnexB,
    /// 4-byte length prefixes, with an avcC record as extradata.
    LengthPrefixed,
}

impl NalFraming {
    /// Reads the framing off the encoder's extradata. An avcC record starts
    /// with configurationVersion 1, an Annex-B header with a zero byte.
    pub fn from_extradata(extradata: &[u8]) -> Self {
        match extradata.first() {
            Some(0x01) => NalFraming::LengthPrefixed,
            _ => NalFraming::AnnexB,
        }
    }
}

/// Pulls the SPS and PPS NAL units out of a serialized avcC record.
pub fn parameter_sets_from_avcc(record: &[u8]) -> Result<Vec<&[u8]>, CodecConfigError> {
    fn take<'a>(data: &mut &'a [u8], len: usize) -> Result<&'a [u8], CodecConfigError> {
        if data.len() < len {
            return Err(CodecConfigError::TruncatedConfigRecord);
        }
        let (head, tail) = data.split_at(len);
        *data = tail;
        Ok(head)
    }
    fn take_sets<'a>(
        data: &mut &'a [u8],
        count: usize,
        sets: &mut Vec<&'a [u8]>,
    ) -> Result<(), CodecConfigError> {
        for _ in 0..count {
            let len = take(data, 2)?;
            let len = u16::from_be_bytes([len[0], len[1]]) as usize;
            sets.push(take(data, len)?);
        }
        Ok(())
    }

    let mut data = record;
    let fixed = take(&mut data, 6)?;
    if fixed[0] != 0x01 {
        return Err(CodecConfigError::TruncatedConfigRecord);
    }
    let mut sets = Vec::new();
    take_sets(&mut data, (fixed[5] & 0x1F) as usize, &mut sets)?;
    let pps_count = take(&mut data, 1)?[0] as usize;
    take_sets(&mut data, pps_count, &mut sets)?;
    Ok(sets)
}

/// Splits an Annex-B byte stream on its 3- or 4-byte start codes.
///
/// Bytes in front of the first start code are ignored, empty NAL units dropped.
pub fn split_annex_b(data: &[u8]) -> Vec<&[u8]> {
    let mut nals = Vec::new();
    let mut start: Option<usize> = None;
    let mut i = 0;

    while i + 2 < data.len() {
        if data[i] == 0 && data[i + 1] == 0 && data[i + 2] == 1 {
            if let Some(s) = start {
                push_nal(&mut nals, &data[s..i]);
            }
            i += 3;
            start = Some(i);
        } else {
            i += 1;
        }
    }
    if let Some(s) = start {
        if s < data.len() {
            push_nal(&mut nals, &data[s..]);
        }
    }
    nals
}

fn push_nal<'a>(nals: &mut Vec<&'a [u8]>, nal: &'a [u8]) {
    // a zero in front of the next start code belongs to that (4-byte) code
    let end = nal.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
    if end > 0 {
        nals.push(&nal[..end]);
    }
}

/// Splits an AVCC payload made of 4-byte length-prefixed NAL units.
pub fn split_length_prefixed(mut data: &[u8]) -> Vec<&[u8]> {
    let mut nals = Vec::new();
    while data.len() >= NAL_LENGTH_SIZE {
        let len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
        data = &data[NAL_LENGTH_SIZE..];
        if len > data.len() {
            break;
        }
        nals.push(&data[..len]);
        data = &data[len..];
    }
    nals
}

pub fn write_length_prefixed<B: BufMut>(buf: &mut B, nals: &[&[u8]]) {
    for nal in nals {
        buf.put_u32(nal.len() as u32);
        buf.put_slice(nal);
    }
}

/// Converts encoder output to the 4-byte length-prefixed form FLV carries.
/// Length-prefixed input passes through unchanged.
pub fn to_length_prefixed(data: &[u8], framing: NalFraming) -> Bytes {
    if framing == NalFraming::LengthPrefixed {
        return Bytes::copy_from_slice(data);
    }
    let nals = split_annex_b(data);
    let mut buf = BytesMut::with_capacity(data.len() + nals.len() * NAL_LENGTH_SIZE);
    write_length_prefixed(&mut buf, &nals);
    buf.freeze()
}

/// Emits the video sequence header record (keyframe, packet type 0).
pub fn write_sequence_header(
    builder: &mut TagBuilder,
    timestamp: u32,
    config: &DecoderConfigurationRecord,
) -> Result<usize> {
    builder.begin_tag(TagType::Video, timestamp);
    let payload = builder.payload()?;
    write_packet_header(payload, true, AvcPacketType::SequenceHeader, 0);
    config.write_to(payload)?;
    Ok(builder.finish_tag()?)
}

/// Emits one coded picture (packet type 1).
pub fn write_access_unit(
    builder: &mut TagBuilder,
    timestamp: u32,
    unit: &AccessUnit,
) -> Result<usize> {
    builder.begin_tag(TagType::Video, timestamp);
    let payload = builder.payload()?;
    write_packet_header(
        payload,
        unit.is_keyframe,
        AvcPacketType::Nalu,
        unit.composition_time_offset,
    );
    payload.put_slice(&unit.data);
    Ok(builder.finish_tag()?)
}

/// Emits the empty-bodied end-of-sequence record (packet type 2).
pub fn write_end_of_sequence(builder: &mut TagBuilder, timestamp: u32) -> Result<usize> {
    builder.begin_tag(TagType::Video, timestamp);
    write_packet_header(builder.payload()?, true, AvcPacketType::EndOfSequence, 0);
    Ok(builder.finish_tag()?)
}
