//! Restricted AMF0 codec used for the leading `onMetaData` script-data record.
//!
//! Only the markers a metadata record needs are supported: Number, Boolean,
//! String and the ECMA (associative) array. Keys inside an array are plain
//! length-prefixed strings without a type marker, and the array is closed by
//! the reserved `00 00 09` end marker.

use crate::error::EncodingError;
use bytes::{Buf, BufMut};

pub const NUMBER_MARKER: u8 = 0x00;
pub const BOOLEAN_MARKER: u8 = 0x01;
pub const STRING_MARKER: u8 = 0x02;
pub const ECMA_ARRAY_MARKER: u8 = 0x08;
pub const OBJECT_END_MARKER: [u8; 3] = [0x00, 0x00, 0x09];

pub const MAX_STRING_LENGTH: usize = u16::MAX as usize;

#[derive(Debug, Clone, PartialEq)]
pub enum AmfValue {
    Number(f64),
    String(String),
    Boolean(bool),
    ArrayBegin(u32),
    ArrayEnd,
}

impl From<f64> for AmfValue {
    fn from(value: f64) -> Self {
        AmfValue::Number(value)
    }
}

impl From<bool> for AmfValue {
    fn from(value: bool) -> Self {
        AmfValue::Boolean(value)
    }
}

impl From<&str> for AmfValue {
    fn from(value: &str) -> Self {
        AmfValue::String(value.to_string())
    }
}

/// Length-prefixed string without a marker, as used for array keys.
pub fn write_key<B: BufMut>(buf: &mut B, key: &str) -> Result<(), EncodingError> {
    if key.len() > MAX_STRING_LENGTH {
        return Err(EncodingError::StringTooLong(key.len()));
    }
    buf.put_u16(key.len() as u16);
    buf.put_slice(key.as_bytes());
    Ok(())
}

pub fn write_value<B: BufMut>(buf: &mut B, value: &AmfValue) -> Result<(), EncodingError> {
    match value {
        AmfValue::Number(n) => {
            buf.put_u8(NUMBER_MARKER);
            // BufMut::put_f64 is big-endian on every host
            buf.put_f64(*n);
        }
        AmfValue::Boolean(b) => {
            buf.put_u8(BOOLEAN_MARKER);
            buf.put_u8(u8::from(*b));
        }
        AmfValue::String(s) => {
            if s.len() > MAX_STRING_LENGTH {
                return Err(EncodingError::StringTooLong(s.len()));
            }
            buf.put_u8(STRING_MARKER);
            write_key(buf, s)?;
        }
        AmfValue::ArrayBegin(count) => {
            buf.put_u8(ECMA_ARRAY_MARKER);
            buf.put_u32(*count);
        }
        AmfValue::ArrayEnd => buf.put_slice(&OBJECT_END_MARKER),
    }
    Ok(())
}

/// Writes an ECMA array holding `pairs` in the given order. Keys are neither
/// deduplicated nor sorted.
pub fn write_ecma_array<B: BufMut>(
    buf: &mut B,
    pairs: &[(&str, AmfValue)],
) -> Result<(), EncodingError> {
    write_value(buf, &AmfValue::ArrayBegin(pairs.len() as u32))?;
    for (key, value) in pairs {
        write_key(buf, key)?;
        write_value(buf, value)?;
    }
    write_value(buf, &AmfValue::ArrayEnd)
}

/// Writes a complete script-data payload: the handler name as an AMF string
/// followed by the associative array.
pub fn encode_metadata<B: BufMut>(
    buf: &mut B,
    name: &str,
    pairs: &[(&str, AmfValue)],
) -> Result<(), EncodingError> {
    write_value(buf, &AmfValue::String(name.to_string()))?;
    write_ecma_array(buf, pairs)
}

fn read_key<B: Buf>(buf: &mut B) -> Result<String, EncodingError> {
    if buf.remaining() < 2 {
        return Err(EncodingError::AmfTruncated);
    }
    let len = buf.get_u16() as usize;
    if buf.remaining() < len {
        return Err(EncodingError::AmfTruncated);
    }
    let mut bytes = vec![0u8; len];
    buf.copy_to_slice(&mut bytes);
    String::from_utf8(bytes).map_err(|_| EncodingError::AmfInvalidUtf8)
}

/// Reads one marker-prefixed value. The end marker is only recognised where
/// an array key would start, see [`read_ecma_array`].
pub fn read_value<B: Buf>(buf: &mut B) -> Result<AmfValue, EncodingError> {
    if !buf.has_remaining() {
        return Err(EncodingError::AmfTruncated);
    }
    match buf.get_u8() {
        NUMBER_MARKER => {
            if buf.remaining() < 8 {
                return Err(EncodingError::AmfTruncated);
            }
            Ok(AmfValue::Number(buf.get_f64()))
        }
        BOOLEAN_MARKER => {
            if !buf.has_remaining() {
                return Err(EncodingError::AmfTruncated);
            }
            Ok(AmfValue::Boolean(buf.get_u8() != 0))
        }
        STRING_MARKER => Ok(AmfValue::String(read_key(buf)?)),
        ECMA_ARRAY_MARKER => {
            if buf.remaining() < 4 {
                return Err(EncodingError::AmfTruncated);
            }
            Ok(AmfValue::ArrayBegin(buf.get_u32()))
        }
        other => Err(EncodingError::AmfUnsupportedMarker(other)),
    }
}

/// Reads an ECMA array back into its ordered pair list.
///
/// The declared count is advisory, as in AMF0 itself: pairs are read until the
/// end marker.
pub fn read_ecma_array<B: Buf>(buf: &mut B) -> Result<Vec<(String, AmfValue)>, EncodingError> {
    let count = match read_value(buf)? {
        AmfValue::ArrayBegin(count) => count,
        _ => return Err(EncodingError::AmfUnsupportedMarker(ECMA_ARRAY_MARKER)),
    };

    let mut pairs = Vec::with_capacity(count.min(64) as usize);
    loop {
        if buf.remaining() < 3 {
            return Err(EncodingError::AmfTruncated);
        }
        if buf.chunk().starts_with(&OBJECT_END_MARKER) {
            buf.advance(3);
            return Ok(pairs);
        }
        let key = read_key(buf)?;
        let value = read_value(buf)?;
        pairs.push((key, value));
    }
}

/// Inverse of [`encode_metadata`].
pub fn decode_metadata<B: Buf>(
    buf: &mut B,
) -> Result<(String, Vec<(String, AmfValue)>), EncodingError> {
    let name = match read_value(buf)? {
        AmfValue::String(name) => name,
        _ => return Err(EncodingError::AmfUnsupportedMarker(STRING_MARKER)),
    };
    Ok((name, read_ecma_array(buf)?))
}
