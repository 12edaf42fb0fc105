//! A binary property list ("bplist00") codec, scoped to the flat
//! string/integer/real/boolean dictionaries AirPlay's `/play` and
//! `/playback-info` bodies use. Nested arrays and dates are not needed by
//! this crate's call sites and are intentionally left unimplemented.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum PlistValue {
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(String),
    Dictionary(HashMap<String, PlistValue>),
}

impl PlistValue {
    pub fn as_dict(&self) -> Option<&HashMap<String, PlistValue>> {
        match self {
            PlistValue::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PlistValue::Real(r) => Some(*r),
            PlistValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PlistValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Builds a flat `PlistValue::Dictionary` one key at a time.
#[derive(Default)]
pub struct DictBuilder {
    entries: HashMap<String, PlistValue>,
}

impl DictBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(mut self, key: &str, value: impl Into<PlistValue>) -> Self {
        self.entries.insert(key.to_string(), value.into());
        self
    }

    pub fn build(self) -> PlistValue {
        PlistValue::Dictionary(self.entries)
    }
}

impl From<&str> for PlistValue {
    fn from(s: &str) -> Self {
        PlistValue::String(s.to_string())
    }
}
impl From<String> for PlistValue {
    fn from(s: String) -> Self {
        PlistValue::String(s)
    }
}
impl From<f64> for PlistValue {
    fn from(v: f64) -> Self {
        PlistValue::Real(v)
    }
}
impl From<i64> for PlistValue {
    fn from(v: i64) -> Self {
        PlistValue::Integer(v)
    }
}
impl From<bool> for PlistValue {
    fn from(v: bool) -> Self {
        PlistValue::Boolean(v)
    }
}

const HEADER: &[u8] = b"bplist00";
const TRAILER_LEN: usize = 32;

/// Object-reference size used throughout this encoder. Every call site in
/// this crate deals with single-digit object counts, so one byte is always
/// enough and there is no need for the 2/4-byte escalation a general encoder
/// needs.
const REF_SIZE: u8 = 1;

struct Encoder {
    objects: Vec<Vec<u8>>,
}

impl Encoder {
    fn new() -> Self {
        Self { objects: Vec::new() }
    }

    fn push(&mut self, bytes: Vec<u8>) -> usize {
        self.objects.push(bytes);
        self.objects.len() - 1
    }

    fn encode_value(&mut self, value: &PlistValue) -> usize {
        match value {
            PlistValue::Boolean(b) => self.push(vec![if *b { 0x09 } else { 0x08 }]),
            PlistValue::Integer(i) => {
                let bytes = i.to_be_bytes();
                let mut out = vec![0x13]; // 8-byte int marker
                out.extend_from_slice(&bytes);
                self.push(out)
            }
            PlistValue::Real(r) => {
                let mut out = vec![0x23]; // 8-byte real marker
                out.extend_from_slice(&r.to_be_bytes());
                self.push(out)
            }
            PlistValue::String(s) => {
                let ascii = s.is_ascii();
                let marker_kind = if ascii { 0x5 } else { 0x6 };
                let len = if ascii { s.len() } else { s.encode_utf16().count() };
                let mut out = encode_marker(marker_kind, len);
                if ascii {
                    out.extend_from_slice(s.as_bytes());
                } else {
                    for unit in s.encode_utf16() {
                        out.extend_from_slice(&unit.to_be_bytes());
                    }
                }
                self.push(out)
            }
            PlistValue::Dictionary(dict) => {
                let mut keys: Vec<&String> = dict.keys().collect();
                keys.sort();
                let key_indices: Vec<usize> = keys
                    .iter()
                    .map(|k| self.encode_value(&PlistValue::String((*k).clone())))
                    .collect();
                let value_indices: Vec<usize> = keys.iter().map(|k| self.encode_value(&dict[*k])).collect();

                let mut out = encode_marker(0xD, keys.len());
                for idx in key_indices.iter().chain(value_indices.iter()) {
                    out.push(*idx as u8);
                }
                self.push(out)
            }
        }
    }
}

fn encode_marker(kind: u8, len: usize) -> Vec<u8> {
    if len < 15 {
        vec![(kind << 4) | len as u8]
    } else {
        let mut out = vec![(kind << 4) | 0xF];
        out.extend(encode_marker(0x1, len));
        out
    }
}

pub fn encode(value: &PlistValue) -> Vec<u8> {
    let mut encoder = Encoder::new();
    let root_index = encoder.encode_value(value);

    let mut body = Vec::new();
    body.extend_from_slice(HEADER);
    let mut offsets = Vec::with_capacity(encoder.objects.len());
    for object in &encoder.objects {
        offsets.push(body.len() as u64);
        body.extend_from_slice(object);
    }
    let offset_table_offset = body.len() as u64;
    let offset_size = size_for(offsets.last().copied().unwrap_or(0) + 1);
    for offset in &offsets {
        body.extend(write_sized(*offset, offset_size));
    }

    let mut trailer = vec![0u8; TRAILER_LEN];
    trailer[6] = offset_size;
    trailer[7] = REF_SIZE;
    trailer[8..16].copy_from_slice(&(encoder.objects.len() as u64).to_be_bytes());
    trailer[16..24].copy_from_slice(&(root_index as u64).to_be_bytes());
    trailer[24..32].copy_from_slice(&offset_table_offset.to_be_bytes());
    body.extend_from_slice(&trailer);
    body
}

fn size_for(max_value: u64) -> u8 {
    if max_value <= 0xFF {
        1
    } else if max_value <= 0xFFFF {
        2
    } else if max_value <= 0xFFFF_FFFF {
        4
    } else {
        8
    }
}

fn write_sized(value: u64, size: u8) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    bytes[8 - size as usize..].to_vec()
}

#[derive(Debug, thiserror::Error)]
pub enum PlistDecodeError {
    #[error("too short to be a bplist")]
    TooShort,
    #[error("bad magic header")]
    BadMagic,
    #[error("malformed object at offset {0}")]
    Malformed(usize),
}

pub fn decode(buf: &[u8]) -> Result<PlistValue, PlistDecodeError> {
    if buf.len() < HEADER.len() + TRAILER_LEN {
        return Err(PlistDecodeError::TooShort);
    }
    if &buf[0..8] != HEADER {
        return Err(PlistDecodeError::BadMagic);
    }

    let trailer = &buf[buf.len() - TRAILER_LEN..];
    let offset_size = trailer[6] as usize;
    let ref_size = trailer[7] as usize;
    let num_objects = u64::from_be_bytes(trailer[8..16].try_into().unwrap()) as usize;
    let root_index = u64::from_be_bytes(trailer[16..24].try_into().unwrap()) as usize;
    let offset_table_offset = u64::from_be_bytes(trailer[24..32].try_into().unwrap()) as usize;

    let mut offsets = Vec::with_capacity(num_objects);
    for i in 0..num_objects {
        let start = offset_table_offset + i * offset_size;
        let bytes = buf.get(start..start + offset_size).ok_or(PlistDecodeError::Malformed(start))?;
        offsets.push(read_uint(bytes));
    }

    decode_object(buf, &offsets, ref_size, root_index)
}

fn read_uint(bytes: &[u8]) -> u64 {
    let mut value = 0u64;
    for b in bytes {
        value = (value << 8) | *b as u64;
    }
    value
}

fn decode_object(buf: &[u8], offsets: &[u64], ref_size: usize, index: usize) -> Result<PlistValue, PlistDecodeError> {
    let offset = *offsets.get(index).ok_or(PlistDecodeError::Malformed(index))? as usize;
    let marker = *buf.get(offset).ok_or(PlistDecodeError::Malformed(offset))?;
    let kind = marker >> 4;
    let low = marker & 0xF;

    match kind {
        0x0 if low == 0x8 => Ok(PlistValue::Boolean(false)),
        0x0 if low == 0x9 => Ok(PlistValue::Boolean(true)),
        0x1 => {
            let n = 1usize << low;
            let bytes = buf.get(offset + 1..offset + 1 + n).ok_or(PlistDecodeError::Malformed(offset))?;
            let mut padded = [0u8; 8];
            padded[8 - n..].copy_from_slice(bytes);
            Ok(PlistValue::Integer(i64::from_be_bytes(padded)))
        }
        0x2 => {
            let n = 1usize << low;
            let bytes = buf.get(offset + 1..offset + 1 + n).ok_or(PlistDecodeError::Malformed(offset))?;
            if n == 8 {
                Ok(PlistValue::Real(f64::from_be_bytes(bytes.try_into().unwrap())))
            } else {
                let mut padded = [0u8; 4];
                padded.copy_from_slice(bytes);
                Ok(PlistValue::Real(f32::from_be_bytes(padded) as f64))
            }
        }
        0x5 => {
            let (len, data_offset) = decode_size(buf, offset, low)?;
            let bytes = buf.get(data_offset..data_offset + len).ok_or(PlistDecodeError::Malformed(offset))?;
            Ok(PlistValue::String(String::from_utf8_lossy(bytes).to_string()))
        }
        0x6 => {
            let (len, data_offset) = decode_size(buf, offset, low)?;
            let bytes = buf.get(data_offset..data_offset + len * 2).ok_or(PlistDecodeError::Malformed(offset))?;
            let units: Vec<u16> = bytes.chunks_exact(2).map(|c| u16::from_be_bytes([c[0], c[1]])).collect();
            Ok(PlistValue::String(String::from_utf16_lossy(&units)))
        }
        0xD => {
            let (count, entries_offset) = decode_size(buf, offset, low)?;
            let mut dict = HashMap::with_capacity(count);
            for i in 0..count {
                let key_ref_offset = entries_offset + i * ref_size;
                let value_ref_offset = entries_offset + (count + i) * ref_size;
                let key_index = read_uint(buf.get(key_ref_offset..key_ref_offset + ref_size).ok_or(PlistDecodeError::Malformed(offset))?) as usize;
                let value_index = read_uint(buf.get(value_ref_offset..value_ref_offset + ref_size).ok_or(PlistDecodeError::Malformed(offset))?) as usize;
                let key = decode_object(buf, offsets, ref_size, key_index)?;
                let value = decode_object(buf, offsets, ref_size, value_index)?;
                if let PlistValue::String(k) = key {
                    dict.insert(k, value);
                }
            }
            Ok(PlistValue::Dictionary(dict))
        }
        _ => Err(PlistDecodeError::Malformed(offset)),
    }
}

fn decode_size(buf: &[u8], offset: usize, low: u8) -> Result<(usize, usize), PlistDecodeError> {
    if low < 0xF {
        Ok((low as usize, offset + 1))
    } else {
        let int_marker = *buf.get(offset + 1).ok_or(PlistDecodeError::Malformed(offset))?;
        let n = 1usize << (int_marker & 0xF);
        let bytes = buf.get(offset + 2..offset + 2 + n).ok_or(PlistDecodeError::Malformed(offset))?;
        Ok((read_uint(bytes) as usize, offset + 2 + n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_flat_dict() {
        let value = DictBuilder::new()
            .insert("Content-Location", "http://host/a.mp4")
            .insert("Start-Position", 0.25_f64)
            .build();
        let encoded = encode(&value);
        assert_eq!(&encoded[0..8], HEADER);
        let decoded = decode(&encoded).unwrap();
        let dict = decoded.as_dict().unwrap();
        assert_eq!(dict.get("Content-Location").unwrap().as_str(), Some("http://host/a.mp4"));
        assert_eq!(dict.get("Start-Position").unwrap().as_f64(), Some(0.25));
    }

    #[test]
    fn round_trips_bool_and_int() {
        let value = DictBuilder::new().insert("rate", 1i64).insert("loop", true).build();
        let decoded = decode(&encode(&value)).unwrap();
        let dict = decoded.as_dict().unwrap();
        assert_eq!(dict.get("rate").unwrap(), &PlistValue::Integer(1));
        assert_eq!(dict.get("loop").unwrap(), &PlistValue::Boolean(true));
    }

    #[test]
    fn rejects_bad_magic() {
        assert!(matches!(decode(b"not-a-plist-at-all-00000000000000"), Err(PlistDecodeError::BadMagic)));
    }
}
