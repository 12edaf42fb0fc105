use super::varint::{decode_varint, encode_varint};

/// The CASTV2 wire message. Six stable fields; hand-rolled because a full
/// protobuf reflection stack buys nothing over this fixed, narrow schema.
#[derive(Debug, Clone, PartialEq)]
pub struct CastMessage {
    pub protocol_version: u32,
    pub source_id: String,
    pub destination_id: String,
    pub namespace: String,
    pub payload_type: u32,
    pub payload_utf8: String,
}

impl Default for CastMessage {
    fn default() -> Self {
        Self {
            protocol_version: 0,
            source_id: String::new(),
            destination_id: String::new(),
            namespace: String::new(),
            payload_type: 0,
            payload_utf8: String::new(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    #[error("truncated message")]
    Truncated,
    #[error("invalid utf-8 in field")]
    InvalidUtf8,
}

const WIRE_VARINT: u64 = 0;
const WIRE_LEN: u64 = 2;

fn tag(field: u64, wire_type: u64) -> u64 {
    (field << 3) | wire_type
}

fn write_string(out: &mut Vec<u8>, field: u64, value: &str) {
    encode_varint(tag(field, WIRE_LEN), out);
    encode_varint(value.len() as u64, out);
    out.extend_from_slice(value.as_bytes());
}

fn write_varint_field(out: &mut Vec<u8>, field: u64, value: u64) {
    encode_varint(tag(field, WIRE_VARINT), out);
    encode_varint(value, out);
}

/// Encodes the message body only (no length prefix — the 4-byte big-endian
/// frame length is the transport's responsibility, not the codec's).
pub fn encode(msg: &CastMessage) -> Vec<u8> {
    let mut out = Vec::new();
    write_varint_field(&mut out, 1, msg.protocol_version as u64);
    write_string(&mut out, 2, &msg.source_id);
    write_string(&mut out, 3, &msg.destination_id);
    write_string(&mut out, 4, &msg.namespace);
    write_varint_field(&mut out, 5, msg.payload_type as u64);
    write_string(&mut out, 6, &msg.payload_utf8);
    out
}

pub fn decode(buf: &[u8]) -> Result<CastMessage, ProtoError> {
    let mut msg = CastMessage::default();
    let mut pos = 0usize;

    while pos < buf.len() {
        let (tag_value, next) = decode_varint(buf, pos).ok_or(ProtoError::Truncated)?;
        pos = next;
        let field = tag_value >> 3;
        let wire_type = tag_value & 0x7;

        match wire_type {
            WIRE_VARINT => {
                let (value, next) = decode_varint(buf, pos).ok_or(ProtoError::Truncated)?;
                pos = next;
                match field {
                    1 => msg.protocol_version = value as u32,
                    5 => msg.payload_type = value as u32,
                    _ => {} // unknown varint field, already consumed
                }
            }
            WIRE_LEN => {
                let (len, next) = decode_varint(buf, pos).ok_or(ProtoError::Truncated)?;
                pos = next;
                let end = pos.checked_add(len as usize).ok_or(ProtoError::Truncated)?;
                let bytes = buf.get(pos..end).ok_or(ProtoError::Truncated)?;
                pos = end;
                let text = || std::str::from_utf8(bytes).map(str::to_string).map_err(|_| ProtoError::InvalidUtf8);
                match field {
                    2 => msg.source_id = text()?,
                    3 => msg.destination_id = text()?,
                    4 => msg.namespace = text()?,
                    6 => msg.payload_utf8 = text()?,
                    _ => {} // unknown length-delimited field, already skipped
                }
            }
            _ => return Err(ProtoError::Truncated),
        }
    }

    Ok(msg)
}

/// Wraps `body` with the 4-byte big-endian length prefix CASTV2 framing uses.
pub fn frame(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + body.len());
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(body);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_all_fields() {
        let msg = CastMessage {
            protocol_version: 0,
            source_id: "sender-0".into(),
            destination_id: "receiver-0".into(),
            namespace: "urn:x-cast:com.google.cast.tp.connection".into(),
            payload_type: 0,
            payload_utf8: "{\"type\":\"CONNECT\"}".into(),
        };
        let encoded = encode(&msg);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn frame_prefixes_big_endian_length() {
        let body = encode(&CastMessage {
            source_id: "sender-0".into(),
            destination_id: "receiver-0".into(),
            namespace: "urn:x-cast:com.google.cast.tp.connection".into(),
            payload_utf8: "{\"type\":\"CONNECT\"}".into(),
            ..Default::default()
        });
        let framed = frame(&body);
        let declared_len = u32::from_be_bytes(framed[0..4].try_into().unwrap()) as usize;
        assert_eq!(declared_len, body.len());
        assert_eq!(&framed[4..], &body[..]);
    }
}
