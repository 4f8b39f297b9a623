//! Wire primitives — tags, varints, zig-zag, fixed-width and
//! length-delimited payloads.
//!
//! Varint and key encoding come from `prost::encoding`; everything here
//! reads from a `&[u8]` cursor and never reads past its end.

use prost::bytes::{Buf, BufMut};
use prost::encoding::{decode_key, decode_varint, encode_key, encode_varint};

pub use prost::encoding::WireType;

use crate::error::ProtoError;

/// Write a field key: `(number << 3) | wire_type` as a varint.
pub fn put_tag(number: u32, wire_type: WireType, buf: &mut Vec<u8>) {
    encode_key(number, wire_type, buf);
}

pub fn put_varint(value: u64, buf: &mut Vec<u8>) {
    encode_varint(value, buf);
}

/// Length prefix followed by the bytes themselves.
pub fn put_len_delimited(bytes: &[u8], buf: &mut Vec<u8>) {
    encode_varint(bytes.len() as u64, buf);
    buf.put_slice(bytes);
}

/// Read a field key. Field number 0, unknown wire types and the
/// deprecated group wire types are malformed.
pub fn read_tag(buf: &mut &[u8]) -> Result<(u32, WireType), ProtoError> {
    let (number, wire_type) = decode_key(buf)?;
    match wire_type {
        WireType::StartGroup | WireType::EndGroup => Err(ProtoError::malformed(format!(
            "field {} uses group encoding, which is not supported",
            number
        ))),
        _ => Ok((number, wire_type)),
    }
}

pub fn read_varint(buf: &mut &[u8]) -> Result<u64, ProtoError> {
    Ok(decode_varint(buf)?)
}

pub fn read_fixed32(buf: &mut &[u8]) -> Result<u32, ProtoError> {
    ensure_remaining(buf, 4)?;
    Ok(buf.get_u32_le())
}

pub fn read_fixed64(buf: &mut &[u8]) -> Result<u64, ProtoError> {
    ensure_remaining(buf, 8)?;
    Ok(buf.get_u64_le())
}

/// Read a length prefix and return the payload slice it covers.
pub fn read_len_delimited<'a>(buf: &mut &'a [u8]) -> Result<&'a [u8], ProtoError> {
    let len = decode_varint(buf)?;
    let len = usize::try_from(len)
        .map_err(|_| ProtoError::malformed(format!("length {} does not fit in memory", len)))?;
    ensure_remaining(buf, len)?;
    let (payload, rest) = buf.split_at(len);
    *buf = rest;
    Ok(payload)
}

/// Advance past one payload of the given wire type.
pub fn skip_field(wire_type: WireType, buf: &mut &[u8]) -> Result<(), ProtoError> {
    match wire_type {
        WireType::Varint => {
            read_varint(buf)?;
        }
        WireType::SixtyFourBit => {
            read_fixed64(buf)?;
        }
        WireType::ThirtyTwoBit => {
            read_fixed32(buf)?;
        }
        WireType::LengthDelimited => {
            read_len_delimited(buf)?;
        }
        WireType::StartGroup | WireType::EndGroup => {
            return Err(ProtoError::malformed("group encoding is not supported"));
        }
    }
    Ok(())
}

pub fn zigzag_encode32(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

pub fn zigzag_decode32(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}

pub fn zigzag_encode64(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

pub fn zigzag_decode64(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

fn ensure_remaining(buf: &[u8], needed: usize) -> Result<(), ProtoError> {
    if buf.len() < needed {
        return Err(ProtoError::malformed(format!(
            "truncated payload: need {} bytes, {} remain",
            needed,
            buf.len()
        )));
    }
    Ok(())
}
