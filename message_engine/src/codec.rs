//! Binary codec — descriptor-driven protobuf wire encoding.
//!
//! Pure codec layer over in-memory buffers:
//!
//! - `encode`: REQUIRED check, present fields by ascending number, then
//!   unknown fields byte-for-byte
//! - `decode` / `decode_with` / `merge`: tag → descriptor lookup → typed
//!   payload, unknown or mistyped fields preserved raw
//! - `encode_length_delimited` / `decode_length_delimited` /
//!   `decode_stream`: varint length-prefixed frames

use std::sync::Arc;

use prost::bytes::BufMut;

use crate::descriptor::MessageDescriptor;
use crate::error::ProtoError;
use crate::field::{FieldDescriptor, FieldType};
use crate::message::DynamicMessage;
use crate::options::CodecOptions;
use crate::store::{Slot, UnknownField};
use crate::value::Value;
use crate::wire::{self, WireType};

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

/// Encode a message to protobuf binary.
///
/// Fails with `MissingRequiredField` if any REQUIRED field (at any depth)
/// is unset.
pub fn encode(message: &DynamicMessage) -> Result<Vec<u8>, ProtoError> {
    message.check_initialized()?;
    let mut buf = Vec::new();
    write_message(message, &mut buf)?;
    Ok(buf)
}

/// Encode with a varint length prefix, for streams of messages.
pub fn encode_length_delimited(message: &DynamicMessage) -> Result<Vec<u8>, ProtoError> {
    let body = encode(message)?;
    let mut buf = Vec::with_capacity(body.len() + 10);
    wire::put_len_delimited(&body, &mut buf);
    Ok(buf)
}

fn write_message(message: &DynamicMessage, buf: &mut Vec<u8>) -> Result<(), ProtoError> {
    for (field, slot) in message.present_fields() {
        match slot {
            Slot::Single(value) => write_field(field, value, buf)?,
            Slot::Repeated(values) if field.is_packed() => {
                let mut block = Vec::new();
                for value in values {
                    write_payload(field, value, &mut block)?;
                }
                wire::put_tag(field.number(), WireType::LengthDelimited, buf);
                wire::put_len_delimited(&block, buf);
            }
            Slot::Repeated(values) => {
                for value in values {
                    write_field(field, value, buf)?;
                }
            }
        }
    }
    for unknown in message.unknown_fields().iter() {
        buf.put_slice(unknown.raw());
    }
    Ok(())
}

fn write_field(field: &FieldDescriptor, value: &Value, buf: &mut Vec<u8>) -> Result<(), ProtoError> {
    wire::put_tag(field.number(), field.field_type().wire_type(), buf);
    write_payload(field, value, buf)
}

fn write_payload(field: &FieldDescriptor, value: &Value, buf: &mut Vec<u8>) -> Result<(), ProtoError> {
    match (field.field_type(), value) {
        // int32 and enums are sign-extended to 64 bits.
        (FieldType::Int32, Value::I32(v)) => wire::put_varint(i64::from(*v) as u64, buf),
        (FieldType::Enum(_), Value::Enum(v)) => wire::put_varint(i64::from(*v) as u64, buf),
        (FieldType::Int64, Value::I64(v)) => wire::put_varint(*v as u64, buf),
        (FieldType::UInt32, Value::U32(v)) => wire::put_varint(u64::from(*v), buf),
        (FieldType::UInt64, Value::U64(v)) => wire::put_varint(*v, buf),
        (FieldType::SInt32, Value::I32(v)) => {
            wire::put_varint(u64::from(wire::zigzag_encode32(*v)), buf)
        }
        (FieldType::SInt64, Value::I64(v)) => wire::put_varint(wire::zigzag_encode64(*v), buf),
        (FieldType::Bool, Value::Bool(v)) => wire::put_varint(u64::from(*v), buf),
        (FieldType::Fixed32, Value::U32(v)) => buf.put_u32_le(*v),
        (FieldType::Fixed64, Value::U64(v)) => buf.put_u64_le(*v),
        (FieldType::SFixed32, Value::I32(v)) => buf.put_i32_le(*v),
        (FieldType::SFixed64, Value::I64(v)) => buf.put_i64_le(*v),
        (FieldType::Float, Value::F32(v)) => buf.put_f32_le(*v),
        (FieldType::Double, Value::F64(v)) => buf.put_f64_le(*v),
        (FieldType::String, Value::Str(s)) => wire::put_len_delimited(s.as_bytes(), buf),
        (FieldType::Bytes, Value::Bytes(b)) => wire::put_len_delimited(b, buf),
        (FieldType::Message(_), Value::Message(m)) => {
            let mut inner = Vec::new();
            write_message(m, &mut inner)?;
            wire::put_len_delimited(&inner, buf);
        }
        (field_type, value) => {
            return Err(ProtoError::TypeMismatch {
                field: field.name().to_string(),
                expected: field_type.to_string(),
                found: value.kind().to_string(),
            })
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// Decode with default options.
pub fn decode(
    descriptor: Arc<MessageDescriptor>,
    buf: &[u8],
) -> Result<DynamicMessage, ProtoError> {
    decode_with(descriptor, buf, &CodecOptions::default())
}

pub fn decode_with(
    descriptor: Arc<MessageDescriptor>,
    buf: &[u8],
    options: &CodecOptions,
) -> Result<DynamicMessage, ProtoError> {
    let mut message = DynamicMessage::new(descriptor);
    merge(&mut message, buf, options)?;
    Ok(message)
}

/// Decode `buf` on top of an existing message.
///
/// Singular scalars take the last value seen, singular messages merge,
/// repeated fields append.
pub fn merge(
    message: &mut DynamicMessage,
    buf: &[u8],
    options: &CodecOptions,
) -> Result<(), ProtoError> {
    if buf.len() > options.max_message_len {
        return Err(ProtoError::malformed(format!(
            "message of {} bytes exceeds max_message_len {}",
            buf.len(),
            options.max_message_len
        )));
    }
    merge_fields(message, buf, options, 0)?;
    if !options.allow_partial {
        message.check_initialized()?;
    }
    Ok(())
}

/// Read one varint length-prefixed frame and advance `buf` past it.
pub fn decode_length_delimited(
    descriptor: Arc<MessageDescriptor>,
    buf: &mut &[u8],
    options: &CodecOptions,
) -> Result<DynamicMessage, ProtoError> {
    let mut peek = *buf;
    let len = wire::read_varint(&mut peek)?;
    if len > options.max_message_len as u64 {
        return Err(ProtoError::malformed(format!(
            "frame of {} bytes exceeds max_message_len {}",
            len, options.max_message_len
        )));
    }
    let frame = wire::read_len_delimited(buf)?;
    decode_with(descriptor, frame, options)
}

/// Decode consecutive length-delimited frames until `buf` is exhausted.
pub fn decode_stream(
    descriptor: Arc<MessageDescriptor>,
    buf: &[u8],
    options: &CodecOptions,
) -> Result<Vec<DynamicMessage>, ProtoError> {
    let mut cursor = buf;
    let mut messages = Vec::new();
    while !cursor.is_empty() {
        messages.push(decode_length_delimited(
            Arc::clone(&descriptor),
            &mut cursor,
            options,
        )?);
    }
    Ok(messages)
}

fn merge_fields(
    message: &mut DynamicMessage,
    input: &[u8],
    options: &CodecOptions,
    depth: u32,
) -> Result<(), ProtoError> {
    if depth > options.recursion_limit {
        return Err(ProtoError::RecursionLimitExceeded(options.recursion_limit));
    }

    let descriptor = Arc::clone(message.descriptor());
    let mut buf = input;
    while !buf.is_empty() {
        let start = input.len() - buf.len();
        let (number, wire_type) = wire::read_tag(&mut buf)?;
        match descriptor.field_by_number(number) {
            Some(field) if accepts(field, wire_type) => {
                read_field(message, field, wire_type, &mut buf, options, depth)?;
            }
            _ => {
                wire::skip_field(wire_type, &mut buf)?;
                if options.preserve_unknown {
                    let end = input.len() - buf.len();
                    log::trace!(
                        "{}: keeping unknown field {} ({:?}, {} bytes)",
                        descriptor.full_name(),
                        number,
                        wire_type,
                        end - start
                    );
                    message.unknown_fields_mut().push(UnknownField::new(
                        number,
                        wire_type,
                        input[start..end].to_vec(),
                    ));
                }
            }
        }
    }
    Ok(())
}

/// Whether a known field may be read with this wire type. Repeated
/// numeric fields accept both the packed and the unpacked form.
fn accepts(field: &FieldDescriptor, wire_type: WireType) -> bool {
    let field_type = field.field_type();
    wire_type == field_type.wire_type()
        || (field.is_repeated()
            && field_type.is_packable()
            && wire_type == WireType::LengthDelimited)
}

fn read_field(
    message: &mut DynamicMessage,
    field: &FieldDescriptor,
    wire_type: WireType,
    buf: &mut &[u8],
    options: &CodecOptions,
    depth: u32,
) -> Result<(), ProtoError> {
    let number = field.number();

    if field.is_repeated()
        && field.field_type().is_packable()
        && wire_type == WireType::LengthDelimited
    {
        let mut block = wire::read_len_delimited(buf)?;
        while !block.is_empty() {
            let value = read_scalar(field.field_type(), &mut block)?;
            message.push(number, value)?;
        }
        return Ok(());
    }

    match field.field_type() {
        FieldType::Message(nested) => {
            let payload = wire::read_len_delimited(buf)?;
            if field.is_repeated() {
                let mut child = DynamicMessage::new(nested.descriptor());
                merge_fields(&mut child, payload, options, depth + 1)?;
                message.push(number, child)?;
            } else {
                merge_fields(message.mutable_message(number)?, payload, options, depth + 1)?;
            }
        }
        field_type => {
            let value = read_scalar(field_type, buf)?;
            if field.is_repeated() {
                message.push(number, value)?;
            } else {
                message.set(number, value)?;
            }
        }
    }
    Ok(())
}

fn read_scalar(field_type: &FieldType, buf: &mut &[u8]) -> Result<Value, ProtoError> {
    Ok(match field_type {
        // Truncation to 32 bits matches other runtimes.
        FieldType::Int32 => Value::I32(wire::read_varint(buf)? as i32),
        FieldType::Int64 => Value::I64(wire::read_varint(buf)? as i64),
        FieldType::UInt32 => Value::U32(wire::read_varint(buf)? as u32),
        FieldType::UInt64 => Value::U64(wire::read_varint(buf)?),
        FieldType::SInt32 => Value::I32(wire::zigzag_decode32(wire::read_varint(buf)? as u32)),
        FieldType::SInt64 => Value::I64(wire::zigzag_decode64(wire::read_varint(buf)?)),
        FieldType::Bool => Value::Bool(wire::read_varint(buf)? != 0),
        FieldType::Enum(_) => Value::Enum(wire::read_varint(buf)? as i32),
        FieldType::Fixed32 => Value::U32(wire::read_fixed32(buf)?),
        FieldType::Fixed64 => Value::U64(wire::read_fixed64(buf)?),
        FieldType::SFixed32 => Value::I32(wire::read_fixed32(buf)? as i32),
        FieldType::SFixed64 => Value::I64(wire::read_fixed64(buf)? as i64),
        FieldType::Float => Value::F32(f32::from_bits(wire::read_fixed32(buf)?)),
        FieldType::Double => Value::F64(f64::from_bits(wire::read_fixed64(buf)?)),
        FieldType::String => {
            let bytes = wire::read_len_delimited(buf)?;
            let text = std::str::from_utf8(bytes).map_err(|e| {
                ProtoError::malformed(format!("invalid UTF-8 in string field: {}", e))
            })?;
            Value::Str(text.to_string())
        }
        FieldType::Bytes => Value::Bytes(wire::read_len_delimited(buf)?.to_vec()),
        FieldType::Message(d) => {
            return Err(ProtoError::malformed(format!(
                "{} cannot be read as a scalar",
                d.full_name()
            )))
        }
    })
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::EnumDescriptor;

    fn node() -> Arc<MessageDescriptor> {
        // A linked list of nodes, built to a fixed depth.
        fn level(depth: u32) -> MessageDescriptor {
            let mut fields = vec![FieldDescriptor::new(1, "value", FieldType::Int32)];
            if depth > 0 {
                fields.push(FieldDescriptor::new(
                    2,
                    "next",
                    FieldType::message(Arc::new(level(depth - 1))),
                ));
            }
            MessageDescriptor::from_fields("test.Node", fields).unwrap()
        }
        Arc::new(level(4))
    }

    fn record() -> Arc<MessageDescriptor> {
        let kind = Arc::new(EnumDescriptor::new("test.Kind", &[("NONE", 0), ("SOME", 1)]));
        Arc::new(
            MessageDescriptor::from_fields(
                "test.Record",
                [
                    FieldDescriptor::new(1, "id", FieldType::UInt64).required(),
                    FieldDescriptor::new(2, "name", FieldType::String),
                    FieldDescriptor::new(3, "delta", FieldType::SInt64),
                    FieldDescriptor::new(4, "score", FieldType::Float),
                    FieldDescriptor::new(5, "flags", FieldType::Int32).repeated().packed(),
                    FieldDescriptor::new(6, "labels", FieldType::String).repeated(),
                    FieldDescriptor::new(7, "kind", FieldType::Enum(kind)),
                    FieldDescriptor::new(8, "blob", FieldType::Bytes),
                    FieldDescriptor::new(9, "checksum", FieldType::Fixed32),
                    FieldDescriptor::new(10, "offset", FieldType::SFixed64),
                    FieldDescriptor::new(11, "ids", FieldType::UInt32).repeated(),
                ],
            )
            .unwrap(),
        )
    }

    fn populated() -> DynamicMessage {
        let mut m = DynamicMessage::new(record());
        m.set(1, 9u64).unwrap()
            .set(2, "rec").unwrap()
            .set(3, -5i64).unwrap()
            .set(4, 0.5f32).unwrap()
            .set_repeated(5, [1, -2, 3]).unwrap()
            .set_repeated(6, ["a", "b"]).unwrap()
            .set(7, Value::Enum(1)).unwrap()
            .set(8, vec![0u8, 255]).unwrap()
            .set(9, 0xdead_beefu32).unwrap()
            .set(10, -1i64).unwrap()
            .set_repeated(11, [7u32, 8]).unwrap();
        m
    }

    #[test]
    fn round_trip_preserves_every_observation() {
        let m = populated();
        let bytes = encode(&m).unwrap();
        let decoded = decode(record(), &bytes).unwrap();
        assert_eq!(decoded, m);
        for field in record().fields() {
            assert_eq!(decoded.has(field.number()), m.has(field.number()));
        }
    }

    #[test]
    fn nan_score_round_trips_equal() {
        let mut m = populated();
        m.set(4, f32::NAN).unwrap();
        let decoded = decode(record(), &encode(&m).unwrap()).unwrap();
        assert!(decoded.get_f32(4).unwrap().is_nan());
        assert_eq!(decoded, m);
    }

    #[test]
    fn unset_fields_stay_unset() {
        let mut m = DynamicMessage::new(record());
        m.set(1, 0u64).unwrap();
        let decoded = decode(record(), &encode(&m).unwrap()).unwrap();
        assert!(decoded.has(1));
        assert!(!decoded.has(2));
        assert!(!decoded.has(5));
    }

    #[test]
    fn fields_are_written_in_ascending_number_order() {
        let mut m = DynamicMessage::new(record());
        m.set(2, "x").unwrap().set(1, 1u64).unwrap();
        assert_eq!(encode(&m).unwrap(), vec![0x08, 0x01, 0x12, 0x01, b'x']);
    }

    #[test]
    fn missing_required_field_fails_encode_and_decode() {
        let m = DynamicMessage::new(record());
        assert_eq!(
            encode(&m).unwrap_err(),
            ProtoError::MissingRequiredField {
                message: "test.Record".to_string(),
                field: "id".to_string(),
            }
        );
        let bytes = [0x12, 0x01, b'x'];
        assert!(matches!(
            decode(record(), &bytes),
            Err(ProtoError::MissingRequiredField { .. })
        ));
        let partial = decode_with(
            record(),
            &bytes,
            &CodecOptions::default().with_allow_partial(true),
        )
        .unwrap();
        assert_eq!(partial.get_str(2).unwrap(), "x");
    }

    #[test]
    fn packed_and_unpacked_repeated_fields_both_decode() {
        // field 5 packed [1, 2], then field 5 unpacked 3
        let bytes = [0x08, 0x01, 0x2a, 0x02, 0x01, 0x02, 0x28, 0x03];
        let m = decode(record(), &bytes).unwrap();
        assert_eq!(
            m.get_repeated(5).unwrap(),
            &[Value::I32(1), Value::I32(2), Value::I32(3)]
        );
        // field 11 is not packed on encode but accepts a packed block
        let bytes = [0x08, 0x01, 0x5a, 0x02, 0x07, 0x08];
        let m = decode(record(), &bytes).unwrap();
        assert_eq!(m.get_repeated(11).unwrap(), &[Value::U32(7), Value::U32(8)]);
    }

    #[test]
    fn unknown_fields_are_preserved_byte_for_byte() {
        // id = 1, field 100 varint 1, field 101 length-delimited "zz"
        let bytes = [0x08, 0x01, 0xa0, 0x06, 0x01, 0xaa, 0x06, 0x02, b'z', b'z'];
        let m = decode(record(), &bytes).unwrap();
        assert_eq!(m.unknown_fields().len(), 2);
        assert!(m.unknown_fields().contains(100));
        assert_eq!(encode(&m).unwrap(), bytes.to_vec());
    }

    #[test]
    fn unknown_fields_can_be_dropped() {
        let bytes = [0x08, 0x01, 0xa0, 0x06, 0x01];
        let options = CodecOptions::default().with_preserve_unknown(false);
        let m = decode_with(record(), &bytes, &options).unwrap();
        assert!(m.unknown_fields().is_empty());
        assert_eq!(encode(&m).unwrap(), vec![0x08, 0x01]);
    }

    #[test]
    fn mistyped_known_field_is_kept_as_unknown() {
        // field 2 (string) arriving as a varint
        let bytes = [0x08, 0x01, 0x10, 0x05];
        let m = decode(record(), &bytes).unwrap();
        assert!(!m.has(2));
        assert!(m.unknown_fields().contains(2));
        assert_eq!(encode(&m).unwrap(), bytes.to_vec());
    }

    #[test]
    fn last_scalar_wins_and_messages_merge() {
        let d = node();
        // value=1, next{value=2}, value=3, next{next{value=4}}
        let bytes = [
            0x08, 0x01, 0x12, 0x02, 0x08, 0x02, 0x08, 0x03, 0x12, 0x04, 0x12, 0x02, 0x08, 0x04,
        ];
        let m = decode(d, &bytes).unwrap();
        assert_eq!(m.get_i32(1).unwrap(), 3);
        let next = m.get_message(2).unwrap();
        assert_eq!(next.get_i32(1).unwrap(), 2);
        assert_eq!(next.get_message(2).unwrap().get_i32(1).unwrap(), 4);
    }

    #[test]
    fn malformed_input_is_rejected() {
        let cases: [&[u8]; 5] = [
            &[0x08],                    // varint missing
            &[0x12, 0x05, b'a'],        // length beyond buffer
            &[0x00, 0x01],              // field number 0
            &[0x0b, 0x0c],              // group wire type
            &[0x12, 0x02, 0xff, 0xfe],  // invalid UTF-8 in string
        ];
        for bytes in cases {
            let err = decode_with(
                record(),
                bytes,
                &CodecOptions::default().with_allow_partial(true),
            )
            .unwrap_err();
            assert!(
                matches!(err, ProtoError::MalformedWireData(_)),
                "expected MalformedWireData for {:02x?}, got {:?}",
                bytes,
                err
            );
        }
    }

    #[test]
    fn recursion_limit_is_enforced() {
        let d = node();
        // next{next{value=1}}
        let bytes = [0x12, 0x04, 0x12, 0x02, 0x08, 0x01];
        let shallow = CodecOptions::default().with_recursion_limit(1);
        assert_eq!(
            decode_with(Arc::clone(&d), &bytes, &shallow).unwrap_err(),
            ProtoError::RecursionLimitExceeded(1)
        );
        let deep_enough = CodecOptions::default().with_recursion_limit(2);
        assert!(decode_with(d, &bytes, &deep_enough).is_ok());
    }

    #[test]
    fn length_delimited_stream() {
        let a = populated();
        let mut b = DynamicMessage::new(record());
        b.set(1, 2u64).unwrap();

        let mut stream = encode_length_delimited(&a).unwrap();
        stream.extend(encode_length_delimited(&b).unwrap());

        let decoded = decode_stream(record(), &stream, &CodecOptions::default()).unwrap();
        assert_eq!(decoded, vec![a, b]);

        let tiny = CodecOptions::default().with_max_message_len(3);
        assert!(matches!(
            decode_stream(record(), &stream, &tiny),
            Err(ProtoError::MalformedWireData(_))
        ));
    }

    #[test]
    fn truncated_frame_is_rejected() {
        let mut frame = encode_length_delimited(&populated()).unwrap();
        frame.truncate(frame.len() - 1);
        let mut cursor = frame.as_slice();
        assert!(decode_length_delimited(record(), &mut cursor, &CodecOptions::default()).is_err());
    }
}
