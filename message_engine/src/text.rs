//! Text format — human-readable dump of a message.
//!
//! Fields appear in descriptor insertion order, unknown fields last.
//! Output is deterministic; it is a debugging aid, not a parse target.

use crate::field::{FieldDescriptor, FieldType};
use crate::message::DynamicMessage;
use crate::store::{Slot, UnknownField};
use crate::value::Value;
use crate::wire::{self, WireType};

#[derive(Clone, Copy)]
enum Layout {
    Multiline,
    SingleLine,
}

/// One `name: value` line per field, nested messages indented by two
/// spaces.
pub fn to_text(message: &DynamicMessage) -> String {
    let mut out = String::new();
    write_fields(message, Layout::Multiline, 0, &mut out);
    out
}

/// Same content as `to_text` on one line, entries separated by spaces.
pub fn to_short_text(message: &DynamicMessage) -> String {
    let mut out = String::new();
    write_fields(message, Layout::SingleLine, 0, &mut out);
    out.trim_end().to_string()
}

fn write_fields(message: &DynamicMessage, layout: Layout, indent: usize, out: &mut String) {
    for field in message.descriptor().fields() {
        match message.store().get(field.number()) {
            Some(Slot::Single(value)) => write_entry(field, value, layout, indent, out),
            Some(Slot::Repeated(values)) => {
                for value in values {
                    write_entry(field, value, layout, indent, out);
                }
            }
            None => {}
        }
    }
    for unknown in message.unknown_fields().iter() {
        let line = format!("{}: {}", unknown.number(), render_unknown(unknown));
        push_line(&line, layout, indent, out);
    }
}

fn write_entry(
    field: &FieldDescriptor,
    value: &Value,
    layout: Layout,
    indent: usize,
    out: &mut String,
) {
    match value {
        Value::Message(m) => {
            push_line(&format!("{} {{", field.name()), layout, indent, out);
            write_fields(m, layout, indent + 1, out);
            push_line("}", layout, indent, out);
        }
        scalar => {
            let line = format!("{}: {}", field.name(), render_scalar(field.field_type(), scalar));
            push_line(&line, layout, indent, out);
        }
    }
}

fn push_line(line: &str, layout: Layout, indent: usize, out: &mut String) {
    match layout {
        Layout::Multiline => {
            out.push_str(&"  ".repeat(indent));
            out.push_str(line);
            out.push('\n');
        }
        Layout::SingleLine => {
            out.push_str(line);
            out.push(' ');
        }
    }
}

fn render_scalar(field_type: &FieldType, value: &Value) -> String {
    match (field_type, value) {
        (FieldType::Enum(e), Value::Enum(n)) => match e.name_of(*n) {
            Some(name) => name.to_string(),
            None => n.to_string(),
        },
        (_, Value::Str(s)) => quote(s.as_bytes()),
        (_, Value::Bytes(b)) => quote(b),
        (_, Value::I32(v)) | (_, Value::Enum(v)) => v.to_string(),
        (_, Value::I64(v)) => v.to_string(),
        (_, Value::U32(v)) => v.to_string(),
        (_, Value::U64(v)) => v.to_string(),
        (_, Value::Bool(v)) => v.to_string(),
        (_, Value::F32(v)) => v.to_string(),
        (_, Value::F64(v)) => v.to_string(),
        (_, Value::Message(m)) => format!("{{ {} }}", to_short_text(m)),
    }
}

fn render_unknown(field: &UnknownField) -> String {
    let mut buf = field.raw();
    let rendered = wire::read_tag(&mut buf).and_then(|_| match field.wire_type() {
        WireType::Varint => wire::read_varint(&mut buf).map(|v| v.to_string()),
        WireType::ThirtyTwoBit => wire::read_fixed32(&mut buf).map(|v| format!("0x{:08x}", v)),
        WireType::SixtyFourBit => wire::read_fixed64(&mut buf).map(|v| format!("0x{:016x}", v)),
        WireType::LengthDelimited => wire::read_len_delimited(&mut buf).map(quote),
        WireType::StartGroup | WireType::EndGroup => Ok("<group>".to_string()),
    });
    rendered.unwrap_or_else(|_| "<malformed>".to_string())
}

/// Double-quoted, with C-style escapes and octal for other
/// non-printable bytes.
fn quote(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + 2);
    out.push('"');
    match std::str::from_utf8(bytes) {
        Ok(text) => {
            for c in text.chars() {
                match c {
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    '\n' => out.push_str("\\n"),
                    '\r' => out.push_str("\\r"),
                    '\t' => out.push_str("\\t"),
                    c if c.is_control() => out.push_str(&format!("\\{:03o}", c as u32)),
                    c => out.push(c),
                }
            }
        }
        Err(_) => {
            for &b in bytes {
                match b {
                    b'"' => out.push_str("\\\""),
                    b'\\' => out.push_str("\\\\"),
                    0x20..=0x7e => out.push(b as char),
                    _ => out.push_str(&format!("\\{:03o}", b)),
                }
            }
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::codec;
    use crate::descriptor::MessageDescriptor;
    use crate::field::EnumDescriptor;

    fn descriptors() -> Arc<MessageDescriptor> {
        let point = Arc::new(
            MessageDescriptor::from_fields(
                "test.Point",
                [
                    FieldDescriptor::new(1, "x", FieldType::Int32),
                    FieldDescriptor::new(2, "y", FieldType::Int32),
                ],
            )
            .unwrap(),
        );
        let shape = Arc::new(EnumDescriptor::new("test.Shape", &[("LINE", 0), ("RING", 1)]));
        Arc::new(
            MessageDescriptor::from_fields(
                "test.Path",
                [
                    FieldDescriptor::new(3, "name", FieldType::String),
                    FieldDescriptor::new(1, "points", FieldType::message(point)).repeated(),
                    FieldDescriptor::new(2, "shape", FieldType::Enum(shape)),
                    FieldDescriptor::new(4, "tag", FieldType::Bytes),
                ],
            )
            .unwrap(),
        )
    }

    fn sample() -> DynamicMessage {
        let d = descriptors();
        let point = match d.field_by_number(1).unwrap().field_type() {
            FieldType::Message(p) => p.descriptor(),
            _ => unreachable!(),
        };
        let mut a = DynamicMessage::new(Arc::clone(&point));
        a.set(1, 1).unwrap().set(2, -2).unwrap();
        let mut m = DynamicMessage::new(d);
        m.set(3, "say \"hi\"\n").unwrap()
            .push(1, a).unwrap()
            .set(2, Value::Enum(1)).unwrap()
            .set(4, vec![0x00u8, b'a']).unwrap();
        m
    }

    #[test]
    fn multiline_follows_insertion_order() {
        let expected = "name: \"say \\\"hi\\\"\\n\"\n\
                        points {\n  x: 1\n  y: -2\n}\n\
                        shape: RING\n\
                        tag: \"\\000a\"\n";
        assert_eq!(to_text(&sample()), expected);
    }

    #[test]
    fn single_line_variant() {
        assert_eq!(
            to_short_text(&sample()),
            "name: \"say \\\"hi\\\"\\n\" points { x: 1 y: -2 } shape: RING tag: \"\\000a\""
        );
        assert_eq!(sample().to_string(), to_short_text(&sample()));
    }

    #[test]
    fn unknown_enum_number_prints_as_number() {
        let mut m = DynamicMessage::new(descriptors());
        m.set(2, 7).unwrap();
        assert_eq!(to_text(&m), "shape: 7\n");
    }

    #[test]
    fn unknown_fields_are_listed_last() {
        // name = "n", field 9 varint 150, field 10 fixed32 1
        let bytes = [0x1a, 0x01, b'n', 0x48, 0x96, 0x01, 0x55, 0x01, 0x00, 0x00, 0x00];
        let m = codec::decode(descriptors(), &bytes).unwrap();
        assert_eq!(to_text(&m), "name: \"n\"\n9: 150\n10: 0x00000001\n");
    }
}
