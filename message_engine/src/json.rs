//! JSON mapping of messages.
//!
//! - objects keyed by field name, present fields only, insertion order
//! - 64-bit integers as decimal strings
//! - bytes as lowercase hex
//! - enums by symbolic name when the number is declared
//! - non-finite floats as "NaN" / "Infinity" / "-Infinity"
//!
//! Unknown fields have no JSON form and are not emitted.

use std::sync::Arc;

use serde_json::{Map, Number, Value as Json};

use crate::descriptor::MessageDescriptor;
use crate::error::ProtoError;
use crate::field::{FieldDescriptor, FieldType};
use crate::message::DynamicMessage;
use crate::store::Slot;
use crate::value::Value;

/// Convert a message to a JSON object.
pub fn to_json(message: &DynamicMessage) -> Json {
    let mut map = Map::new();
    for field in message.descriptor().fields() {
        let entry = match message.store().get(field.number()) {
            Some(Slot::Single(value)) => value_to_json(field, value),
            Some(Slot::Repeated(values)) => {
                Json::Array(values.iter().map(|v| value_to_json(field, v)).collect())
            }
            None => continue,
        };
        map.insert(field.name().to_string(), entry);
    }
    Json::Object(map)
}

/// Build a message of `descriptor` from a JSON object.
///
/// `null` members are treated as unset. Unknown member names fail with
/// `NoSuchField`, wrongly-typed members with `TypeMismatch`.
pub fn from_json(
    descriptor: Arc<MessageDescriptor>,
    json: &Json,
) -> Result<DynamicMessage, ProtoError> {
    let object = json.as_object().ok_or_else(|| ProtoError::TypeMismatch {
        field: descriptor.full_name().to_string(),
        expected: "JSON object".to_string(),
        found: json_kind(json).to_string(),
    })?;

    let mut message = DynamicMessage::new(Arc::clone(&descriptor));
    for (name, member) in object {
        let field = descriptor
            .field_by_name(name)
            .ok_or_else(|| ProtoError::NoSuchField {
                message: descriptor.full_name().to_string(),
                field: name.clone(),
            })?;
        if member.is_null() {
            continue;
        }
        if field.is_repeated() {
            let items = member.as_array().ok_or_else(|| mismatch(field, "JSON array", member))?;
            let values = items
                .iter()
                .map(|item| json_to_value(field, item))
                .collect::<Result<Vec<_>, _>>()?;
            message.set_repeated(field.number(), values)?;
        } else {
            message.set(field.number(), json_to_value(field, member)?)?;
        }
    }
    Ok(message)
}

fn value_to_json(field: &FieldDescriptor, value: &Value) -> Json {
    match (field.field_type(), value) {
        (FieldType::Enum(e), Value::Enum(n)) => match e.name_of(*n) {
            Some(name) => Json::String(name.to_string()),
            None => Json::from(*n),
        },
        (_, Value::I32(v)) | (_, Value::Enum(v)) => Json::from(*v),
        (_, Value::U32(v)) => Json::from(*v),
        (_, Value::I64(v)) => Json::String(v.to_string()),
        (_, Value::U64(v)) => Json::String(v.to_string()),
        (_, Value::Bool(v)) => Json::Bool(*v),
        (_, Value::F32(v)) => float_to_json(f64::from(*v)),
        (_, Value::F64(v)) => float_to_json(*v),
        (_, Value::Str(s)) => Json::String(s.clone()),
        (_, Value::Bytes(b)) => Json::String(b.iter().map(|x| format!("{:02x}", x)).collect()),
        (_, Value::Message(m)) => to_json(m),
    }
}

fn float_to_json(v: f64) -> Json {
    match Number::from_f64(v) {
        Some(n) => Json::Number(n),
        None if v.is_nan() => Json::String("NaN".to_string()),
        None if v > 0.0 => Json::String("Infinity".to_string()),
        None => Json::String("-Infinity".to_string()),
    }
}

fn json_to_value(field: &FieldDescriptor, json: &Json) -> Result<Value, ProtoError> {
    match field.field_type() {
        FieldType::Int32
        | FieldType::Int64
        | FieldType::UInt32
        | FieldType::UInt64
        | FieldType::SInt32
        | FieldType::SInt64
        | FieldType::Fixed32
        | FieldType::Fixed64
        | FieldType::SFixed32
        | FieldType::SFixed64 => json_integer(json).ok_or_else(|| mismatch(field, "integer", json)),
        // float fields take the nearest f32
        FieldType::Float => json_float(json)
            .map(|v| Value::F32(v as f32))
            .ok_or_else(|| mismatch(field, "number", json)),
        FieldType::Double => json_float(json)
            .map(Value::F64)
            .ok_or_else(|| mismatch(field, "number", json)),
        FieldType::Bool => json
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| mismatch(field, "boolean", json)),
        FieldType::String => json
            .as_str()
            .map(|s| Value::Str(s.to_string()))
            .ok_or_else(|| mismatch(field, "string", json)),
        FieldType::Bytes => json
            .as_str()
            .and_then(decode_hex)
            .map(Value::Bytes)
            .ok_or_else(|| mismatch(field, "hex string", json)),
        FieldType::Enum(e) => match json {
            Json::String(name) => e.number_of(name).map(Value::Enum),
            other => json_integer(other),
        }
        .ok_or_else(|| mismatch(field, "enum name or number", json)),
        FieldType::Message(d) => from_json(d.descriptor(), json).map(Value::from),
    }
}

fn json_float(json: &Json) -> Option<f64> {
    match json {
        Json::Number(n) => n.as_f64(),
        Json::String(s) => match s.as_str() {
            "NaN" => Some(f64::NAN),
            "Infinity" => Some(f64::INFINITY),
            "-Infinity" => Some(f64::NEG_INFINITY),
            other => other.parse::<f64>().ok(),
        },
        _ => None,
    }
}

/// JSON number or decimal string, as the widest integer kind that holds it.
fn json_integer(json: &Json) -> Option<Value> {
    match json {
        Json::Number(n) => n
            .as_i64()
            .map(Value::I64)
            .or_else(|| n.as_u64().map(Value::U64)),
        Json::String(s) => s
            .parse::<i64>()
            .map(Value::I64)
            .ok()
            .or_else(|| s.parse::<u64>().ok().map(Value::U64)),
        _ => None,
    }
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    // from_str_radix alone would take a leading '+'
    if s.len() % 2 != 0 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| s.get(i..i + 2).and_then(|pair| u8::from_str_radix(pair, 16).ok()))
        .collect()
}

fn mismatch(field: &FieldDescriptor, expected: &str, found: &Json) -> ProtoError {
    ProtoError::TypeMismatch {
        field: field.name().to_string(),
        expected: expected.to_string(),
        found: json_kind(found).to_string(),
    }
}

fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}
