//! Field values — one variant per storage kind.
//!
//! Several field types share a storage kind (`sint32`, `sfixed32` and
//! `int32` are all stored as `I32`); the field type only changes the wire
//! encoding.

use crate::field::FieldType;
use crate::message::DynamicMessage;

/// A single field value.
///
/// Equality compares floats by bit pattern, so a NaN equals itself and
/// `0.0` differs from `-0.0`.
#[derive(Debug, Clone)]
pub enum Value {
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    Bool(bool),
    F32(f32),
    F64(f64),
    Str(String),
    Bytes(Vec<u8>),
    Enum(i32),
    Message(Box<DynamicMessage>),
}

impl Value {
    /// Short name of the storage kind, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::U32(_) => "u32",
            Value::U64(_) => "u64",
            Value::Bool(_) => "bool",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Enum(_) => "enum",
            Value::Message(_) => "message",
        }
    }

    /// The zero value of a field type: 0, false, "", empty bytes, the
    /// first declared enum number, or an empty nested message.
    pub fn zero_of(field_type: &FieldType) -> Value {
        match field_type {
            FieldType::Int32 | FieldType::SInt32 | FieldType::SFixed32 => Value::I32(0),
            FieldType::Int64 | FieldType::SInt64 | FieldType::SFixed64 => Value::I64(0),
            FieldType::UInt32 | FieldType::Fixed32 => Value::U32(0),
            FieldType::UInt64 | FieldType::Fixed64 => Value::U64(0),
            FieldType::Bool => Value::Bool(false),
            FieldType::Float => Value::F32(0.0),
            FieldType::Double => Value::F64(0.0),
            FieldType::String => Value::Str(String::new()),
            FieldType::Bytes => Value::Bytes(Vec::new()),
            FieldType::Enum(e) => Value::Enum(e.first_number()),
            FieldType::Message(d) => Value::Message(Box::new(DynamicMessage::new(d.descriptor()))),
        }
    }

    /// Convert into the storage kind of `field_type`.
    ///
    /// Integers convert between widths and signedness when the value is in
    /// range. Integers and floats convert to float kinds when the result
    /// represents the same number exactly. Integers convert to enums and
    /// strings convert to bytes. Nested messages must carry a
    /// descriptor with the declared full name. Returns `None` otherwise.
    pub fn coerce_to(self, field_type: &FieldType) -> Option<Value> {
        match field_type {
            FieldType::Int32 | FieldType::SInt32 | FieldType::SFixed32 => self
                .as_integer()
                .and_then(|i| i32::try_from(i).ok())
                .map(Value::I32),
            FieldType::Int64 | FieldType::SInt64 | FieldType::SFixed64 => self
                .as_integer()
                .and_then(|i| i64::try_from(i).ok())
                .map(Value::I64),
            FieldType::UInt32 | FieldType::Fixed32 => self
                .as_integer()
                .and_then(|i| u32::try_from(i).ok())
                .map(Value::U32),
            FieldType::UInt64 | FieldType::Fixed64 => self
                .as_integer()
                .and_then(|i| u64::try_from(i).ok())
                .map(Value::U64),
            FieldType::Enum(_) => self
                .as_integer()
                .and_then(|i| i32::try_from(i).ok())
                .map(Value::Enum),
            FieldType::Bool => match self {
                Value::Bool(b) => Some(Value::Bool(b)),
                _ => None,
            },
            FieldType::Float => match self {
                Value::F32(v) => Some(Value::F32(v)),
                Value::F64(v) if v.is_nan() => Some(Value::F32(f32::NAN)),
                Value::F64(v) => {
                    let narrowed = v as f32;
                    (f64::from(narrowed) == v).then_some(Value::F32(narrowed))
                }
                other => other.as_integer().and_then(|i| {
                    let f = i as f32;
                    (f as i128 == i).then_some(Value::F32(f))
                }),
            },
            FieldType::Double => match self {
                Value::F32(v) => Some(Value::F64(f64::from(v))),
                Value::F64(v) => Some(Value::F64(v)),
                other => other.as_integer().and_then(|i| {
                    let f = i as f64;
                    (f as i128 == i).then_some(Value::F64(f))
                }),
            },
            FieldType::String => match self {
                Value::Str(s) => Some(Value::Str(s)),
                _ => None,
            },
            FieldType::Bytes => match self {
                Value::Bytes(b) => Some(Value::Bytes(b)),
                Value::Str(s) => Some(Value::Bytes(s.into_bytes())),
                _ => None,
            },
            FieldType::Message(d) => match self {
                Value::Message(m) if m.full_name() == d.full_name() => Some(Value::Message(m)),
                _ => None,
            },
        }
    }

    fn as_integer(&self) -> Option<i128> {
        match self {
            Value::I32(v) | Value::Enum(v) => Some(i128::from(*v)),
            Value::I64(v) => Some(i128::from(*v)),
            Value::U32(v) => Some(i128::from(*v)),
            Value::U64(v) => Some(i128::from(*v)),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        self.as_integer().and_then(|i| i32::try_from(i).ok())
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_integer().and_then(|i| i64::try_from(i).ok())
    }

    pub fn as_u32(&self) -> Option<u32> {
        self.as_integer().and_then(|i| u32::try_from(i).ok())
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.as_integer().and_then(|i| u64::try_from(i).ok())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::F32(v) => Some(*v),
            Value::F64(v) => Some(*v as f32),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F32(v) => Some(f64::from(*v)),
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            Value::Str(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&DynamicMessage> {
        match self {
            Value::Message(m) => Some(m),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::I32(a), Value::I32(b)) | (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::U32(a), Value::U32(b)) => a == b,
            (Value::U64(a), Value::U64(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::F32(a), Value::F32(b)) => a.to_bits() == b.to_bits(),
            (Value::F64(a), Value::F64(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Message(a), Value::Message(b)) => a == b,
            _ => false,
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::U32(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::U64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::F32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<DynamicMessage> for Value {
    fn from(v: DynamicMessage) -> Self {
        Value::Message(Box::new(v))
    }
}
