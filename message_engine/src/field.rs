//! Field Descriptor — immutable metadata for one field.
//!
//! A field is identified on the wire by its number and encoded according
//! to its type. The name is only used by the text and JSON formats.

use std::fmt;
use std::sync::Arc;

use crate::descriptor::MessageDescriptor;
use crate::registry::DescriptorCell;
use crate::value::Value;
use crate::wire::WireType;

/// Largest field number the wire format can carry (2^29 - 1).
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;

/// Cardinality of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    Optional,
    Required,
    Repeated,
}

impl Rule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rule::Optional => "optional",
            Rule::Required => "required",
            Rule::Repeated => "repeated",
        }
    }
}

// ── Enum Descriptor ────────────────────────────────────────────

/// Symbolic names of an enum type. Enums are open: numbers without a
/// declared name are still valid values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDescriptor {
    full_name: String,
    values: Vec<(String, i32)>,
}

impl EnumDescriptor {
    pub fn new(full_name: impl Into<String>, values: &[(&str, i32)]) -> Self {
        Self {
            full_name: full_name.into(),
            values: values
                .iter()
                .map(|(name, number)| (name.to_string(), *number))
                .collect(),
        }
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn values(&self) -> impl Iterator<Item = (&str, i32)> {
        self.values.iter().map(|(name, number)| (name.as_str(), *number))
    }

    pub fn name_of(&self, number: i32) -> Option<&str> {
        self.values
            .iter()
            .find(|(_, n)| *n == number)
            .map(|(name, _)| name.as_str())
    }

    pub fn number_of(&self, name: &str) -> Option<i32> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, number)| *number)
    }

    /// Zero value of the enum: the first declared number, or 0.
    pub fn first_number(&self) -> i32 {
        self.values.first().map(|(_, number)| *number).unwrap_or(0)
    }
}

// ── Message Type ───────────────────────────────────────────────

/// Descriptor of a nested message field.
///
/// `Generated` resolves through the type's cell on every lookup, so a
/// containing type sees extensions registered after it was built.
#[derive(Clone)]
pub enum MessageType {
    Fixed(Arc<MessageDescriptor>),
    Generated(&'static DescriptorCell),
}

impl MessageType {
    pub fn full_name(&self) -> &str {
        match self {
            MessageType::Fixed(d) => d.full_name(),
            MessageType::Generated(cell) => cell.full_name(),
        }
    }

    /// Current descriptor of the nested type.
    pub fn descriptor(&self) -> Arc<MessageDescriptor> {
        match self {
            MessageType::Fixed(d) => Arc::clone(d),
            MessageType::Generated(cell) => cell.get(),
        }
    }
}

impl From<Arc<MessageDescriptor>> for MessageType {
    fn from(descriptor: Arc<MessageDescriptor>) -> Self {
        MessageType::Fixed(descriptor)
    }
}

impl From<&'static DescriptorCell> for MessageType {
    fn from(cell: &'static DescriptorCell) -> Self {
        MessageType::Generated(cell)
    }
}

// ── Field Type ─────────────────────────────────────────────────

/// Closed set of field types.
#[derive(Clone)]
pub enum FieldType {
    Int32,
    Int64,
    UInt32,
    UInt64,
    SInt32,
    SInt64,
    Fixed32,
    Fixed64,
    SFixed32,
    SFixed64,
    Bool,
    String,
    Bytes,
    Float,
    Double,
    Enum(Arc<EnumDescriptor>),
    Message(MessageType),
}

impl FieldType {
    pub fn message(message_type: impl Into<MessageType>) -> Self {
        FieldType::Message(message_type.into())
    }

    /// Wire type used for a single (non-packed) value of this type.
    pub fn wire_type(&self) -> WireType {
        match self {
            FieldType::Int32
            | FieldType::Int64
            | FieldType::UInt32
            | FieldType::UInt64
            | FieldType::SInt32
            | FieldType::SInt64
            | FieldType::Bool
            | FieldType::Enum(_) => WireType::Varint,
            FieldType::Fixed32 | FieldType::SFixed32 | FieldType::Float => WireType::ThirtyTwoBit,
            FieldType::Fixed64 | FieldType::SFixed64 | FieldType::Double => WireType::SixtyFourBit,
            FieldType::String | FieldType::Bytes | FieldType::Message(_) => {
                WireType::LengthDelimited
            }
        }
    }

    /// Scalar numeric types may be packed into one length-delimited block.
    pub fn is_packable(&self) -> bool {
        !matches!(
            self,
            FieldType::String | FieldType::Bytes | FieldType::Message(_)
        )
    }

    /// Schema-level name: the keyword for scalars, the full name otherwise.
    pub fn name(&self) -> &str {
        match self {
            FieldType::Int32 => "int32",
            FieldType::Int64 => "int64",
            FieldType::UInt32 => "uint32",
            FieldType::UInt64 => "uint64",
            FieldType::SInt32 => "sint32",
            FieldType::SInt64 => "sint64",
            FieldType::Fixed32 => "fixed32",
            FieldType::Fixed64 => "fixed64",
            FieldType::SFixed32 => "sfixed32",
            FieldType::SFixed64 => "sfixed64",
            FieldType::Bool => "bool",
            FieldType::String => "string",
            FieldType::Bytes => "bytes",
            FieldType::Float => "float",
            FieldType::Double => "double",
            FieldType::Enum(e) => e.full_name(),
            FieldType::Message(m) => m.full_name(),
        }
    }
}

impl PartialEq for FieldType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldType::Enum(a), FieldType::Enum(b)) => a.full_name() == b.full_name(),
            (FieldType::Message(a), FieldType::Message(b)) => a.full_name() == b.full_name(),
            (a, b) => std::mem::discriminant(a) == std::mem::discriminant(b),
        }
    }
}

impl fmt::Debug for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Enum(e) => write!(f, "Enum({})", e.full_name()),
            FieldType::Message(m) => write!(f, "Message({})", m.full_name()),
            other => f.write_str(other.name()),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Field Descriptor ───────────────────────────────────────────

/// Immutable description of one field of a message type.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    number: u32,
    name: String,
    field_type: FieldType,
    rule: Rule,
    packed: bool,
    default: Option<Value>,
    extension: bool,
}

impl FieldDescriptor {
    /// Create an OPTIONAL field.
    ///
    /// Panics if `number` is outside `1..=MAX_FIELD_NUMBER`: field numbers
    /// are fixed by the schema author, so a bad one is a programming error.
    pub fn new(number: u32, name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        assert!(
            (1..=MAX_FIELD_NUMBER).contains(&number),
            "field {} has number {} outside 1..={}",
            name,
            number,
            MAX_FIELD_NUMBER
        );
        Self {
            number,
            name,
            field_type,
            rule: Rule::Optional,
            packed: false,
            default: None,
            extension: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.rule = Rule::Required;
        self
    }

    pub fn repeated(mut self) -> Self {
        self.rule = Rule::Repeated;
        self
    }

    /// Encode a repeated numeric field as one length-delimited block.
    /// Has no effect on non-repeated or non-packable fields.
    pub fn packed(mut self) -> Self {
        self.packed = true;
        self
    }

    /// Explicit default returned by `get` while the field is unset.
    ///
    /// Panics if the value cannot be stored in a field of this type.
    pub fn with_default(mut self, value: Value) -> Self {
        let found = value.kind();
        match value.coerce_to(&self.field_type) {
            Some(v) if !self.is_repeated() => self.default = Some(v),
            _ => panic!(
                "default for field {} must be a single {}, got {}",
                self.name, self.field_type, found
            ),
        }
        self
    }

    pub(crate) fn into_extension(mut self) -> Self {
        self.extension = true;
        self
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    pub fn rule(&self) -> Rule {
        self.rule
    }

    pub fn is_repeated(&self) -> bool {
        self.rule == Rule::Repeated
    }

    pub fn is_required(&self) -> bool {
        self.rule == Rule::Required
    }

    /// True when repeated values are written as a packed block.
    pub fn is_packed(&self) -> bool {
        self.packed && self.is_repeated() && self.field_type.is_packable()
    }

    pub fn is_extension(&self) -> bool {
        self.extension
    }

    /// The explicit default, if one was declared.
    pub fn explicit_default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Value observed through `get` while the field is unset.
    pub fn default_value(&self) -> Value {
        match &self.default {
            Some(v) => v.clone(),
            None => Value::zero_of(&self.field_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_types_follow_field_types() {
        assert_eq!(FieldType::Int64.wire_type(), WireType::Varint);
        assert_eq!(FieldType::SInt32.wire_type(), WireType::Varint);
        assert_eq!(FieldType::Fixed32.wire_type(), WireType::ThirtyTwoBit);
        assert_eq!(FieldType::Double.wire_type(), WireType::SixtyFourBit);
        assert_eq!(FieldType::String.wire_type(), WireType::LengthDelimited);
        assert!(!FieldType::Bytes.is_packable());
        assert!(FieldType::Bool.is_packable());
    }

    #[test]
    #[should_panic(expected = "outside")]
    fn zero_field_number_is_rejected() {
        let _ = FieldDescriptor::new(0, "bad", FieldType::Int32);
    }

    #[test]
    fn packed_only_applies_to_repeated_numeric_fields() {
        let f = FieldDescriptor::new(1, "ids", FieldType::Int32).packed();
        assert!(!f.is_packed());
        let f = FieldDescriptor::new(1, "ids", FieldType::Int32).repeated().packed();
        assert!(f.is_packed());
        let f = FieldDescriptor::new(1, "names", FieldType::String).repeated().packed();
        assert!(!f.is_packed());
    }

    #[test]
    fn explicit_default_is_coerced_to_field_type() {
        let f = FieldDescriptor::new(1, "limit", FieldType::Int64).with_default(Value::I32(10));
        assert_eq!(f.default_value(), Value::I64(10));
        let f = FieldDescriptor::new(2, "name", FieldType::String);
        assert_eq!(f.default_value(), Value::Str(String::new()));
    }

    #[test]
    #[should_panic(expected = "default for field")]
    fn mismatched_default_panics() {
        let _ = FieldDescriptor::new(1, "flag", FieldType::Bool).with_default(Value::I32(1));
    }

    #[test]
    fn message_types_compare_by_full_name() {
        fn leaf() -> MessageDescriptor {
            MessageDescriptor::from_fields("test.Leaf", [FieldDescriptor::new(1, "id", FieldType::Int32)])
                .unwrap()
        }
        static CELL: DescriptorCell = DescriptorCell::new("test.Leaf", leaf);
        let fixed = FieldType::message(Arc::new(MessageDescriptor::new("test.Leaf")));
        let lazy = FieldType::message(&CELL);
        assert_eq!(fixed, lazy);
        assert_eq!(lazy.name(), "test.Leaf");
        match &lazy {
            FieldType::Message(m) => assert_eq!(m.descriptor().len(), 1),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn enum_zero_value_is_first_declared_number() {
        let e = EnumDescriptor::new("test.Color", &[("RED", 3), ("BLUE", 4)]);
        assert_eq!(e.first_number(), 3);
        assert_eq!(e.name_of(4), Some("BLUE"));
        assert_eq!(e.number_of("RED"), Some(3));
        assert_eq!(e.name_of(9), None);
    }
}
