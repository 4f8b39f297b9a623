//! Message Base — field access for any message type.
//!
//! `DynamicMessage` pairs a shared descriptor with a private presence
//! store. Every accessor checks the field number and value against the
//! descriptor, so generated types only need to bake in field numbers.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::codec;
use crate::descriptor::MessageDescriptor;
use crate::error::ProtoError;
use crate::field::FieldDescriptor;
use crate::registry::{DescriptorCell, ExtensionRegistry};
use crate::store::{PresenceStore, Slot, UnknownFields};
use crate::text;
use crate::value::Value;

/// A message instance of any descriptor.
#[derive(Clone)]
pub struct DynamicMessage {
    descriptor: Arc<MessageDescriptor>,
    store: PresenceStore,
}

impl DynamicMessage {
    pub fn new(descriptor: Arc<MessageDescriptor>) -> Self {
        Self {
            descriptor,
            store: PresenceStore::default(),
        }
    }

    pub fn descriptor(&self) -> &Arc<MessageDescriptor> {
        &self.descriptor
    }

    pub fn full_name(&self) -> &str {
        self.descriptor.full_name()
    }

    pub fn store(&self) -> &PresenceStore {
        &self.store
    }

    pub fn unknown_fields(&self) -> &UnknownFields {
        self.store.unknown()
    }

    pub(crate) fn unknown_fields_mut(&mut self) -> &mut UnknownFields {
        self.store.unknown_mut()
    }

    // ── presence ──────────────────────────────────────────────

    /// True iff the field has been set (for repeated fields: non-empty).
    /// Undeclared numbers are never present.
    pub fn has(&self, number: u32) -> bool {
        self.store.contains(number)
    }

    /// Remove the field's value. Undeclared numbers are ignored.
    pub fn clear(&mut self, number: u32) -> &mut Self {
        self.store.remove(number);
        self
    }

    /// Reset every field and drop unknown fields.
    pub fn clear_all(&mut self) -> &mut Self {
        self.store.clear();
        self
    }

    // ── singular access ───────────────────────────────────────

    /// Stored value, or the field default while unset.
    pub fn get(&self, number: u32) -> Result<Cow<'_, Value>, ProtoError> {
        let (field, stored) = self.singular(number)?;
        Ok(match stored {
            Some(v) => Cow::Borrowed(v),
            None => Cow::Owned(field.default_value()),
        })
    }

    /// Validate, coerce and store a value; marks the field present.
    pub fn set(&mut self, number: u32, value: impl Into<Value>) -> Result<&mut Self, ProtoError> {
        let field = lookup(&self.descriptor, number)?;
        if field.is_repeated() {
            return Err(ProtoError::TypeMismatch {
                field: qualified(&self.descriptor, field),
                expected: format!("repeated {} (use set_repeated or push)", field.field_type()),
                found: "single value".to_string(),
            });
        }
        let value = coerce(&self.descriptor, field, value.into())?;
        self.store.insert(number, Slot::Single(value));
        Ok(self)
    }

    // ── repeated access ───────────────────────────────────────

    /// Full sequence of a repeated field; empty while unset.
    pub fn get_repeated(&self, number: u32) -> Result<&[Value], ProtoError> {
        let field = lookup(&self.descriptor, number)?;
        if !field.is_repeated() {
            return Err(expect_repeated(&self.descriptor, field));
        }
        Ok(match self.store.get(number) {
            Some(Slot::Repeated(values)) => values.as_slice(),
            _ => &[],
        })
    }

    /// Replace the whole sequence of a repeated field.
    pub fn set_repeated<I, V>(&mut self, number: u32, values: I) -> Result<&mut Self, ProtoError>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let field = lookup(&self.descriptor, number)?;
        if !field.is_repeated() {
            return Err(expect_repeated(&self.descriptor, field));
        }
        let values = values
            .into_iter()
            .map(|v| coerce(&self.descriptor, field, v.into()))
            .collect::<Result<Vec<_>, _>>()?;
        self.store.insert(number, Slot::Repeated(values));
        Ok(self)
    }

    /// Append one element to a repeated field.
    pub fn push(&mut self, number: u32, value: impl Into<Value>) -> Result<&mut Self, ProtoError> {
        let field = lookup(&self.descriptor, number)?;
        if !field.is_repeated() {
            return Err(expect_repeated(&self.descriptor, field));
        }
        let value = coerce(&self.descriptor, field, value.into())?;
        self.store.push(number, value);
        Ok(self)
    }

    /// Number of elements of a repeated field, 1/0 for singular fields.
    pub fn field_len(&self, number: u32) -> usize {
        match self.store.get(number) {
            Some(Slot::Repeated(values)) => values.len(),
            Some(Slot::Single(_)) => 1,
            None => 0,
        }
    }

    /// Nested message of a singular message field, created (and marked
    /// present) on first access. Used to merge repeated occurrences.
    pub fn mutable_message(&mut self, number: u32) -> Result<&mut DynamicMessage, ProtoError> {
        let field = lookup(&self.descriptor, number)?;
        if field.is_repeated() {
            return Err(ProtoError::TypeMismatch {
                field: qualified(&self.descriptor, field),
                expected: format!("repeated {}", field.field_type()),
                found: "single message access".to_string(),
            });
        }
        if !matches!(self.store.get(number), Some(Slot::Single(Value::Message(_)))) {
            let empty = match Value::zero_of(field.field_type()) {
                v @ Value::Message(_) => v,
                other => {
                    return Err(ProtoError::TypeMismatch {
                        field: qualified(&self.descriptor, field),
                        expected: field.field_type().to_string(),
                        found: format!("message access ({} field)", other.kind()),
                    })
                }
            };
            self.store.insert(number, Slot::Single(empty));
        }
        match self.store.get_mut(number) {
            Some(Slot::Single(Value::Message(m))) => Ok(&mut **m),
            _ => Err(ProtoError::NoSuchField {
                message: self.descriptor.full_name().to_string(),
                field: number.to_string(),
            }),
        }
    }

    // ── typed getters ─────────────────────────────────────────

    pub fn get_i32(&self, number: u32) -> Result<i32, ProtoError> {
        self.typed(number, 0, Value::as_i32)
    }

    pub fn get_i64(&self, number: u32) -> Result<i64, ProtoError> {
        self.typed(number, 0, Value::as_i64)
    }

    pub fn get_u32(&self, number: u32) -> Result<u32, ProtoError> {
        self.typed(number, 0, Value::as_u32)
    }

    pub fn get_u64(&self, number: u32) -> Result<u64, ProtoError> {
        self.typed(number, 0, Value::as_u64)
    }

    pub fn get_bool(&self, number: u32) -> Result<bool, ProtoError> {
        self.typed(number, false, Value::as_bool)
    }

    pub fn get_f32(&self, number: u32) -> Result<f32, ProtoError> {
        self.typed(number, 0.0, Value::as_f32)
    }

    pub fn get_f64(&self, number: u32) -> Result<f64, ProtoError> {
        self.typed(number, 0.0, Value::as_f64)
    }

    /// Enum number; the first declared value while unset.
    pub fn get_enum(&self, number: u32) -> Result<i32, ProtoError> {
        let (field, stored) = self.singular(number)?;
        match stored {
            Some(v) => v.as_i32().ok_or_else(|| mismatch(&self.descriptor, field, v)),
            None => field
                .default_value()
                .as_i32()
                .ok_or_else(|| mismatch(&self.descriptor, field, &field.default_value())),
        }
    }

    pub fn get_str(&self, number: u32) -> Result<&str, ProtoError> {
        let (field, stored) = self.singular(number)?;
        match stored.or_else(|| field.explicit_default()) {
            Some(v) => v.as_str().ok_or_else(|| mismatch(&self.descriptor, field, v)),
            None => Ok(""),
        }
    }

    pub fn get_bytes(&self, number: u32) -> Result<&[u8], ProtoError> {
        let (field, stored) = self.singular(number)?;
        match stored.or_else(|| field.explicit_default()) {
            Some(v) => v.as_bytes().ok_or_else(|| mismatch(&self.descriptor, field, v)),
            None => Ok(&[]),
        }
    }

    /// Nested message; an empty instance of the declared type while unset.
    pub fn get_message(&self, number: u32) -> Result<Cow<'_, DynamicMessage>, ProtoError> {
        match self.get(number)? {
            Cow::Borrowed(Value::Message(m)) => Ok(Cow::Borrowed(&**m)),
            Cow::Owned(Value::Message(m)) => Ok(Cow::Owned(*m)),
            other => {
                let field = lookup(&self.descriptor, number)?;
                Err(mismatch(&self.descriptor, field, &other))
            }
        }
    }

    // ── required fields ───────────────────────────────────────

    /// True when every REQUIRED field is set, recursively through present
    /// nested messages.
    pub fn is_initialized(&self) -> bool {
        self.check_initialized().is_ok()
    }

    pub fn check_initialized(&self) -> Result<(), ProtoError> {
        for field in self.descriptor.required_fields() {
            if !self.store.contains(field.number()) {
                return Err(ProtoError::MissingRequiredField {
                    message: self.descriptor.full_name().to_string(),
                    field: field.name().to_string(),
                });
            }
        }
        for (_, slot) in self.store.iter() {
            match slot {
                Slot::Single(Value::Message(m)) => m.check_initialized()?,
                Slot::Repeated(values) => {
                    for v in values {
                        if let Value::Message(m) = v {
                            m.check_initialized()?;
                        }
                    }
                }
                Slot::Single(_) => {}
            }
        }
        Ok(())
    }

    /// Present fields with their descriptors, in ascending number order.
    pub fn present_fields(&self) -> impl Iterator<Item = (&FieldDescriptor, &Slot)> {
        self.store
            .iter()
            .filter_map(|(n, slot)| self.descriptor.field_by_number(n).map(|f| (f, slot)))
    }

    fn singular(&self, number: u32) -> Result<(&FieldDescriptor, Option<&Value>), ProtoError> {
        let field = lookup(&self.descriptor, number)?;
        if field.is_repeated() {
            return Err(ProtoError::TypeMismatch {
                field: qualified(&self.descriptor, field),
                expected: format!("repeated {} (use get_repeated)", field.field_type()),
                found: "single value access".to_string(),
            });
        }
        let stored = match self.store.get(number) {
            Some(Slot::Single(v)) => Some(v),
            _ => None,
        };
        Ok((field, stored))
    }

    fn typed<T>(
        &self,
        number: u32,
        zero: T,
        convert: impl Fn(&Value) -> Option<T>,
    ) -> Result<T, ProtoError> {
        let (field, stored) = self.singular(number)?;
        match stored.or_else(|| field.explicit_default()) {
            Some(v) => convert(v).ok_or_else(|| mismatch(&self.descriptor, field, v)),
            None => Ok(zero),
        }
    }
}

impl PartialEq for DynamicMessage {
    fn eq(&self, other: &Self) -> bool {
        self.descriptor.full_name() == other.descriptor.full_name() && self.store == other.store
    }
}

impl fmt::Debug for DynamicMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{ {} }}", self.full_name(), text::to_short_text(self))
    }
}

impl fmt::Display for DynamicMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&text::to_short_text(self))
    }
}

fn lookup<'d>(descriptor: &'d MessageDescriptor, number: u32) -> Result<&'d FieldDescriptor, ProtoError> {
    descriptor
        .field_by_number(number)
        .ok_or_else(|| ProtoError::NoSuchField {
            message: descriptor.full_name().to_string(),
            field: number.to_string(),
        })
}

fn qualified(descriptor: &MessageDescriptor, field: &FieldDescriptor) -> String {
    format!("{}.{}", descriptor.full_name(), field.name())
}

fn coerce(
    descriptor: &MessageDescriptor,
    field: &FieldDescriptor,
    value: Value,
) -> Result<Value, ProtoError> {
    let found = value.kind();
    value
        .coerce_to(field.field_type())
        .ok_or_else(|| ProtoError::TypeMismatch {
            field: qualified(descriptor, field),
            expected: field.field_type().to_string(),
            found: found.to_string(),
        })
}

fn mismatch(descriptor: &MessageDescriptor, field: &FieldDescriptor, value: &Value) -> ProtoError {
    ProtoError::TypeMismatch {
        field: qualified(descriptor, field),
        expected: field.field_type().to_string(),
        found: value.kind().to_string(),
    }
}

fn expect_repeated(descriptor: &MessageDescriptor, field: &FieldDescriptor) -> ProtoError {
    ProtoError::TypeMismatch {
        field: qualified(descriptor, field),
        expected: format!("single {}", field.field_type()),
        found: "sequence access".to_string(),
    }
}

// ── Generated types ───────────────────────────────────────────

/// Shape shared by generated message types: a memoized descriptor plus a
/// wrapped `DynamicMessage` that all typed accessors delegate to.
pub trait GeneratedMessage: Sized {
    /// Fully-qualified schema name.
    const FULL_NAME: &'static str;

    /// Memo cell holding this type's descriptor. Nested fields of this type
    /// refer to the cell rather than to one built descriptor.
    fn descriptor_cell() -> &'static DescriptorCell;

    /// The process-wide descriptor of this type.
    fn descriptor() -> Arc<MessageDescriptor> {
        Self::descriptor_cell().get()
    }

    /// Wrap a message known to use this type's descriptor.
    fn wrap(message: DynamicMessage) -> Self;

    fn as_dynamic(&self) -> &DynamicMessage;

    fn as_dynamic_mut(&mut self) -> &mut DynamicMessage;

    fn into_dynamic(self) -> DynamicMessage;

    fn new_message() -> Self {
        Self::wrap(DynamicMessage::new(Self::descriptor()))
    }

    /// Wrap a dynamic message after checking its type name.
    fn from_dynamic(message: DynamicMessage) -> Result<Self, ProtoError> {
        if message.full_name() != Self::FULL_NAME {
            return Err(ProtoError::TypeMismatch {
                field: Self::FULL_NAME.to_string(),
                expected: Self::FULL_NAME.to_string(),
                found: message.full_name().to_string(),
            });
        }
        Ok(Self::wrap(message))
    }

    fn encode_to_vec(&self) -> Result<Vec<u8>, ProtoError> {
        codec::encode(self.as_dynamic())
    }

    fn decode(buf: &[u8]) -> Result<Self, ProtoError> {
        codec::decode(Self::descriptor(), buf).map(Self::wrap)
    }

    /// Register an extension field for this type in the global registry.
    ///
    /// Collisions with base fields or earlier extensions are rejected here,
    /// before the descriptor is rebuilt.
    fn register_extension<F>(ctor: F) -> Result<u64, ProtoError>
    where
        F: Fn() -> FieldDescriptor + Send + Sync + 'static,
    {
        let current = Self::descriptor();
        let field = ctor();
        if current.field_by_number(field.number()).is_some() {
            return Err(ProtoError::DuplicateFieldNumber {
                message: Self::FULL_NAME.to_string(),
                number: field.number(),
            });
        }
        if current.field_by_name(field.name()).is_some() {
            return Err(ProtoError::DuplicateFieldName {
                message: Self::FULL_NAME.to_string(),
                name: field.name().to_string(),
            });
        }
        ExtensionRegistry::global().register(Self::FULL_NAME, ctor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{EnumDescriptor, FieldType};

    fn inner() -> Arc<MessageDescriptor> {
        Arc::new(
            MessageDescriptor::from_fields(
                "test.Inner",
                [FieldDescriptor::new(1, "id", FieldType::Int32).required()],
            )
            .unwrap(),
        )
    }

    fn outer() -> Arc<MessageDescriptor> {
        let color = Arc::new(EnumDescriptor::new("test.Color", &[("RED", 1), ("GREEN", 2)]));
        Arc::new(
            MessageDescriptor::from_fields(
                "test.Outer",
                [
                    FieldDescriptor::new(1, "count", FieldType::Int64),
                    FieldDescriptor::new(2, "label", FieldType::String),
                    FieldDescriptor::new(3, "tags", FieldType::String).repeated(),
                    FieldDescriptor::new(4, "inner", FieldType::message(inner())),
                    FieldDescriptor::new(5, "color", FieldType::Enum(color)),
                    FieldDescriptor::new(6, "limit", FieldType::UInt32).with_default(Value::U32(25)),
                    FieldDescriptor::new(7, "raw", FieldType::Bytes),
                    FieldDescriptor::new(8, "ratio", FieldType::Double),
                    FieldDescriptor::new(9, "on", FieldType::Bool),
                ],
            )
            .unwrap(),
        )
    }

    #[test]
    fn fresh_message_reports_zero_values() {
        let m = DynamicMessage::new(outer());
        for field in m.descriptor().fields() {
            assert!(!m.has(field.number()), "{} should be unset", field.name());
        }
        assert_eq!(m.get_i64(1).unwrap(), 0);
        assert_eq!(m.get_str(2).unwrap(), "");
        assert!(m.get_repeated(3).unwrap().is_empty());
        assert_eq!(m.get_message(4).unwrap().full_name(), "test.Inner");
        assert_eq!(m.get_enum(5).unwrap(), 1);
        assert_eq!(m.get_bytes(7).unwrap(), b"");
        assert_eq!(m.get_f64(8).unwrap(), 0.0);
        assert!(!m.get_bool(9).unwrap());
    }

    #[test]
    fn explicit_default_is_returned_while_unset() {
        let mut m = DynamicMessage::new(outer());
        assert_eq!(m.get_u32(6).unwrap(), 25);
        assert!(!m.has(6));
        m.set(6, 3u32).unwrap();
        assert_eq!(m.get_u32(6).unwrap(), 3);
        m.clear(6);
        assert_eq!(m.get(6).unwrap().into_owned(), Value::U32(25));
    }

    #[test]
    fn set_then_get_then_clear() {
        let mut m = DynamicMessage::new(outer());
        m.set(1, 42i64).unwrap().set(2, "hello").unwrap();
        assert!(m.has(1));
        assert_eq!(m.get_i64(1).unwrap(), 42);
        assert_eq!(m.get_str(2).unwrap(), "hello");

        m.clear(1);
        assert!(!m.has(1));
        assert_eq!(m.get_i64(1).unwrap(), 0);
        assert!(m.has(2));
    }

    #[test]
    fn setting_zero_marks_presence() {
        let mut m = DynamicMessage::new(outer());
        m.set(1, 0i64).unwrap();
        assert!(m.has(1));
        m.set(9, false).unwrap();
        assert!(m.has(9));
    }

    #[test]
    fn compatible_scalars_are_coerced() {
        let mut m = DynamicMessage::new(outer());
        m.set(1, 7i32).unwrap();
        assert_eq!(m.get(1).unwrap().into_owned(), Value::I64(7));
        m.set(8, 2u32).unwrap();
        assert_eq!(m.get_f64(8).unwrap(), 2.0);
        m.set(7, "abc").unwrap();
        assert_eq!(m.get_bytes(7).unwrap(), b"abc");
    }

    #[test]
    fn incompatible_values_are_rejected() {
        let mut m = DynamicMessage::new(outer());
        let err = m.set(1, "not a number").unwrap_err();
        assert_eq!(
            err,
            ProtoError::TypeMismatch {
                field: "test.Outer.count".to_string(),
                expected: "int64".to_string(),
                found: "string".to_string(),
            }
        );
        assert!(!m.has(1));
        assert!(m.set(6, -1i32).is_err());
        assert!(m.set(9, 1i32).is_err());
    }

    #[test]
    fn undeclared_numbers_are_reported() {
        let mut m = DynamicMessage::new(outer());
        assert!(matches!(m.set(99, 1i32), Err(ProtoError::NoSuchField { .. })));
        assert!(matches!(m.get(99), Err(ProtoError::NoSuchField { .. })));
        assert!(!m.has(99));
    }

    #[test]
    fn repeated_fields_use_sequence_accessors() {
        let mut m = DynamicMessage::new(outer());
        assert!(m.set(3, "x").is_err());
        m.push(3, "a").unwrap().push(3, "b").unwrap();
        assert_eq!(m.field_len(3), 2);
        assert_eq!(
            m.get_repeated(3).unwrap(),
            &[Value::Str("a".into()), Value::Str("b".into())]
        );

        m.set_repeated(3, ["z"]).unwrap();
        assert_eq!(m.get_repeated(3).unwrap(), &[Value::Str("z".into())]);

        m.set_repeated(3, Vec::<String>::new()).unwrap();
        assert!(!m.has(3));
        assert!(m.get_repeated(1).is_err());
    }

    #[test]
    fn nested_message_values() {
        let mut m = DynamicMessage::new(outer());
        let mut child = DynamicMessage::new(inner());
        child.set(1, 5i32).unwrap();
        m.set(4, child.clone()).unwrap();
        assert_eq!(&*m.get_message(4).unwrap(), &child);

        let wrong = DynamicMessage::new(outer());
        assert!(m.set(4, wrong).is_err());

        m.mutable_message(4).unwrap().set(1, 6i32).unwrap();
        assert_eq!(m.get_message(4).unwrap().get_i32(1).unwrap(), 6);
    }

    #[test]
    fn required_fields_are_checked_recursively() {
        let mut m = DynamicMessage::new(outer());
        assert!(m.is_initialized());
        m.mutable_message(4).unwrap();
        assert_eq!(
            m.check_initialized().unwrap_err(),
            ProtoError::MissingRequiredField {
                message: "test.Inner".to_string(),
                field: "id".to_string(),
            }
        );
        m.mutable_message(4).unwrap().set(1, 1i32).unwrap();
        assert!(m.is_initialized());
    }

    #[test]
    fn equality_ignores_descriptor_identity() {
        let mut a = DynamicMessage::new(outer());
        let mut b = DynamicMessage::new(outer());
        a.set(2, "same").unwrap();
        b.set(2, "same").unwrap();
        assert_eq!(a, b);
        b.set(1, 0i64).unwrap();
        assert_ne!(a, b);
    }
}
