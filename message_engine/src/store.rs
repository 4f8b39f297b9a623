//! Presence Store — per-instance sparse field storage.
//!
//! A field number missing from the store is unset. Repeated fields never
//! keep an empty sequence: clearing the last element removes the key.

use std::collections::BTreeMap;

use crate::value::Value;
use crate::wire::WireType;

/// Stored content of one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Single(Value),
    Repeated(Vec<Value>),
}

/// Raw bytes of one field the descriptor did not declare.
///
/// `raw` holds the tag and the payload exactly as they were read.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownField {
    number: u32,
    wire_type: WireType,
    raw: Vec<u8>,
}

impl UnknownField {
    pub fn new(number: u32, wire_type: WireType, raw: Vec<u8>) -> Self {
        Self {
            number,
            wire_type,
            raw,
        }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn wire_type(&self) -> WireType {
        self.wire_type
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }
}

/// Unknown fields in the order they were decoded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnknownFields {
    fields: Vec<UnknownField>,
}

impl UnknownFields {
    pub fn push(&mut self, field: UnknownField) {
        self.fields.push(field);
    }

    pub fn iter(&self) -> impl Iterator<Item = &UnknownField> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    /// Whether any occurrence carries this field number.
    pub fn contains(&self, number: u32) -> bool {
        self.fields.iter().any(|f| f.number == number)
    }

    /// Concatenated raw bytes, as they are re-emitted by the encoder.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.fields.iter().flat_map(|f| f.raw.iter().copied()).collect()
    }
}

/// Field number → value storage, plus the unknown field set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresenceStore {
    slots: BTreeMap<u32, Slot>,
    unknown: UnknownFields,
}

impl PresenceStore {
    pub fn contains(&self, number: u32) -> bool {
        self.slots.contains_key(&number)
    }

    pub fn get(&self, number: u32) -> Option<&Slot> {
        self.slots.get(&number)
    }

    pub fn get_mut(&mut self, number: u32) -> Option<&mut Slot> {
        self.slots.get_mut(&number)
    }

    pub fn insert(&mut self, number: u32, slot: Slot) {
        match slot {
            Slot::Repeated(values) if values.is_empty() => {
                self.slots.remove(&number);
            }
            slot => {
                self.slots.insert(number, slot);
            }
        }
    }

    /// Append to a repeated slot, creating it on first use.
    pub fn push(&mut self, number: u32, value: Value) {
        match self.slots.get_mut(&number) {
            Some(Slot::Repeated(values)) => values.push(value),
            _ => {
                self.slots.insert(number, Slot::Repeated(vec![value]));
            }
        }
    }

    pub fn remove(&mut self, number: u32) -> Option<Slot> {
        self.slots.remove(&number)
    }

    /// Present fields in ascending number order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &Slot)> {
        self.slots.iter().map(|(n, s)| (*n, s))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty() && self.unknown.is_empty()
    }

    /// Drop every value and every unknown field.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.unknown.clear();
    }

    pub fn unknown(&self) -> &UnknownFields {
        &self.unknown
    }

    pub fn unknown_mut(&mut self) -> &mut UnknownFields {
        &mut self.unknown
    }
}
