//! Message Descriptor — the field table of one message type.
//!
//! Fields keep their insertion order (text dumps follow it) and are
//! indexed by number (the encoder walks them in ascending number order)
//! and by name.

use std::collections::{BTreeMap, HashMap};

use sha2::{Digest, Sha256};

use crate::error::ProtoError;
use crate::field::FieldDescriptor;

/// Schema of one message type.
#[derive(Debug, Clone)]
pub struct MessageDescriptor {
    full_name: String,
    fields: Vec<FieldDescriptor>,
    by_number: BTreeMap<u32, usize>,
    by_name: HashMap<String, usize>,
}

impl MessageDescriptor {
    /// Create an empty descriptor for `full_name` (e.g. `query.EventToken`).
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            fields: Vec::new(),
            by_number: BTreeMap::new(),
            by_name: HashMap::new(),
        }
    }

    /// Build a descriptor from base (non-extension) fields.
    pub fn from_fields(
        full_name: impl Into<String>,
        fields: impl IntoIterator<Item = FieldDescriptor>,
    ) -> Result<Self, ProtoError> {
        let mut descriptor = Self::new(full_name);
        for field in fields {
            descriptor.add_field(field, false)?;
        }
        Ok(descriptor)
    }

    /// Register a field.
    ///
    /// Numbers and names must be unique within the descriptor, for
    /// extensions as for base fields.
    pub fn add_field(
        &mut self,
        field: FieldDescriptor,
        is_extension: bool,
    ) -> Result<(), ProtoError> {
        if self.by_number.contains_key(&field.number()) {
            return Err(ProtoError::DuplicateFieldNumber {
                message: self.full_name.clone(),
                number: field.number(),
            });
        }
        if self.by_name.contains_key(field.name()) {
            return Err(ProtoError::DuplicateFieldName {
                message: self.full_name.clone(),
                name: field.name().to_string(),
            });
        }

        let field = if is_extension {
            field.into_extension()
        } else {
            field
        };
        let index = self.fields.len();
        self.by_number.insert(field.number(), index);
        self.by_name.insert(field.name().to_string(), index);
        self.fields.push(field);
        Ok(())
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Last segment of the full name.
    pub fn name(&self) -> &str {
        self.full_name
            .rsplit('.')
            .next()
            .unwrap_or(&self.full_name)
    }

    pub fn field_by_number(&self, number: u32) -> Option<&FieldDescriptor> {
        self.by_number.get(&number).map(|&i| &self.fields[i])
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }

    /// Fields in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter()
    }

    /// Fields in ascending field-number order.
    pub fn fields_by_number(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.by_number.values().map(|&i| &self.fields[i])
    }

    pub fn extensions(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.is_extension())
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.is_required())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// SHA-256 of the canonical schema listing. Lowercase hex string.
    ///
    /// One line for the full name, then one line per field in insertion
    /// order: `number name type rule`. Equal schemas hash equally; any
    /// renumbering, retyping or added extension changes the digest.
    pub fn fingerprint(&self) -> String {
        let mut listing = String::new();
        listing.push_str(&self.full_name);
        listing.push('\n');
        for f in &self.fields {
            listing.push_str(&format!(
                "{} {} {} {}\n",
                f.number(),
                f.name(),
                f.field_type(),
                f.rule().as_str()
            ));
        }
        let digest = Sha256::digest(listing.as_bytes());
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }
}
