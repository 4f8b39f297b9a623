//! `query.EventToken` — a logical clock for replication streams.
//!
//! Combines the commit timestamp, the shard that produced the event and
//! an opaque replication position. All three fields are optional and
//! independent of each other.

use std::fmt;

use message_engine::{
    DescriptorCell, DynamicMessage, FieldDescriptor, FieldType, GeneratedMessage,
    MessageDescriptor, ProtoError,
};

static DESCRIPTOR: DescriptorCell = DescriptorCell::new(EventToken::FULL_NAME, build_descriptor);

fn build_descriptor() -> MessageDescriptor {
    let mut descriptor = MessageDescriptor::new(EventToken::FULL_NAME);

    // OPTIONAL INT64 timestamp = 1
    add(&mut descriptor, FieldDescriptor::new(EventToken::TIMESTAMP, "timestamp", FieldType::Int64));

    // OPTIONAL STRING shard = 2
    add(&mut descriptor, FieldDescriptor::new(EventToken::SHARD, "shard", FieldType::String));

    // OPTIONAL STRING position = 3
    add(&mut descriptor, FieldDescriptor::new(EventToken::POSITION, "position", FieldType::String));

    descriptor
}

fn add(descriptor: &mut MessageDescriptor, field: FieldDescriptor) {
    let name = field.name().to_string();
    if let Err(err) = descriptor.add_field(field, false) {
        panic!("invalid schema for {} field {}: {}", descriptor.full_name(), name, err);
    }
}

#[derive(Clone, PartialEq)]
pub struct EventToken {
    inner: DynamicMessage,
}

impl EventToken {
    pub const TIMESTAMP: u32 = 1;
    pub const SHARD: u32 = 2;
    pub const POSITION: u32 = 3;

    pub fn new() -> Self {
        Self::new_message()
    }

    // ── timestamp ──────────────────────────────────────────────

    pub fn has_timestamp(&self) -> bool {
        self.inner.has(Self::TIMESTAMP)
    }

    pub fn clear_timestamp(&mut self) -> &mut Self {
        self.inner.clear(Self::TIMESTAMP);
        self
    }

    /// Seconds since the epoch; 0 while unset.
    pub fn get_timestamp(&self) -> i64 {
        self.inner.get_i64(Self::TIMESTAMP).unwrap_or_default()
    }

    pub fn set_timestamp(&mut self, value: i64) -> Result<&mut Self, ProtoError> {
        self.inner.set(Self::TIMESTAMP, value)?;
        Ok(self)
    }

    // ── shard ──────────────────────────────────────────────────

    pub fn has_shard(&self) -> bool {
        self.inner.has(Self::SHARD)
    }

    pub fn clear_shard(&mut self) -> &mut Self {
        self.inner.clear(Self::SHARD);
        self
    }

    pub fn get_shard(&self) -> &str {
        self.inner.get_str(Self::SHARD).unwrap_or_default()
    }

    pub fn set_shard(&mut self, value: impl Into<String>) -> Result<&mut Self, ProtoError> {
        self.inner.set(Self::SHARD, value.into())?;
        Ok(self)
    }

    // ── position ───────────────────────────────────────────────

    pub fn has_position(&self) -> bool {
        self.inner.has(Self::POSITION)
    }

    pub fn clear_position(&mut self) -> &mut Self {
        self.inner.clear(Self::POSITION);
        self
    }

    /// Opaque replication position; empty while unset.
    pub fn get_position(&self) -> &str {
        self.inner.get_str(Self::POSITION).unwrap_or_default()
    }

    pub fn set_position(&mut self, value: impl Into<String>) -> Result<&mut Self, ProtoError> {
        self.inner.set(Self::POSITION, value.into())?;
        Ok(self)
    }
}

impl GeneratedMessage for EventToken {
    const FULL_NAME: &'static str = "query.EventToken";

    fn descriptor_cell() -> &'static DescriptorCell {
        &DESCRIPTOR
    }

    fn wrap(message: DynamicMessage) -> Self {
        Self { inner: message }
    }

    fn as_dynamic(&self) -> &DynamicMessage {
        &self.inner
    }

    fn as_dynamic_mut(&mut self) -> &mut DynamicMessage {
        &mut self.inner
    }

    fn into_dynamic(self) -> DynamicMessage {
        self.inner
    }
}

impl Default for EventToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

impl fmt::Display for EventToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}
