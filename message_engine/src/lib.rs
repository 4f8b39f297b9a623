#![forbid(unsafe_code)]
//! Descriptor-driven protobuf message engine.
//!
//! A `MessageDescriptor` declares a message type's fields. A
//! `DynamicMessage` stores values for any descriptor with explicit
//! presence, and the codec reads and writes the protobuf binary format
//! against the descriptor. Generated types wrap a `DynamicMessage` and
//! share one memoized descriptor per type through a `DescriptorCell`,
//! which also picks up extension fields registered at runtime.

pub mod codec;
pub mod descriptor;
pub mod error;
pub mod field;
pub mod json;
pub mod message;
pub mod options;
pub mod registry;
pub mod store;
pub mod text;
pub mod value;
pub mod wire;

pub use descriptor::MessageDescriptor;
pub use error::ProtoError;
pub use field::{EnumDescriptor, FieldDescriptor, FieldType, MessageType, Rule, MAX_FIELD_NUMBER};
pub use message::{DynamicMessage, GeneratedMessage};
pub use options::CodecOptions;
pub use registry::{DescriptorCell, ExtensionCtor, ExtensionRegistry};
pub use store::{PresenceStore, Slot, UnknownField, UnknownFields};
pub use value::Value;
pub use wire::WireType;
