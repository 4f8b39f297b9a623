//! Error taxonomy shared by schema construction, accessors and the codecs.

use thiserror::Error;

/// All possible engine failures.
///
/// Schema errors (`DuplicateFieldNumber`, `DuplicateFieldName`) are raised
/// while building descriptors. Accessor errors (`TypeMismatch`,
/// `NoSuchField`) and codec errors (`MissingRequiredField`,
/// `MalformedWireData`, `RecursionLimitExceeded`) are recoverable by the
/// caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtoError {
    /// A descriptor already declares a field with this number.
    #[error("DuplicateFieldNumber: {message} already declares field number {number}")]
    DuplicateFieldNumber { message: String, number: u32 },
    /// A descriptor already declares a field with this name.
    #[error("DuplicateFieldName: {message} already declares a field named {name}")]
    DuplicateFieldName { message: String, name: String },
    /// A value does not fit the declared field type or cardinality.
    #[error("TypeMismatch: {field} expects {expected}, got {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },
    /// The descriptor declares no such field.
    #[error("NoSuchField: {message} has no field {field}")]
    NoSuchField { message: String, field: String },
    /// A REQUIRED field is unset.
    #[error("MissingRequiredField: {message}.{field}")]
    MissingRequiredField { message: String, field: String },
    /// Bad tag, truncated payload, or otherwise undecodable input.
    #[error("MalformedWireData: {0}")]
    MalformedWireData(String),
    /// Nested messages deeper than the configured limit.
    #[error("RecursionLimitExceeded: nesting deeper than {0} levels")]
    RecursionLimitExceeded(u32),
    /// Codec options failed to parse or validate.
    #[error("InvalidOptions: {0}")]
    InvalidOptions(String),
}

impl From<prost::DecodeError> for ProtoError {
    fn from(err: prost::DecodeError) -> Self {
        ProtoError::MalformedWireData(err.to_string())
    }
}

impl From<serde_json::Error> for ProtoError {
    fn from(err: serde_json::Error) -> Self {
        ProtoError::InvalidOptions(err.to_string())
    }
}

impl ProtoError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        ProtoError::MalformedWireData(msg.into())
    }
}
