//! Codec configuration.
//!
//! Defaults match the limits common protobuf runtimes ship with. Options
//! can be loaded from JSON, missing keys fall back to defaults.

use serde::{Deserialize, Serialize};

use crate::error::ProtoError;

/// Limits and policies applied by the binary decoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodecOptions {
    /// Maximum nesting depth of messages inside messages.
    pub recursion_limit: u32,
    /// Maximum size of one encoded message or length-delimited frame.
    pub max_message_len: usize,
    /// Skip the REQUIRED-field check after decoding.
    pub allow_partial: bool,
    /// Keep undeclared fields for re-encoding (otherwise dropped).
    pub preserve_unknown: bool,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            recursion_limit: 100,
            max_message_len: 64 * 1024 * 1024,
            allow_partial: false,
            preserve_unknown: true,
        }
    }
}

impl CodecOptions {
    /// Parse options from JSON and validate them.
    pub fn from_json_str(json: &str) -> Result<Self, ProtoError> {
        let options: CodecOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), ProtoError> {
        if self.recursion_limit == 0 {
            return Err(ProtoError::InvalidOptions(
                "recursion_limit must be at least 1".to_string(),
            ));
        }
        if self.max_message_len == 0 {
            return Err(ProtoError::InvalidOptions(
                "max_message_len must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_allow_partial(mut self, allow: bool) -> Self {
        self.allow_partial = allow;
        self
    }

    pub fn with_recursion_limit(mut self, limit: u32) -> Self {
        self.recursion_limit = limit;
        self
    }

    pub fn with_max_message_len(mut self, len: usize) -> Self {
        self.max_message_len = len;
        self
    }

    pub fn with_preserve_unknown(mut self, preserve: bool) -> Self {
        self.preserve_unknown = preserve;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_use_defaults() {
        let options = CodecOptions::from_json_str(r#"{"allow_partial":true}"#).unwrap();
        assert!(options.allow_partial);
        assert_eq!(options.recursion_limit, 100);
        assert!(options.preserve_unknown);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = CodecOptions::from_json_str(r#"{"max_depth":3}"#).unwrap_err();
        assert!(matches!(err, ProtoError::InvalidOptions(_)));
    }

    #[test]
    fn zero_limits_are_invalid() {
        let err = CodecOptions::from_json_str(r#"{"recursion_limit":0}"#).unwrap_err();
        assert!(matches!(err, ProtoError::InvalidOptions(_)));
        assert!(CodecOptions::default().with_max_message_len(0).validate().is_err());
    }

    #[test]
    fn options_serialize_back_to_json() {
        let options = CodecOptions::default().with_allow_partial(true);
        let json = serde_json::to_string(&options).unwrap();
        assert_eq!(CodecOptions::from_json_str(&json).unwrap(), options);
    }
}
