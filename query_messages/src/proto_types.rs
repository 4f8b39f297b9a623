//! Hand-written prost mirrors of the `query` messages.
//!
//! Uses prost derive macros for encode/decode without prost-build.
//! Field numbers and types match the dynamic descriptors exactly, with
//! proto2-style `Option` presence so unset and zero stay distinct.

use prost::Message;

// ── Event Token ────────────────────────────────────────────────

#[derive(Clone, PartialEq, Message)]
pub struct ProtoEventToken {
    #[prost(int64, optional, tag = "1")]
    pub timestamp: Option<i64>,
    #[prost(string, optional, tag = "2")]
    pub shard: Option<String>,
    #[prost(string, optional, tag = "3")]
    pub position: Option<String>,
}

// ── Stream Event ───────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum ProtoCategory {
    Error = 0,
    Dml = 1,
    Ddl = 2,
}

#[derive(Clone, PartialEq, Message)]
pub struct ProtoStatement {
    #[prost(enumeration = "ProtoCategory", optional, tag = "1")]
    pub category: Option<i32>,
    #[prost(string, optional, tag = "2")]
    pub table_name: Option<String>,
    #[prost(bytes = "vec", optional, tag = "5")]
    pub sql: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ProtoStreamEvent {
    #[prost(message, repeated, tag = "1")]
    pub statements: Vec<ProtoStatement>,
    #[prost(message, optional, tag = "2")]
    pub event_token: Option<ProtoEventToken>,
}
