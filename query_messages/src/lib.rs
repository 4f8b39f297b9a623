#![forbid(unsafe_code)]

//! Generated message types for the `query` schema package.
//!
//! Each type is a thin declaration over `message_engine`: a memoized
//! descriptor plus typed accessors with the field numbers baked in.
//! Encoding, decoding and presence all live in the engine.
//!
//! `proto_types` mirrors the same messages as prost structs, and
//! `proto_bridge` converts between the two object models.

pub mod event_token;
pub mod proto_bridge;
pub mod proto_types;
pub mod stream_event;

pub use event_token::EventToken;
pub use stream_event::{Category, Statement, StreamEvent};
