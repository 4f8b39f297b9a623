//! Dynamic ↔ prost conversion bridge.
//!
//! Converts between the descriptor-driven message types and the prost
//! mirrors in proto_types.rs, field by field, carrying presence across.
//! Both sides encode the same observable state to the same bytes.
//!
//! The mirrors have no slot for unknown fields or extensions; those are
//! dropped on the way to prost (logged at debug).

use message_engine::{GeneratedMessage, ProtoError, Value};

use crate::event_token::EventToken;
use crate::proto_types::*;
use crate::stream_event::{Category, Statement, StreamEvent};

// ── Event Token ────────────────────────────────────────────────

pub fn event_token_to_proto(token: &EventToken) -> ProtoEventToken {
    note_dropped(token);
    ProtoEventToken {
        timestamp: token.has_timestamp().then(|| token.get_timestamp()),
        shard: token.has_shard().then(|| token.get_shard().to_string()),
        position: token.has_position().then(|| token.get_position().to_string()),
    }
}

pub fn event_token_from_proto(proto: &ProtoEventToken) -> Result<EventToken, ProtoError> {
    let mut token = EventToken::new();
    if let Some(timestamp) = proto.timestamp {
        token.set_timestamp(timestamp)?;
    }
    if let Some(shard) = &proto.shard {
        token.set_shard(shard.as_str())?;
    }
    if let Some(position) = &proto.position {
        token.set_position(position.as_str())?;
    }
    Ok(token)
}

// ── Statement ──────────────────────────────────────────────────

pub fn statement_to_proto(statement: &Statement) -> ProtoStatement {
    note_dropped(statement);
    ProtoStatement {
        // raw number, so undeclared categories survive the trip
        category: statement
            .has_category()
            .then(|| statement.get_category_raw()),
        table_name: statement
            .has_table_name()
            .then(|| statement.get_table_name().to_string()),
        sql: statement.has_sql().then(|| statement.get_sql().to_vec()),
    }
}

pub fn statement_from_proto(proto: &ProtoStatement) -> Result<Statement, ProtoError> {
    let mut statement = Statement::new();
    if let Some(category) = proto.category {
        // open enum: undeclared numbers are stored as-is
        statement
            .as_dynamic_mut()
            .set(Statement::CATEGORY, Value::Enum(category))?;
    }
    if let Some(table_name) = &proto.table_name {
        statement.set_table_name(table_name.as_str())?;
    }
    if let Some(sql) = &proto.sql {
        statement.set_sql(sql.as_slice())?;
    }
    Ok(statement)
}

pub fn category_to_proto(category: Category) -> ProtoCategory {
    match category {
        Category::Error => ProtoCategory::Error,
        Category::Dml => ProtoCategory::Dml,
        Category::Ddl => ProtoCategory::Ddl,
    }
}

// ── Stream Event ───────────────────────────────────────────────

pub fn stream_event_to_proto(event: &StreamEvent) -> ProtoStreamEvent {
    note_dropped(event);
    ProtoStreamEvent {
        statements: event.get_statements().iter().map(statement_to_proto).collect(),
        event_token: event
            .has_event_token()
            .then(|| event_token_to_proto(&event.get_event_token())),
    }
}

pub fn stream_event_from_proto(proto: &ProtoStreamEvent) -> Result<StreamEvent, ProtoError> {
    let mut event = StreamEvent::new();
    for statement in &proto.statements {
        event.push_statement(statement_from_proto(statement)?)?;
    }
    if let Some(token) = &proto.event_token {
        event.set_event_token(event_token_from_proto(token)?)?;
    }
    Ok(event)
}

fn note_dropped<M: GeneratedMessage>(message: &M) {
    let dynamic = message.as_dynamic();
    let unknown = dynamic.unknown_fields().len();
    let extensions = dynamic
        .present_fields()
        .filter(|(field, _)| field.is_extension())
        .count();
    if unknown > 0 || extensions > 0 {
        log::debug!(
            "{}: dropping {} unknown and {} extension fields for prost mirror",
            M::FULL_NAME,
            unknown,
            extensions
        );
    }
}

#[cfg(test)]
mod tests {
    use prost::Message;

    use super::*;

    #[test]
    fn token_presence_survives_both_directions() {
        let mut token = EventToken::new();
        token.set_timestamp(0).unwrap().set_position("pos").unwrap();

        let proto = event_token_to_proto(&token);
        assert_eq!(proto.timestamp, Some(0));
        assert_eq!(proto.shard, None);
        assert_eq!(proto.position.as_deref(), Some("pos"));

        let back = event_token_from_proto(&proto).unwrap();
        assert_eq!(back, token);
        assert!(!back.has_shard());
    }

    #[test]
    fn statement_category_maps_to_prost_enum() {
        let mut statement = Statement::new();
        statement.set_category(Category::Ddl).unwrap();
        let proto = statement_to_proto(&statement);
        assert_eq!(proto.category(), ProtoCategory::Ddl);
        assert_eq!(category_to_proto(Category::Dml), ProtoCategory::Dml);
    }

    #[test]
    fn undeclared_category_is_kept_as_number() {
        let proto = ProtoStatement {
            category: Some(9),
            ..Default::default()
        };
        let statement = statement_from_proto(&proto).unwrap();
        assert_eq!(statement.get_category_raw(), 9);
        assert_eq!(statement_to_proto(&statement), proto);
    }

    #[test]
    fn stream_event_bytes_match_prost() {
        let proto = ProtoStreamEvent {
            statements: vec![ProtoStatement {
                category: Some(ProtoCategory::Dml as i32),
                table_name: Some("orders".to_string()),
                sql: Some(b"UPDATE orders SET state = 2".to_vec()),
            }],
            event_token: Some(ProtoEventToken {
                timestamp: Some(1_700_000_000),
                shard: Some("80-".to_string()),
                position: None,
            }),
        };
        let event = stream_event_from_proto(&proto).unwrap();
        assert_eq!(event.encode_to_vec().unwrap(), proto.encode_to_vec());
        assert_eq!(stream_event_to_proto(&event), proto);
    }
}
