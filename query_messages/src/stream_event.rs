//! `query.StreamEvent` — one transaction's worth of replicated statements,
//! stamped with the `EventToken` it was read at.

use std::fmt;
use std::sync::{Arc, OnceLock};

use message_engine::{
    DescriptorCell, DynamicMessage, EnumDescriptor, FieldDescriptor, FieldType,
    GeneratedMessage, MessageDescriptor, ProtoError, Value,
};

use crate::event_token::EventToken;

// ── Category ───────────────────────────────────────────────────

/// Kind of a streamed statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Error = 0,
    Dml = 1,
    Ddl = 2,
}

impl Category {
    pub const FULL_NAME: &'static str = "query.StreamEvent.Statement.Category";

    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Category::Error),
            1 => Some(Category::Dml),
            2 => Some(Category::Ddl),
            _ => None,
        }
    }

    pub fn enum_descriptor() -> Arc<EnumDescriptor> {
        static DESCRIPTOR: OnceLock<Arc<EnumDescriptor>> = OnceLock::new();
        Arc::clone(DESCRIPTOR.get_or_init(|| {
            Arc::new(EnumDescriptor::new(
                Category::FULL_NAME,
                &[("Error", 0), ("DML", 1), ("DDL", 2)],
            ))
        }))
    }
}

impl From<Category> for Value {
    fn from(category: Category) -> Self {
        Value::Enum(category.as_i32())
    }
}

// ── Statement ──────────────────────────────────────────────────

static STATEMENT_DESCRIPTOR: DescriptorCell =
    DescriptorCell::new(Statement::FULL_NAME, build_statement_descriptor);

fn build_statement_descriptor() -> MessageDescriptor {
    let mut descriptor = MessageDescriptor::new(Statement::FULL_NAME);

    // OPTIONAL ENUM category = 1
    add(
        &mut descriptor,
        FieldDescriptor::new(
            Statement::CATEGORY,
            "category",
            FieldType::Enum(Category::enum_descriptor()),
        ),
    );

    // OPTIONAL STRING table_name = 2
    add(
        &mut descriptor,
        FieldDescriptor::new(Statement::TABLE_NAME, "table_name", FieldType::String),
    );

    // OPTIONAL BYTES sql = 5
    add(&mut descriptor, FieldDescriptor::new(Statement::SQL, "sql", FieldType::Bytes));

    descriptor
}

#[derive(Clone, PartialEq)]
pub struct Statement {
    inner: DynamicMessage,
}

impl Statement {
    pub const CATEGORY: u32 = 1;
    pub const TABLE_NAME: u32 = 2;
    pub const SQL: u32 = 5;

    pub fn new() -> Self {
        Self::new_message()
    }

    pub fn has_category(&self) -> bool {
        self.inner.has(Self::CATEGORY)
    }

    pub fn clear_category(&mut self) -> &mut Self {
        self.inner.clear(Self::CATEGORY);
        self
    }

    /// Stored category; numbers outside the declared set read as `Error`.
    pub fn get_category(&self) -> Category {
        Category::from_i32(self.get_category_raw()).unwrap_or(Category::Error)
    }

    /// Stored enum number, including undeclared values read off the wire.
    pub fn get_category_raw(&self) -> i32 {
        self.inner.get_enum(Self::CATEGORY).unwrap_or_default()
    }

    pub fn set_category(&mut self, value: Category) -> Result<&mut Self, ProtoError> {
        self.inner.set(Self::CATEGORY, value)?;
        Ok(self)
    }

    pub fn has_table_name(&self) -> bool {
        self.inner.has(Self::TABLE_NAME)
    }

    pub fn clear_table_name(&mut self) -> &mut Self {
        self.inner.clear(Self::TABLE_NAME);
        self
    }

    pub fn get_table_name(&self) -> &str {
        self.inner.get_str(Self::TABLE_NAME).unwrap_or_default()
    }

    pub fn set_table_name(&mut self, value: impl Into<String>) -> Result<&mut Self, ProtoError> {
        self.inner.set(Self::TABLE_NAME, value.into())?;
        Ok(self)
    }

    pub fn has_sql(&self) -> bool {
        self.inner.has(Self::SQL)
    }

    pub fn clear_sql(&mut self) -> &mut Self {
        self.inner.clear(Self::SQL);
        self
    }

    pub fn get_sql(&self) -> &[u8] {
        self.inner.get_bytes(Self::SQL).unwrap_or_default()
    }

    pub fn set_sql(&mut self, value: impl Into<Vec<u8>>) -> Result<&mut Self, ProtoError> {
        self.inner.set(Self::SQL, value.into())?;
        Ok(self)
    }
}

impl GeneratedMessage for Statement {
    const FULL_NAME: &'static str = "query.StreamEvent.Statement";

    fn descriptor_cell() -> &'static DescriptorCell {
        &STATEMENT_DESCRIPTOR
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

impl Default for Statement {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

// ── Stream Event ───────────────────────────────────────────────

static STREAM_EVENT_DESCRIPTOR: DescriptorCell =
    DescriptorCell::new(StreamEvent::FULL_NAME, build_stream_event_descriptor);

fn build_stream_event_descriptor() -> MessageDescriptor {
    let mut descriptor = MessageDescriptor::new(StreamEvent::FULL_NAME);

    // REPEATED MESSAGE statements = 1
    add(
        &mut descriptor,
        FieldDescriptor::new(
            StreamEvent::STATEMENTS,
            "statements",
            FieldType::message(Statement::descriptor_cell()),
        )
        .repeated(),
    );

    // OPTIONAL MESSAGE event_token = 2
    add(
        &mut descriptor,
        FieldDescriptor::new(
            StreamEvent::EVENT_TOKEN,
            "event_token",
            FieldType::message(EventToken::descriptor_cell()),
        ),
    );

    descriptor
}

#[derive(Clone, PartialEq)]
pub struct StreamEvent {
    inner: DynamicMessage,
}

impl StreamEvent {
    pub const STATEMENTS: u32 = 1;
    pub const EVENT_TOKEN: u32 = 2;

    pub fn new() -> Self {
        Self::new_message()
    }

    pub fn clear_statements(&mut self) -> &mut Self {
        self.inner.clear(Self::STATEMENTS);
        self
    }

    /// Copies of the statements, in stream order.
    pub fn get_statements(&self) -> Vec<Statement> {
        self.inner
            .get_repeated(Self::STATEMENTS)
            .unwrap_or_default()
            .iter()
            .filter_map(Value::as_message)
            .map(|m| Statement::wrap(m.clone()))
            .collect()
    }

    pub fn statements_len(&self) -> usize {
        self.inner.field_len(Self::STATEMENTS)
    }

    pub fn push_statement(&mut self, statement: Statement) -> Result<&mut Self, ProtoError> {
        self.inner.push(Self::STATEMENTS, statement.into_dynamic())?;
        Ok(self)
    }

    pub fn has_event_token(&self) -> bool {
        self.inner.has(Self::EVENT_TOKEN)
    }

    pub fn clear_event_token(&mut self) -> &mut Self {
        self.inner.clear(Self::EVENT_TOKEN);
        self
    }

    /// The token, or an empty one while unset.
    pub fn get_event_token(&self) -> EventToken {
        match self.inner.get_message(Self::EVENT_TOKEN) {
            Ok(m) => EventToken::wrap(m.into_owned()),
            Err(_) => EventToken::new(),
        }
    }

    pub fn set_event_token(&mut self, token: EventToken) -> Result<&mut Self, ProtoError> {
        self.inner.set(Self::EVENT_TOKEN, token.into_dynamic())?;
        Ok(self)
    }
}

impl GeneratedMessage for StreamEvent {
    const FULL_NAME: &'static str = "query.StreamEvent";

    fn descriptor_cell() -> &'static DescriptorCell {
        &STREAM_EVENT_DESCRIPTOR
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

impl Default for StreamEvent {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StreamEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

impl fmt::Display for StreamEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

fn add(descriptor: &mut MessageDescriptor, field: FieldDescriptor) {
    let name = field.name().to_string();
    if let Err(err) = descriptor.add_field(field, false) {
        panic!("invalid schema for {} field {}: {}", descriptor.full_name(), name, err);
    }
}
