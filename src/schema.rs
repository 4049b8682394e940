//! Reflective description of message types and their values.
//!
//! Descriptors declare what a message looks like; a [`Record`] holds one
//! instance with per-field presence. The walker traverses records through
//! this layer only, so anything that can describe itself here compresses.

use std::sync::Arc;

/// Closed set of field kinds the walker understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Bool,
    Int32,
    Int64,
    UInt32,
    UInt64,
    SInt32,
    SInt64,
    Fixed32,
    Fixed64,
    SFixed32,
    SFixed64,
    Float,
    Double,
    Enum,
    String,
    Bytes,
    Message,
}

/// Singular, repeated, or map cardinality of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Singular,
    Repeated,
    Map,
}

/// One declared value of an enumeration.
#[derive(Debug, Clone)]
pub struct EnumValue {
    pub name: String,
    pub number: i32,
}

/// Enumeration descriptor. Values keep declared order; the coder transmits
/// zero-based declared indices, not numbers.
#[derive(Debug)]
pub struct EnumDescriptor {
    name: String,
    values: Vec<EnumValue>,
}

impl EnumDescriptor {
    pub fn new<N: Into<String>>(
        name: impl Into<String>,
        values: impl IntoIterator<Item = (N, i32)>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            values: values
                .into_iter()
                .map(|(name, number)| EnumValue {
                    name: name.into(),
                    number,
                })
                .collect(),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared values in declared order.
    #[must_use]
    pub fn values(&self) -> &[EnumValue] {
        &self.values
    }

    /// Declared index of the value with this number.
    #[must_use]
    pub fn index_of(&self, number: i32) -> Option<usize> {
        self.values.iter().position(|v| v.number == number)
    }

    #[must_use]
    pub fn by_index(&self, index: usize) -> Option<&EnumValue> {
        self.values.get(index)
    }
}

/// One declared field of a message.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub tag: u32,
    pub name: String,
    pub kind: Kind,
    pub cardinality: Cardinality,
    pub enum_type: Option<Arc<EnumDescriptor>>,
    pub message_type: Option<Arc<MessageDescriptor>>,
    /// Key kind for map fields; `kind` then describes the value.
    pub map_key: Option<Kind>,
}

impl FieldDescriptor {
    /// A singular scalar field.
    #[must_use]
    pub fn scalar(tag: u32, name: impl Into<String>, kind: Kind) -> Self {
        Self {
            tag,
            name: name.into(),
            kind,
            cardinality: Cardinality::Singular,
            enum_type: None,
            message_type: None,
            map_key: None,
        }
    }

    /// A singular enum field.
    #[must_use]
    pub fn enumeration(tag: u32, name: impl Into<String>, values: Arc<EnumDescriptor>) -> Self {
        Self {
            enum_type: Some(values),
            ..Self::scalar(tag, name, Kind::Enum)
        }
    }

    /// A singular nested-message field.
    #[must_use]
    pub fn message(tag: u32, name: impl Into<String>, inner: Arc<MessageDescriptor>) -> Self {
        Self {
            message_type: Some(inner),
            ..Self::scalar(tag, name, Kind::Message)
        }
    }

    /// A map field with primitive keys and scalar values.
    #[must_use]
    pub fn map(tag: u32, name: impl Into<String>, key: Kind, value: Kind) -> Self {
        Self {
            cardinality: Cardinality::Map,
            map_key: Some(key),
            ..Self::scalar(tag, name, value)
        }
    }

    /// Turn this field into a repeated one.
    #[must_use]
    pub fn repeated(mut self) -> Self {
        self.cardinality = Cardinality::Repeated;
        self
    }
}

/// Message descriptor: a name and its fields in declared order.
#[derive(Debug)]
pub struct MessageDescriptor {
    name: String,
    fields: Vec<FieldDescriptor>,
}

impl MessageDescriptor {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            fields,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared fields in declared order.
    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Declared index of the field with this name.
    #[must_use]
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Declared index and descriptor of the field with this tag.
    #[must_use]
    pub fn field_by_tag(&self, tag: u32) -> Option<(usize, &FieldDescriptor)> {
        self.fields
            .iter()
            .enumerate()
            .find(|(_, f)| f.tag == tag)
    }
}

/// Primitive key of a map entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    Str(String),
}

/// A typed field value.
///
/// Equality is value equality with bit-exact float comparison, so a
/// round-tripped record compares equal even through NaN payloads.
#[derive(Debug, Clone)]
pub enum Value {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Enum(i32),
    Str(String),
    Bytes(Vec<u8>),
    Message(Record),
    List(Vec<Value>),
    Map(Vec<(MapKey, Value)>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;

        match (self, other) {
            (Bool(a), Bool(b)) => a == b,
            (I32(a), I32(b)) => a == b,
            (I64(a), I64(b)) => a == b,
            (U32(a), U32(b)) => a == b,
            (U64(a), U64(b)) => a == b,
            (F32(a), F32(b)) => a.to_bits() == b.to_bits(),
            (F64(a), F64(b)) => a.to_bits() == b.to_bits(),
            (Enum(a), Enum(b)) => a == b,
            (Str(a), Str(b)) => a == b,
            (Bytes(a), Bytes(b)) => a == b,
            (Message(a), Message(b)) => a == b,
            (List(a), List(b)) => a == b,
            (Map(a), Map(b)) => a == b,
            _ => false,
        }
    }
}

/// One message instance: a descriptor plus per-field presence and values.
#[derive(Debug, Clone)]
pub struct Record {
    descriptor: Arc<MessageDescriptor>,
    values: Vec<Option<Value>>,
}

/// Records compare by message-type name and field values, so a decoded
/// record equals its source even when the descriptors are separate handles
/// to the same schema.
impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.descriptor.name() == other.descriptor.name() && self.values == other.values
    }
}

impl Record {
    /// A record with every field absent.
    #[must_use]
    pub fn new(descriptor: Arc<MessageDescriptor>) -> Self {
        let values = vec![None; descriptor.fields().len()];
        Self { descriptor, values }
    }

    #[must_use]
    pub fn descriptor(&self) -> &Arc<MessageDescriptor> {
        &self.descriptor
    }

    #[must_use]
    pub fn is_present(&self, index: usize) -> bool {
        self.values.get(index).is_some_and(Option::is_some)
    }

    /// True when every field is absent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index).and_then(Option::as_ref)
    }

    pub fn set(&mut self, index: usize, value: Value) {
        self.values[index] = Some(value);
    }

    pub fn clear(&mut self, index: usize) {
        self.values[index] = None;
    }

    /// Field value by name.
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.descriptor
            .field_index(name)
            .and_then(|index| self.get(index))
    }

    /// Set a field value by name.
    ///
    /// # Panics
    ///
    /// Panics if the descriptor declares no field with this name.
    pub fn set_by_name(&mut self, name: &str, value: Value) -> &mut Self {
        let index = self
            .descriptor
            .field_index(name)
            .unwrap_or_else(|| panic!("no field named {name} in {}", self.descriptor.name()));
        self.values[index] = Some(value);
        self
    }
}
