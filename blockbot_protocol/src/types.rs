// Field layouts and decoded field values.
//
// A message's wire form is an ordered list of typed fields. `FieldKind`
// names the encoding of one field; `Value` is the decoded (or to-be-encoded)
// value. `Fields` is the ordered name → value mapping that both `decode` and
// `encode` speak, so callers work with names from the registry rather than
// positional tuples.
//
// Integers of every width decode into `Value::Int(i64)` and floats of both
// widths into `Value::Float(f64)`; the declared `FieldKind` decides the wire
// width and the range check on encode.
//
// See also: `message.rs` for the registry that assigns kinds to fields,
// `codec.rs` for the reader/writer that interprets them.

use bytes::Bytes;
use serde::Serialize;
use serde::ser::SerializeMap;

use crate::error::FieldError;

/// Width of the length prefix in front of a variable-size blob.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Prefix {
    U8,
    I16,
    I32,
}

/// Wire encoding of a single field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    U8,
    I8,
    U16,
    I16,
    I32,
    I64,
    F32,
    F64,
    Bool,
    /// 2-byte length followed by that many UTF-8 bytes.
    Str,
    /// Opaque bytes of a fixed length.
    Fixed(usize),
    /// Opaque bytes preceded by a length prefix.
    Blob(Prefix),
    /// Item slot: i16 id, then (when the id is non-negative) u8 count and
    /// i16 damage.
    Slot,
    /// Self-terminating typed key/value list.
    Metadata,
    /// Repeated `element`, with the repeat count taken from an earlier
    /// integer field of the same message.
    Array {
        count: &'static str,
        element: &'static FieldKind,
    },
}

/// One field of a registered message layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

/// An item stack as carried in a slot field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ItemStack {
    pub id: i16,
    pub count: u8,
    pub damage: i16,
}

/// A typed value in an entity metadata list.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum MetaValue {
    Byte(i8),
    Short(i16),
    Int(i32),
    Float(f32),
    Str(String),
    Item(ItemStack),
    Position(i32, i32, i32),
}

impl MetaValue {
    /// The 3-bit type code that precedes this value on the wire.
    pub fn type_code(&self) -> u8 {
        match self {
            MetaValue::Byte(_) => 0,
            MetaValue::Short(_) => 1,
            MetaValue::Int(_) => 2,
            MetaValue::Float(_) => 3,
            MetaValue::Str(_) => 4,
            MetaValue::Item(_) => 5,
            MetaValue::Position(..) => 6,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetadataEntry {
    /// 5-bit key.
    pub key: u8,
    pub value: MetaValue,
}

/// A decoded or to-be-encoded field value.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Bytes(Bytes),
    Slot(Option<ItemStack>),
    Metadata(Vec<MetadataEntry>),
    Array(Vec<Value>),
}

impl Value {
    /// Short name of the variant, used in type-mismatch errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Slot(_) => "slot",
            Value::Metadata(_) => "metadata",
            Value::Array(_) => "array",
        }
    }
}

macro_rules! value_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Int(i64::from(v))
            }
        })*
    };
}

value_from_int!(i8, u8, i16, u16, i32, i64);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Value::Bytes(v)
    }
}

impl From<Option<ItemStack>> for Value {
    fn from(v: Option<ItemStack>) -> Self {
        Value::Slot(v)
    }
}

impl From<Vec<MetadataEntry>> for Value {
    fn from(v: Vec<MetadataEntry>) -> Self {
        Value::Metadata(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

// ---------------------------------------------------------------------------
// Fields
// ---------------------------------------------------------------------------

/// Ordered mapping from field name to value.
///
/// Insertion order is preserved so decoded messages list their fields in wire
/// order. Setting an existing name replaces its value in place.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Fields {
    entries: Vec<(&'static str, Value)>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of `set`.
    pub fn with(mut self, name: &'static str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &'static str, value: impl Into<Value>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.entries.iter().map(|(n, v)| (*n, v))
    }

    fn typed<'a, T>(
        &'a self,
        name: &'static str,
        expected: &'static str,
        pick: impl FnOnce(&'a Value) -> Option<T>,
    ) -> Result<T, FieldError> {
        self.get(name)
            .and_then(pick)
            .ok_or(FieldError { name, expected })
    }

    pub fn int(&self, name: &'static str) -> Result<i64, FieldError> {
        self.typed(name, "int", |v| match v {
            Value::Int(i) => Some(*i),
            _ => None,
        })
    }

    pub fn float(&self, name: &'static str) -> Result<f64, FieldError> {
        self.typed(name, "float", |v| match v {
            Value::Float(f) => Some(*f),
            _ => None,
        })
    }

    pub fn bool(&self, name: &'static str) -> Result<bool, FieldError> {
        self.typed(name, "bool", |v| match v {
            Value::Bool(b) => Some(*b),
            _ => None,
        })
    }

    pub fn str(&self, name: &'static str) -> Result<&str, FieldError> {
        self.typed(name, "string", |v| match v {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn bytes(&self, name: &'static str) -> Result<&Bytes, FieldError> {
        self.typed(name, "bytes", |v| match v {
            Value::Bytes(b) => Some(b),
            _ => None,
        })
    }

    pub fn array(&self, name: &'static str) -> Result<&[Value], FieldError> {
        self.typed(name, "array", |v| match v {
            Value::Array(a) => Some(a.as_slice()),
            _ => None,
        })
    }

    /// An integer array field, e.g. the coordinate list of a batch change.
    pub fn int_array(&self, name: &'static str) -> Result<Vec<i64>, FieldError> {
        self.array(name)?
            .iter()
            .map(|v| match v {
                Value::Int(i) => Ok(*i),
                _ => Err(FieldError {
                    name,
                    expected: "int array",
                }),
            })
            .collect()
    }
}

impl Serialize for Fields {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// One decoded message.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Packet {
    Message {
        tag: u8,
        name: &'static str,
        fields: Fields,
    },
    /// A tag with no registered layout. The payload holds whatever bytes were
    /// buffered after the tag; nothing after an unknown tag can be framed.
    Unrecognized { tag: u8, payload: Bytes },
}

impl Packet {
    pub fn tag(&self) -> u8 {
        match self {
            Packet::Message { tag, .. } | Packet::Unrecognized { tag, .. } => *tag,
        }
    }

    /// Registered name, or `None` for an unrecognized tag.
    pub fn name(&self) -> Option<&'static str> {
        match self {
            Packet::Message { name, .. } => Some(name),
            Packet::Unrecognized { .. } => None,
        }
    }
}
