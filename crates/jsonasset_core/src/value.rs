// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-memory property values.
//!
//! A [`Value`] is the typed slot a property codec reads from and writes into.
//! Maps and sets stage inserted elements until [`ScriptMap::rehash`] or
//! [`ScriptSet::rehash`] rebuilds their index in one pass.

use crate::object::ObjectHandle;
use crate::reflect::StructId;
use crate::text::Text;
use indexmap::{IndexMap, IndexSet};
use std::hash::{Hash, Hasher};

/// A soft reference, kept as its path string
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SoftObjectPath(pub String);

impl SoftObjectPath {
    /// Create from a path string
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Whether the path is empty
    pub fn is_null(&self) -> bool {
        self.0.is_empty()
    }
}

/// A struct instance: one value per flattened field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructValue {
    /// Struct type
    pub struct_id: StructId,
    /// Field values in declaration order
    pub fields: Vec<Value>,
}

impl StructValue {
    /// Create from field values
    pub fn new(struct_id: StructId, fields: Vec<Value>) -> Self {
        Self { struct_id, fields }
    }
}

/// A typed value slot
#[derive(Debug, Clone)]
pub enum Value {
    /// Boolean
    Bool(bool),
    /// Integer, also used for bytes and enums
    Int(i64),
    /// Float
    Float(f64),
    /// String
    Str(String),
    /// Name
    Name(String),
    /// Text
    Text(Text),
    /// Hard object reference
    Object(Option<ObjectHandle>),
    /// Interface reference
    Interface(Option<ObjectHandle>),
    /// Soft object reference
    SoftObject(SoftObjectPath),
    /// Struct
    Struct(StructValue),
    /// Array
    Array(Vec<Value>),
    /// Set
    Set(ScriptSet),
    /// Map
    Map(ScriptMap),
    /// Bound delegate, never reconstructed
    Delegate,
    /// Bound multicast delegate, never reconstructed
    MulticastDelegate,
    /// Static array
    Fixed(Vec<Value>),
}

impl Value {
    /// Variant name for messages
    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "Bool",
            Self::Int(_) => "Int",
            Self::Float(_) => "Float",
            Self::Str(_) => "Str",
            Self::Name(_) => "Name",
            Self::Text(_) => "Text",
            Self::Object(_) => "Object",
            Self::Interface(_) => "Interface",
            Self::SoftObject(_) => "SoftObject",
            Self::Struct(_) => "Struct",
            Self::Array(_) => "Array",
            Self::Set(_) => "Set",
            Self::Map(_) => "Map",
            Self::Delegate => "Delegate",
            Self::MulticastDelegate => "MulticastDelegate",
            Self::Fixed(_) => "Fixed",
        }
    }

    /// Boolean content
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer content
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Float content
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// String or name content
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) | Self::Name(s) => Some(s),
            _ => None,
        }
    }

    /// Object or interface reference
    pub fn as_object(&self) -> Option<ObjectHandle> {
        match self {
            Self::Object(o) | Self::Interface(o) => *o,
            _ => None,
        }
    }

    /// Struct content
    pub fn as_struct(&self) -> Option<&StructValue> {
        match self {
            Self::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Mutable struct content
    pub fn as_struct_mut(&mut self) -> Option<&mut StructValue> {
        match self {
            Self::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Array or static array elements
    pub fn as_slice(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) | Self::Fixed(items) => Some(items),
            _ => None,
        }
    }
}

fn float_bits(value: f64) -> u64 {
    if value == 0.0 {
        0
    } else if value.is_nan() {
        f64::NAN.to_bits()
    } else {
        value.to_bits()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Self::Str(a), Self::Str(b)) | (Self::Name(a), Self::Name(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a.identical(b),
            (Self::Object(a), Self::Object(b)) | (Self::Interface(a), Self::Interface(b)) => a == b,
            (Self::SoftObject(a), Self::SoftObject(b)) => a == b,
            (Self::Struct(a), Self::Struct(b)) => a == b,
            (Self::Array(a), Self::Array(b)) | (Self::Fixed(a), Self::Fixed(b)) => a == b,
            (Self::Set(a), Self::Set(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Delegate, Self::Delegate)
            | (Self::MulticastDelegate, Self::MulticastDelegate) => true,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Bool(b) => b.hash(state),
            Self::Int(i) => i.hash(state),
            Self::Float(f) => float_bits(*f).hash(state),
            Self::Str(s) | Self::Name(s) => s.hash(state),
            // Empty texts with different keys are equal, so only the source hashes.
            Self::Text(t) => t.source.hash(state),
            Self::Object(o) | Self::Interface(o) => o.hash(state),
            Self::SoftObject(p) => p.hash(state),
            Self::Struct(s) => s.hash(state),
            Self::Array(items) | Self::Fixed(items) => items.hash(state),
            // Unordered containers only hash their size.
            Self::Set(set) => set.len().hash(state),
            Self::Map(map) => map.len().hash(state),
            Self::Delegate | Self::MulticastDelegate => {}
        }
    }
}

/// Hashed set with a staging list for bulk insertion
#[derive(Debug, Clone, Default)]
pub struct ScriptSet {
    elements: IndexSet<Value>,
    pending: Vec<Value>,
}

impl ScriptSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an element without touching the index
    pub fn add_needs_rehash(&mut self, value: Value) {
        self.pending.push(value);
    }

    /// Fold staged elements into the index, dropping duplicates
    pub fn rehash(&mut self) {
        for value in self.pending.drain(..) {
            self.elements.insert(value);
        }
    }

    /// Insert immediately
    pub fn insert(&mut self, value: Value) -> bool {
        self.elements.insert(value)
    }

    /// Remove every element
    pub fn clear(&mut self) {
        self.elements.clear();
        self.pending.clear();
    }

    /// Whether the set contains an element
    pub fn contains(&self, value: &Value) -> bool {
        self.elements.contains(value)
    }

    /// Number of hashed elements
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the set has no hashed elements
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Number of staged elements awaiting a rehash
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Elements in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.elements.iter()
    }
}

impl PartialEq for ScriptSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|v| other.contains(v))
    }
}

impl Eq for ScriptSet {}

impl FromIterator<Value> for ScriptSet {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self {
            elements: iter.into_iter().collect(),
            pending: Vec::new(),
        }
    }
}

/// Hashed map with a staging list for bulk insertion
#[derive(Debug, Clone, Default)]
pub struct ScriptMap {
    entries: IndexMap<Value, Value>,
    pending: Vec<(Value, Value)>,
}

impl ScriptMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a pair without touching the index
    pub fn add_needs_rehash(&mut self, key: Value, value: Value) {
        self.pending.push((key, value));
    }

    /// Fold staged pairs into the index; later pairs win on duplicate keys
    pub fn rehash(&mut self) {
        for (key, value) in self.pending.drain(..) {
            self.entries.insert(key, value);
        }
    }

    /// Insert immediately
    pub fn insert(&mut self, key: Value, value: Value) -> Option<Value> {
        self.entries.insert(key, value)
    }

    /// Value for a key
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.entries.clear();
        self.pending.clear();
    }

    /// Number of hashed entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map has no hashed entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of staged pairs awaiting a rehash
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter()
    }
}

impl PartialEq for ScriptMap {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl Eq for ScriptMap {}

impl FromIterator<(Value, Value)> for ScriptMap {
    fn from_iter<I: IntoIterator<Item = (Value, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
            pending: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_rehash_last_write_wins() {
        let mut map = ScriptMap::new();
        map.add_needs_rehash(Value::Name("A".into()), Value::Int(1));
        map.add_needs_rehash(Value::Name("A".into()), Value::Int(2));
        map.add_needs_rehash(Value::Name("B".into()), Value::Int(3));
        assert_eq!(map.len(), 0);
        assert_eq!(map.pending_len(), 3);

        map.rehash();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&Value::Name("A".into())), Some(&Value::Int(2)));
        assert_eq!(map.pending_len(), 0);
    }

    #[test]
    fn test_set_rehash_dedups() {
        let mut set = ScriptSet::new();
        for i in [1, 2, 2, 3, 1] {
            set.add_needs_rehash(Value::Int(i));
        }
        set.rehash();
        assert_eq!(set.len(), 3);
        let order: Vec<_> = set.iter().filter_map(Value::as_int).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn test_unordered_equality() {
        let a: ScriptSet = [Value::Int(1), Value::Int(2)].into_iter().collect();
        let b: ScriptSet = [Value::Int(2), Value::Int(1)].into_iter().collect();
        assert_eq!(Value::Set(a), Value::Set(b));

        let a: ScriptMap = [(Value::Int(1), Value::Bool(true))].into_iter().collect();
        let b: ScriptMap = [(Value::Int(1), Value::Bool(false))].into_iter().collect();
        assert_ne!(Value::Map(a), Value::Map(b));
    }

    #[test]
    fn test_float_keys() {
        let mut set = ScriptSet::new();
        set.insert(Value::Float(0.0));
        assert!(set.contains(&Value::Float(-0.0)));
        assert!(!set.insert(Value::Float(-0.0)));
    }
}
