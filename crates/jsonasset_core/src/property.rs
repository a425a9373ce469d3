// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property value codec.
//!
//! Converts between [`Value`] slots and JSON, dispatching on the
//! [`PropertyKind`] of the field. Object references recurse back into the
//! session's table; structs go through the struct codec registry.

use crate::compare::CompareContext;
use crate::descriptor::INDEX_NONE;
use crate::diagnostics::Severity;
use crate::error::{ImportError, ImportResult};
use crate::object::ObjectHandle;
use crate::reference::ObjectReference;
use crate::reflect::{FieldDescriptor, PropertyFlags, PropertyKind, StructId, TypeRegistry};
use crate::structs::{
    guid_from_str, guid_json, DateTimeCodec, FallbackStructCodec, StructCodec, TimespanCodec,
};
use crate::table::ObjectSerializer;
use crate::text::Text;
use crate::value::{ScriptSet, SoftObjectPath, Value};
use serde_json::{Map, Number, Value as Json};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Sentinel written for delegate properties
pub const DELEGATE_SENTINEL: &str = "##NOT SERIALIZED##";

/// Codec configuration: struct codecs and the field exclusion set
pub struct PropertySerializer {
    codecs: HashMap<StructId, Rc<dyn StructCodec>>,
    fallback: Rc<dyn StructCodec>,
    excluded: HashSet<(String, String)>,
    guid_struct: Option<StructId>,
}

impl PropertySerializer {
    /// Create with the built-in tick codecs for every tick struct the
    /// registry defines
    pub fn new(registry: &TypeRegistry) -> Self {
        let mut serializer = Self {
            codecs: HashMap::new(),
            fallback: Rc::new(FallbackStructCodec),
            excluded: HashSet::new(),
            guid_struct: registry.find_struct("Guid"),
        };
        if let Some(id) = registry.find_struct("DateTime") {
            serializer.register_struct_codec(id, Rc::new(DateTimeCodec));
        }
        if let Some(id) = registry.find_struct("Timespan") {
            serializer.register_struct_codec(id, Rc::new(TimespanCodec));
        }
        serializer
    }

    /// Register a codec for a struct type
    pub fn register_struct_codec(&mut self, id: StructId, codec: Rc<dyn StructCodec>) {
        self.codecs.insert(id, codec);
    }

    /// Codec for a struct type, falling back to the field-walking codec
    pub fn struct_codec(&self, id: StructId) -> Rc<dyn StructCodec> {
        self.codecs
            .get(&id)
            .map_or_else(|| Rc::clone(&self.fallback), Rc::clone)
    }

    /// Exclude a field, identified by its declaring type
    pub fn disable_property_serialization(&mut self, owner: &str, field: &str) {
        self.excluded.insert((owner.to_string(), field.to_string()));
    }

    /// Field skip rule shared by objects and structs
    pub fn should_serialize(&self, field: &FieldDescriptor) -> bool {
        if field.has_flags(PropertyFlags::TRANSIENT) {
            return false;
        }
        if self.excluded.contains(&(field.owner.clone(), field.name.clone())) {
            return false;
        }
        if field.has_flags(PropertyFlags::EDITOR_ONLY) {
            return true;
        }
        !field.has_flags(PropertyFlags::DEPRECATED)
    }
}

fn mismatch(field: &str, kind: &PropertyKind) -> ImportError {
    ImportError::KindMismatch {
        field: field.to_string(),
        kind: kind.name(),
    }
}

fn float_json(value: f64) -> Json {
    Number::from_f64(value).map_or(Json::Null, Json::Number)
}

fn json_int(json: &Json) -> Option<i64> {
    json.as_i64()
        .or_else(|| json.as_u64().and_then(|u| i64::try_from(u).ok()))
        .or_else(|| json.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
}

fn json_index(json: &Json) -> Option<i32> {
    json.as_i64().and_then(|i| i32::try_from(i).ok())
}

/// Whether decoding an element of this kind may resolve objects
fn holds_objects(kind: &PropertyKind) -> bool {
    match kind {
        PropertyKind::Object | PropertyKind::Interface | PropertyKind::Struct(_) => true,
        PropertyKind::Array(inner) | PropertyKind::Set(inner) => holds_objects(inner),
        PropertyKind::Map(key, value) => holds_objects(key) || holds_objects(value),
        _ => false,
    }
}

fn text_from_json(map: &Map<String, Json>) -> Text {
    let field = |name: &str| map.get(name).and_then(Json::as_str).unwrap_or_default();
    if let Some(invariant) = map.get("CultureInvariantString").and_then(Json::as_str) {
        return Text::from_string(invariant);
    }
    let key = field("Key");
    if key.is_empty() {
        Text::from_string(field("SourceString"))
    } else {
        Text::localized(field("Namespace"), key, field("SourceString"))
    }
}

impl<'a> ObjectSerializer<'a> {
    // ========================================================================
    // Serialize
    // ========================================================================

    /// Serialize a field, unwrapping static arrays
    pub fn serialize_property(
        &mut self,
        field: &FieldDescriptor,
        value: &Value,
        refs: &mut Vec<i32>,
    ) -> ImportResult<Json> {
        if field.array_dim > 1 {
            let Value::Fixed(items) = value else {
                return Err(mismatch(&field.name, &field.kind));
            };
            if items.len() != field.array_dim {
                return Err(mismatch(&field.name, &field.kind));
            }
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(self.serialize_value(&field.name, &field.kind, item, refs)?);
            }
            return Ok(Json::Array(out));
        }
        self.serialize_value(&field.name, &field.kind, value, refs)
    }

    /// Serialize one element of a kind
    pub fn serialize_value(
        &mut self,
        name: &str,
        kind: &PropertyKind,
        value: &Value,
        refs: &mut Vec<i32>,
    ) -> ImportResult<Json> {
        let registry = Rc::clone(&self.registry);
        match (kind, value) {
            (PropertyKind::Map(key_kind, value_kind), Value::Map(map)) => {
                let mut pairs = Vec::with_capacity(map.len());
                for (k, v) in map.iter() {
                    let key = self.serialize_value(name, key_kind, k, refs)?;
                    let value = self.serialize_value(name, value_kind, v, refs)?;
                    let mut pair = Map::new();
                    pair.insert("Key".to_string(), key);
                    pair.insert("Value".to_string(), value);
                    pairs.push(Json::Object(pair));
                }
                Ok(Json::Array(pairs))
            }
            (PropertyKind::Set(inner), Value::Set(set)) => {
                let mut out = Vec::with_capacity(set.len());
                for element in set.iter() {
                    out.push(self.serialize_value(name, inner, element, refs)?);
                }
                Ok(Json::Array(out))
            }
            (PropertyKind::Array(inner), Value::Array(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for element in items {
                    out.push(self.serialize_value(name, inner, element, refs)?);
                }
                Ok(Json::Array(out))
            }
            (PropertyKind::Struct(id), Value::Struct(s)) => {
                if !registry.struct_is_child_of(s.struct_id, *id) {
                    return Err(mismatch(name, kind));
                }
                let codec = self.properties.struct_codec(s.struct_id);
                let mut out = Map::new();
                codec.serialize(self, s, &mut out, refs)?;
                Ok(Json::Object(out))
            }
            (PropertyKind::Object, Value::Object(object))
            | (PropertyKind::Interface, Value::Interface(object)) => {
                let index = self.serialize_object(*object)?;
                if index != INDEX_NONE && !refs.contains(&index) {
                    refs.push(index);
                }
                Ok(Json::from(index))
            }
            (PropertyKind::SoftObject, Value::SoftObject(path)) => Ok(Json::String(path.0.clone())),
            (PropertyKind::Enum(enum_id) | PropertyKind::Byte(Some(enum_id)), Value::Int(v)) => {
                Ok(match registry.enum_type(*enum_id).name_of(*v) {
                    Some(entry) => Json::String(entry.to_string()),
                    None => Json::from(*v),
                })
            }
            (PropertyKind::Byte(None) | PropertyKind::Int, Value::Int(v)) => Ok(Json::from(*v)),
            (PropertyKind::Float, Value::Float(v)) => Ok(float_json(*v)),
            (PropertyKind::Bool, Value::Bool(b)) => Ok(Json::Bool(*b)),
            (PropertyKind::Str, Value::Str(s)) | (PropertyKind::Name, Value::Name(s)) => {
                Ok(Json::String(s.clone()))
            }
            (PropertyKind::Text, Value::Text(text)) => {
                if text.is_empty() {
                    let mut out = Map::new();
                    out.insert("SourceString".to_string(), Json::String(text.source.clone()));
                    Ok(Json::Object(out))
                } else {
                    Ok(Json::String(text.to_buffer_string()))
                }
            }
            (PropertyKind::Delegate, _) | (PropertyKind::MulticastDelegate, _) => {
                Ok(Json::String(DELEGATE_SENTINEL.to_string()))
            }
            _ => Err(mismatch(name, kind)),
        }
    }

    // ========================================================================
    // Deserialize
    // ========================================================================

    /// Deserialize into a field, unwrapping static arrays
    pub fn deserialize_property(
        &mut self,
        field: &FieldDescriptor,
        json: &Json,
        value: &mut Value,
    ) -> ImportResult<()> {
        if field.array_dim > 1 {
            let items = json
                .as_array()
                .filter(|items| items.len() == field.array_dim)
                .ok_or_else(|| {
                    ImportError::invalid(&field.name, "array matching the static dimension")
                })?;
            let Value::Fixed(slots) = value else {
                return Err(mismatch(&field.name, &field.kind));
            };
            for (slot, item) in slots.iter_mut().zip(items) {
                self.deserialize_value(&field.name, &field.kind, item, slot)?;
            }
            return Ok(());
        }
        self.deserialize_value(&field.name, &field.kind, json, value)
    }

    /// Deserialize one element of a kind
    pub fn deserialize_value(
        &mut self,
        name: &str,
        kind: &PropertyKind,
        json: &Json,
        value: &mut Value,
    ) -> ImportResult<()> {
        let registry = Rc::clone(&self.registry);
        match kind {
            PropertyKind::Map(key_kind, value_kind) => {
                let Value::Map(map) = value else {
                    return Err(mismatch(name, kind));
                };
                let pairs = json
                    .as_array()
                    .ok_or_else(|| ImportError::invalid(name, "array of pairs"))?;
                for pair in pairs {
                    let entry = pair
                        .as_object()
                        .and_then(|p| Some((p.get("Key")?, p.get("Value")?)));
                    let Some((key_json, value_json)) = entry else {
                        let message = format!("Skipping malformed pair in {name}");
                        self.report(Severity::Warning, &message);
                        continue;
                    };
                    let mut key = registry.default_value(key_kind);
                    let mut item = registry.default_value(value_kind);
                    let decoded = self
                        .deserialize_value(name, key_kind, key_json, &mut key)
                        .and_then(|()| {
                            self.deserialize_value(name, value_kind, value_json, &mut item)
                        });
                    match decoded {
                        Ok(()) => map.add_needs_rehash(key, item),
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => {
                            let message = format!("Skipping pair in {name}: {e}");
                            self.report(Severity::Warning, &message);
                        }
                    }
                }
                map.rehash();
                Ok(())
            }
            PropertyKind::Set(inner) => {
                let Value::Set(set) = value else {
                    return Err(mismatch(name, kind));
                };
                let items = json.as_array().ok_or_else(|| ImportError::invalid(name, "array"))?;
                set.clear();
                for item in items {
                    let mut scratch = registry.default_value(inner);
                    self.deserialize_value(name, inner, item, &mut scratch)?;
                    set.add_needs_rehash(scratch);
                }
                set.rehash();
                Ok(())
            }
            PropertyKind::Array(inner) => {
                let Value::Array(target) = value else {
                    return Err(mismatch(name, kind));
                };
                let items = json.as_array().ok_or_else(|| ImportError::invalid(name, "array"))?;
                target.clear();
                for item in items {
                    let mut element = registry.default_value(inner);
                    self.deserialize_value(name, inner, item, &mut element)?;
                    target.push(element);
                }
                Ok(())
            }
            PropertyKind::Struct(id) => {
                let Value::Struct(target) = value else {
                    return Err(mismatch(name, kind));
                };
                let converted;
                let fields = match json {
                    Json::Object(map) => map,
                    Json::String(s) if self.properties.guid_struct == Some(*id) => {
                        let parts = guid_from_str(s)
                            .ok_or_else(|| ImportError::invalid(name, "GUID string"))?;
                        converted = guid_json(parts);
                        &converted
                    }
                    _ => return Err(ImportError::invalid(name, "object")),
                };
                let codec = self.properties.struct_codec(target.struct_id);
                codec.deserialize(self, target, fields)
            }
            PropertyKind::Object | PropertyKind::Interface => {
                let resolved = self.resolve_object_json(name, json)?;
                match value {
                    Value::Object(slot) | Value::Interface(slot) => {
                        *slot = resolved;
                        Ok(())
                    }
                    _ => Err(mismatch(name, kind)),
                }
            }
            PropertyKind::SoftObject => {
                let path = match json {
                    Json::String(s) => s.clone(),
                    Json::Null => String::new(),
                    Json::Object(map) => {
                        let asset = map
                            .get("AssetPathName")
                            .and_then(Json::as_str)
                            .unwrap_or_default();
                        match map.get("SubPathString").and_then(Json::as_str) {
                            Some(sub) if !sub.is_empty() => format!("{asset}:{sub}"),
                            _ => asset.to_string(),
                        }
                    }
                    _ => return Err(ImportError::invalid(name, "path string")),
                };
                *value = Value::SoftObject(SoftObjectPath(path));
                Ok(())
            }
            PropertyKind::Enum(enum_id) | PropertyKind::Byte(Some(enum_id)) => {
                let number = match json {
                    Json::String(entry) => {
                        let def = registry.enum_type(*enum_id);
                        def.value_of(entry).ok_or_else(|| ImportError::UnknownEnumEntry {
                            enum_name: def.name.clone(),
                            entry: entry.clone(),
                        })?
                    }
                    other if matches!(kind, PropertyKind::Byte(_)) => {
                        json_int(other)
                            .ok_or_else(|| ImportError::invalid(name, "enum name or number"))?
                    }
                    _ => return Err(ImportError::invalid(name, "enum name")),
                };
                *value = Value::Int(number);
                Ok(())
            }
            PropertyKind::Byte(None) | PropertyKind::Int => {
                let int = json_int(json).ok_or_else(|| ImportError::invalid(name, "integer"))?;
                *value = Value::Int(int);
                Ok(())
            }
            PropertyKind::Float => {
                let float = json
                    .as_f64()
                    .ok_or_else(|| ImportError::invalid(name, "number"))?;
                *value = Value::Float(float);
                Ok(())
            }
            PropertyKind::Bool => {
                let flag = json
                    .as_bool()
                    .ok_or_else(|| ImportError::invalid(name, "boolean"))?;
                *value = Value::Bool(flag);
                Ok(())
            }
            PropertyKind::Str => {
                let text = json
                    .as_str()
                    .ok_or_else(|| ImportError::invalid(name, "string"))?;
                *value = Value::Str(text.to_string());
                Ok(())
            }
            PropertyKind::Name => {
                let text = json
                    .as_str()
                    .ok_or_else(|| ImportError::invalid(name, "name"))?;
                *value = Value::Name(text.to_string());
                Ok(())
            }
            PropertyKind::Text => {
                let text = match json {
                    Json::String(s) if s.is_empty() => Text::default(),
                    Json::String(s) => Text::parse_buffer(s),
                    Json::Object(map) => text_from_json(map),
                    _ => return Err(ImportError::invalid(name, "text")),
                };
                *value = Value::Text(text);
                Ok(())
            }
            // Delegates cannot be rebuilt from a flat description.
            PropertyKind::Delegate | PropertyKind::MulticastDelegate => Ok(()),
        }
    }

    fn resolve_object_json(
        &mut self,
        name: &str,
        json: &Json,
    ) -> ImportResult<Option<ObjectHandle>> {
        match json {
            Json::Null => Ok(None),
            Json::Number(_) => {
                let index =
                    json_index(json).ok_or_else(|| ImportError::invalid(name, "object index"))?;
                self.deserialize_object(index)
            }
            Json::Object(map) => {
                let reference = ObjectReference::from_json(map)
                    .ok_or_else(|| ImportError::invalid(name, "object reference"))?;
                Ok(self.resolve_package_index(&reference))
            }
            Json::String(path) if path.is_empty() || path == "None" => Ok(None),
            Json::String(path) => Ok(self.resolve_package_index(&ObjectReference::from_path(path))),
            _ => Err(ImportError::invalid(name, "object reference")),
        }
    }

    /// Resolve a tool-side reference: the named scope first, then the
    /// resolver, then one retry after asking the resolver to import the
    /// asset. Failures are logged and yield `None`.
    pub fn resolve_package_index(&mut self, reference: &ObjectReference) -> Option<ObjectHandle> {
        if let Some(object) = self.scoped_object(reference.leaf_name()) {
            return Some(object);
        }
        let mut found = self.resolve_reference(reference);
        if found.is_none() && self.import_reference(reference) {
            found = self.resolve_reference(reference);
        }
        if found.is_none() {
            let message = format!("Failed to resolve reference {}", reference.object_path());
            self.report(Severity::Warning, &message);
        }
        found
    }

    // ========================================================================
    // Compare
    // ========================================================================

    /// Compare a field against its JSON description
    pub fn compare_property(
        &mut self,
        field: &FieldDescriptor,
        json: &Json,
        value: &Value,
        ctx: &mut CompareContext,
    ) -> ImportResult<bool> {
        if field.array_dim > 1 {
            let (Some(items), Value::Fixed(slots)) = (json.as_array(), value) else {
                return Ok(false);
            };
            if items.len() != slots.len() {
                return Ok(false);
            }
            for (item, slot) in items.iter().zip(slots) {
                if !self.compare_value(&field.name, &field.kind, item, slot, ctx)? {
                    return Ok(false);
                }
            }
            return Ok(true);
        }
        self.compare_value(&field.name, &field.kind, json, value, ctx)
    }

    /// Compare one element of a kind against its JSON description
    pub fn compare_value(
        &mut self,
        name: &str,
        kind: &PropertyKind,
        json: &Json,
        value: &Value,
        ctx: &mut CompareContext,
    ) -> ImportResult<bool> {
        let registry = Rc::clone(&self.registry);
        match (kind, value) {
            (PropertyKind::Map(key_kind, value_kind), Value::Map(map)) => {
                let Some(pairs) = json.as_array() else {
                    return Ok(false);
                };
                let live: Vec<(&Value, &Value)> = map.iter().collect();
                // Later pairs overwrite earlier ones with the same key.
                let mut described: HashMap<usize, &Json> = HashMap::new();
                for pair in pairs {
                    let Some((key_json, value_json)) =
                        pair.as_object().and_then(|p| Some((p.get("Key")?, p.get("Value")?)))
                    else {
                        continue;
                    };
                    let keys = live.iter().map(|(key, _)| *key);
                    match self.match_element(name, key_kind, key_json, keys, ctx)? {
                        Some(slot) => {
                            described.insert(slot, value_json);
                        }
                        None => return Ok(false),
                    }
                }
                if described.len() != live.len() {
                    return Ok(false);
                }
                for (slot, value_json) in described {
                    if !self.compare_value(name, value_kind, value_json, live[slot].1, ctx)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (PropertyKind::Set(inner), Value::Set(set)) => {
                let Some(items) = json.as_array() else {
                    return Ok(false);
                };
                if holds_objects(inner) {
                    let live: Vec<&Value> = set.iter().collect();
                    let mut matched = vec![false; live.len()];
                    for item in items {
                        match self.match_element(name, inner, item, live.iter().copied(), ctx)? {
                            Some(slot) => matched[slot] = true,
                            None => return Ok(false),
                        }
                    }
                    return Ok(matched.into_iter().all(|m| m));
                }
                let mut described = ScriptSet::new();
                for item in items {
                    let mut scratch = registry.default_value(inner);
                    match self.deserialize_value(name, inner, item, &mut scratch) {
                        Ok(()) => described.add_needs_rehash(scratch),
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(_) => return Ok(false),
                    }
                }
                described.rehash();
                Ok(described == *set)
            }
            (PropertyKind::Array(inner), Value::Array(elements)) => {
                let Some(items) = json.as_array() else {
                    return Ok(false);
                };
                if items.len() != elements.len() {
                    return Ok(false);
                }
                for (item, element) in items.iter().zip(elements) {
                    if !self.compare_value(name, inner, item, element, ctx)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (PropertyKind::Struct(_), Value::Struct(s)) => {
                let converted;
                let fields = match json {
                    Json::Object(map) => map,
                    Json::String(text) if self.properties.guid_struct == Some(s.struct_id) => {
                        let Some(parts) = guid_from_str(text) else {
                            return Ok(false);
                        };
                        converted = guid_json(parts);
                        &converted
                    }
                    _ => return Ok(false),
                };
                let codec = self.properties.struct_codec(s.struct_id);
                codec.compare(self, fields, s, ctx)
            }
            (PropertyKind::Object, Value::Object(object))
            | (PropertyKind::Interface, Value::Interface(object)) => match json {
                Json::Number(_) => match json_index(json) {
                    Some(index) => self.compare_object(index, *object, ctx),
                    None => Ok(false),
                },
                other => Ok(self.resolve_object_json(name, other).ok().flatten() == *object),
            },
            (PropertyKind::Delegate | PropertyKind::MulticastDelegate, _) => Ok(true),
            _ => {
                let mut scratch = registry.default_value(kind);
                match self.deserialize_value(name, kind, json, &mut scratch) {
                    Ok(()) => Ok(scratch == *value),
                    Err(e) if e.is_fatal() => Err(e),
                    Err(_) => Ok(false),
                }
            }
        }
    }

    /// Position of the first candidate a JSON element describes. Elements
    /// that may hold objects are compared instead of decoded, so nothing is
    /// constructed.
    fn match_element<'v>(
        &mut self,
        name: &str,
        kind: &PropertyKind,
        json: &Json,
        candidates: impl IntoIterator<Item = &'v Value>,
        ctx: &mut CompareContext,
    ) -> ImportResult<Option<usize>> {
        if !holds_objects(kind) {
            let mut scratch = self.registry.default_value(kind);
            return match self.deserialize_value(name, kind, json, &mut scratch) {
                Ok(()) => Ok(candidates.into_iter().position(|c| *c == scratch)),
                Err(e) if e.is_fatal() => Err(e),
                Err(_) => Ok(None),
            };
        }
        for (slot, candidate) in candidates.into_iter().enumerate() {
            // A failed trial must not leave its pairs marked as compared.
            let mut trial = ctx.clone();
            if self.compare_value(name, kind, json, candidate, &mut trial)? {
                *ctx = trial;
                return Ok(Some(slot));
            }
        }
        Ok(None)
    }
}
