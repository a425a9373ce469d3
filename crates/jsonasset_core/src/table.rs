// SPDX-License-Identifier: MIT OR Apache-2.0
//! Object graph table.
//!
//! One [`ObjectSerializer`] serves one session against one package. Going
//! out, every live object gets a stable index and an import or export
//! descriptor. Coming in, descriptors are resolved lazily: an export is
//! cached before its properties are applied, so cyclic references find the
//! object under construction instead of recursing forever.

use crate::descriptor::{
    ExportDescriptor, ImportDescriptor, ObjectDescriptor, INDEX_NONE, REFERENCED_OBJECTS_FIELD,
};
use crate::diagnostics::{DiagnosticLog, DiagnosticSink, Severity};
use crate::error::{ImportError, ImportResult};
use crate::object::{ObjectArena, ObjectFlags, ObjectHandle};
use crate::property::PropertySerializer;
use crate::reference::{ArenaResolver, ObjectReference, ReferenceResolver};
use crate::reflect::{FieldTable, TypeRegistry};
use indexmap::IndexMap;
use serde_json::{Map, Value as Json};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::Rc;

/// Serialization session over an [`ObjectArena`]
pub struct ObjectSerializer<'a> {
    pub(crate) arena: &'a mut ObjectArena,
    pub(crate) registry: Rc<TypeRegistry>,
    pub(crate) properties: PropertySerializer,
    pub(crate) resolver: Box<dyn ReferenceResolver + 'a>,
    diagnostics: Box<dyn DiagnosticSink + 'a>,
    pub(crate) source_package: Option<ObjectHandle>,
    object_indices: HashMap<ObjectHandle, i32>,
    serialized: BTreeMap<i32, ObjectDescriptor>,
    last_index: i32,
    descriptors: BTreeMap<i32, Rc<ObjectDescriptor>>,
    loaded: HashMap<i32, Option<ObjectHandle>>,
    marks: IndexMap<ObjectHandle, String>,
    named_scope: HashMap<String, ObjectHandle>,
}

impl<'a> ObjectSerializer<'a> {
    /// Start a session with the arena resolver and a logging diagnostics sink
    pub fn new(arena: &'a mut ObjectArena) -> Self {
        let registry = Rc::clone(arena.registry());
        let properties = PropertySerializer::new(&registry);
        Self {
            arena,
            registry,
            properties,
            resolver: Box::new(ArenaResolver),
            diagnostics: Box::new(DiagnosticLog::new()),
            source_package: None,
            object_indices: HashMap::new(),
            serialized: BTreeMap::new(),
            last_index: 0,
            descriptors: BTreeMap::new(),
            loaded: HashMap::new(),
            marks: IndexMap::new(),
            named_scope: HashMap::new(),
        }
    }

    /// Use a different reference resolver
    pub fn with_resolver(mut self, resolver: impl ReferenceResolver + 'a) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    /// Use a different diagnostics sink
    pub fn with_diagnostics(mut self, sink: impl DiagnosticSink + 'a) -> Self {
        self.diagnostics = Box::new(sink);
        self
    }

    /// The arena objects live in
    pub fn arena(&self) -> &ObjectArena {
        &*self.arena
    }

    /// Mutable access to the arena
    pub fn arena_mut(&mut self) -> &mut ObjectArena {
        &mut *self.arena
    }

    /// The type registry
    pub fn registry(&self) -> &Rc<TypeRegistry> {
        &self.registry
    }

    /// Property codec configuration
    pub fn properties(&self) -> &PropertySerializer {
        &self.properties
    }

    /// Mutable property codec configuration
    pub fn properties_mut(&mut self) -> &mut PropertySerializer {
        &mut self.properties
    }

    /// Report a diagnostic
    pub fn report(&mut self, severity: Severity, message: &str) {
        self.diagnostics.report(severity, message);
    }

    /// Ask the resolver to locate an object
    pub fn resolve_reference(&mut self, reference: &ObjectReference) -> Option<ObjectHandle> {
        self.resolver.resolve(&mut *self.arena, reference)
    }

    /// Ask the resolver to import a missing asset
    pub fn import_reference(&mut self, reference: &ObjectReference) -> bool {
        self.resolver.import_reference(&mut *self.arena, reference)
    }

    /// Package whose objects are exports
    pub fn source_package(&self) -> Option<ObjectHandle> {
        self.source_package
    }

    /// Set the package whose objects are exports
    pub fn set_source_package(&mut self, package: ObjectHandle) {
        self.source_package = Some(package);
    }

    /// Names that package-index references resolve to before the resolver
    /// is consulted
    pub fn set_named_scope(&mut self, scope: HashMap<String, ObjectHandle>) {
        self.named_scope = scope;
    }

    /// Look up a name in the named scope
    pub fn scoped_object(&self, name: &str) -> Option<ObjectHandle> {
        self.named_scope.get(name).copied()
    }

    /// Bind a singleton to a mark
    pub fn set_object_mark(&mut self, object: ObjectHandle, mark: &str) {
        let previous = self
            .marks
            .iter()
            .find(|(_, m)| m.as_str() == mark)
            .map(|(h, _)| *h);
        if let Some(previous) = previous {
            self.marks.shift_remove(&previous);
            // Indices already resolved to the old singleton follow the mark.
            for loaded in self.loaded.values_mut() {
                if *loaded == Some(previous) {
                    *loaded = Some(object);
                }
            }
        }
        self.marks.insert(object, mark.to_string());
    }

    /// Singleton bound to a mark
    pub fn object_by_mark(&self, mark: &str) -> Option<ObjectHandle> {
        self.marks
            .iter()
            .find(|(_, m)| m.as_str() == mark)
            .map(|(h, _)| *h)
    }

    /// Mark bound to an object
    pub fn object_mark(&self, object: ObjectHandle) -> Option<&str> {
        self.marks.get(&object).map(String::as_str)
    }

    /// Stop serializing a field of a type
    pub fn disable_property_serialization(&mut self, owner: &str, field: &str) {
        self.properties.disable_property_serialization(owner, field);
    }

    // ========================================================================
    // Serialization
    // ========================================================================

    /// Assign an index to an object and describe it. Repeat calls return
    /// the same index.
    pub fn serialize_object(&mut self, object: Option<ObjectHandle>) -> ImportResult<i32> {
        let Some(object) = object else {
            return Ok(INDEX_NONE);
        };
        if let Some(index) = self.object_indices.get(&object) {
            return Ok(*index);
        }

        let index = self.last_index;
        self.last_index += 1;
        self.object_indices.insert(object, index);

        let descriptor = if let Some(mark) = self.marks.get(&object).cloned() {
            ObjectDescriptor::Export(ExportDescriptor {
                object_index: index,
                object_mark: Some(mark),
                ..ExportDescriptor::default()
            })
        } else if Some(self.arena.outermost(object)) != self.source_package {
            self.describe_import(index, object)?
        } else {
            self.describe_export(index, object)?
        };
        self.serialized.insert(index, descriptor);
        Ok(index)
    }

    fn describe_import(
        &mut self,
        index: i32,
        object: ObjectHandle,
    ) -> ImportResult<ObjectDescriptor> {
        let registry = Rc::clone(&self.registry);
        let class = registry.class(self.arena.class(object));
        let outer = match self.arena.outer(object) {
            Some(outer) => Some(self.serialize_object(Some(outer))?),
            None => None,
        };
        Ok(ObjectDescriptor::Import(ImportDescriptor {
            object_index: index,
            class_package: class.package.clone(),
            class_name: class.name.clone(),
            outer,
            object_name: self.arena.name(object).to_string(),
        }))
    }

    fn describe_export(
        &mut self,
        index: i32,
        object: ObjectHandle,
    ) -> ImportResult<ObjectDescriptor> {
        let class_object = self.arena.class_object(self.arena.class(object));
        let object_class = Some(self.serialize_object(Some(class_object))?);

        let Some(outer) = self.arena.outer(object) else {
            return Ok(ObjectDescriptor::Export(ExportDescriptor {
                object_index: index,
                object_class,
                ..ExportDescriptor::default()
            }));
        };

        let outer = self.serialize_object(Some(outer))?;
        let properties = self.serialize_object_properties(object)?;
        let data = self.arena.object(object);
        Ok(ObjectDescriptor::Export(ExportDescriptor {
            object_index: index,
            object_class,
            outer: Some(outer),
            object_name: Some(data.name.clone()),
            object_flags: Some(data.flags.loadable().0),
            properties: Some(properties),
            object_mark: None,
        }))
    }

    /// Serialize every eligible property of an object, plus the reference
    /// side-channel
    pub fn serialize_object_properties(
        &mut self,
        object: ObjectHandle,
    ) -> ImportResult<Map<String, Json>> {
        let registry = Rc::clone(&self.registry);
        let class = registry.class(self.arena.class(object));
        let mut out = Map::new();
        let mut refs = Vec::new();

        for (slot, field) in class.fields().iter().enumerate() {
            if !self.properties.should_serialize(field) {
                continue;
            }
            let Some(value) = self.arena.property(object, slot).cloned() else {
                continue;
            };
            let json = self.serialize_property(field, &value, &mut refs)?;
            out.insert(field.name.clone(), json);
        }

        refs.retain(|i| *i != INDEX_NONE);
        out.insert(
            REFERENCED_OBJECTS_FIELD.to_string(),
            Json::Array(refs.into_iter().map(Json::from).collect()),
        );
        Ok(out)
    }

    /// All descriptors produced so far, in index order
    pub fn finalize_serialization(&self) -> ImportResult<Vec<ObjectDescriptor>> {
        (0..self.last_index)
            .map(|i| {
                self.serialized
                    .get(&i)
                    .cloned()
                    .ok_or(ImportError::MissingIndex(i))
            })
            .collect()
    }

    /// Descriptors as a JSON array
    pub fn finalize_to_json(&self) -> ImportResult<Json> {
        Ok(serde_json::to_value(self.finalize_serialization()?)?)
    }

    // ========================================================================
    // Deserialization
    // ========================================================================

    /// Load descriptors for lazy resolution
    pub fn init_for_deserialization(&mut self, descriptors: Vec<ObjectDescriptor>) {
        self.descriptors = descriptors
            .into_iter()
            .map(|d| (d.index(), Rc::new(d)))
            .collect();
        self.loaded.clear();
    }

    /// Load descriptors from their JSON array form
    pub fn init_from_json(&mut self, json: Json) -> ImportResult<()> {
        let descriptors: Vec<ObjectDescriptor> = serde_json::from_value(json)?;
        self.init_for_deserialization(descriptors);
        Ok(())
    }

    pub(crate) fn descriptor(&self, index: i32) -> Option<Rc<ObjectDescriptor>> {
        if let Some(d) = self.descriptors.get(&index) {
            return Some(Rc::clone(d));
        }
        self.serialized.get(&index).map(|d| Rc::new(d.clone()))
    }

    /// Resolve an index to a live object. Repeat calls return the same object.
    pub fn deserialize_object(&mut self, index: i32) -> ImportResult<Option<ObjectHandle>> {
        if index < 0 {
            return Ok(None);
        }
        if let Some(loaded) = self.loaded.get(&index) {
            return Ok(*loaded);
        }
        let Some(descriptor) = self.descriptors.get(&index).map(Rc::clone) else {
            self.report(Severity::Error, &format!("Object index {index} is not in the table"));
            return Ok(None);
        };

        let result = match descriptor.as_ref() {
            ObjectDescriptor::Import(d) => self.deserialize_import(d)?,
            ObjectDescriptor::Export(d) => self.deserialize_export(d)?,
        };
        self.loaded.insert(index, result);
        Ok(result)
    }

    fn deserialize_import(&mut self, d: &ImportDescriptor) -> ImportResult<Option<ObjectHandle>> {
        let registry = Rc::clone(&self.registry);
        let class = registry
            .find_class_in(&d.class_package, &d.class_name)
            .or_else(|| registry.find_class(&d.class_name));
        let Some(class) = class else {
            let message = format!(
                "Failed to find class {}.{} for import {}",
                d.class_package, d.class_name, d.object_name
            );
            self.report(Severity::Error, &message);
            return Ok(None);
        };

        let Some(outer_index) = d.outer else {
            let package = match self.arena.find_package(&d.object_name) {
                Some(package) => Some(package),
                None => self.resolver.load_package(&mut *self.arena, &d.object_name),
            };
            if package.is_none() {
                self.report(Severity::Error, &format!("Failed to load package {}", d.object_name));
            }
            return Ok(package);
        };

        let Some(outer) = self.deserialize_object(outer_index)? else {
            self.report(
                Severity::Error,
                &format!("Failed to resolve outer of import {} ({})", d.object_name, d.class_name),
            );
            return Ok(None);
        };

        if let Some(found) = self.arena.find_object(Some(class), outer, &d.object_name) {
            return Ok(Some(found));
        }

        let path = format!(
            "{}{}{}",
            self.arena.path_name(outer),
            child_separator(self.arena, outer),
            d.object_name
        );
        let found = self.resolve_reference(&ObjectReference::from_path(&path));
        if found.is_none() {
            self.report(Severity::Error, &format!("Failed to find import {path}"));
        }
        Ok(found)
    }

    fn deserialize_export(&mut self, d: &ExportDescriptor) -> ImportResult<Option<ObjectHandle>> {
        let index = d.object_index;
        if let Some(mark) = &d.object_mark {
            let object = self
                .object_by_mark(mark)
                .ok_or_else(|| ImportError::UnknownObjectMark(mark.clone()))?;
            return Ok(Some(object));
        }

        let class_index = d.object_class.ok_or(ImportError::MissingClass(index))?;
        let class = self
            .deserialize_object(class_index)?
            .and_then(|h| self.arena.class_of(h))
            .ok_or(ImportError::UnresolvedClass(class_index))?;

        let Some(outer_index) = d.outer else {
            return self
                .source_package
                .map(Some)
                .ok_or(ImportError::MissingSourcePackage(index));
        };

        let name = d.object_name.clone().unwrap_or_default();
        let Some(outer) = self.deserialize_object(outer_index)? else {
            self.report(Severity::Error, &format!("Failed to resolve outer of export {name}"));
            return Ok(None);
        };

        // The outer's own properties may already have pulled this index in.
        if let Some(loaded) = self.loaded.get(&index) {
            return Ok(*loaded);
        }

        let object = match self.arena.find_object(Some(class), outer, &name) {
            Some(existing) => existing,
            None => {
                let flags = ObjectFlags(d.object_flags.unwrap_or(0)).loadable();
                let template = self.arena.find_archetype(class, outer, &name);
                self.arena.construct(class, outer, &name, flags, template)
            }
        };
        self.loaded.insert(index, Some(object));

        if let Some(properties) = &d.properties {
            self.deserialize_object_properties(properties, object)?;
        }
        Ok(Some(object))
    }

    /// Apply JSON properties to an already constructed object. Data errors
    /// skip the field; structural errors abort.
    pub fn deserialize_object_properties(
        &mut self,
        properties: &Map<String, Json>,
        object: ObjectHandle,
    ) -> ImportResult<()> {
        let registry = Rc::clone(&self.registry);
        let class = registry.class(self.arena.class(object));

        for (slot, field) in class.fields().iter().enumerate() {
            if !self.properties.should_serialize(field) {
                continue;
            }
            let Some(json) = properties.get(&field.name) else {
                continue;
            };
            let Some(mut value) = self.arena.property(object, slot).cloned() else {
                continue;
            };
            match self.deserialize_property(field, json, &mut value) {
                Ok(()) => self.arena.set_property(object, slot, value),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    let message = format!(
                        "Skipping property {} of {}: {}",
                        field.name,
                        self.arena.name(object),
                        e
                    );
                    self.report(Severity::Warning, &message);
                }
            }
        }
        Ok(())
    }

    /// Apply the descriptor at `index` onto an existing object, optionally
    /// renaming and moving it to match. Returns false if the index is not an
    /// export with properties.
    pub fn flush_properties_into_object(
        &mut self,
        index: i32,
        object: ObjectHandle,
        verify_name_and_rename: bool,
        verify_outer_and_move: bool,
    ) -> ImportResult<bool> {
        let Some(descriptor) = self.descriptors.get(&index).map(Rc::clone) else {
            return Ok(false);
        };
        let ObjectDescriptor::Export(d) = descriptor.as_ref() else {
            return Ok(false);
        };
        let Some(properties) = &d.properties else {
            return Ok(false);
        };

        let mut new_outer = None;
        if verify_outer_and_move {
            if let Some(outer_index) = d.outer {
                let outer = self.deserialize_object(outer_index)?;
                if outer.is_some() && outer != self.arena.outer(object) {
                    new_outer = outer;
                }
            }
        }
        let mut new_name = self.arena.name(object).to_string();
        if verify_name_and_rename {
            if let Some(name) = &d.object_name {
                new_name.clone_from(name);
            }
        }
        if new_outer.is_some() || new_name != self.arena.name(object) {
            self.arena.rename(object, &new_name, new_outer);
        }

        self.loaded.insert(index, Some(object));
        self.deserialize_object_properties(properties, object)?;
        Ok(true)
    }

    // ========================================================================
    // Table queries
    // ========================================================================

    /// Names of every package reached from `index` through imports
    pub fn collect_referenced_packages(&self, index: i32) -> Vec<String> {
        let mut packages = BTreeSet::new();
        let mut visited = BTreeSet::new();
        let mut pending = vec![index];

        while let Some(current) = pending.pop() {
            if current < 0 || !visited.insert(current) {
                continue;
            }
            let Some(descriptor) = self.descriptor(current) else {
                continue;
            };
            match descriptor.as_ref() {
                ObjectDescriptor::Import(d) => match d.outer {
                    Some(outer) => pending.push(outer),
                    None => {
                        packages.insert(d.object_name.clone());
                    }
                },
                ObjectDescriptor::Export(d) => {
                    pending.extend(d.object_class);
                    pending.extend(d.outer);
                    pending.extend(descriptor.referenced_objects());
                }
            }
        }
        packages.into_iter().collect()
    }

    /// Full path of the object described at `index`
    pub fn object_full_path(&self, index: i32) -> Option<String> {
        let mut names = Vec::new();
        let mut current = Some(index);
        while let Some(i) = current {
            let descriptor = self.descriptor(i)?;
            match descriptor.as_ref() {
                ObjectDescriptor::Import(d) => names.push(d.object_name.clone()),
                ObjectDescriptor::Export(d) => {
                    if let Some(mark) = &d.object_mark {
                        let object = self.object_by_mark(mark)?;
                        names.push(self.arena.path_name(object));
                        break;
                    }
                    match (&d.object_name, d.outer) {
                        (Some(name), Some(_)) => names.push(name.clone()),
                        _ => names.push(self.arena.name(self.source_package?).to_string()),
                    }
                }
            }
            current = descriptor.outer();
        }
        names.reverse();

        let mut path = String::new();
        for (depth, name) in names.iter().enumerate() {
            match depth {
                0 => {}
                1 => path.push('.'),
                _ => path.push(':'),
            }
            path.push_str(name);
        }
        Some(path)
    }

    /// Number of indices handed out during serialization
    pub fn serialized_count(&self) -> usize {
        self.serialized.len()
    }
}

fn child_separator(arena: &ObjectArena, outer: ObjectHandle) -> char {
    if arena.is_package(outer) {
        '.'
    } else {
        ':'
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticLog;
    use crate::reflect::{ClassDescriptor, ClassId, EnumDescriptor, FieldDescriptor, PropertyKind};
    use crate::text::Text;
    use crate::value::{ScriptMap, ScriptSet, StructValue, Value};
    use serde_json::json;

    struct Fixture {
        registry: Rc<TypeRegistry>,
        node: ClassId,
    }

    fn fixture() -> Fixture {
        let mut registry = TypeRegistry::with_engine_types();
        let mode = registry.register_enum(EnumDescriptor::namespaced(
            "ETestMode",
            &["TM_Off", "TM_On"],
        ));
        let date_time = registry.find_struct("DateTime").unwrap();
        let node = registry.register_class(
            ClassDescriptor::new("TestNode")
                .with_parent(registry.object_class())
                .field(FieldDescriptor::new("Ref", PropertyKind::Object))
                .field(FieldDescriptor::new("Values", PropertyKind::array(PropertyKind::Int)))
                .field(FieldDescriptor::new("Tags", PropertyKind::set(PropertyKind::Name)))
                .field(FieldDescriptor::new(
                    "Lookup",
                    PropertyKind::map(PropertyKind::Name, PropertyKind::Float),
                ))
                .field(FieldDescriptor::new("Mode", PropertyKind::Byte(Some(mode))))
                .field(FieldDescriptor::new("When", PropertyKind::Struct(date_time)))
                .field(FieldDescriptor::new("Label", PropertyKind::Text))
                .field(FieldDescriptor::new("Weights", PropertyKind::Float).fixed(3))
                .field(FieldDescriptor::new("OnChanged", PropertyKind::MulticastDelegate))
                .field(FieldDescriptor::new("Cache", PropertyKind::Int).transient()),
        );
        Fixture {
            registry: Rc::new(registry),
            node,
        }
    }

    fn populate(
        arena: &mut ObjectArena,
        node: ClassId,
    ) -> (ObjectHandle, ObjectHandle, ObjectHandle) {
        let registry = Rc::clone(arena.registry());
        let date_time = registry.find_struct("DateTime").unwrap();
        let package = arena.create_package("/Game/Nodes");
        let a = arena.construct(
            node,
            package,
            "A",
            ObjectFlags::PUBLIC | ObjectFlags::TRANSIENT,
            None,
        );
        let b = arena.construct(node, package, "B", ObjectFlags::PUBLIC, None);

        arena.set_property_by_name(a, "Ref", Value::Object(Some(b)));
        arena.set_property_by_name(b, "Ref", Value::Object(Some(a)));
        arena.set_property_by_name(a, "Values", Value::Array(vec![Value::Int(3), Value::Int(1)]));
        let tags: ScriptSet = [Value::Name("x".into()), Value::Name("y".into())]
            .into_iter()
            .collect();
        arena.set_property_by_name(a, "Tags", Value::Set(tags));
        let lookup: ScriptMap = [(Value::Name("k".into()), Value::Float(0.5))]
            .into_iter()
            .collect();
        arena.set_property_by_name(a, "Lookup", Value::Map(lookup));
        arena.set_property_by_name(a, "Mode", Value::Int(1));
        arena.set_property_by_name(
            a,
            "When",
            Value::Struct(StructValue::new(date_time, vec![Value::Int(638_000_000_000_000_000)])),
        );
        arena.set_property_by_name(a, "Label", Value::Text(Text::localized("Ns", "Key", "Hello")));
        arena.set_property_by_name(
            a,
            "Weights",
            Value::Fixed(vec![Value::Float(1.0), Value::Float(2.0), Value::Float(3.0)]),
        );
        arena.set_property_by_name(a, "Cache", Value::Int(99));
        (package, a, b)
    }

    #[test]
    fn test_serialize_is_idempotent() {
        let fx = fixture();
        let mut arena = ObjectArena::new(Rc::clone(&fx.registry));
        let (package, a, _) = populate(&mut arena, fx.node);

        let mut session = ObjectSerializer::new(&mut arena);
        session.set_source_package(package);
        let first = session.serialize_object(Some(a)).unwrap();
        let count = session.serialized_count();
        let second = session.serialize_object(Some(a)).unwrap();
        assert_eq!(first, second);
        assert_eq!(session.serialized_count(), count);
        assert_eq!(session.serialize_object(None).unwrap(), INDEX_NONE);
    }

    #[test]
    fn test_export_shape() {
        let fx = fixture();
        let mut arena = ObjectArena::new(Rc::clone(&fx.registry));
        let (package, a, _) = populate(&mut arena, fx.node);

        let mut session = ObjectSerializer::new(&mut arena);
        session.set_source_package(package);
        let index = session.serialize_object(Some(a)).unwrap();
        let table = session.finalize_to_json().unwrap();
        let entry = &table[index as usize];

        assert_eq!(entry["Type"], json!("Export"));
        assert_eq!(entry["ObjectName"], json!("A"));
        assert_eq!(entry["ObjectFlags"], json!(ObjectFlags::PUBLIC.0));

        let props = &entry["Properties"];
        assert_eq!(props["Mode"], json!("ETestMode::TM_On"));
        assert_eq!(props["When"], json!({"Ticks": "638000000000000000"}));
        assert_eq!(props["Label"], json!(r#"NSLOCTEXT("Ns", "Key", "Hello")"#));
        assert_eq!(props["Weights"], json!([1.0, 2.0, 3.0]));
        assert_eq!(props["Lookup"], json!([{"Key": "k", "Value": 0.5}]));
        assert_eq!(props["OnChanged"], json!("##NOT SERIALIZED##"));
        assert!(props.get("Cache").is_none());

        let refs = props[REFERENCED_OBJECTS_FIELD].as_array().unwrap();
        assert_eq!(refs.len(), 1);

        // The class object is an import chained to its script package.
        let class_entry = &table[entry["ObjectClass"].as_u64().unwrap() as usize];
        assert_eq!(class_entry["Type"], json!("Import"));
        assert_eq!(class_entry["ClassName"], json!("Class"));
        let package_entry = &table[class_entry["Outer"].as_u64().unwrap() as usize];
        assert_eq!(package_entry["ObjectName"], json!("/Script/Engine"));
    }

    #[test]
    fn test_round_trip_with_cycle() {
        let fx = fixture();
        let mut source = ObjectArena::new(Rc::clone(&fx.registry));
        let (package, a, _) = populate(&mut source, fx.node);

        let (table, index) = {
            let mut session = ObjectSerializer::new(&mut source);
            session.set_source_package(package);
            let index = session.serialize_object(Some(a)).unwrap();
            (session.finalize_to_json().unwrap(), index)
        };

        let mut target = ObjectArena::new(Rc::clone(&fx.registry));
        let package = target.create_package("/Game/Nodes");
        let mut session = ObjectSerializer::new(&mut target);
        session.set_source_package(package);
        session.init_from_json(table).unwrap();

        let first = session.deserialize_object(index).unwrap().unwrap();
        let again = session.deserialize_object(index).unwrap().unwrap();
        assert_eq!(first, again);
        assert!(session.compare_objects(index, Some(first), true, true).unwrap());

        let arena = session.arena();
        let b = arena.property_by_name(first, "Ref").and_then(Value::as_object).unwrap();
        assert_eq!(arena.name(b), "B");
        assert_eq!(arena.property_by_name(b, "Ref").and_then(Value::as_object), Some(first));
        assert_eq!(arena.property_by_name(first, "Mode"), Some(&Value::Int(1)));
        assert_eq!(arena.property_by_name(first, "Cache"), Some(&Value::Int(0)));
        assert_eq!(arena.object(first).flags, ObjectFlags::PUBLIC);
    }

    #[test]
    fn test_reimport_reuses_existing_object() {
        let fx = fixture();
        let mut arena = ObjectArena::new(Rc::clone(&fx.registry));
        let (package, a, _) = populate(&mut arena, fx.node);

        let table = {
            let mut session = ObjectSerializer::new(&mut arena);
            session.set_source_package(package);
            session.serialize_object(Some(a)).unwrap();
            session.finalize_to_json().unwrap()
        };
        let before = arena.len();

        let mut session = ObjectSerializer::new(&mut arena);
        session.set_source_package(package);
        session.init_from_json(table).unwrap();
        let found = session.deserialize_object(0).unwrap();
        assert_eq!(found, Some(a));
        assert_eq!(session.arena().len(), before);
    }

    #[test]
    fn test_missing_class_is_fatal() {
        let fx = fixture();
        let mut arena = ObjectArena::new(Rc::clone(&fx.registry));
        let package = arena.create_package("/Game/Broken");
        let mut session = ObjectSerializer::new(&mut arena);
        session.set_source_package(package);
        session
            .init_from_json(json!([
                {"Type": "Export", "ObjectIndex": 0, "Outer": 1, "ObjectName": "X"},
                {"Type": "Export", "ObjectIndex": 1, "ObjectClass": 2},
                {"Type": "Import", "ObjectIndex": 2, "ClassPackage": "/Script/CoreUObject",
                 "ClassName": "Class", "Outer": 3, "ObjectName": "NoSuchClass"},
                {"Type": "Import", "ObjectIndex": 3, "ClassPackage": "/Script/CoreUObject",
                 "ClassName": "Package", "ObjectName": "/Script/Engine"}
            ]))
            .unwrap();

        let err = session.deserialize_object(0).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, ImportError::MissingClass(0)));

        // Package root export without a class index is also structural.
        let err = session.deserialize_object(1).unwrap_err();
        assert!(matches!(err, ImportError::UnresolvedClass(2)));
    }

    #[test]
    fn test_unresolved_import_is_null() {
        let fx = fixture();
        let mut arena = ObjectArena::new(Rc::clone(&fx.registry));
        let mut log = DiagnosticLog::new();
        {
            let mut session = ObjectSerializer::new(&mut arena).with_diagnostics(&mut log);
            session
                .init_from_json(json!([
                    {"Type": "Import", "ObjectIndex": 0, "ClassPackage": "/Script/CoreUObject",
                     "ClassName": "Package", "ObjectName": "/Game/Elsewhere"},
                    {"Type": "Import", "ObjectIndex": 1, "ClassPackage": "/Script/Engine",
                     "ClassName": "CurveFloat", "Outer": 0, "ObjectName": "Curve"}
                ]))
                .unwrap();
            assert_eq!(session.deserialize_object(1).unwrap(), None);
        }
        assert!(log.contains("/Game/Elsewhere"));
    }

    #[test]
    fn test_object_marks() {
        let fx = fixture();
        let mut arena = ObjectArena::new(Rc::clone(&fx.registry));
        let (package, a, b) = populate(&mut arena, fx.node);
        let engine = arena.create_package("/Engine/Transient");
        let singleton = arena.construct(fx.node, engine, "Singleton", ObjectFlags::NONE, None);
        arena.set_property_by_name(a, "Ref", Value::Object(Some(singleton)));

        let table = {
            let mut session = ObjectSerializer::new(&mut arena);
            session.set_source_package(package);
            session.set_object_mark(singleton, "GEngine");
            session.serialize_object(Some(a)).unwrap();
            let table = session.finalize_to_json().unwrap();
            let marked = table.as_array().unwrap().iter().find(|d| d.get("ObjectMark").is_some());
            assert_eq!(marked.unwrap()["ObjectMark"], json!("GEngine"));
            table
        };

        let mut session = ObjectSerializer::new(&mut arena);
        session.set_source_package(package);
        session.init_from_json(table).unwrap();
        session.set_object_mark(b, "GEngine");
        let object = session.deserialize_object(0).unwrap().unwrap();
        assert_eq!(
            session.arena().property_by_name(object, "Ref").and_then(Value::as_object),
            Some(b)
        );
    }

    #[test]
    fn test_unknown_mark_is_fatal() {
        let fx = fixture();
        let mut arena = ObjectArena::new(Rc::clone(&fx.registry));
        let mut session = ObjectSerializer::new(&mut arena);
        session
            .init_from_json(json!([{"Type": "Export", "ObjectIndex": 0, "ObjectMark": "Nope"}]))
            .unwrap();
        assert!(matches!(
            session.deserialize_object(0),
            Err(ImportError::UnknownObjectMark(_))
        ));
    }

    #[test]
    fn test_package_queries() {
        let fx = fixture();
        let mut arena = ObjectArena::new(Rc::clone(&fx.registry));
        let (package, a, _) = populate(&mut arena, fx.node);
        let other = arena.create_package("/Game/Other");
        let foreign = arena.construct(fx.node, other, "Foreign", ObjectFlags::PUBLIC, None);
        arena.set_property_by_name(a, "Ref", Value::Object(Some(foreign)));

        let mut session = ObjectSerializer::new(&mut arena);
        session.set_source_package(package);
        let index = session.serialize_object(Some(a)).unwrap();

        let packages = session.collect_referenced_packages(index);
        assert_eq!(packages, vec!["/Game/Other", "/Script/CoreUObject", "/Script/Engine"]);
        assert_eq!(session.object_full_path(index).as_deref(), Some("/Game/Nodes.A"));
    }

    #[test]
    fn test_flush_renames_and_applies() {
        let fx = fixture();
        let mut arena = ObjectArena::new(Rc::clone(&fx.registry));
        let package = arena.create_package("/Game/Flush");
        let target = arena.construct(fx.node, package, "Old", ObjectFlags::NONE, None);
        let class_import = json!({"Type": "Import", "ObjectIndex": 2,
            "ClassPackage": "/Script/CoreUObject", "ClassName": "Class", "Outer": 3,
            "ObjectName": "TestNode"});

        let mut session = ObjectSerializer::new(&mut arena);
        session.set_source_package(package);
        session
            .init_from_json(json!([
                {"Type": "Export", "ObjectIndex": 0, "ObjectClass": 2, "Outer": 1,
                 "ObjectName": "New", "Properties": {"Values": [5, 6]}},
                {"Type": "Export", "ObjectIndex": 1, "ObjectClass": 4},
                class_import,
                {"Type": "Import", "ObjectIndex": 3, "ClassPackage": "/Script/CoreUObject",
                 "ClassName": "Package", "ObjectName": "/Script/Engine"},
                {"Type": "Import", "ObjectIndex": 4, "ClassPackage": "/Script/CoreUObject",
                 "ClassName": "Class", "Outer": 5, "ObjectName": "Package"},
                {"Type": "Import", "ObjectIndex": 5, "ClassPackage": "/Script/CoreUObject",
                 "ClassName": "Package", "ObjectName": "/Script/CoreUObject"}
            ]))
            .unwrap();

        assert!(session.flush_properties_into_object(0, target, true, true).unwrap());
        let arena = session.arena();
        assert_eq!(arena.name(target), "New");
        assert_eq!(
            arena.property_by_name(target, "Values"),
            Some(&Value::Array(vec![Value::Int(5), Value::Int(6)]))
        );
    }
}
