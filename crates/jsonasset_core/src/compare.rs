// SPDX-License-Identifier: MIT OR Apache-2.0
//! Up-to-date checks: does a live object already match its descriptor?

use crate::descriptor::ObjectDescriptor;
use crate::error::ImportResult;
use crate::object::ObjectHandle;
use crate::reflect::FieldTable;
use crate::table::ObjectSerializer;
use serde_json::{Map, Value as Json};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Per-index comparison switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompareSettings {
    /// Compare object names
    pub check_name: bool,
    /// Compare outers
    pub check_outer: bool,
}

impl Default for CompareSettings {
    fn default() -> Self {
        Self {
            check_name: true,
            check_outer: true,
        }
    }
}

/// State for one comparison walk
#[derive(Debug, Default, Clone)]
pub struct CompareContext {
    compared: HashSet<(i32, ObjectHandle)>,
    settings: HashMap<i32, CompareSettings>,
}

impl CompareContext {
    /// Empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pair; returns false if it was already being compared
    pub fn mark_compared(&mut self, index: i32, object: ObjectHandle) -> bool {
        self.compared.insert((index, object))
    }

    /// Override the switches for one index
    pub fn set_settings(&mut self, index: i32, settings: CompareSettings) {
        self.settings.insert(index, settings);
    }

    /// Switches for an index
    pub fn settings(&self, index: i32) -> CompareSettings {
        self.settings.get(&index).copied().unwrap_or_default()
    }
}

impl<'a> ObjectSerializer<'a> {
    /// Compare the object at `index` with a live object
    pub fn compare_objects(
        &mut self,
        index: i32,
        object: Option<ObjectHandle>,
        check_name: bool,
        check_outer: bool,
    ) -> ImportResult<bool> {
        let mut ctx = CompareContext::new();
        ctx.set_settings(index, CompareSettings { check_name, check_outer });
        self.compare_object(index, object, &mut ctx)
    }

    /// Compare within an existing walk. Pairs already under comparison
    /// count as equal, which terminates cycles.
    pub fn compare_object(
        &mut self,
        index: i32,
        object: Option<ObjectHandle>,
        ctx: &mut CompareContext,
    ) -> ImportResult<bool> {
        if index < 0 {
            return Ok(object.is_none());
        }
        let Some(descriptor) = self.descriptor(index) else {
            return Ok(false);
        };
        let Some(object) = object else {
            // A missing import matches a null reference.
            return Ok(descriptor.is_import() && self.deserialize_object(index)?.is_none());
        };
        if !ctx.mark_compared(index, object) {
            return Ok(true);
        }
        let settings = ctx.settings(index);

        match descriptor.as_ref() {
            ObjectDescriptor::Import(d) => {
                if self.arena.name(object) != d.object_name {
                    return Ok(false);
                }
                match d.outer {
                    Some(outer) if settings.check_outer => {
                        let live_outer = self.arena.outer(object);
                        self.compare_object(outer, live_outer, ctx)
                    }
                    _ => Ok(true),
                }
            }
            ObjectDescriptor::Export(d) => {
                if let Some(mark) = &d.object_mark {
                    return Ok(self.object_by_mark(mark) == Some(object));
                }
                if settings.check_name {
                    if let Some(name) = &d.object_name {
                        if self.arena.name(object) != name {
                            return Ok(false);
                        }
                    }
                }
                if let Some(class_index) = d.object_class {
                    let class_object = self.arena.class_object(self.arena.class(object));
                    if !self.compare_object(class_index, Some(class_object), ctx)? {
                        return Ok(false);
                    }
                }
                let Some(outer) = d.outer else {
                    return Ok(self.source_package == Some(object));
                };
                if settings.check_outer {
                    let live_outer = self.arena.outer(object);
                    if !self.compare_object(outer, live_outer, ctx)? {
                        return Ok(false);
                    }
                }
                match &d.properties {
                    Some(properties) => self.are_properties_up_to_date(properties, object, ctx),
                    None => Ok(true),
                }
            }
        }
    }

    /// Whether every described property already holds the described value.
    /// Properties absent from the JSON are not checked.
    pub fn are_properties_up_to_date(
        &mut self,
        properties: &Map<String, Json>,
        object: ObjectHandle,
        ctx: &mut CompareContext,
    ) -> ImportResult<bool> {
        let registry = Rc::clone(&self.registry);
        let class = registry.class(self.arena.class(object));
        for (slot, field) in class.fields().iter().enumerate() {
            if !self.properties.should_serialize(field) {
                continue;
            }
            let Some(json) = properties.get(&field.name) else {
                continue;
            };
            let Some(value) = self.arena.property(object, slot).cloned() else {
                continue;
            };
            if !self.compare_property(field, json, &value, ctx)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{ObjectArena, ObjectFlags};
    use crate::reflect::TypeRegistry;
    use crate::value::Value;
    use serde_json::json;

    fn curve_table(arena: &mut ObjectArena) -> (ObjectHandle, ObjectHandle, Json) {
        let registry = Rc::clone(arena.registry());
        let curve_class = registry.find_class("CurveFloat").unwrap();
        let package = arena.create_package("/Game/Curves");
        let curve = arena.construct(curve_class, package, "Inner", ObjectFlags::PUBLIC, None);
        arena.set_property_by_name(curve, "bIsEventCurve", Value::Bool(true));

        let mut session = ObjectSerializer::new(arena);
        session.set_source_package(package);
        session.serialize_object(Some(curve)).unwrap();
        (package, curve, session.finalize_to_json().unwrap())
    }

    #[test]
    fn test_compare_detects_changes() {
        let mut arena = ObjectArena::new(Rc::new(TypeRegistry::with_engine_types()));
        let (package, curve, table) = curve_table(&mut arena);

        let mut session = ObjectSerializer::new(&mut arena);
        session.set_source_package(package);
        session.init_from_json(table).unwrap();
        assert!(session.compare_objects(0, Some(curve), true, true).unwrap());

        session.arena_mut().set_property_by_name(curve, "bIsEventCurve", Value::Bool(false));
        assert!(!session.compare_objects(0, Some(curve), true, true).unwrap());
    }

    #[test]
    fn test_name_check_can_be_disabled() {
        let mut arena = ObjectArena::new(Rc::new(TypeRegistry::with_engine_types()));
        let (package, curve, table) = curve_table(&mut arena);
        arena.rename(curve, "Renamed", None);

        let mut session = ObjectSerializer::new(&mut arena);
        session.set_source_package(package);
        session.init_from_json(table).unwrap();
        assert!(!session.compare_objects(0, Some(curve), true, true).unwrap());
        assert!(session.compare_objects(0, Some(curve), false, true).unwrap());
    }

    #[test]
    fn test_null_cases() {
        let mut arena = ObjectArena::new(Rc::new(TypeRegistry::with_engine_types()));
        let (package, curve, table) = curve_table(&mut arena);

        let mut session = ObjectSerializer::new(&mut arena);
        session.set_source_package(package);
        session.init_from_json(table).unwrap();
        let mut ctx = CompareContext::new();
        assert!(session.compare_object(-1, None, &mut ctx).unwrap());
        assert!(!session.compare_object(-1, Some(curve), &mut ctx).unwrap());
        // An export never equals a null object.
        assert!(!session.compare_object(0, None, &mut ctx).unwrap());
    }

    #[test]
    fn test_missing_import_matches_null() {
        let mut arena = ObjectArena::new(Rc::new(TypeRegistry::with_engine_types()));
        let mut session = ObjectSerializer::new(&mut arena);
        session
            .init_from_json(json!([
                {"Type": "Import", "ObjectIndex": 0, "ClassPackage": "/Script/CoreUObject",
                 "ClassName": "Package", "ObjectName": "/Game/Gone"}
            ]))
            .unwrap();
        assert!(session.compare_objects(0, None, true, true).unwrap());
    }
}
