// SPDX-License-Identifier: MIT OR Apache-2.0
//! Three-pass graph reconstruction.
//!
//! 1. Find the editor data entry holding the material inputs and comments.
//! 2. Instantiate one node per expression entry so every node exists before
//!    any pin refers to it. Unknown types get a placeholder.
//! 3. Propagate properties with the node names in the session's named
//!    scope, then fill the pins the generic codec cannot: positional switch
//!    inputs, function references and material inputs.
//!
//! Comments and missing-type annotations come last; composites recurse into
//! subgraphs.

use crate::graph::{ExpressionGraph, GraphError, GraphResult};
use crate::graphs::material::{
    MaterialTypes, FUNCTION_CALL_NODE, MATERIAL, MATERIAL_INPUTS, POSITIONAL_INPUT_NODES,
};
use crate::node::{classify, NodeKind};
use crate::pin::{expression_name, populate_pin, PinStructCodec, PinType};
use jsonasset_core::document::filter_exports_by_outer;
use jsonasset_core::reference::export_name_of_subobject;
use jsonasset_core::structs::{guid_is_zero, guid_parts, guid_value};
use jsonasset_core::{
    ClassId, Export, FieldTable, ObjectFlags, ObjectHandle, ObjectReference, ObjectSerializer,
    PropertyKind, Severity, StructValue, TypeRegistry, Value,
};
use serde_json::{Map, Value as Json};
use std::collections::HashMap;
use std::rc::Rc;
use uuid::Uuid;

const MISSING_NODE_PREFIX: &str = "MissingNode_";
const MISSING_NODE_SIZE: (i64, i64) = (400, 100);

/// Register the pin codecs and exclude the fields the builder fills by hand.
/// Call before deserializing a material's own properties.
pub fn prepare_session(session: &mut ObjectSerializer<'_>) -> GraphResult<MaterialTypes> {
    let types = MaterialTypes::from_registry(session.registry())
        .ok_or(GraphError::TypesNotRegistered)?;
    for pin in types.pin_structs() {
        session
            .properties_mut()
            .register_struct_codec(pin, Rc::new(PinStructCodec));
    }
    for (node, _) in POSITIONAL_INPUT_NODES {
        session.disable_property_serialization(node, "Inputs");
    }
    session.disable_property_serialization(FUNCTION_CALL_NODE, "MaterialFunction");
    for (input, _) in MATERIAL_INPUTS {
        session.disable_property_serialization(MATERIAL, input);
    }
    Ok(types)
}

/// Rebuild the expression graph of `parent` from the document's export
/// entries. Nodes are looked up among entries whose `Outer` is
/// `outer_filter`, or the parent's name when `None`.
pub fn build_graph(
    session: &mut ObjectSerializer<'_>,
    parent: ObjectHandle,
    exports: &[Export],
    outer_filter: Option<&str>,
) -> GraphResult<ExpressionGraph> {
    let types = prepare_session(session)?;
    let registry = Rc::clone(session.registry());
    let parent_class = session.arena().class(parent);
    let is_material = registry.is_child_of(parent_class, types.material);
    if !is_material && !registry.is_child_of(parent_class, types.material_function) {
        return Err(GraphError::InvalidParent(session.arena().path_name(parent)));
    }

    let parent_name = session.arena().name(parent).to_string();
    let outer = outer_filter.unwrap_or(&parent_name).to_string();
    let mut builder = GraphBuilder {
        session,
        registry,
        types,
        parent,
        is_material,
        exports,
    };
    let graph = builder.build(&outer, true)?;
    builder.session.set_named_scope(HashMap::new());

    tracing::debug!(
        parent = %parent_name,
        nodes = graph.node_count(),
        comments = graph.comments().len(),
        "Rebuilt expression graph"
    );
    Ok(graph)
}

struct GraphBuilder<'s, 'a, 'e> {
    session: &'s mut ObjectSerializer<'a>,
    registry: Rc<TypeRegistry>,
    types: MaterialTypes,
    parent: ObjectHandle,
    is_material: bool,
    exports: &'e [Export],
}

struct NodeEntry<'e> {
    export: &'e Export,
    node: ObjectHandle,
    class: ClassId,
}

impl<'e> GraphBuilder<'_, '_, 'e> {
    fn build(&mut self, outer: &str, top_level: bool) -> GraphResult<ExpressionGraph> {
        let mut graph = ExpressionGraph::new(self.parent);
        let editor_data = if top_level { self.find_editor_data() } else { None };

        // Instantiate
        let mut entries = Vec::new();
        let mut composites = Vec::new();
        let mut missing = Vec::new();
        let mut scope = HashMap::new();
        for export in filter_exports_by_outer(self.exports, outer) {
            let class = match classify(&self.registry, self.types.expression, &export.type_name) {
                NodeKind::Expression(class) => class,
                NodeKind::Composite => {
                    composites.push(export.name.as_str());
                    continue;
                }
                NodeKind::Ignored => continue,
                NodeKind::Missing => {
                    if graph.record_missing_type(export) {
                        let message = format!(
                            "Missing node class {} for {}, using a placeholder",
                            export.type_name, export.name
                        );
                        self.session.report(Severity::Warning, &message);
                        missing.push(export);
                    }
                    self.types.placeholder
                }
            };
            let node = self.find_or_construct(class, &export.name);
            scope.insert(export.name.clone(), node);
            entries.push(NodeEntry { export, node, class });
        }
        self.session.set_named_scope(scope);

        // Propagate
        for entry in &entries {
            self.propagate(entry, &mut graph)?;
        }

        if let Some(editor_data) = editor_data {
            if self.is_material {
                self.wire_material_inputs(editor_data, &mut graph);
            }
            self.construct_comments(editor_data, &mut graph)?;
        }
        for export in missing {
            self.annotate_missing(export, &mut graph);
        }

        for composite in composites {
            let subgraph = self.build(composite, false)?;
            graph.add_subgraph(composite, subgraph);
        }
        Ok(graph)
    }

    /// `<ParentType>EditorOnlyData` in newer exports; older ones keep the
    /// same fields on the parent's own entry
    fn find_editor_data(&self) -> Option<&'e Export> {
        let arena = self.session.arena();
        let parent_name = arena.name(self.parent);
        let parent_type = &self.registry.class(arena.class(self.parent)).name;
        let editor_type = format!("{parent_type}EditorOnlyData");

        self.exports
            .iter()
            .find(|e| {
                e.type_name == editor_type && e.outer.as_deref().map_or(true, |o| o == parent_name)
            })
            .or_else(|| {
                self.exports
                    .iter()
                    .find(|e| e.type_name == *parent_type && e.name == parent_name)
            })
    }

    fn find_or_construct(&mut self, class: ClassId, name: &str) -> ObjectHandle {
        let arena = self.session.arena_mut();
        match arena.find_object(Some(class), self.parent, name) {
            Some(existing) => existing,
            None => arena.construct(class, self.parent, name, ObjectFlags::TRANSACTIONAL, None),
        }
    }

    fn propagate(&mut self, entry: &NodeEntry<'_>, graph: &mut ExpressionGraph) -> GraphResult<()> {
        let NodeEntry { export, node, class } = *entry;
        self.session.deserialize_object_properties(&export.properties, node)?;

        let class_name = self.registry.class(class).name.clone();
        if let Some((_, count)) = POSITIONAL_INPUT_NODES.iter().find(|(n, _)| *n == class_name) {
            self.populate_positional_inputs(export, node, *count);
        }
        if class_name == FUNCTION_CALL_NODE {
            self.resolve_function(export, node);
        }

        let owner_field = if self.is_material { "Material" } else { "Function" };
        let arena = self.session.arena_mut();
        arena.set_property_by_name(node, owner_field, Value::Object(Some(self.parent)));
        self.ensure_guid(node);

        if self.is_material {
            let parameter = self
                .session
                .arena()
                .property_by_name(node, "ParameterName")
                .and_then(Value::as_str)
                .filter(|name| !name.is_empty() && *name != "None")
                .map(str::to_string);
            if let Some(parameter) = parameter {
                graph.register_parameter(parameter, node);
            }
        }
        graph.add_node(export.name.clone(), node);
        Ok(())
    }

    fn pin_target(&self, json: &Map<String, Json>) -> Option<ObjectHandle> {
        expression_name(json).and_then(|name| self.session.scoped_object(&name))
    }

    fn populate_positional_inputs(&mut self, export: &Export, node: ObjectHandle, count: usize) {
        let Some(Json::Array(items)) = export.properties.get("Inputs") else {
            return;
        };
        let inputs = self.session.arena().property_by_name(node, "Inputs").cloned();
        let Some(Value::Fixed(mut slots)) = inputs else {
            return;
        };
        if items.len() > count {
            let message = format!(
                "{} has {} inputs, keeping the first {}",
                export.name,
                items.len(),
                count
            );
            self.session.report(Severity::Warning, &message);
        }
        for (slot, item) in slots.iter_mut().zip(items) {
            let Json::Object(json) = item else {
                continue;
            };
            let pin = populate_pin(json, self.pin_target(json), PinType::Default);
            *slot = Value::Struct(pin.to_value(&self.registry, self.types.expression_input));
        }
        self.session
            .arena_mut()
            .set_property_by_name(node, "Inputs", Value::Fixed(slots));
    }

    fn resolve_function(&mut self, export: &Export, node: ObjectHandle) {
        let Some(reference) = export
            .properties
            .get("MaterialFunction")
            .and_then(Json::as_object)
            .and_then(ObjectReference::from_json)
        else {
            return;
        };

        let mut function = self.session.resolve_reference(&reference);
        if function.is_none() && self.session.import_reference(&reference) {
            function = self.session.resolve_reference(&reference);
        }
        match function {
            Some(function) => {
                self.session
                    .arena_mut()
                    .set_property_by_name(node, "MaterialFunction", Value::Object(Some(function)));
            }
            None => {
                let message = format!(
                    "Failed to resolve material function {} for {}",
                    reference.object_path(),
                    export.name
                );
                self.session.report(Severity::Warning, &message);
            }
        }
    }

    fn ensure_guid(&mut self, node: ObjectHandle) {
        let arena = self.session.arena_mut();
        let Some(Value::Struct(guid)) = arena.property_by_name(node, "MaterialExpressionGuid")
        else {
            return;
        };
        if guid_is_zero(guid) {
            let fresh = guid_value(guid.struct_id, guid_parts(&Uuid::new_v4()));
            arena.set_property_by_name(node, "MaterialExpressionGuid", Value::Struct(fresh));
        }
    }

    fn wire_material_inputs(&mut self, editor_data: &Export, graph: &mut ExpressionGraph) {
        let parent_class = self.registry.class(self.session.arena().class(self.parent));
        for (name, pin_type) in MATERIAL_INPUTS {
            let Some(Json::Object(json)) = editor_data.properties.get(*name) else {
                continue;
            };
            let pin = populate_pin(json, self.pin_target(json), *pin_type);
            if !pin.is_connected() && !pin.use_constant {
                continue;
            }
            let pin_struct = match parent_class.field(name).map(|f| &f.kind) {
                Some(PropertyKind::Struct(id)) => *id,
                _ => self.types.pin_struct(*pin_type),
            };
            let value = pin.to_value(&self.registry, pin_struct);
            self.session
                .arena_mut()
                .set_property_by_name(self.parent, name, Value::Struct(value));
            graph.set_material_input(*name, pin);
        }
    }

    fn construct_comments(
        &mut self,
        editor_data: &Export,
        graph: &mut ExpressionGraph,
    ) -> GraphResult<()> {
        let listed = editor_data
            .properties
            .get("ExpressionCollection")
            .and_then(|collection| collection.get("EditorComments"))
            .or_else(|| editor_data.properties.get("EditorComments"));
        let Some(Json::Array(listed)) = listed else {
            return Ok(());
        };

        for reference in listed {
            let Some(object_name) = reference.get("ObjectName").and_then(Json::as_str) else {
                continue;
            };
            let name = export_name_of_subobject(object_name);
            let Some(export) = self.exports.iter().find(|e| e.name == name) else {
                let message = format!("Comment {name} has no export entry");
                self.session.report(Severity::Warning, &message);
                continue;
            };
            let comment = self.find_or_construct(self.types.comment, name);
            self.session.deserialize_object_properties(&export.properties, comment)?;
            self.ensure_guid(comment);
            graph.add_comment(comment);
        }
        Ok(())
    }

    /// Red comment at the position of the first node of a missing type
    fn annotate_missing(&mut self, export: &Export, graph: &mut ExpressionGraph) {
        let position = |field: &str| {
            export
                .properties
                .get(field)
                .and_then(Json::as_i64)
                .unwrap_or(0)
        };
        let (x, y) = (position("MaterialExpressionEditorX"), position("MaterialExpressionEditorY"));

        let name = format!("{MISSING_NODE_PREFIX}{}", export.type_name);
        let comment = self.find_or_construct(self.types.comment, &name);
        let red = self.registry.find_struct("LinearColor").map(|color| {
            let mut value = self.registry.default_struct(color);
            set_struct_field(&self.registry, &mut value, "R", Value::Float(1.0));
            set_struct_field(&self.registry, &mut value, "A", Value::Float(1.0));
            value
        });

        let arena = self.session.arena_mut();
        arena.set_property_by_name(comment, "MaterialExpressionEditorX", Value::Int(x));
        arena.set_property_by_name(comment, "MaterialExpressionEditorY", Value::Int(y));
        arena.set_property_by_name(comment, "SizeX", Value::Int(MISSING_NODE_SIZE.0));
        arena.set_property_by_name(comment, "SizeY", Value::Int(MISSING_NODE_SIZE.1));
        arena.set_property_by_name(
            comment,
            "Text",
            Value::Str(format!("Missing Node Class: {}", export.type_name)),
        );
        if let Some(red) = red {
            arena.set_property_by_name(comment, "CommentColor", Value::Struct(red));
        }
        self.ensure_guid(comment);
        graph.add_comment(comment);
    }
}

fn set_struct_field(registry: &TypeRegistry, value: &mut StructValue, name: &str, field: Value) {
    if let Some(slot) = registry.struct_type(value.struct_id).field_index(name) {
        value.fields[slot] = field;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Connection;
    use crate::graphs::material::register_material_types;
    use jsonasset_core::{DiagnosticLog, ExportDocument, ObjectArena};
    use serde_json::json;

    fn material_arena() -> (ObjectArena, ObjectHandle) {
        let mut registry = TypeRegistry::new();
        let types = register_material_types(&mut registry);
        let mut arena = ObjectArena::new(Rc::new(registry));
        let package = arena.create_package("/Game/M_Test");
        let material =
            arena.construct(types.material, package, "M_Test", ObjectFlags::PUBLIC, None);
        (arena, material)
    }

    fn node_ref(class: &str, name: &str) -> Json {
        json!({"ObjectName": format!("{class}'M_Test:{name}'"), "ObjectPath": "/Game/M_Test.0"})
    }

    #[test]
    fn test_unknown_node_type_gets_placeholder() {
        let document = ExportDocument::from_value(json!([
            {"Type": "Material", "Name": "M_Test", "Properties": {}},
            {"Type": "MaterialEditorOnlyData", "Name": "M_TestEditorOnlyData", "Outer": "M_Test",
             "Properties": {
                "BaseColor": {
                    "Expression":
                        node_ref("MaterialExpressionMultiply", "MaterialExpressionMultiply_0")
                }
             }},
            {"Type": "MaterialExpressionFancyNew", "Name": "MaterialExpressionFancyNew_0",
             "Outer": "M_Test",
             "Properties": {"MaterialExpressionEditorX": -320, "MaterialExpressionEditorY": 48}},
            {"Type": "MaterialExpressionFancyNew", "Name": "MaterialExpressionFancyNew_1",
             "Outer": "M_Test", "Properties": {}},
            {"Type": "MaterialExpressionMultiply", "Name": "MaterialExpressionMultiply_0",
             "Outer": "M_Test",
             "Properties": {
                "A": {
                    "Expression":
                        node_ref("MaterialExpressionFancyNew", "MaterialExpressionFancyNew_0"),
                    "OutputIndex": 0
                },
                "ConstB": 2.0
             }}
        ]))
        .unwrap();

        let (mut arena, material) = material_arena();
        let mut log = DiagnosticLog::new();
        let graph = {
            let mut session = ObjectSerializer::new(&mut arena).with_diagnostics(&mut log);
            build_graph(&mut session, material, &document.exports, None).unwrap()
        };

        let fancy = graph.node("MaterialExpressionFancyNew_0").unwrap();
        let multiply = graph.node("MaterialExpressionMultiply_0").unwrap();
        assert_eq!(arena.registry().class(arena.class(fancy)).name, "MaterialExpressionReroute");

        let connections = graph.connections_to(&arena, multiply);
        assert_eq!(connections, vec![Connection::new(fancy, 0, multiply, "A")]);
        assert_eq!(graph.material_input("BaseColor").and_then(|p| p.expression), Some(multiply));

        assert_eq!(graph.missing_types().count(), 1);
        assert_eq!(graph.comments().len(), 1);
        let note = graph.comments()[0];
        assert_eq!(arena.name(note), "MissingNode_MaterialExpressionFancyNew");
        assert_eq!(
            arena.property_by_name(note, "Text").and_then(Value::as_str),
            Some("Missing Node Class: MaterialExpressionFancyNew")
        );
        assert_eq!(
            arena
                .property_by_name(note, "MaterialExpressionEditorX")
                .and_then(Value::as_int),
            Some(-320)
        );
        assert!(log.contains("Missing node class MaterialExpressionFancyNew"));
    }

    #[test]
    fn test_switch_inputs_are_positional() {
        let document = ExportDocument::from_value(json!([
            {"Type": "MaterialExpressionConstant", "Name": "Low", "Outer": "M_Test",
             "Properties": {"R": 0.25}},
            {"Type": "MaterialExpressionConstant", "Name": "High", "Outer": "M_Test",
             "Properties": {"R": 1.0}},
            {"Type": "MaterialExpressionQualitySwitch", "Name": "Switch", "Outer": "M_Test",
             "Properties": {"Inputs": [
                {"Expression": node_ref("MaterialExpressionConstant", "Low")},
                {},
                {"Expression": node_ref("MaterialExpressionConstant", "High"), "OutputIndex": 0}
             ]}}
        ]))
        .unwrap();

        let (mut arena, material) = material_arena();
        let graph = {
            let mut session = ObjectSerializer::new(&mut arena);
            build_graph(&mut session, material, &document.exports, None).unwrap()
        };

        let switch = graph.node("Switch").unwrap();
        let low = graph.node("Low").unwrap();
        let high = graph.node("High").unwrap();
        let mut connections = graph.connections_to(&arena, switch);
        connections.sort_by(|a, b| a.input.cmp(&b.input));
        assert_eq!(
            connections,
            vec![
                Connection::new(low, 0, switch, "Inputs[0]"),
                Connection::new(high, 0, switch, "Inputs[2]"),
            ]
        );
        let Some(Value::Fixed(slots)) = arena.property_by_name(switch, "Inputs") else {
            panic!("Inputs should be a static array");
        };
        assert_eq!(slots.len(), 4);
    }

    #[test]
    fn test_legacy_pin_and_parameters() {
        let document = ExportDocument::from_value(json!([
            {"Type": "Material", "Name": "M_Test", "Properties": {
                "Roughness": {"ExpressionName": "Rough"},
                "EditorComments": [{"ObjectName": "MaterialExpressionComment'M_Test:Note'"}]
            }},
            {"Type": "MaterialExpressionScalarParameter", "Name": "Rough", "Outer": "M_Test",
             "Properties": {"ParameterName": "Roughness", "DefaultValue": 0.4}},
            {"Type": "MaterialExpressionOneMinus", "Name": "Invert", "Outer": "M_Test",
             "Properties": {"Input": {"Expression": null, "ExpressionName": "Rough"}}},
            {"Type": "MaterialExpressionComment", "Name": "Note", "Outer": "M_Test",
             "Properties": {"Text": "Surface", "SizeX": 200, "SizeY": 120}}
        ]))
        .unwrap();

        let (mut arena, material) = material_arena();
        let graph = {
            let mut session = ObjectSerializer::new(&mut arena);
            build_graph(&mut session, material, &document.exports, None).unwrap()
        };

        let rough = graph.node("Rough").unwrap();
        let invert = graph.node("Invert").unwrap();
        assert_eq!(graph.parameters("Roughness"), &[rough]);
        assert_eq!(
            graph.connections_to(&arena, invert),
            vec![Connection::new(rough, 0, invert, "Input")]
        );
        assert_eq!(graph.material_input("Roughness").and_then(|p| p.expression), Some(rough));

        // Comments are not graph nodes.
        assert_eq!(graph.node_count(), 2);
        let note = graph.comments()[0];
        assert_eq!(arena.property_by_name(note, "Text").and_then(Value::as_str), Some("Surface"));

        // Nodes without a GUID get a fresh one.
        let Some(Value::Struct(guid)) = arena.property_by_name(rough, "MaterialExpressionGuid")
        else {
            panic!("expected a guid struct");
        };
        assert!(!guid_is_zero(guid));
        assert_eq!(
            arena.property_by_name(rough, "Material").and_then(Value::as_object),
            Some(material)
        );
    }

    #[test]
    fn test_composite_subgraph() {
        let document = ExportDocument::from_value(json!([
            {"Type": "MaterialExpressionComposite", "Name": "Group", "Outer": "M_Test",
             "Properties": {}},
            {"Type": "MaterialExpressionPinBase", "Name": "GroupInputs", "Outer": "Group",
             "Properties": {}},
            {"Type": "MaterialExpressionAbs", "Name": "Inner", "Outer": "Group", "Properties": {}},
            {"Type": "MaterialExpressionAbs", "Name": "Outer", "Outer": "M_Test", "Properties": {}}
        ]))
        .unwrap();

        let (mut arena, material) = material_arena();
        let graph = {
            let mut session = ObjectSerializer::new(&mut arena);
            build_graph(&mut session, material, &document.exports, None).unwrap()
        };

        assert_eq!(graph.node_count(), 1);
        assert!(graph.node("Outer").is_some());
        let subgraph = graph.subgraph("Group").unwrap();
        assert_eq!(subgraph.nodes().map(|(name, _)| name).collect::<Vec<_>>(), vec!["Inner"]);
    }

    #[test]
    fn test_parent_must_own_a_graph() {
        let (mut arena, _) = material_arena();
        let curve_class = arena.registry().find_class("CurveFloat").unwrap();
        let package = arena.create_package("/Game/C");
        let curve = arena.construct(curve_class, package, "C", ObjectFlags::PUBLIC, None);

        let mut session = ObjectSerializer::new(&mut arena);
        let err = build_graph(&mut session, curve, &[], None).unwrap_err();
        assert!(matches!(err, GraphError::InvalidParent(_)));
    }
}
