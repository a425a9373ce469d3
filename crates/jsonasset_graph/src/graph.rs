// SPDX-License-Identifier: MIT OR Apache-2.0
//! Expression graph: the nodes, comments and pins reconstructed for one
//! material or material function.

use crate::connection::Connection;
use crate::graphs::material::EXPRESSION_INPUT;
use crate::pin::Pin;
use indexmap::IndexMap;
use jsonasset_core::{
    Export, FieldTable, ImportError, ObjectArena, ObjectHandle, StructId, TypeRegistry, Value,
};

/// A reconstructed expression graph
#[derive(Debug, Clone)]
pub struct ExpressionGraph {
    /// Material or material function owning the nodes
    pub parent: ObjectHandle,
    /// Nodes by export name, in document order
    nodes: IndexMap<String, ObjectHandle>,
    /// Comment nodes, including missing-type annotations
    comments: Vec<ObjectHandle>,
    /// Parameter nodes by parameter name
    parameters: IndexMap<String, Vec<ObjectHandle>>,
    /// Composite subgraphs by composite node name
    subgraphs: IndexMap<String, ExpressionGraph>,
    /// Pins wired straight into the parent
    material_inputs: IndexMap<String, Pin>,
    /// Unknown node types with the export of their first occurrence
    missing_types: IndexMap<String, Export>,
}

impl ExpressionGraph {
    /// Create a new empty graph
    pub fn new(parent: ObjectHandle) -> Self {
        Self {
            parent,
            nodes: IndexMap::new(),
            comments: Vec::new(),
            parameters: IndexMap::new(),
            subgraphs: IndexMap::new(),
            material_inputs: IndexMap::new(),
            missing_types: IndexMap::new(),
        }
    }

    /// Add a node to the graph
    pub fn add_node(&mut self, name: impl Into<String>, node: ObjectHandle) {
        self.nodes.insert(name.into(), node);
    }

    /// Remove a node, its parameter entries and any material input it feeds
    pub fn remove_node(&mut self, name: &str) -> Option<ObjectHandle> {
        let node = self.nodes.shift_remove(name)?;
        for nodes in self.parameters.values_mut() {
            nodes.retain(|n| *n != node);
        }
        self.parameters.retain(|_, nodes| !nodes.is_empty());
        self.material_inputs.retain(|_, pin| pin.expression != Some(node));
        Some(node)
    }

    /// Get a node by export name
    pub fn node(&self, name: &str) -> Option<ObjectHandle> {
        self.nodes.get(name).copied()
    }

    /// Get all nodes with their export names
    pub fn nodes(&self) -> impl Iterator<Item = (&str, ObjectHandle)> {
        self.nodes.iter().map(|(name, node)| (name.as_str(), *node))
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Add a comment node
    pub fn add_comment(&mut self, comment: ObjectHandle) {
        self.comments.push(comment);
    }

    /// Comment nodes
    pub fn comments(&self) -> &[ObjectHandle] {
        &self.comments
    }

    /// Index a parameter node under its name
    pub fn register_parameter(&mut self, name: impl Into<String>, node: ObjectHandle) {
        let nodes = self.parameters.entry(name.into()).or_default();
        if !nodes.contains(&node) {
            nodes.push(node);
        }
    }

    /// Nodes carrying a parameter name
    pub fn parameters(&self, name: &str) -> &[ObjectHandle] {
        self.parameters.get(name).map_or(&[][..], Vec::as_slice)
    }

    /// Parameter names in first-seen order
    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.parameters.keys().map(String::as_str)
    }

    /// Attach a composite's subgraph
    pub fn add_subgraph(&mut self, composite: impl Into<String>, graph: ExpressionGraph) {
        self.subgraphs.insert(composite.into(), graph);
    }

    /// Subgraph of a composite node
    pub fn subgraph(&self, composite: &str) -> Option<&ExpressionGraph> {
        self.subgraphs.get(composite)
    }

    /// All subgraphs
    pub fn subgraphs(&self) -> impl Iterator<Item = (&str, &ExpressionGraph)> {
        self.subgraphs.iter().map(|(name, graph)| (name.as_str(), graph))
    }

    /// Wire a pin into the parent
    pub fn set_material_input(&mut self, name: impl Into<String>, pin: Pin) {
        self.material_inputs.insert(name.into(), pin);
    }

    /// Pin wired into the parent under `name`
    pub fn material_input(&self, name: &str) -> Option<&Pin> {
        self.material_inputs.get(name)
    }

    /// Pins wired into the parent
    pub fn material_inputs(&self) -> impl Iterator<Item = (&str, &Pin)> {
        self.material_inputs.iter().map(|(name, pin)| (name.as_str(), pin))
    }

    /// Record the export of an unknown node type. The first occurrence wins.
    pub fn record_missing_type(&mut self, export: &Export) -> bool {
        if self.missing_types.contains_key(&export.type_name) {
            return false;
        }
        self.missing_types.insert(export.type_name.clone(), export.clone());
        true
    }

    /// Unknown node types with the export that first used each
    pub fn missing_types(&self) -> impl Iterator<Item = (&str, &Export)> {
        self.missing_types.iter().map(|(t, e)| (t.as_str(), e))
    }

    /// Every connection, read from the pins stored on the nodes and the
    /// material inputs. Subgraphs are not included.
    pub fn connections(&self, arena: &ObjectArena) -> Vec<Connection> {
        let registry = arena.registry();
        let mut connections = Vec::new();

        if let Some(pin_struct) = registry.find_struct(EXPRESSION_INPUT) {
            for node in self.nodes.values() {
                let class = registry.class(arena.class(*node));
                for (field, value) in class.fields().iter().zip(&arena.object(*node).properties) {
                    let mut pins = Vec::new();
                    collect_pins(registry, pin_struct, value, field.name.clone(), &mut pins);
                    connections.extend(pins.iter().filter_map(|(path, pin)| {
                        Connection::from_pin(pin, *node, path.as_str())
                    }));
                }
            }
        }

        connections.extend(
            self.material_inputs
                .iter()
                .filter_map(|(name, pin)| Connection::from_pin(pin, self.parent, name.as_str())),
        );
        connections
    }

    /// Connections into one node
    pub fn connections_to(&self, arena: &ObjectArena, node: ObjectHandle) -> Vec<Connection> {
        self.connections(arena)
            .into_iter()
            .filter(|c| c.to_node == node)
            .collect()
    }
}

fn collect_pins(
    registry: &TypeRegistry,
    pin_struct: StructId,
    value: &Value,
    path: String,
    out: &mut Vec<(String, Pin)>,
) {
    match value {
        Value::Struct(s) if registry.struct_is_child_of(s.struct_id, pin_struct) => {
            out.push((path, Pin::from_value(registry, s)));
        }
        Value::Struct(s) => {
            for (field, inner) in registry.struct_type(s.struct_id).fields().iter().zip(&s.fields) {
                collect_pins(registry, pin_struct, inner, format!("{path}.{}", field.name), out);
            }
        }
        Value::Array(items) | Value::Fixed(items) => {
            for (i, item) in items.iter().enumerate() {
                collect_pins(registry, pin_struct, item, format!("{path}[{i}]"), out);
            }
        }
        _ => {}
    }
}

/// Error raised while building a graph
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// The registry lacks the material types
    #[error("Material types are not registered")]
    TypesNotRegistered,

    /// The parent is not a material or material function
    #[error("Object {0} cannot own an expression graph")]
    InvalidParent(String),

    /// A structural codec failure
    #[error(transparent)]
    Import(#[from] ImportError),
}

/// Result alias for graph building
pub type GraphResult<T> = Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphs::material::register_material_types;
    use jsonasset_core::ObjectFlags;
    use std::rc::Rc;

    #[test]
    fn test_parameters_and_removal() {
        let mut graph = ExpressionGraph::new(ObjectHandle(1));
        graph.add_node("ScalarParameter_0", ObjectHandle(2));
        graph.add_node("ScalarParameter_1", ObjectHandle(3));
        graph.register_parameter("Roughness", ObjectHandle(2));
        graph.register_parameter("Roughness", ObjectHandle(3));
        graph.register_parameter("Roughness", ObjectHandle(3));
        assert_eq!(graph.parameters("Roughness"), &[ObjectHandle(2), ObjectHandle(3)]);

        graph.remove_node("ScalarParameter_0");
        assert_eq!(graph.parameters("Roughness"), &[ObjectHandle(3)]);
        graph.remove_node("ScalarParameter_1");
        assert!(graph.parameter_names().next().is_none());
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn test_missing_type_first_wins() {
        let mut graph = ExpressionGraph::new(ObjectHandle(1));
        let mut properties = serde_json::Map::new();
        properties.insert("Desc".to_string(), serde_json::json!("first"));
        let first = Export::new("MaterialExpressionFancy", "Fancy_0", properties);
        let second = Export::new("MaterialExpressionFancy", "Fancy_1", serde_json::Map::new());
        assert!(graph.record_missing_type(&first));
        assert!(!graph.record_missing_type(&second));

        let missing: Vec<_> = graph.missing_types().collect();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].0, "MaterialExpressionFancy");
        assert_eq!(missing[0].1.name, "Fancy_0");
        assert_eq!(missing[0].1.properties["Desc"], "first");
    }

    #[test]
    fn test_connections_from_pins() {
        let mut registry = TypeRegistry::new();
        let types = register_material_types(&mut registry);
        let registry = Rc::new(registry);
        let mut arena = ObjectArena::new(Rc::clone(&registry));

        let package = arena.create_package("/Game/M_Test");
        let material =
            arena.construct(types.material, package, "M_Test", ObjectFlags::PUBLIC, None);
        let add = registry.find_class("MaterialExpressionAdd").unwrap();
        let constant = registry.find_class("MaterialExpressionConstant").unwrap();
        let a = arena.construct(constant, material, "Constant_0", ObjectFlags::NONE, None);
        let sum = arena.construct(add, material, "Add_0", ObjectFlags::NONE, None);

        let pin = Pin {
            expression: Some(a),
            output_index: 0,
            ..Pin::default()
        };
        let pin_value = pin.to_value(&registry, types.expression_input);
        arena.set_property_by_name(sum, "B", Value::Struct(pin_value));

        let mut graph = ExpressionGraph::new(material);
        graph.add_node("Constant_0", a);
        graph.add_node("Add_0", sum);
        graph.set_material_input(
            "BaseColor",
            Pin {
                expression: Some(sum),
                ..Pin::default()
            },
        );

        let connections = graph.connections(&arena);
        assert_eq!(
            connections,
            vec![
                Connection::new(a, 0, sum, "B"),
                Connection::new(sum, 0, material, "BaseColor"),
            ]
        );
        assert_eq!(graph.connections_to(&arena, sum).len(), 1);
    }
}
