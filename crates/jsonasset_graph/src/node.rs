// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node type resolution: maps the `Type` of an export entry to an
//! expression class, following the renames expression types went through
//! across engine versions.

use jsonasset_core::{ClassId, TypeRegistry};

/// Class instantiated for node types the registry does not know
pub const PLACEHOLDER_NODE: &str = "MaterialExpressionReroute";

/// Composite nodes; their contents become a subgraph
pub const COMPOSITE_NODE: &str = "MaterialExpressionComposite";

/// Entry types that never become nodes in the first pass
pub const IGNORED_NODE_TYPES: &[&str] = &[
    COMPOSITE_NODE,
    "MaterialExpressionPinBase",
    "MaterialExpressionComment",
    "MaterialFunction",
    "Material",
];

/// Old type names and their current replacement
const RENAMED_NODE_TYPES: &[(&str, &str)] = &[
    ("MaterialExpressionLightmassReplace", "MaterialExpressionGIReplace"),
    (
        "MaterialExpressionTextureSampleParameterMeshSubUV",
        "MaterialExpressionTextureSampleParameterSubUV",
    ),
    (
        "MaterialExpressionStrataLegacyConversion",
        "MaterialExpressionSubstrateConvertMaterialAttributes",
    ),
];

/// What an export entry becomes in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A node of a known expression class
    Expression(ClassId),
    /// A composite whose contents form a subgraph
    Composite,
    /// Not a node
    Ignored,
    /// An expression type the registry does not know
    Missing,
}

/// Classify an entry type. `expression` is the expression base class.
pub fn classify(registry: &TypeRegistry, expression: ClassId, type_name: &str) -> NodeKind {
    if type_name == COMPOSITE_NODE {
        return NodeKind::Composite;
    }
    if IGNORED_NODE_TYPES.contains(&type_name) || type_name.ends_with("EditorOnlyData") {
        return NodeKind::Ignored;
    }
    match resolve_node_class(registry, expression, type_name) {
        Some(class) => NodeKind::Expression(class),
        None => NodeKind::Missing,
    }
}

/// Find the expression class for a type name: directly, through the rename
/// table, then with `Strata` spelled `Substrate`
pub fn resolve_node_class(
    registry: &TypeRegistry,
    expression: ClassId,
    type_name: &str,
) -> Option<ClassId> {
    let lookup = |name: &str| {
        registry
            .find_class(name)
            .filter(|class| registry.is_child_of(*class, expression))
    };

    if let Some(class) = lookup(type_name) {
        return Some(class);
    }
    if let Some((_, current)) = RENAMED_NODE_TYPES.iter().find(|(old, _)| *old == type_name) {
        if let Some(class) = lookup(current) {
            return Some(class);
        }
    }
    if type_name.contains("Strata") {
        return lookup(&type_name.replace("Strata", "Substrate"));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphs::material::register_material_types;

    #[test]
    fn test_renamed_types() {
        let mut registry = TypeRegistry::new();
        let types = register_material_types(&mut registry);
        let gi = registry.find_class("MaterialExpressionGIReplace").unwrap();
        let slab = registry.find_class("MaterialExpressionSubstrateSlabBSDF").unwrap();

        assert_eq!(
            resolve_node_class(&registry, types.expression, "MaterialExpressionLightmassReplace"),
            Some(gi)
        );
        assert_eq!(
            resolve_node_class(&registry, types.expression, "MaterialExpressionStrataSlabBSDF"),
            Some(slab)
        );
        assert_eq!(
            resolve_node_class(&registry, types.expression, "MaterialExpressionFancy"),
            None
        );
        // Only expression classes count as node types.
        assert_eq!(resolve_node_class(&registry, types.expression, "Texture2D"), None);
    }

    #[test]
    fn test_classify() {
        let mut registry = TypeRegistry::new();
        let types = register_material_types(&mut registry);
        let expression = types.expression;

        assert_eq!(classify(&registry, expression, COMPOSITE_NODE), NodeKind::Composite);
        assert_eq!(classify(&registry, expression, "MaterialExpressionComment"), NodeKind::Ignored);
        assert_eq!(classify(&registry, expression, "MaterialEditorOnlyData"), NodeKind::Ignored);
        assert_eq!(classify(&registry, expression, "MaterialExpressionFancy"), NodeKind::Missing);
        assert!(matches!(
            classify(&registry, expression, "MaterialExpressionAdd"),
            NodeKind::Expression(_)
        ));
    }
}
