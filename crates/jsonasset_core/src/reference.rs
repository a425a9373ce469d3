// SPDX-License-Identifier: MIT OR Apache-2.0
//! Object references as written by the asset inspection tool, and the
//! resolver collaborator that turns them into live objects.

use crate::object::{ObjectArena, ObjectHandle};
use serde_json::{Map, Value as Json};

/// A parsed `{"ObjectName": "Class'Asset:Sub'", "ObjectPath": "/Game/Pkg.0"}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectReference {
    /// Class name in front of the quote, e.g. `Texture2D`
    pub class_name: String,
    /// Object name inside the quotes, e.g. `M_Test:MaterialExpressionAdd_0`
    pub object_name: String,
    /// Package path, e.g. `/Game/Pkg`
    pub package: String,
    /// Text after the `.` in the object path
    pub suffix: Option<String>,
}

impl ObjectReference {
    /// Parse a package-index object. Needs at least `ObjectName`.
    pub fn from_json(json: &Map<String, Json>) -> Option<Self> {
        let object_name = json.get("ObjectName")?.as_str()?;
        let (class_name, object_name) = split_class_and_name(object_name);
        let (package, suffix) = match json.get("ObjectPath").and_then(Json::as_str) {
            Some(path) => split_path(path),
            None => (String::new(), None),
        };
        Some(Self {
            class_name,
            object_name,
            package,
            suffix,
        })
    }

    /// Parse a bare path, optionally wrapped as `Class'/Game/Pkg.Asset'`
    pub fn from_path(path: &str) -> Self {
        let (class_name, inner) = split_class_and_name(path);
        let (package, suffix) = split_path(&inner);
        let object_name = suffix.clone().unwrap_or_default();
        Self {
            class_name,
            object_name,
            package,
            suffix,
        }
    }

    /// Whether the path suffix is an export index rather than a name
    pub fn has_index_suffix(&self) -> bool {
        self.suffix
            .as_deref()
            .map_or(false, |s| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()))
    }

    /// Name of the object inside its package, including subobject parts
    pub fn asset_name(&self) -> String {
        match &self.suffix {
            Some(suffix) if !self.has_index_suffix() && !suffix.is_empty() => suffix.clone(),
            _ => self
                .object_name
                .rsplit('.')
                .next()
                .unwrap_or(&self.object_name)
                .to_string(),
        }
    }

    /// Path usable with [`ObjectArena::find_by_path`]
    pub fn object_path(&self) -> String {
        if self.package.is_empty() {
            return self.object_name.clone();
        }
        let asset = self.asset_name();
        if asset.is_empty() {
            self.package.clone()
        } else {
            format!("{}.{}", self.package, asset)
        }
    }

    /// The innermost object name (after any `:`)
    pub fn leaf_name(&self) -> &str {
        export_name_of_subobject(&self.object_name)
    }
}

/// Innermost name of `Class'Asset:Name'`, `Asset:Name` or `Name`
pub fn export_name_of_subobject(reference: &str) -> &str {
    let inner = match reference.split_once('\'') {
        Some((_, rest)) => rest.trim_end_matches('\''),
        None => reference,
    };
    inner.rsplit(':').next().unwrap_or(inner)
}

fn split_class_and_name(text: &str) -> (String, String) {
    match text.split_once('\'') {
        Some((class, rest)) => (class.to_string(), rest.trim_end_matches('\'').to_string()),
        None => (String::new(), text.to_string()),
    }
}

/// Normalize tool-side content paths to mount points
pub fn normalize_package_path(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("Engine/Content") {
        return format!("/Engine{rest}");
    }
    if !path.starts_with('/') {
        if let Some((_, rest)) = path.split_once("/Content/") {
            return format!("/Game/{rest}");
        }
    }
    path.to_string()
}

fn split_path(path: &str) -> (String, Option<String>) {
    let path = normalize_package_path(path);
    match path.split_once('.') {
        Some((package, suffix)) => (package.to_string(), Some(suffix.to_string())),
        None => (path, None),
    }
}

/// Locates (or triggers import of) objects that live outside the session
pub trait ReferenceResolver {
    /// Find an already-loaded object
    fn resolve(
        &mut self,
        arena: &mut ObjectArena,
        reference: &ObjectReference,
    ) -> Option<ObjectHandle>;

    /// Try to bring the referenced asset in from an external source.
    /// Returns true when something was imported and resolution may be retried.
    fn import_reference(&mut self, _arena: &mut ObjectArena, _reference: &ObjectReference) -> bool {
        false
    }

    /// Find or load a package by name
    fn load_package(&mut self, arena: &mut ObjectArena, name: &str) -> Option<ObjectHandle> {
        arena.find_package(name)
    }
}

/// Resolver that only looks at objects already in the arena
#[derive(Debug, Default, Clone, Copy)]
pub struct ArenaResolver;

impl ReferenceResolver for ArenaResolver {
    fn resolve(
        &mut self,
        arena: &mut ObjectArena,
        reference: &ObjectReference,
    ) -> Option<ObjectHandle> {
        arena.find_by_path(&reference.object_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Json) -> ObjectReference {
        ObjectReference::from_json(value.as_object().unwrap()).unwrap()
    }

    #[test]
    fn test_named_path_suffix() {
        let reference = parse(json!({
            "ObjectName": "Class'/Script/Engine.Material'",
            "ObjectPath": "/Game/M.M"
        }));
        assert_eq!(reference.class_name, "Class");
        assert_eq!(reference.package, "/Game/M");
        assert_eq!(reference.object_path(), "/Game/M.M");
    }

    #[test]
    fn test_index_suffix_uses_object_name() {
        let reference = parse(json!({
            "ObjectName": "MaterialExpressionAdd'M_Test:MaterialExpressionAdd_0'",
            "ObjectPath": "/Game/Materials/M_Test.4"
        }));
        assert!(reference.has_index_suffix());
        assert_eq!(
            reference.object_path(),
            "/Game/Materials/M_Test.M_Test:MaterialExpressionAdd_0"
        );
        assert_eq!(reference.leaf_name(), "MaterialExpressionAdd_0");
    }

    #[test]
    fn test_subobject_names() {
        assert_eq!(export_name_of_subobject("MaterialExpressionComment'M:Comment_2'"), "Comment_2");
        assert_eq!(export_name_of_subobject("M:Comment_2"), "Comment_2");
        assert_eq!(export_name_of_subobject("Comment_2"), "Comment_2");
    }

    #[test]
    fn test_content_paths() {
        assert_eq!(
            normalize_package_path("Engine/Content/Functions/MF_Lerp"),
            "/Engine/Functions/MF_Lerp"
        );
        assert_eq!(
            normalize_package_path("MyGame/Content/Textures/T_Rock"),
            "/Game/Textures/T_Rock"
        );
        assert_eq!(normalize_package_path("/Game/T_Rock"), "/Game/T_Rock");

        let reference = ObjectReference::from_path("Texture2D'/Game/T_Rock.T_Rock'");
        assert_eq!(reference.class_name, "Texture2D");
        assert_eq!(reference.object_path(), "/Game/T_Rock.T_Rock");
    }
}
