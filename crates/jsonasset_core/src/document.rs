// SPDX-License-Identifier: MIT OR Apache-2.0
//! The flat export list emitted by the asset inspection tool.

use crate::error::ImportResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

/// One entry of the export list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Export {
    /// Declared type, e.g. `CurveFloat` or `MaterialExpressionAdd`
    #[serde(rename = "Type")]
    pub type_name: String,
    /// Object name
    #[serde(rename = "Name")]
    pub name: String,
    /// Name of the owning export, if any
    #[serde(rename = "Outer", default, skip_serializing_if = "Option::is_none")]
    pub outer: Option<String>,
    /// Property values
    #[serde(rename = "Properties", default)]
    pub properties: Map<String, Json>,
    /// Everything else the tool wrote (`Class`, `Flags`, `Template`, ...)
    #[serde(flatten)]
    pub extra: Map<String, Json>,
}

impl Export {
    /// Create an export with properties
    pub fn new(
        type_name: impl Into<String>,
        name: impl Into<String>,
        properties: Map<String, Json>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
            outer: None,
            properties,
            extra: Map::new(),
        }
    }

    /// Set the outer name
    pub fn with_outer(mut self, outer: impl Into<String>) -> Self {
        self.outer = Some(outer.into());
        self
    }
}

/// A parsed export list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportDocument {
    /// Exports in file order
    pub exports: Vec<Export>,
}

impl ExportDocument {
    /// Parse either `{"data": [...]}` or a bare array
    pub fn parse(text: &str) -> ImportResult<Self> {
        let value: Json = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// Build from an already parsed JSON value
    pub fn from_value(value: Json) -> ImportResult<Self> {
        let list = match value {
            Json::Object(mut root) => root.remove("data").unwrap_or(Json::Array(Vec::new())),
            other => other,
        };
        let exports = serde_json::from_value(list)?;
        Ok(Self { exports })
    }

    /// Wrap the exports back into `{"data": [...]}`
    pub fn to_value(&self) -> ImportResult<Json> {
        let list = serde_json::to_value(&self.exports)?;
        let mut root = Map::new();
        root.insert("data".to_string(), list);
        Ok(Json::Object(root))
    }

    /// First export with the given name
    pub fn find(&self, name: &str) -> Option<&Export> {
        self.exports.iter().find(|e| e.name == name)
    }

    /// First export with the given type
    pub fn find_by_type(&self, type_name: &str) -> Option<&Export> {
        self.exports.iter().find(|e| e.type_name == type_name)
    }

    /// Exports whose outer is `outer`
    pub fn filter_by_outer<'d>(&'d self, outer: &'d str) -> impl Iterator<Item = &'d Export> + 'd {
        filter_exports_by_outer(&self.exports, outer)
    }
}

/// Exports whose outer is `outer`
pub fn filter_exports_by_outer<'d>(
    exports: &'d [Export],
    outer: &'d str,
) -> impl Iterator<Item = &'d Export> + 'd {
    exports
        .iter()
        .filter(move |e| e.outer.as_deref() == Some(outer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_wrapped_and_bare() {
        let wrapped = r#"{"data": [{"Type": "CurveFloat", "Name": "C", "Properties": {}}]}"#;
        let bare = r#"[{"Type": "CurveFloat", "Name": "C", "Flags": "RF_Public"}]"#;

        let a = ExportDocument::parse(wrapped).unwrap();
        let b = ExportDocument::parse(bare).unwrap();
        assert_eq!(a.exports.len(), 1);
        assert_eq!(b.exports[0].type_name, "CurveFloat");
        assert_eq!(b.exports[0].extra.get("Flags"), Some(&json!("RF_Public")));
        assert!(b.exports[0].properties.is_empty());
    }

    #[test]
    fn test_filter_by_outer() {
        let doc = ExportDocument::from_value(json!([
            {"Type": "Material", "Name": "M"},
            {"Type": "MaterialExpressionAdd", "Name": "Add", "Outer": "M"},
            {"Type": "MaterialExpressionAdd", "Name": "Inner", "Outer": "Composite"}
        ]))
        .unwrap();

        let names: Vec<_> = doc.filter_by_outer("M").map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Add"]);
        assert_eq!(doc.find_by_type("Material").map(|e| e.name.as_str()), Some("M"));
    }

    #[test]
    fn test_to_value_wraps_data() {
        let doc = ExportDocument {
            exports: vec![Export::new("CurveFloat", "C", Map::new())],
        };
        let value = doc.to_value().unwrap();
        assert_eq!(value["data"][0]["Name"], json!("C"));
    }
}
