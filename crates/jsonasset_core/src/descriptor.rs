// SPDX-License-Identifier: MIT OR Apache-2.0
//! Serialized object descriptors, one per table index.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

/// Index meaning "no object"
pub const INDEX_NONE: i32 = -1;

/// Reserved property key holding the indices an export references
pub const REFERENCED_OBJECTS_FIELD: &str = "$ReferencedObjects";

/// An object living outside the session's package; located, never built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImportDescriptor {
    /// Table index
    pub object_index: i32,
    /// Script package of the class
    pub class_package: String,
    /// Class name
    pub class_name: String,
    /// Outer index; absent for a package
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outer: Option<i32>,
    /// Object name
    pub object_name: String,
}

/// An object owned by the session's package
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExportDescriptor {
    /// Table index
    pub object_index: i32,
    /// Index of the class object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_class: Option<i32>,
    /// Outer index; absent for the package root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outer: Option<i32>,
    /// Object name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_name: Option<String>,
    /// Loadable creation flags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_flags: Option<u32>,
    /// Property values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Json>>,
    /// Registered singleton standing in for this object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_mark: Option<String>,
}

/// A table entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Type")]
pub enum ObjectDescriptor {
    /// External reference
    Import(ImportDescriptor),
    /// Locally owned definition
    Export(ExportDescriptor),
}

impl ObjectDescriptor {
    /// Table index of the entry
    pub fn index(&self) -> i32 {
        match self {
            Self::Import(d) => d.object_index,
            Self::Export(d) => d.object_index,
        }
    }

    /// Outer index, if any
    pub fn outer(&self) -> Option<i32> {
        match self {
            Self::Import(d) => d.outer,
            Self::Export(d) => d.outer,
        }
    }

    /// Whether the entry is an import
    pub fn is_import(&self) -> bool {
        matches!(self, Self::Import(_))
    }

    /// Indices listed in the export's reference side-channel
    pub fn referenced_objects(&self) -> Vec<i32> {
        let Self::Export(d) = self else {
            return Vec::new();
        };
        d.properties
            .as_ref()
            .and_then(|p| p.get(REFERENCED_OBJECTS_FIELD))
            .and_then(Json::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(Json::as_i64)
                    .filter_map(|i| i32::try_from(i).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}
