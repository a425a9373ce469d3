// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types for the object codec.
//!
//! Every failure belongs to one of four categories. Only structural errors
//! abort an import; the others are reported and the affected element is
//! skipped or replaced.

/// The recovery category of an [`ImportError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The descriptor format and the type system have diverged
    Structural,
    /// A referenced object could not be located
    DataAvailability,
    /// The data names a type the running registry does not know
    SchemaEvolution,
    /// Reading or fetching an external resource failed
    ExternalIo,
}

/// Errors raised while serializing, deserializing or comparing objects
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// A class index did not resolve to a class object
    #[error("Cannot resolve object class for index {0}")]
    UnresolvedClass(i32),

    /// An export has no class index at all
    #[error("Export {0} has no ObjectClass")]
    MissingClass(i32),

    /// A root export was found but no source package is set
    #[error("No source package set for root export {0}")]
    MissingSourcePackage(i32),

    /// A descriptor references an object mark nobody registered
    #[error("Object mark '{0}' is not registered")]
    UnknownObjectMark(String),

    /// A value slot does not hold the variant its property kind requires
    #[error("Value of field '{field}' does not match its {kind} property kind")]
    KindMismatch {
        /// Field name
        field: String,
        /// Property kind name
        kind: &'static str,
    },

    /// A struct codec was registered for the wrong struct layout
    #[error("Struct codec for '{0}' does not match the struct layout")]
    CodecMismatch(String),

    /// A descriptor index was never serialized
    #[error("Object index {0} is missing from the table")]
    MissingIndex(i32),

    /// An import could not be located
    #[error("Failed to find import {0}")]
    ImportNotFound(String),

    /// An export's outer could not be resolved
    #[error("Failed to resolve outer of '{0}'")]
    OuterNotFound(String),

    /// A JSON value has the wrong shape for the property
    #[error("Invalid value for '{field}': expected {expected}")]
    InvalidValue {
        /// Field name
        field: String,
        /// What the property expected
        expected: &'static str,
    },

    /// An enum entry name was not found
    #[error("Enum '{enum_name}' has no entry '{entry}'")]
    UnknownEnumEntry {
        /// Enum type name
        enum_name: String,
        /// Entry name from the data
        entry: String,
    },

    /// A node or object type is not registered
    #[error("Unknown type '{0}'")]
    UnknownType(String),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parse failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ImportError {
    /// The recovery category of this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnresolvedClass(_)
            | Self::MissingClass(_)
            | Self::MissingSourcePackage(_)
            | Self::UnknownObjectMark(_)
            | Self::KindMismatch { .. }
            | Self::CodecMismatch(_) => ErrorCategory::Structural,
            Self::MissingIndex(_)
            | Self::ImportNotFound(_)
            | Self::OuterNotFound(_)
            | Self::InvalidValue { .. }
            | Self::UnknownEnumEntry { .. } => ErrorCategory::DataAvailability,
            Self::UnknownType(_) => ErrorCategory::SchemaEvolution,
            Self::Io(_) | Self::Json(_) => ErrorCategory::ExternalIo,
        }
    }

    /// Whether this error must abort the current import
    pub fn is_fatal(&self) -> bool {
        self.category() == ErrorCategory::Structural
    }

    /// Shorthand for [`ImportError::InvalidValue`]
    pub fn invalid(field: &str, expected: &'static str) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            expected,
        }
    }
}

/// Result alias used throughout the codec
pub type ImportResult<T> = Result<T, ImportError>;
