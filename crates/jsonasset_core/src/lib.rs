// SPDX-License-Identifier: MIT OR Apache-2.0
//! Reflective object/property codec for JSON asset descriptions.
//!
//! This crate provides:
//! - A type registry describing classes, structs and enums as field tables
//! - An object arena addressed by integer handles
//! - A property value codec covering every property kind
//! - An import/export object table with lazy, cycle-safe resolution
//! - A comparator that checks live objects against their descriptions
//!
//! ## Architecture
//!
//! [`ObjectSerializer`] is the session type. It borrows an [`ObjectArena`]
//! and owns the index caches for one package. Property and struct codecs
//! are implemented on the session so object references can recurse back
//! into the table.

pub mod compare;
pub mod descriptor;
pub mod diagnostics;
pub mod document;
pub mod engine;
pub mod error;
pub mod object;
pub mod property;
pub mod reference;
pub mod reflect;
pub mod structs;
pub mod table;
pub mod text;
pub mod value;

pub use compare::{CompareContext, CompareSettings};
pub use descriptor::{ExportDescriptor, ImportDescriptor, ObjectDescriptor, INDEX_NONE};
pub use diagnostics::{Diagnostic, DiagnosticLog, DiagnosticSink, Severity};
pub use document::{Export, ExportDocument};
pub use error::{ErrorCategory, ImportError, ImportResult};
pub use object::{ObjectArena, ObjectData, ObjectFlags, ObjectHandle};
pub use property::PropertySerializer;
pub use reference::{ArenaResolver, ObjectReference, ReferenceResolver};
pub use reflect::{
    ClassDescriptor, ClassId, EnumDescriptor, EnumId, FieldDescriptor, FieldTable, PropertyFlags,
    PropertyKind, StructDescriptor, StructId, TypeRegistry,
};
pub use structs::StructCodec;
pub use table::ObjectSerializer;
pub use text::Text;
pub use value::{ScriptMap, ScriptSet, SoftObjectPath, StructValue, Value};
