// SPDX-License-Identifier: MIT OR Apache-2.0
//! Import driver: turns every top-level export of a file into an asset.
//!
//! Assets are constructed from their declared class and handed to the
//! property codec. Materials and material functions additionally get their
//! expression graph rebuilt. References to assets that are not loaded yet
//! are imported from the export directory on demand.

use crate::settings::ImportSettings;
use indexmap::IndexMap;
use jsonasset_core::{
    ArenaResolver, CompareContext, Diagnostic, DiagnosticLog, Export, ExportDocument, ImportError,
    ObjectArena, ObjectFlags, ObjectHandle, ObjectReference, ObjectSerializer, ReferenceResolver,
    Severity, TypeRegistry,
};
use jsonasset_graph::{build_graph, prepare_session, register_material_types, GraphError};
use std::cell::RefCell;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Error that aborts an import
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The codec hit a structural error
    #[error(transparent)]
    Import(#[from] ImportError),

    /// Graph reconstruction failed
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Registry with every type the tool imports
pub fn build_registry() -> TypeRegistry {
    let mut registry = TypeRegistry::with_engine_types();
    register_material_types(&mut registry);
    registry
}

/// Shape of a rebuilt graph
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphSummary {
    /// Expression nodes
    pub nodes: usize,
    /// Comment nodes
    pub comments: usize,
    /// Wired pins
    pub connections: usize,
    /// Distinct parameter names
    pub parameters: usize,
    /// Node types replaced by placeholders
    pub missing_types: Vec<String>,
}

/// Outcome of importing one file
#[derive(Debug, Default)]
pub struct ImportReport {
    /// Imported assets by path, with their type
    pub imported: IndexMap<String, String>,
    /// Graphs by owning asset path
    pub graphs: IndexMap<String, GraphSummary>,
    /// Assets skipped because they already matched
    pub up_to_date: Vec<String>,
    /// Exports with a type the registry does not know
    pub unsupported: Vec<String>,
    /// Diagnostics reported while importing
    pub diagnostics: Vec<Diagnostic>,
}

impl ImportReport {
    /// Diagnostics at warning level or above
    pub fn warnings(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity >= Severity::Warning)
            .count()
    }
}

/// Import an export file
pub fn import_file(
    arena: &mut ObjectArena,
    settings: &ImportSettings,
    file: &Path,
) -> Result<ImportReport, AppError> {
    let guard = Rc::new(RefCell::new(HashSet::new()));
    import_file_guarded(arena, settings, file, &guard)
}

fn import_file_guarded(
    arena: &mut ObjectArena,
    settings: &ImportSettings,
    file: &Path,
    guard: &Rc<RefCell<HashSet<PathBuf>>>,
) -> Result<ImportReport, AppError> {
    guard.borrow_mut().insert(file.to_path_buf());
    let text = std::fs::read_to_string(file).map_err(ImportError::from)?;
    let document = ExportDocument::parse(&text)?;
    let resolver = DirectoryResolver {
        settings: settings.clone(),
        code_name: settings.code_name_of(file),
        guard: Rc::clone(guard),
    };
    import_document(arena, settings, &settings.package_path_for(file), &document, resolver)
}

/// Import every export without an outer into `package_path`
pub fn import_document(
    arena: &mut ObjectArena,
    settings: &ImportSettings,
    package_path: &str,
    document: &ExportDocument,
    resolver: impl ReferenceResolver,
) -> Result<ImportReport, AppError> {
    let mut report = ImportReport::default();
    let mut log = DiagnosticLog::new();
    {
        let mut session = ObjectSerializer::new(arena)
            .with_resolver(resolver)
            .with_diagnostics(&mut log);
        prepare_session(&mut session)?;

        for export in document.exports.iter().filter(|e| e.outer.is_none()) {
            import_export(&mut session, settings, package_path, document, export, &mut report)?;
        }
    }
    report.diagnostics = log.drain();
    Ok(report)
}

fn import_export(
    session: &mut ObjectSerializer<'_>,
    settings: &ImportSettings,
    package_path: &str,
    document: &ExportDocument,
    export: &Export,
    report: &mut ImportReport,
) -> Result<(), AppError> {
    let registry = Rc::clone(session.registry());
    let Some(class) = registry.find_class(&export.type_name) else {
        tracing::warn!("Skipping {} of unsupported type {}", export.name, export.type_name);
        report.unsupported.push(format!("{} ({})", export.name, export.type_name));
        return Ok(());
    };

    let arena = session.arena_mut();
    let package = match arena.find_package(package_path) {
        Some(package) => package,
        None => arena.create_package(package_path),
    };
    let existing = arena.find_object(Some(class), package, &export.name);
    let owns_graph = ["Material", "MaterialFunction"]
        .iter()
        .filter_map(|name| registry.find_class(name))
        .any(|graph_class| registry.is_child_of(class, graph_class));

    if let Some(object) = existing {
        if settings.compare_before_reimport && !owns_graph {
            let mut ctx = CompareContext::new();
            if session.are_properties_up_to_date(&export.properties, object, &mut ctx)? {
                let path = session.arena().path_name(object);
                tracing::info!("{path} is up to date");
                report.up_to_date.push(path);
                return Ok(());
            }
        }
    }
    let object = existing.unwrap_or_else(|| {
        let flags = ObjectFlags::PUBLIC | ObjectFlags::STANDALONE | ObjectFlags::TRANSACTIONAL;
        session.arena_mut().construct(class, package, &export.name, flags, None)
    });

    session.set_source_package(package);
    session.deserialize_object_properties(&export.properties, object)?;
    let path = session.arena().path_name(object);

    if owns_graph {
        let graph = build_graph(session, object, &document.exports, None)?;
        let summary = GraphSummary {
            nodes: graph.node_count(),
            comments: graph.comments().len(),
            connections: graph.connections(session.arena()).len(),
            parameters: graph.parameter_names().count(),
            missing_types: graph.missing_types().map(|(t, _)| t.to_string()).collect(),
        };
        report.graphs.insert(path.clone(), summary);
    }

    tracing::info!("Imported {path}");
    report.imported.insert(path, export.type_name.clone());
    Ok(())
}

/// Resolver backed by the export directory. Misses are imported from
/// `<export dir>/<project>/Content/<path>.json` when reference imports are
/// enabled.
pub struct DirectoryResolver {
    settings: ImportSettings,
    code_name: Option<String>,
    guard: Rc<RefCell<HashSet<PathBuf>>>,
}

impl ReferenceResolver for DirectoryResolver {
    fn resolve(
        &mut self,
        arena: &mut ObjectArena,
        reference: &ObjectReference,
    ) -> Option<ObjectHandle> {
        ArenaResolver.resolve(arena, reference)
    }

    fn import_reference(&mut self, arena: &mut ObjectArena, reference: &ObjectReference) -> bool {
        if !self.settings.allow_reference_imports {
            return false;
        }
        let Some(code_name) = self.code_name.as_deref() else {
            return false;
        };
        let Some(file) = self.settings.file_for_package(code_name, &reference.package) else {
            return false;
        };
        if !file.exists() || self.guard.borrow().contains(&file) {
            return false;
        }

        tracing::info!("Importing referenced asset {}", file.display());
        match import_file_guarded(arena, &self.settings, &file, &self.guard) {
            Ok(report) => !report.imported.is_empty(),
            Err(e) => {
                tracing::error!("Failed to import {}: {e}", file.display());
                false
            }
        }
    }
}
