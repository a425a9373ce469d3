// SPDX-License-Identifier: MIT OR Apache-2.0
//! Import settings.
//!
//! Settings are stored as RON next to where the tool runs:
//! - Where the inspection tool wrote its exports
//! - Which mount the exported content maps to
//! - Re-import and reference-import switches
//! - The default log filter

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Current settings format version
pub const SETTINGS_FORMAT_VERSION: u32 = 1;

/// Settings file looked up in the working directory
pub const SETTINGS_FILE_NAME: &str = "jsonasset.ron";

/// Error loading or saving settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Reading or writing the file failed
    #[error("Settings file error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid RON for the settings
    #[error("Invalid settings: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// The settings could not be written as RON
    #[error("Failed to write settings: {0}")]
    Write(#[from] ron::Error),

    /// Written by a newer version of the tool
    #[error("Settings version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version in the file
        found: u32,
        /// Newest version this build reads
        supported: u32,
    },
}

/// Import settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    /// Settings format version
    pub version: u32,
    /// Root the export files live under, `<dir>/<Project>/Content/...`
    pub export_directory: PathBuf,
    /// Mount point exported content is imported to
    pub content_root: String,
    /// Skip assets whose properties already match
    pub compare_before_reimport: bool,
    /// Import referenced assets from the export directory when missing
    pub allow_reference_imports: bool,
    /// Default `tracing` filter directive, overridden by `RUST_LOG`
    pub log_directive: String,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_FORMAT_VERSION,
            export_directory: PathBuf::from("Exports"),
            content_root: "Game".to_string(),
            compare_before_reimport: true,
            allow_reference_imports: true,
            log_directive: "jsonasset_app=info".to_string(),
        }
    }
}

impl ImportSettings {
    /// Load settings from a file
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        let settings: ImportSettings = ron::from_str(&content)?;

        if settings.version > SETTINGS_FORMAT_VERSION {
            return Err(SettingsError::UnsupportedVersion {
                found: settings.version,
                supported: SETTINGS_FORMAT_VERSION,
            });
        }
        Ok(settings)
    }

    /// Load settings if the file exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> Result<Self, SettingsError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        let content = ron::ser::to_string_pretty(self, config)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Path of `file` below the export directory, with `/` separators and
    /// without the extension
    fn relative_stem(&self, file: &Path) -> Option<Vec<String>> {
        let relative = file.strip_prefix(&self.export_directory).ok()?;
        let parts: Vec<String> = relative
            .with_extension("")
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        (!parts.is_empty()).then_some(parts)
    }

    /// Project folder a file was exported from: the first directory below
    /// the export directory
    pub fn code_name_of(&self, file: &Path) -> Option<String> {
        let parts = self.relative_stem(file)?;
        (parts.len() > 1).then(|| parts[0].clone())
    }

    /// Package an export file imports into. `<Project>/Content/A/B.json`
    /// maps to `/<root>/A/B`, `Engine/Content/A.json` to `/Engine/A`.
    pub fn package_path_for(&self, file: &Path) -> String {
        let Some(parts) = self.relative_stem(file) else {
            let stem = file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            return format!("/{}/{stem}", self.content_root);
        };
        let content = parts.iter().position(|p| p == "Content");
        match content {
            Some(1) if parts[0] == "Engine" => format!("/Engine/{}", parts[2..].join("/")),
            Some(i) => format!("/{}/{}", self.content_root, parts[i + 1..].join("/")),
            None => format!("/{}/{}", self.content_root, parts.join("/")),
        }
    }

    /// Export file for a package, exported by project `code_name`
    pub fn file_for_package(&self, code_name: &str, package: &str) -> Option<PathBuf> {
        let (mount, rest) = package.trim_start_matches('/').split_once('/')?;
        let project = if mount == "Engine" {
            "Engine"
        } else if mount == self.content_root {
            code_name
        } else {
            return None;
        };
        let mut path = self.export_directory.join(project).join("Content");
        path.extend(rest.split('/'));
        path.set_extension("json");
        Some(path)
    }
}
