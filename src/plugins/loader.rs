//! Loading of the collected dataset and of curator patches
//!
//! Both sources are best effort. A missing dataset is an empty dataset, and a
//! patch file that cannot be used is logged and skipped so one bad file never
//! aborts the load.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{RegistryError, Result};

use super::types::{PluginPatch, RegistryPlugin, Tool};

/// Longest package name npm accepts.
const MAX_PACKAGE_NAME_LEN: usize = 214;

/// Load the registry-derived dataset written by the collector.
///
/// A missing, unreadable or malformed file yields an empty list.
pub fn load_registry_plugins(path: &Path) -> Vec<RegistryPlugin> {
    if !path.exists() {
        info!(path = %path.display(), "Plugin data file does not exist, using empty dataset");
        return Vec::new();
    }

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read plugin data");
            return Vec::new();
        }
    };

    match serde_json::from_str::<Vec<RegistryPlugin>>(&content) {
        Ok(plugins) => {
            info!(path = %path.display(), count = plugins.len(), "Loaded plugin data");
            plugins
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Malformed plugin data, using empty dataset");
            Vec::new()
        }
    }
}

/// Load every `*.json` patch in `dir`, keyed by package name.
///
/// Files are read in file-name order. When two files patch the same
/// package, the later file wins and a warning names both. Files without a
/// usable `packageName` and malformed files are skipped with a warning.
pub fn load_patches(dir: &Path) -> HashMap<String, PluginPatch> {
    let mut patches = HashMap::new();
    let mut sources: HashMap<String, PathBuf> = HashMap::new();

    for path in patch_files(dir) {
        let patch = match load_patch(&path) {
            Ok(patch) => patch,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Failed to load patch file, skipping");
                continue;
            }
        };

        if let Some(previous) = sources.insert(patch.package_name.clone(), path.clone()) {
            warn!(
                package = %patch.package_name,
                previous = %previous.display(),
                file = %path.display(),
                "Duplicate patch for package, later file wins"
            );
        }
        patches.insert(patch.package_name.clone(), patch);
    }

    info!(dir = %dir.display(), count = patches.len(), "Loaded patches");
    patches
}

/// Sorted list of `*.json` files in `dir`; empty when the directory is absent.
fn patch_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        info!(dir = %dir.display(), "Patches directory does not exist, skipping");
        return Vec::new();
    }

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Failed to read patches directory");
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    files
}

/// Load a single patch file.
///
/// # Errors
/// - `RegistryError::Json` if the file is not JSON or does not match the patch shape
/// - `RegistryError::Validation` if `packageName` is missing or not a valid npm name,
///   or a compatibility override carries an invalid `versions` range
pub fn load_patch(path: &Path) -> Result<PluginPatch> {
    let content = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content)?;

    let name = value
        .get("packageName")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    if name.is_empty() {
        return Err(RegistryError::Validation(
            "patch has no packageName".to_string(),
        ));
    }
    validate_package_name(&name)?;

    let mut patch: PluginPatch = serde_json::from_value(value)?;
    patch.package_name = name;
    validate_patch_ranges(&patch)?;
    Ok(patch)
}

/// Reject compatibility overrides whose `versions` is not a usable range.
fn validate_patch_ranges(patch: &PluginPatch) -> Result<()> {
    let Some(compat) = patch
        .overrides
        .as_ref()
        .and_then(|o| o.compatibility.as_ref())
    else {
        return Ok(());
    };

    for tool in Tool::ALL {
        if let Some(value) = compat.get(tool) {
            if !value.has_valid_range() {
                return Err(RegistryError::Validation(format!(
                    "{}: compatibility.{}.versions '{}' is not a valid semver range",
                    patch.package_name,
                    tool,
                    value.badge_label()
                )));
            }
        }
    }
    Ok(())
}

/// Check that `name` is a syntactically valid npm package name.
///
/// Accepts unscoped (`vite-plugin-pwa`) and scoped (`@vitejs/plugin-react`)
/// names: lowercase, URL-safe characters, at most 214 characters.
pub fn validate_package_name(name: &str) -> Result<()> {
    if name.len() > MAX_PACKAGE_NAME_LEN {
        return Err(RegistryError::Validation(format!(
            "package name '{}' is longer than {} characters",
            name, MAX_PACKAGE_NAME_LEN
        )));
    }

    let name_re = Regex::new(r"^(?:@[a-z0-9\-*~][a-z0-9\-*._~]*/)?[a-z0-9\-~][a-z0-9\-._~]*$")
        .map_err(|e| RegistryError::Config(format!("package name pattern: {}", e)))?;
    if !name_re.is_match(name) {
        return Err(RegistryError::Validation(format!(
            "'{}' is not a valid npm package name",
            name
        )));
    }
    Ok(())
}
