//! Merging curator patches into the registry dataset.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};

use super::loader::{load_patches, load_registry_plugins};
use super::types::{PluginPatch, RegistryPlugin};

/// Apply `patch` to `plugin`, producing a new record.
///
/// Returns `None` when the patch excludes the plugin; exclusion wins over
/// any overrides on the same patch. Otherwise the description is replaced
/// wholesale while links and compatibility are merged key by key, so
/// sub-fields the patch does not mention keep their original value.
pub fn apply_patch(plugin: &RegistryPlugin, patch: &PluginPatch) -> Option<RegistryPlugin> {
    if patch.is_excluded() {
        return None;
    }

    let mut patched = plugin.clone();
    if let Some(overrides) = &patch.overrides {
        if let Some(description) = &overrides.description {
            patched.description = description.clone();
        }
        if let Some(links) = &overrides.links {
            patched.links = plugin.links.merged(links);
        }
        if let Some(compatibility) = &overrides.compatibility {
            patched.compatibility = plugin.compatibility.merged(compatibility);
        }
    }
    Some(patched)
}

/// Patch every plugin, drop excluded ones, and order by weekly downloads.
///
/// Sorting is descending and stable: missing counts are treated as zero and
/// plugins with equal counts keep their input order.
pub fn merge_plugins(
    plugins: Vec<RegistryPlugin>,
    patches: &HashMap<String, PluginPatch>,
) -> Vec<RegistryPlugin> {
    let total = plugins.len();
    let mut merged: Vec<RegistryPlugin> = plugins
        .into_iter()
        .filter_map(|plugin| match patches.get(&plugin.name) {
            Some(patch) => {
                let patched = apply_patch(&plugin, patch);
                if patched.is_none() {
                    debug!(
                        plugin = %plugin.name,
                        reason = patch.exclude.as_ref().map(|e| e.reason.as_str()).unwrap_or(""),
                        "Plugin excluded by patch"
                    );
                }
                patched
            }
            None => Some(plugin),
        })
        .collect();

    merged.sort_by_key(|plugin| Reverse(plugin.downloads_or_zero()));

    info!(
        total,
        published = merged.len(),
        excluded = total - merged.len(),
        "Merged patches into plugin data"
    );
    merged
}

/// Load `<data_dir>/all.json` and the patches in `patches_dir`, then merge.
pub fn load_plugins(data_file: &Path, patches_dir: &Path) -> Vec<RegistryPlugin> {
    let plugins = load_registry_plugins(data_file);
    if plugins.is_empty() {
        return plugins;
    }
    let patches = load_patches(patches_dir);
    merge_plugins(plugins, &patches)
}
