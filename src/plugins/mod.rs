//! Plugin dataset: model, curator patches, merge and published output
//!
//! The collector writes the registry-derived dataset to `data/plugins/all.json`.
//! Curators correct individual records with patch files in `data/patches/`.
//! A build run merges the two and publishes the result.
//!
//! # Architecture
//!
//! - **types**: the compatibility model, [`RegistryPlugin`] and [`PluginPatch`]
//! - **loader**: best-effort loading of the dataset and of patch files
//! - **merge**: [`apply_patch`] and [`merge_plugins`], exclusion and ordering
//! - **output**: `plugins.json` and `plugin-badges.json`
//!
//! # Patch directory
//!
//! ```text
//! data/patches/
//! ├── vite-plugin-legacy-thing.json
//! └── rollup-plugin-not-a-plugin.json
//! ```

pub mod loader;
pub mod merge;
pub mod output;
pub mod types;

pub use loader::{load_patch, load_patches, load_registry_plugins, validate_package_name};
pub use merge::{apply_patch, load_plugins, merge_plugins};
pub use output::{
    generate_badges, write_latest_versions, write_plugin_data, LatestVersions, PluginBadge,
    PluginsApiResponse,
};
pub use types::{
    Compatibility, Links, PartialCompatibility, PartialLinks, PluginPatch, RegistryPlugin, Tool,
    ToolCompatibility,
};
