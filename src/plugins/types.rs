//! Plugin types for the registry
//!
//! This module defines the records flowing through the pipeline: the
//! tri-state [`ToolCompatibility`] value, the registry-derived
//! [`RegistryPlugin`] record and the curator-authored [`PluginPatch`].
//! Field names serialize in camelCase to match the published JSON documents.

use serde::{Deserialize, Serialize};

use crate::utils::semver_range;

// ============================================================================
// Compatibility
// ============================================================================

/// The bundlers a plugin can declare compatibility with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tool {
    Vite,
    Rollup,
    Rolldown,
}

impl Tool {
    /// All tools, in display order.
    pub const ALL: [Tool; 3] = [Tool::Vite, Tool::Rollup, Tool::Rolldown];

    /// The npm package name of the tool, also used as the JSON key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tool::Vite => "vite",
            Tool::Rollup => "rollup",
            Tool::Rolldown => "rolldown",
        }
    }
}

impl std::fmt::Display for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A plugin's relationship to one tool.
///
/// Serialized as a tagged object:
///
/// ```json
/// { "type": "compatible", "versions": "^5.0.0 || ^6.0.0", "note": "SSR untested" }
/// { "type": "incompatible", "reason": "Relies on Rollup-only hooks" }
/// { "type": "unknown" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolCompatibility {
    /// Confirmed compatible with the given semver range.
    Compatible {
        versions: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },
    /// Confirmed incompatible.
    Incompatible { reason: String },
    /// Nothing is known.
    #[default]
    Unknown,
}

impl ToolCompatibility {
    /// Shorthand for a compatible value without a note.
    pub fn compatible(versions: impl Into<String>) -> Self {
        ToolCompatibility::Compatible {
            versions: versions.into(),
            note: None,
        }
    }

    /// Shorthand for an incompatible value.
    pub fn incompatible(reason: impl Into<String>) -> Self {
        ToolCompatibility::Incompatible {
            reason: reason.into(),
        }
    }

    /// The variant tag as it appears in JSON.
    pub fn type_name(&self) -> &'static str {
        match self {
            ToolCompatibility::Compatible { .. } => "compatible",
            ToolCompatibility::Incompatible { .. } => "incompatible",
            ToolCompatibility::Unknown => "unknown",
        }
    }

    /// Display string used by badges: the version range when compatible,
    /// otherwise the variant tag.
    pub fn badge_label(&self) -> &str {
        match self {
            ToolCompatibility::Compatible { versions, .. } => versions,
            other => other.type_name(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, ToolCompatibility::Unknown)
    }

    /// `false` only for a compatible value whose range does not parse.
    pub fn has_valid_range(&self) -> bool {
        match self {
            ToolCompatibility::Compatible { versions, .. } => {
                semver_range::is_valid_range(versions)
            }
            _ => true,
        }
    }
}

/// Compatibility of a plugin with every tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Compatibility {
    #[serde(default)]
    pub vite: ToolCompatibility,
    #[serde(default)]
    pub rollup: ToolCompatibility,
    #[serde(default)]
    pub rolldown: ToolCompatibility,
}

impl Compatibility {
    pub fn get(&self, tool: Tool) -> &ToolCompatibility {
        match tool {
            Tool::Vite => &self.vite,
            Tool::Rollup => &self.rollup,
            Tool::Rolldown => &self.rolldown,
        }
    }

    pub fn get_mut(&mut self, tool: Tool) -> &mut ToolCompatibility {
        match tool {
            Tool::Vite => &mut self.vite,
            Tool::Rollup => &mut self.rollup,
            Tool::Rolldown => &mut self.rolldown,
        }
    }

    /// Returns a copy with every field set in `partial` replaced.
    /// Fields absent from `partial` keep their current value.
    pub fn merged(&self, partial: &PartialCompatibility) -> Compatibility {
        let mut merged = self.clone();
        for tool in Tool::ALL {
            if let Some(value) = partial.get(tool) {
                *merged.get_mut(tool) = value.clone();
            }
        }
        merged
    }
}

/// A subset of [`Compatibility`], used by patches and curator metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PartialCompatibility {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vite: Option<ToolCompatibility>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollup: Option<ToolCompatibility>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolldown: Option<ToolCompatibility>,
}

impl PartialCompatibility {
    pub fn get(&self, tool: Tool) -> Option<&ToolCompatibility> {
        match tool {
            Tool::Vite => self.vite.as_ref(),
            Tool::Rollup => self.rollup.as_ref(),
            Tool::Rolldown => self.rolldown.as_ref(),
        }
    }

    pub fn set(&mut self, tool: Tool, value: ToolCompatibility) {
        match tool {
            Tool::Vite => self.vite = Some(value),
            Tool::Rollup => self.rollup = Some(value),
            Tool::Rolldown => self.rolldown = Some(value),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vite.is_none() && self.rollup.is_none() && self.rolldown.is_none()
    }
}

// ============================================================================
// Registry plugin
// ============================================================================

/// Links shown for a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Links {
    /// npm package page.
    pub npm: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
}

impl Links {
    /// Returns a copy with every field set in `partial` replaced.
    pub fn merged(&self, partial: &PartialLinks) -> Links {
        Links {
            npm: partial.npm.clone().unwrap_or_else(|| self.npm.clone()),
            repository: partial
                .repository
                .clone()
                .or_else(|| self.repository.clone()),
            homepage: partial.homepage.clone().or_else(|| self.homepage.clone()),
        }
    }
}

/// A subset of [`Links`] used by patch overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PartialLinks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub npm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
}

/// A plugin record derived from the npm registry.
///
/// `name` is the unique key across the dataset. Records are built once per
/// collection run and never mutated afterwards: patching produces a new
/// record (see [`crate::plugins::merge::apply_patch`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryPlugin {
    /// npm package name.
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Package keywords, in the order the package declares them.
    #[serde(default)]
    pub keywords: Vec<String>,

    pub links: Links,

    /// Latest published version.
    pub version: String,

    /// ISO-8601 timestamp of the latest publish.
    #[serde(default)]
    pub updated_at: String,

    #[serde(default)]
    pub compatibility: Compatibility,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekly_downloads: Option<u64>,
}

impl RegistryPlugin {
    /// Download count used for ordering; absent counts as zero.
    pub fn downloads_or_zero(&self) -> u64 {
        self.weekly_downloads.unwrap_or(0)
    }
}

// ============================================================================
// Patches
// ============================================================================

/// Curator correction for a single package, loaded from `data/patches/*.json`.
///
/// # Example
///
/// ```json
/// {
///   "packageName": "vite-plugin-legacy-thing",
///   "overrides": {
///     "description": "Better description",
///     "compatibility": { "vite": { "type": "compatible", "versions": "^6.0.0" } }
///   },
///   "exclude": { "enabled": false, "reason": "" }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginPatch {
    /// Key into [`RegistryPlugin::name`].
    pub package_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides: Option<PatchOverrides>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<PatchExclude>,
}

impl PluginPatch {
    /// Whether this patch removes the plugin from the dataset.
    pub fn is_excluded(&self) -> bool {
        self.exclude.as_ref().is_some_and(|e| e.enabled)
    }
}

/// Field overrides carried by a patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PatchOverrides {
    /// Replaces the description wholesale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Merged field by field into the plugin's links.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<PartialLinks>,

    /// Merged tool by tool into the plugin's compatibility.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compatibility: Option<PartialCompatibility>,
}

/// Exclusion flag carried by a patch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchExclude {
    pub enabled: bool,
    #[serde(default)]
    pub reason: String,
}
