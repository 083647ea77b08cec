//! Published documents: the plugin list and the badge summary.
//!
//! `plugins.json` holds the merged, ordered list with a generation timestamp.
//! `plugin-badges.json` maps each plugin name to one display string per tool.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;

use super::types::{RegistryPlugin, Tool, ToolCompatibility};

pub const PLUGINS_FILE: &str = "plugins.json";
pub const BADGES_FILE: &str = "plugin-badges.json";
pub const LATEST_VERSIONS_FILE: &str = "latest-versions.json";

/// Contents of `plugins.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginsApiResponse {
    pub plugins: Vec<RegistryPlugin>,
    /// ISO-8601 generation time.
    pub last_updated: String,
}

impl PluginsApiResponse {
    pub fn new(plugins: Vec<RegistryPlugin>, generated_at: DateTime<Utc>) -> Self {
        Self {
            plugins,
            last_updated: generated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Badge strings for one plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginBadge {
    pub vite: String,
    pub rollup: String,
    pub rolldown: String,
}

/// Latest released versions of the tools, shown next to compatibility ranges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestVersions {
    pub vite: String,
    pub rollup: String,
    pub rolldown: String,
}

impl LatestVersions {
    /// Fallback for a tool whose lookup failed.
    pub fn fallback(tool: Tool) -> &'static str {
        match tool {
            Tool::Vite => "7.0.0",
            Tool::Rollup => "4.0.0",
            Tool::Rolldown => "1.0.0",
        }
    }
}

fn badge_label(compat: &ToolCompatibility) -> String {
    compat.badge_label().to_string()
}

/// Project every plugin onto its badge strings, keyed by name.
pub fn generate_badges(plugins: &[RegistryPlugin]) -> BTreeMap<String, PluginBadge> {
    plugins
        .iter()
        .map(|plugin| {
            let compat = &plugin.compatibility;
            (
                plugin.name.clone(),
                PluginBadge {
                    vite: badge_label(&compat.vite),
                    rollup: badge_label(&compat.rollup),
                    rolldown: badge_label(&compat.rolldown),
                },
            )
        })
        .collect()
}

/// Write `plugins.json` and `plugin-badges.json` into `output_dir`,
/// creating it if needed. Returns the written paths.
pub fn write_plugin_data(
    output_dir: &Path,
    plugins: Vec<RegistryPlugin>,
    generated_at: DateTime<Utc>,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir)?;

    let badges = generate_badges(&plugins);
    let response = PluginsApiResponse::new(plugins, generated_at);

    let plugins_path = output_dir.join(PLUGINS_FILE);
    fs::write(&plugins_path, serde_json::to_string(&response)?)?;

    let badges_path = output_dir.join(BADGES_FILE);
    fs::write(&badges_path, serde_json::to_string(&badges)?)?;

    info!(
        dir = %output_dir.display(),
        plugins = response.plugins.len(),
        "Generated {} and {}",
        PLUGINS_FILE,
        BADGES_FILE
    );
    Ok(vec![plugins_path, badges_path])
}

/// Write `latest-versions.json` into `output_dir`.
pub fn write_latest_versions(output_dir: &Path, versions: &LatestVersions) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)?;
    let path = output_dir.join(LATEST_VERSIONS_FILE);
    fs::write(&path, serde_json::to_string_pretty(versions)?)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::types::{Compatibility, Links};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn plugin(name: &str, compatibility: Compatibility) -> RegistryPlugin {
        RegistryPlugin {
            name: name.to_string(),
            description: String::new(),
            keywords: Vec::new(),
            links: Links {
                npm: format!("https://www.npmjs.com/package/{}", name),
                ..Default::default()
            },
            version: "1.0.0".to_string(),
            updated_at: String::new(),
            compatibility,
            weekly_downloads: Some(1),
        }
    }

    #[test]
    fn test_generate_badges() {
        let plugins = vec![plugin(
            "vite-plugin-a",
            Compatibility {
                vite: ToolCompatibility::compatible("^6.0.0"),
                rollup: ToolCompatibility::incompatible("dev server only"),
                rolldown: ToolCompatibility::Unknown,
            },
        )];

        let badges = generate_badges(&plugins);
        assert_eq!(
            badges["vite-plugin-a"],
            PluginBadge {
                vite: "^6.0.0".to_string(),
                rollup: "incompatible".to_string(),
                rolldown: "unknown".to_string(),
            }
        );
    }

    #[test]
    fn test_last_updated_is_iso8601() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap();
        let response = PluginsApiResponse::new(Vec::new(), at);
        assert_eq!(response.last_updated, "2026-03-01T12:30:00.000Z");
    }

    #[test]
    fn test_write_plugin_data_creates_dir_and_files() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("public").join("api");
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();

        let written = write_plugin_data(
            &out,
            vec![plugin("a", Compatibility::default()), plugin("b", Compatibility::default())],
            at,
        )
        .unwrap();
        assert_eq!(written.len(), 2);

        let plugins: PluginsApiResponse =
            serde_json::from_str(&fs::read_to_string(out.join(PLUGINS_FILE)).unwrap()).unwrap();
        assert_eq!(plugins.plugins.len(), 2);
        assert_eq!(plugins.plugins[0].name, "a");
        assert_eq!(plugins.last_updated, "2026-01-02T03:04:05.000Z");

        let badges: BTreeMap<String, PluginBadge> =
            serde_json::from_str(&fs::read_to_string(out.join(BADGES_FILE)).unwrap()).unwrap();
        assert_eq!(badges.len(), 2);
        assert_eq!(badges["b"].vite, "unknown");
    }

    #[test]
    fn test_write_latest_versions() {
        let tmp = TempDir::new().unwrap();
        let versions = LatestVersions {
            vite: "7.1.0".to_string(),
            rollup: LatestVersions::fallback(Tool::Rollup).to_string(),
            rolldown: "1.0.0-beta.30".to_string(),
        };
        let path = write_latest_versions(tmp.path(), &versions).unwrap();
        let read: LatestVersions =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(read, versions);
        assert_eq!(read.rollup, "4.0.0");
    }
}
