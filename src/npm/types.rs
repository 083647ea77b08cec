//! npm registry response types.
//!
//! Only the fields the collector reads are typed. Version manifests inside a
//! packument stay as raw JSON and are read through lenient accessors, since
//! published `package.json` files are frequently malformed.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field in `package.json` pointing at curator-hosted metadata.
pub const METADATA_FIELD: &str = "vite-plugin-registry";

/// Response of `GET /-/v1/search`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub objects: Vec<SearchObject>,
    #[serde(default)]
    pub total: u64,
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchObject {
    pub package: SearchPackage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<SearchDownloads>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<Value>,
}

impl SearchObject {
    pub fn name(&self) -> &str {
        &self.package.name
    }

    pub fn weekly_downloads(&self) -> Option<u64> {
        self.downloads.as_ref().and_then(|d| d.weekly)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPackage {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default)]
    pub links: SearchLinks,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SearchLinks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub npm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SearchDownloads {
    #[serde(default)]
    pub weekly: Option<u64>,
    #[serde(default)]
    pub monthly: Option<u64>,
}

/// Full package document served by `GET /<name>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Packument {
    pub name: String,
    #[serde(rename = "dist-tags", default)]
    pub dist_tags: HashMap<String, String>,
    #[serde(default)]
    pub versions: HashMap<String, Value>,
    #[serde(default)]
    pub time: HashMap<String, Value>,
}

impl Packument {
    /// The version tagged `latest`, if any.
    pub fn latest_version(&self) -> Option<&str> {
        self.dist_tags.get("latest").map(String::as_str)
    }

    /// Manifest of the `latest` version.
    pub fn latest_manifest(&self) -> Option<PackageManifest<'_>> {
        let version = self.latest_version()?;
        self.versions.get(version).map(PackageManifest)
    }

    /// Publish time of `version`, falling back to the `modified` timestamp.
    pub fn published_at(&self, version: &str) -> Option<&str> {
        self.time
            .get(version)
            .or_else(|| self.time.get("modified"))
            .and_then(Value::as_str)
    }
}

/// Lenient read-only view over a version's `package.json`.
#[derive(Debug, Clone, Copy)]
pub struct PackageManifest<'a>(pub &'a Value);

impl<'a> PackageManifest<'a> {
    pub fn description(&self) -> Option<&'a str> {
        self.0.get("description").and_then(Value::as_str)
    }

    /// Keywords; a non-array value yields nothing.
    pub fn keywords(&self) -> Vec<String> {
        self.0
            .get("keywords")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn homepage(&self) -> Option<&'a str> {
        self.0.get("homepage").and_then(Value::as_str)
    }

    /// Repository URL, declared either as a string or as `{ "url": ... }`.
    pub fn repository(&self) -> Option<String> {
        let raw = match self.0.get("repository")? {
            Value::String(s) => s.as_str(),
            Value::Object(map) => map.get("url").and_then(Value::as_str)?,
            _ => return None,
        };
        Some(normalize_repository_url(raw))
    }

    /// Peer dependency range on `package`, if declared.
    pub fn peer_dependency(&self, package: &str) -> Option<&'a str> {
        self.0
            .get("peerDependencies")
            .and_then(|deps| deps.get(package))
            .and_then(Value::as_str)
    }

    /// URL of the curator-hosted metadata document, if declared.
    pub fn metadata_url(&self) -> Option<&'a str> {
        self.0
            .get(METADATA_FIELD)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Turns `git+https://github.com/a/b.git` style URLs into browsable ones.
fn normalize_repository_url(raw: &str) -> String {
    let url = raw.trim();
    let url = url.strip_prefix("git+").unwrap_or(url);
    let url = url.strip_suffix(".git").unwrap_or(url);
    if let Some(rest) = url.strip_prefix("git://") {
        return format!("https://{}", rest);
    }
    if let Some(rest) = url.strip_prefix("github:") {
        return format!("https://github.com/{}", rest);
    }
    url.to_string()
}
