//! Collection run: registry search, enrichment and the raw dataset.
//!
//! Registry failures are fatal to a run; a search or packument request that
//! exhausts its retries aborts collection with the failing operation named.
//! Metadata failures only leave compatibility `unknown`.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use futures::future::try_join_all;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info, warn};

use crate::config::{CollectConfig, Config};
use crate::error::Result;
use crate::metadata::{ExternalMetadata, MetadataFetcher};
use crate::npm::{NpmClient, PackageManifest, Packument, SearchObject};
use crate::plugins::output::LatestVersions;
use crate::plugins::types::{Compatibility, Links, RegistryPlugin, Tool, ToolCompatibility};
use crate::utils::semver_range;

/// Drives one collection run over a shared registry client.
pub struct Collector {
    client: NpmClient,
    metadata: MetadataFetcher,
    config: CollectConfig,
}

impl Collector {
    pub fn new(client: NpmClient, metadata: MetadataFetcher, config: CollectConfig) -> Self {
        Self {
            client,
            metadata,
            config,
        }
    }

    /// Build the client, fetcher and search settings from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            NpmClient::from_config(&config.registry)?,
            MetadataFetcher::from_config(&config.metadata)?,
            config.collect.clone(),
        ))
    }

    pub fn client(&self) -> &NpmClient {
        &self.client
    }

    /// Search, enrich and return every plugin, sorted by name.
    pub async fn collect(&self) -> Result<Vec<RegistryPlugin>> {
        let candidates = self.search_candidates().await?;
        info!(candidates = candidates.len(), "Resolving plugin candidates");

        let width = self.client.queue().concurrency().max(1);
        let resolved: Vec<Option<RegistryPlugin>> = stream::iter(candidates)
            .map(|candidate| self.resolve(candidate))
            .buffered(width)
            .try_collect()
            .await?;
        let mut plugins: Vec<RegistryPlugin> = resolved.into_iter().flatten().collect();

        plugins.sort_by(|a, b| a.name.cmp(&b.name));
        info!(
            plugins = plugins.len(),
            rate_limit_pauses = self.client.queue().pause_count(),
            metadata_requests = self.metadata.request_count(),
            "Collection finished"
        );
        Ok(plugins)
    }

    /// Run every keyword and scope search concurrently and de-duplicate by
    /// name, keeping the first occurrence.
    async fn search_candidates(&self) -> Result<Vec<SearchObject>> {
        let max_per_keyword = self.config.max_results_per_keyword;
        let scope_max = Some(self.config.scope_max_results);

        let keyword_searches = try_join_all(
            self.config
                .keywords
                .iter()
                .map(|keyword| self.client.search_by_keyword(keyword, max_per_keyword)),
        );
        let scope_searches = try_join_all(
            self.config
                .scopes
                .iter()
                .map(|prefix| self.client.search_by_scope(prefix, scope_max)),
        );
        let (by_keyword, by_scope) = tokio::try_join!(keyword_searches, scope_searches)?;

        let mut seen = HashSet::new();
        let candidates: Vec<SearchObject> = by_keyword
            .into_iter()
            .chain(by_scope)
            .flatten()
            .filter(|obj| seen.insert(obj.name().to_string()))
            .collect();
        Ok(candidates)
    }

    /// Fetch the packument and metadata for one candidate.
    async fn resolve(&self, candidate: SearchObject) -> Result<Option<RegistryPlugin>> {
        let Some(packument) = self.client.get_package(candidate.name()).await? else {
            warn!(package = candidate.name(), "Package not found in registry, skipping");
            return Ok(None);
        };

        let metadata_url = packument
            .latest_manifest()
            .and_then(|manifest| manifest.metadata_url());
        let metadata = match metadata_url {
            Some(url) => self.metadata.fetch(url).await,
            None => None,
        };

        Ok(Some(build_plugin(&candidate, &packument, metadata.as_ref())))
    }
}

/// Assemble a plugin record from a search hit, its packument and optional
/// curator metadata.
pub fn build_plugin(
    candidate: &SearchObject,
    packument: &Packument,
    metadata: Option<&ExternalMetadata>,
) -> RegistryPlugin {
    let package = &candidate.package;
    let manifest = packument.latest_manifest();
    let version = packument
        .latest_version()
        .unwrap_or(package.version.as_str())
        .to_string();

    let description = manifest
        .and_then(|m| m.description())
        .or(package.description.as_deref())
        .unwrap_or_default()
        .to_string();

    let keywords = match manifest.map(|m| m.keywords()) {
        Some(keywords) if !keywords.is_empty() => keywords,
        _ => package.keywords.clone(),
    };

    let links = Links {
        npm: package
            .links
            .npm
            .clone()
            .unwrap_or_else(|| format!("https://www.npmjs.com/package/{}", package.name)),
        repository: manifest
            .and_then(|m| m.repository())
            .or_else(|| package.links.repository.clone()),
        homepage: manifest
            .and_then(|m| m.homepage())
            .map(str::to_string)
            .or_else(|| package.links.homepage.clone()),
    };

    let updated_at = packument
        .published_at(&version)
        .or(package.date.as_deref())
        .unwrap_or_default()
        .to_string();

    RegistryPlugin {
        name: package.name.clone(),
        description,
        keywords,
        links,
        version,
        updated_at,
        compatibility: derive_compatibility(manifest, metadata),
        weekly_downloads: candidate.weekly_downloads(),
    }
}

/// Per tool: curator metadata wins, then a valid peer dependency range,
/// otherwise `unknown`.
pub fn derive_compatibility(
    manifest: Option<PackageManifest<'_>>,
    metadata: Option<&ExternalMetadata>,
) -> Compatibility {
    let declared = metadata.and_then(|m| m.compatibility.as_ref());
    let mut compatibility = Compatibility::default();

    for tool in Tool::ALL {
        if let Some(value) = declared.and_then(|d| d.get(tool)) {
            *compatibility.get_mut(tool) = value.clone();
            continue;
        }

        let peer = manifest.and_then(|m| m.peer_dependency(tool.as_str()));
        if let Some(range) = peer {
            if semver_range::is_valid_range(range) {
                *compatibility.get_mut(tool) = ToolCompatibility::compatible(range);
            } else {
                debug!(tool = %tool, range, "Ignoring unparsable peer dependency range");
            }
        }
    }
    compatibility
}

/// Write the collected dataset as pretty JSON, sorted by name.
pub fn write_dataset(path: &Path, plugins: &[RegistryPlugin]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut sorted: Vec<&RegistryPlugin> = plugins.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));
    fs::write(path, serde_json::to_string_pretty(&sorted)?)?;

    info!(path = %path.display(), count = sorted.len(), "Wrote plugin dataset");
    Ok(())
}

/// Latest published versions of Vite, Rollup and Rolldown.
///
/// Lookups run concurrently; a tool whose lookup fails gets a fixed fallback.
pub async fn latest_tool_versions(client: &NpmClient) -> LatestVersions {
    let lookup = |tool: Tool| async move {
        match client.get_latest_version(tool.as_str()).await {
            Some(version) => version,
            None => {
                let fallback = LatestVersions::fallback(tool);
                warn!(tool = %tool, fallback, "Using fallback version");
                fallback.to_string()
            }
        }
    };

    let (vite, rollup, rolldown) = tokio::join!(
        lookup(Tool::Vite),
        lookup(Tool::Rollup),
        lookup(Tool::Rolldown)
    );
    LatestVersions {
        vite,
        rollup,
        rolldown,
    }
}
