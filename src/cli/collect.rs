//! Collect command: registry search and enrichment.

use anyhow::{Context, Result};

use vite_plugin_registry::collect::{write_dataset, Collector};
use vite_plugin_registry::Config;

pub(crate) async fn cmd_collect(mut config: Config, keywords: Vec<String>) -> Result<()> {
    if !keywords.is_empty() {
        config.collect.keywords = keywords;
        config.collect.scopes.clear();
    }

    let collector = Collector::from_config(&config).context("Failed to create registry client")?;
    let plugins = collector.collect().await.context("Collection run failed")?;

    let path = config.paths.all_plugins_file();
    write_dataset(&path, &plugins)
        .with_context(|| format!("Failed to write dataset to {}", path.display()))?;

    println!("Collected {} plugins into {}", plugins.len(), path.display());
    Ok(())
}
