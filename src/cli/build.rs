//! Build command: merge patches and publish.

use anyhow::{Context, Result};

use vite_plugin_registry::plugins::{load_plugins, write_plugin_data};
use vite_plugin_registry::Config;

pub(crate) fn cmd_build(config: &Config) -> Result<()> {
    let paths = &config.paths;
    let plugins = load_plugins(&paths.all_plugins_file(), &paths.patches_dir);
    let count = plugins.len();

    let written = write_plugin_data(&paths.output_dir, plugins, chrono::Utc::now())
        .with_context(|| format!("Failed to write output to {}", paths.output_dir.display()))?;

    println!("Published {} plugins", count);
    for path in written {
        println!("  {}", path.display());
    }
    Ok(())
}
