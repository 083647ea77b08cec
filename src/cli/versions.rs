use anyhow::{Context, Result};

use vite_plugin_registry::collect::latest_tool_versions;
use vite_plugin_registry::npm::NpmClient;
use vite_plugin_registry::plugins::write_latest_versions;
use vite_plugin_registry::Config;

pub(crate) async fn cmd_latest_versions(config: &Config, write: bool) -> Result<()> {
    let client =
        NpmClient::from_config(&config.registry).context("Failed to create registry client")?;
    let versions = latest_tool_versions(&client).await;

    println!("vite      {}", versions.vite);
    println!("rollup    {}", versions.rollup);
    println!("rolldown  {}", versions.rolldown);

    if write {
        let path = write_latest_versions(&config.paths.output_dir, &versions)
            .context("Failed to write latest versions")?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}
