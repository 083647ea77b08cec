//! Command-line surface of the registry tooling.

mod build;
mod collect;
mod versions;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use vite_plugin_registry::Config;

#[derive(Parser)]
#[command(name = "vite-plugin-registry")]
#[command(about = "Collect, patch and publish the Vite/Rollup/Rolldown plugin registry", long_about = None)]
#[command(version)]
pub(crate) struct Cli {
    /// Path to a JSON config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Search the npm registry and write the raw plugin dataset
    Collect {
        /// Only search this keyword (repeatable); overrides the config
        #[arg(short, long)]
        keyword: Vec<String>,
    },
    /// Merge curator patches and write the published JSON documents
    Build,
    /// Look up the latest Vite, Rollup and Rolldown releases
    LatestVersions {
        /// Also write latest-versions.json into the output directory
        #[arg(long)]
        write: bool,
    },
}

impl Cli {
    pub(crate) async fn run(self) -> Result<()> {
        let config = Config::load(self.config.as_deref()).context("Failed to load config")?;

        match self.command {
            Commands::Collect { keyword } => collect::cmd_collect(config, keyword).await,
            Commands::Build => build::cmd_build(&config),
            Commands::LatestVersions { write } => versions::cmd_latest_versions(&config, write).await,
        }
    }
}
