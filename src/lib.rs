//! Vite Plugin Registry - data collection and merge pipeline
//!
//! Discovers Vite, Rollup and Rolldown plugins on the npm registry, enriches
//! them with curator-hosted compatibility metadata, applies curator patches
//! and publishes a stable, download-ordered dataset.

pub mod collect;
pub mod config;
pub mod error;
pub mod metadata;
pub mod npm;
pub mod plugins;
pub mod utils;

pub use config::Config;
pub use error::{RegistryError, Result};
