//! Curator-hosted plugin metadata
//!
//! A package can declare a URL in the `vite-plugin-registry` field of its
//! `package.json`. The document at that URL states the plugin's compatibility
//! with Vite, Rollup and Rolldown, and takes precedence over what the
//! collector infers from peer dependencies.
//!
//! - **fetcher**: [`MetadataFetcher`], https-only, 5 concurrent, 5s timeout, per-URL cache
//! - **schema**: [`ExternalMetadata`] and the field-by-field validator

pub mod fetcher;
pub mod schema;

pub use fetcher::MetadataFetcher;
pub use schema::{validate_metadata, ExternalMetadata, Validation, Violation};
