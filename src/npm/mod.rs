//! npm registry access
//!
//! - **client**: [`NpmClient`], keyword/scope search with pagination and packument fetch
//! - **queue**: [`RequestQueue`], the bounded admission queue with a pause switch
//! - **retry**: [`RetryPolicy`] and the outcome-tagged retry driver
//! - **types**: search and packument response types
//!
//! # Usage
//!
//! ```rust,no_run
//! use vite_plugin_registry::npm::NpmClient;
//!
//! # async fn run() -> vite_plugin_registry::Result<()> {
//! let client = NpmClient::new()?;
//! let hits = client.search_by_keyword("vite-plugin", Some(1000)).await?;
//! if let Some(doc) = client.get_package(hits[0].name()).await? {
//!     println!("{} is at {:?}", doc.name, doc.latest_version());
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod queue;
pub mod retry;
pub mod types;

pub use client::{NpmClient, DEFAULT_REGISTRY_URL, PAGE_SIZE};
pub use queue::{PauseGuard, RequestQueue};
pub use retry::{Outcome, RetryPolicy};
pub use types::{PackageManifest, Packument, SearchObject, SearchResponse};
