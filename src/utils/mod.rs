//! Shared helpers.

pub mod semver_range;
