//! GitHub provider implementation for bonvoy.
//!
//! This crate provides [`GitHubHosting`], the GitHub implementation of the
//! hosting contract used by the `github` release plugin: hosted releases per
//! package tag and the optional release pull request.

#![warn(missing_docs)]

pub mod release;

// Re-exports for convenience
pub use release::{GitHubHosting, GitHubHostingConfig, parse_github_remote};
