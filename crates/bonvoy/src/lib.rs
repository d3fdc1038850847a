//! bonvoy - release tool for JavaScript monorepos
//!
//! The binary wires the built-in plugins of [`bonvoy_release`] to real
//! collaborators (`git`, `npm`, the GitHub API) and exposes three commands:
//!
//! - `bonvoy shipit` - release every package with releasable commits
//! - `bonvoy rollback` - undo the last release from its release log
//! - `bonvoy status` - show the release log and the configured pipeline

/// CLI argument parsing.
pub mod cli;
/// Command implementations.
pub mod commands;
/// Tracing and logging configuration.
pub mod tracing;
