//! [`RegistryOperations`] backed by the `npm` binary.

use super::RegistryOperations;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

/// Runs `npm`.
#[derive(Debug, Clone, Default)]
pub struct NpmCli {
    registry: Option<String>,
}

impl NpmCli {
    /// Use the registry npm is configured with.
    #[must_use]
    pub const fn new() -> Self {
        Self { registry: None }
    }

    /// Query and unpublish against a specific registry.
    #[must_use]
    pub fn with_registry(mut self, registry: impl Into<String>) -> Self {
        self.registry = Some(registry.into());
        self
    }

    fn command(&self, args: &[&str], cwd: Option<&Path>) -> Command {
        let mut cmd = Command::new("npm");
        cmd.args(args);
        if let Some(registry) = &self.registry {
            cmd.arg("--registry").arg(registry);
        }
        if let Some(cwd) = cwd {
            cmd.current_dir(cwd);
        }
        cmd
    }
}

fn is_not_found(stderr: &str) -> bool {
    stderr.contains("E404") || stderr.contains("404 Not Found")
}

#[async_trait]
impl RegistryOperations for NpmCli {
    async fn publish(&self, args: &[String], cwd: &Path) -> Result<()> {
        let mut all = vec!["publish"];
        all.extend(args.iter().map(String::as_str));
        debug!(args = ?all, cwd = %cwd.display(), "Running npm");

        let output = Command::new("npm")
            .args(&all)
            .current_dir(cwd)
            .output()
            .await
            .map_err(|e| Error::process("npm publish", e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::process("npm publish", stderr.trim()));
        }
        Ok(())
    }

    async fn view(&self, package: &str, version: &str) -> Result<Option<String>> {
        let spec = format!("{package}@{version}");
        let output = self
            .command(&["view", &spec, "version"], None)
            .output()
            .await
            .map_err(|e| Error::process("npm view", e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_not_found(&stderr) {
                return Ok(None);
            }
            return Err(Error::process("npm view", stderr.trim()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!stdout.is_empty()).then_some(stdout))
    }

    async fn unpublish(&self, package: &str, version: &str) -> Result<()> {
        let spec = format!("{package}@{version}");
        let output = self
            .command(&["unpublish", &spec], None)
            .output()
            .await
            .map_err(|e| Error::process("npm unpublish", e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::process("npm unpublish", stderr.trim()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        assert!(is_not_found("npm ERR! code E404\nnpm ERR! 404 Not Found"));
        assert!(!is_not_found("npm ERR! code E401"));
    }
}
