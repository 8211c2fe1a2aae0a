//! Build backend adapters
//!
//! The lifecycle drives an external build tool through three operations:
//! configure, build and install. Backends only look at process exit status;
//! whatever the tool printed is carried back verbatim as the diagnostic.

mod cmake;
mod command;
pub mod process;

pub use cmake::CMakeBackend;
pub use command::{CommandBackend, CommandTemplates};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::config::{BackendKind, RecipeConfig};
use super::env::EnvironmentContext;
use super::resolve::ResolvedDeps;

/// A failed backend operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} failed: {command} (exit code: {code:?})\n{diagnostic}")]
pub struct BackendError {
    pub operation: String,
    pub command: String,
    pub code: Option<i32>,
    /// Raw output of the build tool, unmodified
    pub diagnostic: String,
}

impl BackendError {
    pub fn new(
        operation: impl Into<String>,
        command: impl Into<String>,
        code: Option<i32>,
        diagnostic: impl Into<String>,
    ) -> Self {
        Self {
            operation: operation.into(),
            command: command.into(),
            code,
            diagnostic: diagnostic.into(),
        }
    }
}

/// Per-run settings every backend needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendContext {
    /// Exported sources (the build tool's source root)
    pub source_dir: PathBuf,
    /// Build output directory
    pub build_dir: PathBuf,
    /// e.g. Release, Debug
    pub build_type: String,
    /// Parallel jobs for the build step
    pub jobs: usize,
    /// Extra environment for every spawned process
    pub env: BTreeMap<String, String>,
}

/// Interface to an external build tool.
///
/// Each call is synchronous: any process it spawns has exited before it returns.
pub trait BuildBackend {
    fn name(&self) -> &str;

    fn configure(&mut self, deps: &ResolvedDeps, env: &EnvironmentContext) -> Result<(), BackendError>;

    fn build(&mut self) -> Result<(), BackendError>;

    fn install(&mut self, target_dir: &Path) -> Result<(), BackendError>;
}

/// Create the backend selected by `config` for one run.
pub fn create_backend(config: &RecipeConfig, ctx: BackendContext) -> Box<dyn BuildBackend> {
    match &config.backend {
        BackendKind::CMake => Box::new(CMakeBackend::new(ctx, &config.toolchain)),
        BackendKind::Command(templates) => Box::new(CommandBackend::new(ctx, templates.clone())),
    }
}

/// Join paths with the separator the platform uses in `PATH`-like variables.
pub(crate) fn join_search_path(paths: &[PathBuf]) -> String {
    std::env::join_paths(paths)
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|_| {
            paths
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join(":")
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> BackendContext {
        BackendContext {
            source_dir: PathBuf::from("/work/export"),
            build_dir: PathBuf::from("/work/build/Release"),
            build_type: "Release".to_string(),
            jobs: 4,
            env: BTreeMap::new(),
        }
    }

    #[test]
    fn test_factory_follows_config() {
        let cmake = create_backend(&RecipeConfig::default(), ctx());
        assert_eq!(cmake.name(), "cmake");

        let config = RecipeConfig::from_toml_str("[backend]\nkind = \"command\"\nbuild = \"make\"").unwrap();
        let command = create_backend(&config, ctx());
        assert_eq!(command.name(), "command");
    }

    #[cfg(unix)]
    #[test]
    fn test_join_search_path() {
        let joined = join_search_path(&[PathBuf::from("/a/lib"), PathBuf::from("/b/lib")]);
        assert_eq!(joined, "/a/lib:/b/lib");
    }
}
