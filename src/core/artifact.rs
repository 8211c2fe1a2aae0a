//! Artifact descriptors
//!
//! The published contract of a packaged recipe: which libraries and
//! binaries it exposes and where consumers find them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// File name of the descriptor written into the install directory.
pub const DESCRIPTOR_FILE: &str = "artifact.json";

/// What a package exposes to downstream consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    pub name: String,
    pub version: String,
    pub package_type: String,
    pub libs: Vec<String>,
    #[serde(default)]
    pub bins: Vec<String>,
    /// Relative to `root`
    #[serde(default = "default_include_dirs")]
    pub include_dirs: Vec<String>,
    #[serde(default = "default_lib_dirs")]
    pub lib_dirs: Vec<String>,
    #[serde(default = "default_bin_dirs")]
    pub bin_dirs: Vec<String>,
    /// Package root the directories above are relative to
    pub root: PathBuf,
}

fn default_include_dirs() -> Vec<String> {
    vec!["include".to_string()]
}

fn default_lib_dirs() -> Vec<String> {
    vec!["lib".to_string()]
}

fn default_bin_dirs() -> Vec<String> {
    vec!["bin".to_string()]
}

impl ArtifactDescriptor {
    pub fn new(name: impl Into<String>, version: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            package_type: "library".to_string(),
            libs: Vec::new(),
            bins: Vec::new(),
            include_dirs: default_include_dirs(),
            lib_dirs: default_lib_dirs(),
            bin_dirs: default_bin_dirs(),
            root: root.into(),
        }
    }

    /// Absolute include directories.
    pub fn include_paths(&self) -> Vec<PathBuf> {
        self.include_dirs.iter().map(|d| self.root.join(d)).collect()
    }

    /// Absolute library directories.
    pub fn lib_paths(&self) -> Vec<PathBuf> {
        self.lib_dirs.iter().map(|d| self.root.join(d)).collect()
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize descriptor")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write descriptor: {}", path.display()))
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read descriptor: {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid descriptor: {}", path.display()))
    }
}

/// Descriptors published by completed runs, keyed by package name.
#[derive(Debug, Clone, Default)]
pub struct ArtifactRegistry {
    descriptors: HashMap<String, ArtifactDescriptor>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a descriptor. A later publish for the same package replaces it.
    pub fn publish(&mut self, descriptor: ArtifactDescriptor) {
        self.descriptors.insert(descriptor.name.clone(), descriptor);
    }

    pub fn describe(&self, package: &str) -> Option<&ArtifactDescriptor> {
        self.descriptors.get(package)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
