//! Dependency resolution
//!
//! Resolution itself belongs to an external package store. The core only
//! asks a [`Resolver`] for the installed location of each declared
//! requirement and reads back what it gets.

use std::path::{Path, PathBuf};

use semver::{Version, VersionReq};

use super::artifact::{ArtifactDescriptor, DESCRIPTOR_FILE};
use super::deps::{DependencySet, Requirement, RequirementClass};
use super::error::RecipeError;

/// A requirement bound to a concrete installed package.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRequirement {
    pub requirement: Requirement,
    pub version: String,
    /// Package root in the store
    pub location: PathBuf,
    /// Published descriptor, when the package was produced by a recipe run
    pub descriptor: Option<ArtifactDescriptor>,
}

impl ResolvedRequirement {
    pub fn lib_dirs(&self) -> Vec<PathBuf> {
        match &self.descriptor {
            Some(d) => d.lib_dirs.iter().map(|dir| self.location.join(dir)).collect(),
            None => vec![self.location.join("lib")],
        }
    }

    pub fn bin_dirs(&self) -> Vec<PathBuf> {
        match &self.descriptor {
            Some(d) => d.bin_dirs.iter().map(|dir| self.location.join(dir)).collect(),
            None => vec![self.location.join("bin")],
        }
    }
}

/// Resolved requirement set, grouped by class (build, run, test-only) with
/// declaration order kept within each class.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedDeps {
    entries: Vec<ResolvedRequirement>,
}

impl ResolvedDeps {
    pub fn for_class(&self, class: RequirementClass) -> impl Iterator<Item = &ResolvedRequirement> {
        self.entries
            .iter()
            .filter(move |r| r.requirement.class == class)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedRequirement> {
        self.entries.iter()
    }

    /// Package roots for the build tool's search path (build and test-only
    /// packages are needed at configure time as well as run-time ones).
    pub fn prefix_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in &self.entries {
            if !paths.contains(&entry.location) {
                paths.push(entry.location.clone());
            }
        }
        paths
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Maps a requirement to an installed package.
pub trait Resolver {
    fn resolve(&self, requirement: &Requirement) -> Result<ResolvedRequirement, RecipeError>;
}

/// Resolve every requirement class by class, in declaration order within a
/// class, stopping at the first failure.
pub fn resolve_all(resolver: &dyn Resolver, deps: &DependencySet) -> Result<ResolvedDeps, RecipeError> {
    let entries = deps
        .iter()
        .map(|req| resolver.resolve(req))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ResolvedDeps { entries })
}

/// Resolver over a directory laid out as `<store>/<name>/<version>/`.
///
/// Picks the highest version that satisfies the constraint.
#[derive(Debug, Clone)]
pub struct LocalStoreResolver {
    store: PathBuf,
}

impl LocalStoreResolver {
    pub fn new(store: impl Into<PathBuf>) -> Self {
        Self {
            store: store.into(),
        }
    }

    pub fn store(&self) -> &Path {
        &self.store
    }

    fn candidates(&self, name: &str) -> std::io::Result<Vec<String>> {
        let dir = self.store.join(name);
        let mut versions = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                versions.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        Ok(versions)
    }
}

impl Resolver for LocalStoreResolver {
    fn resolve(&self, requirement: &Requirement) -> Result<ResolvedRequirement, RecipeError> {
        let fail = |reason: String| RecipeError::DependencyResolution {
            reference: requirement.reference(),
            reason,
        };

        if requirement.name.chars().all(|c| c == '.') {
            return Err(fail("package name is not a store entry".to_string()));
        }

        let versions = self.candidates(&requirement.name).map_err(|e| {
            fail(format!(
                "package not found in store {}: {}",
                self.store.display(),
                e
            ))
        })?;

        let constraint = Constraint::parse(&requirement.constraint);
        let best = versions
            .iter()
            .filter(|v| constraint.matches(v))
            .max_by(|a, b| compare_versions(a, b))
            .ok_or_else(|| {
                let mut available = versions.clone();
                available.sort();
                fail(format!(
                    "no version matches (available: {})",
                    if available.is_empty() {
                        "none".to_string()
                    } else {
                        available.join(", ")
                    }
                ))
            })?;

        let location = self.store.join(&requirement.name).join(best);
        let descriptor = ArtifactDescriptor::read_from(&location.join(DESCRIPTOR_FILE)).ok();

        Ok(ResolvedRequirement {
            requirement: requirement.clone(),
            version: best.clone(),
            location,
            descriptor,
        })
    }
}

/// A version constraint as understood by the local store.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Constraint {
    Any,
    /// Bare version: an exact pin
    Exact(String),
    Range(VersionReq),
}

impl Constraint {
    fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() || s == "*" {
            return Constraint::Any;
        }
        if parse_lenient(s).is_some() {
            return Constraint::Exact(s.to_string());
        }
        match VersionReq::parse(s) {
            Ok(req) => Constraint::Range(req),
            Err(_) => Constraint::Exact(s.to_string()),
        }
    }

    fn matches(&self, version: &str) -> bool {
        match self {
            Constraint::Any => true,
            Constraint::Exact(pin) => match (parse_lenient(pin), parse_lenient(version)) {
                (Some(a), Some(b)) => a == b,
                _ => pin == version,
            },
            Constraint::Range(req) => parse_lenient(version).is_some_and(|v| req.matches(&v)),
        }
    }
}

/// Parse `1`, `1.3` or `1.3.0` style versions, padding missing components.
fn parse_lenient(s: &str) -> Option<Version> {
    if let Ok(v) = Version::parse(s) {
        return Some(v);
    }
    let parts: Vec<&str> = s.split('.').collect();
    if parts.is_empty() || parts.len() > 2 || parts.iter().any(|p| p.parse::<u64>().is_err()) {
        return None;
    }
    let padded = match parts.len() {
        1 => format!("{}.0.0", parts[0]),
        _ => format!("{}.{}.0", parts[0], parts[1]),
    };
    Version::parse(&padded).ok()
}

fn compare_versions(a: &str, b: &str) -> std::cmp::Ordering {
    match (parse_lenient(a), parse_lenient(b)) {
        (Some(va), Some(vb)) => va.cmp(&vb),
        (Some(_), None) => std::cmp::Ordering::Greater,
        (None, Some(_)) => std::cmp::Ordering::Less,
        (None, None) => a.cmp(b),
    }
}
