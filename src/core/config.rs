//! Layered TOML configuration
//!
//! Files are read from `$XDG_CONFIG_DIRS/recipe/config.toml`,
//! `$XDG_CONFIG_HOME/recipe/config.toml` and finally an explicit path, later
//! files overriding earlier ones key by key. The merged result is resolved
//! into a plain [`RecipeConfig`] value that each run receives explicitly.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use super::backend::CommandTemplates;
use super::env::{host_triple, probe, EnvironmentContext, RunnerConfig};

const DEFAULT_BUILD_TYPE: &str = "Release";
const DEFAULT_CMAKE: &str = "cmake";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConfigToml {
    build: Option<BuildToml>,
    toolchain: Option<ToolchainToml>,
    backend: Option<BackendToml>,
    environment: Option<EnvironmentToml>,
    policy: Option<PolicyToml>,
    resolver: Option<ResolverToml>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct BuildToml {
    build_type: Option<String>,
    jobs: Option<usize>,
    cache_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ToolchainToml {
    cmake: Option<String>,
    generator: Option<String>,
    toolchain_file: Option<PathBuf>,
    env: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct BackendToml {
    kind: Option<String>,
    configure: Option<String>,
    build: Option<String>,
    install: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct EnvironmentToml {
    host: Option<String>,
    target: Option<String>,
    runner: Option<Vec<String>>,
    can_run: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PolicyToml {
    strict_tests: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ResolverToml {
    store: Option<PathBuf>,
}

/// Overwrite `dst` with `src` when `src` is set.
fn take<T>(dst: &mut Option<T>, src: Option<T>) {
    if src.is_some() {
        *dst = src;
    }
}

/// Merge two optional tables with the table's own merge.
fn merge_table<T>(dst: &mut Option<T>, src: Option<T>, merge: impl FnOnce(&mut T, T)) {
    match (dst.as_mut(), src) {
        (Some(d), Some(s)) => merge(d, s),
        (None, Some(s)) => *dst = Some(s),
        _ => {}
    }
}

impl ConfigToml {
    fn merge(&mut self, other: ConfigToml) {
        merge_table(&mut self.build, other.build, |d, s| {
            take(&mut d.build_type, s.build_type);
            take(&mut d.jobs, s.jobs);
            take(&mut d.cache_dir, s.cache_dir);
        });
        merge_table(&mut self.toolchain, other.toolchain, |d, s| {
            take(&mut d.cmake, s.cmake);
            take(&mut d.generator, s.generator);
            take(&mut d.toolchain_file, s.toolchain_file);
            merge_table(&mut d.env, s.env, |de, se| de.extend(se));
        });
        merge_table(&mut self.backend, other.backend, |d, s| {
            take(&mut d.kind, s.kind);
            take(&mut d.configure, s.configure);
            take(&mut d.build, s.build);
            take(&mut d.install, s.install);
        });
        merge_table(&mut self.environment, other.environment, |d, s| {
            take(&mut d.host, s.host);
            take(&mut d.target, s.target);
            take(&mut d.runner, s.runner);
            take(&mut d.can_run, s.can_run);
        });
        merge_table(&mut self.policy, other.policy, |d, s| {
            take(&mut d.strict_tests, s.strict_tests);
        });
        merge_table(&mut self.resolver, other.resolver, |d, s| {
            take(&mut d.store, s.store);
        });
    }
}

/// Build settings shared by every backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    pub build_type: String,
    pub jobs: usize,
    /// Root for export/build/package folders when none is given explicitly
    pub cache_dir: Option<PathBuf>,
}

/// Build tool locations and process environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainConfig {
    pub cmake: String,
    pub generator: Option<String>,
    pub toolchain_file: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            cmake: DEFAULT_CMAKE.to_string(),
            generator: None,
            toolchain_file: None,
            env: BTreeMap::new(),
        }
    }
}

/// Which backend adapter a run uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind {
    CMake,
    Command(CommandTemplates),
}

/// Host, target and runner settings fed to the environment probe.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnvironmentConfig {
    pub host: Option<String>,
    pub target: Option<String>,
    pub runner: RunnerConfig,
}

/// Fully resolved configuration for recipe runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeConfig {
    pub build: BuildConfig,
    pub toolchain: ToolchainConfig,
    pub backend: BackendKind,
    pub environment: EnvironmentConfig,
    /// Treat a failing test binary as fatal to the run
    pub strict_tests: bool,
    /// Local package store used to resolve requirements
    pub store: Option<PathBuf>,
}

impl Default for RecipeConfig {
    fn default() -> Self {
        Self {
            build: BuildConfig {
                build_type: DEFAULT_BUILD_TYPE.to_string(),
                jobs: num_cpus::get(),
                cache_dir: None,
            },
            toolchain: ToolchainConfig::default(),
            backend: BackendKind::CMake,
            environment: EnvironmentConfig::default(),
            strict_tests: false,
            store: None,
        }
    }
}

impl RecipeConfig {
    /// Load layered configuration. `explicit` must exist when given.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut merged = ConfigToml::default();

        for path in find_config_files() {
            if path.exists() {
                merged.merge(read_toml(&path)?);
            }
        }

        if let Some(path) = explicit {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            merged.merge(read_toml(path)?);
        }

        resolve(merged)
    }

    /// Parse a single TOML document on top of the defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let parsed: ConfigToml = toml::from_str(text).context("Invalid recipe config")?;
        resolve(parsed)
    }

    /// Probe the environment once for a run.
    pub fn environment_context(&self) -> EnvironmentContext {
        let host = self
            .environment
            .host
            .clone()
            .unwrap_or_else(host_triple);
        let target = self.environment.target.clone().unwrap_or_else(|| host.clone());
        probe(Some(&host), Some(&target), &self.environment.runner)
    }

    /// Local package store, defaulting to `$XDG_DATA_HOME/recipe/store`.
    pub fn store_path(&self) -> PathBuf {
        self.store.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from(".").join(".local").join("share"))
                .join("recipe")
                .join("store")
        })
    }
}

fn resolve(cfg: ConfigToml) -> Result<RecipeConfig> {
    let defaults = RecipeConfig::default();
    let build = cfg.build.unwrap_or_default();
    let toolchain = cfg.toolchain.unwrap_or_default();
    let backend = cfg.backend.unwrap_or_default();
    let environment = cfg.environment.unwrap_or_default();

    let backend_kind = match backend.kind.as_deref().unwrap_or("cmake") {
        "cmake" => BackendKind::CMake,
        "command" => BackendKind::Command(CommandTemplates {
            configure: backend.configure,
            build: backend.build,
            install: backend.install,
        }),
        other => bail!("Unknown backend kind '{}' (expected 'cmake' or 'command')", other),
    };

    Ok(RecipeConfig {
        build: BuildConfig {
            build_type: build.build_type.unwrap_or(defaults.build.build_type),
            jobs: build.jobs.unwrap_or(defaults.build.jobs).max(1),
            cache_dir: build.cache_dir,
        },
        toolchain: ToolchainConfig {
            cmake: toolchain.cmake.unwrap_or_else(|| DEFAULT_CMAKE.to_string()),
            generator: toolchain.generator,
            toolchain_file: toolchain.toolchain_file,
            env: toolchain.env.unwrap_or_default(),
        },
        backend: backend_kind,
        environment: EnvironmentConfig {
            host: environment.host,
            target: environment.target,
            runner: RunnerConfig {
                runner: environment.runner,
                can_run: environment.can_run,
            },
        },
        strict_tests: cfg.policy.and_then(|p| p.strict_tests).unwrap_or(false),
        store: cfg.resolver.and_then(|r| r.store),
    })
}

fn split_xdg_config_dirs() -> Vec<PathBuf> {
    let raw = std::env::var("XDG_CONFIG_DIRS").unwrap_or_else(|_| "/etc/xdg".to_owned());
    raw.split(':')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

fn xdg_config_home() -> PathBuf {
    if let Ok(raw) = std::env::var("XDG_CONFIG_HOME") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    dirs::config_dir().unwrap_or_else(|| PathBuf::from(".").join(".config"))
}

fn find_config_files() -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = split_xdg_config_dirs()
        .into_iter()
        .map(|dir| dir.join("recipe").join("config.toml"))
        .collect();
    paths.push(xdg_config_home().join("recipe").join("config.toml"));
    paths
}

fn read_toml(path: &Path) -> Result<ConfigToml> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("Invalid TOML in {}", path.display()))
}
