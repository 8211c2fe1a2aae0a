//! Lifecycle orchestration for recipe runs
//!
//! The lifecycle flow:
//! 1. export() - Copy declared sources into the export folder
//! 2. configure() - Resolve requirements, then backend configure
//! 3. build() - Backend build
//! 4. test() - Run the test binary, or skip when the target cannot execute here
//! 5. package() - Backend install (via staging so a failed install leaves nothing behind)
//! 6. publish_info() - Emit the artifact descriptor
//!
//! Each phase may only be entered once, in order, and only after its
//! precondition completed. A fatal failure or a cancellation ends the run.

pub mod phase;
mod report;
mod runtime;
mod stage;
pub mod state;

pub use phase::Phase;
pub use report::RunReport;
pub use runtime::{library_path_var, runtime_env};
pub use state::{Halt, PhaseOutcome, PhaseRecord, RecipeState};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::artifact::{ArtifactDescriptor, ArtifactRegistry, DESCRIPTOR_FILE};
use super::backend::process::{diagnostic, display_command, run_captured};
use super::backend::{create_backend, BackendContext, BuildBackend};
use super::config::RecipeConfig;
use super::env::EnvironmentContext;
use super::error::RecipeError;
use super::export::export_sources;
use super::lock::acquire_run_lock;
use super::output;
use super::recipe::Recipe;
use super::resolve::{resolve_all, LocalStoreResolver, Resolver};

/// Folders used by one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    pub root: PathBuf,
    /// Copied sources; the backend's source root
    pub export_dir: PathBuf,
    /// Backend build output, one per build type
    pub build_dir: PathBuf,
    /// Install directory the package is published from
    pub package_dir: PathBuf,
}

impl RunLayout {
    pub fn new(root: impl Into<PathBuf>, build_type: &str) -> Self {
        let root = root.into();
        Self {
            export_dir: root.join("export"),
            build_dir: root.join("build").join(build_type),
            package_dir: root.join("package"),
            root,
        }
    }

    /// Layout for `recipe`: an explicit workdir, else `<cache_dir>/<name>/<version>`,
    /// else `build/` next to the recipe.
    pub fn for_recipe(recipe: &Recipe, config: &RecipeConfig, workdir: Option<&Path>) -> Self {
        let root = match (workdir, &config.build.cache_dir) {
            (Some(dir), _) => dir.to_path_buf(),
            (None, Some(cache)) => cache.join(&recipe.name).join(&recipe.version),
            (None, None) => recipe.recipe_dir.join("build"),
        };
        Self::new(root, &config.build.build_type)
    }

    /// Conventional location of a test binary.
    pub fn test_binary(&self, name: &str) -> PathBuf {
        self.build_dir.join("test").join(name)
    }
}

/// Cooperative cancellation, checked before each phase starts.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One execution of a recipe.
///
/// Owns the backend session and all per-run state. Runs share nothing, so
/// independent runs may proceed in parallel as long as their layouts differ.
pub struct RecipeRun {
    recipe: Recipe,
    env: EnvironmentContext,
    layout: RunLayout,
    backend: Box<dyn BuildBackend>,
    resolver: Box<dyn Resolver>,
    strict_tests: bool,
    run_env: BTreeMap<String, String>,
    cancel: CancelToken,
    registry: ArtifactRegistry,
    state: RecipeState,
}

impl RecipeRun {
    pub fn new(
        recipe: Recipe,
        env: EnvironmentContext,
        layout: RunLayout,
        backend: Box<dyn BuildBackend>,
        resolver: Box<dyn Resolver>,
    ) -> Self {
        let state = RecipeState::new(backend.name());
        Self {
            recipe,
            env,
            layout,
            backend,
            resolver,
            strict_tests: false,
            run_env: BTreeMap::new(),
            cancel: CancelToken::new(),
            registry: ArtifactRegistry::new(),
            state,
        }
    }

    /// Wire a run from resolved configuration: backend, local store and environment probe.
    pub fn from_config(recipe: Recipe, config: &RecipeConfig, layout: RunLayout) -> Self {
        let ctx = BackendContext {
            source_dir: layout.export_dir.clone(),
            build_dir: layout.build_dir.clone(),
            build_type: config.build.build_type.clone(),
            jobs: config.build.jobs,
            env: config.toolchain.env.clone(),
        };
        let backend = create_backend(config, ctx);
        let resolver = Box::new(LocalStoreResolver::new(config.store_path()));
        Self::new(recipe, config.environment_context(), layout, backend, resolver)
            .with_strict_tests(config.strict_tests)
            .with_run_env(config.toolchain.env.clone())
    }

    /// Make a failing test binary fatal to the run.
    pub fn with_strict_tests(mut self, strict: bool) -> Self {
        self.strict_tests = strict;
        self
    }

    /// Base environment for the test binary.
    pub fn with_run_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.run_env = env;
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    pub fn environment(&self) -> &EnvironmentContext {
        &self.env
    }

    pub fn layout(&self) -> &RunLayout {
        &self.layout
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> &RecipeState {
        &self.state
    }

    pub fn into_state(self) -> RecipeState {
        self.state
    }

    pub fn report(&self) -> RunReport {
        RunReport::from_state(self.recipe.reference(), &self.state)
    }

    /// Descriptors published by this run.
    pub fn registry(&self) -> &ArtifactRegistry {
        &self.registry
    }

    pub fn describe(&self, package: &str) -> Option<&ArtifactDescriptor> {
        self.registry.describe(package)
    }

    pub fn export(&mut self) -> Result<(), RecipeError> {
        self.transition(Phase::Export)
    }

    pub fn configure(&mut self) -> Result<(), RecipeError> {
        self.transition(Phase::Configure)
    }

    pub fn build(&mut self) -> Result<(), RecipeError> {
        self.transition(Phase::Build)
    }

    /// Run the test binary. A failure is returned but, unless tests are
    /// strict, does not halt the run.
    pub fn test(&mut self) -> Result<(), RecipeError> {
        self.transition(Phase::Test)
    }

    pub fn package(&mut self) -> Result<(), RecipeError> {
        self.transition(Phase::Package)
    }

    pub fn publish_info(&mut self) -> Result<(), RecipeError> {
        self.transition(Phase::PublishInfo)
    }

    /// Drive every remaining phase up to and including `last`, holding the
    /// build directory lock throughout.
    ///
    /// A non-fatal test failure does not stop the loop; it is returned once
    /// `last` has been reached, or in place of a later fatal failure, so the
    /// error is always the earliest failing phase.
    pub fn run_until(&mut self, last: Phase) -> Result<(), RecipeError> {
        let _lock = acquire_run_lock(&self.layout.build_dir)
            .map_err(|e| RecipeError::from(std::io::Error::other(format!("{:#}", e))))?;

        output::action(&format!("Running {} up to {}", self.recipe.reference(), last));

        let mut test_failure = None;
        while let Some(next) = self.state.next_phase() {
            if next > last {
                break;
            }
            match self.transition(next) {
                Ok(()) => {}
                Err(e @ RecipeError::TestFailure { .. }) if self.state.halt().is_none() => {
                    test_failure = Some(e);
                }
                Err(e) => return Err(test_failure.unwrap_or(e)),
            }
        }

        match test_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// The full build: every phase, returning the published descriptor.
    pub fn run_to_completion(&mut self) -> Result<ArtifactDescriptor, RecipeError> {
        let result = self.run_until(Phase::PublishInfo);
        let descriptor = self.state.descriptor().cloned();
        match (result, descriptor) {
            (Ok(()), Some(descriptor)) => Ok(descriptor),
            (Err(e), _) => Err(e),
            (Ok(()), None) => Err(RecipeError::PhaseOrder {
                phase: Phase::PublishInfo,
                missing: Phase::Package,
            }),
        }
    }

    fn transition(&mut self, phase: Phase) -> Result<(), RecipeError> {
        self.state.check_can_enter(phase)?;
        if self.cancel.is_cancelled() {
            self.state.cancel(phase);
            output::warning(&format!("cancelled before {}", phase));
            return Err(RecipeError::Cancelled(phase));
        }

        output::phase(phase.name());
        let result = match phase {
            Phase::Export => self.run_export(),
            Phase::Configure => self.run_configure(),
            Phase::Build => self.run_build(),
            Phase::Test => self.run_test(),
            Phase::Package => self.run_package(),
            Phase::PublishInfo => self.run_publish_info(),
        };

        match result {
            Ok(PhaseOutcome::Skipped(reason)) => {
                output::skip(&format!("{} skipped: {}", phase, reason));
                self.state.record(phase, PhaseOutcome::Skipped(reason), true);
                Ok(())
            }
            Ok(outcome) => {
                self.state.record(phase, outcome, true);
                Ok(())
            }
            Err(e) => {
                let fatal = !matches!(e, RecipeError::TestFailure { .. }) || self.strict_tests;
                if fatal {
                    output::error(&e.to_string());
                } else {
                    output::warning(&e.to_string());
                }
                self.state.record(phase, PhaseOutcome::Failed(e.clone()), fatal);
                Err(e)
            }
        }
    }

    fn run_export(&mut self) -> Result<PhaseOutcome, RecipeError> {
        let export_dir = &self.layout.export_dir;
        if export_dir.exists() {
            std::fs::remove_dir_all(export_dir)?;
        }
        let manifest = export_sources(
            &self.recipe.recipe_dir,
            &self.recipe.exports,
            export_dir,
            &[self.layout.root.as_path()],
        )?;
        output::detail(&format!("exported {} files", manifest.len()));
        self.state.set_export(manifest);
        Ok(PhaseOutcome::Completed)
    }

    fn run_configure(&mut self) -> Result<PhaseOutcome, RecipeError> {
        let resolved = resolve_all(self.resolver.as_ref(), &self.recipe.dependencies)?;
        for dep in resolved.iter() {
            output::detail(&format!(
                "{} -> {} ({})",
                dep.requirement.reference(),
                dep.version,
                dep.requirement.class
            ));
        }
        self.backend
            .configure(&resolved, &self.env)
            .map_err(RecipeError::Configure)?;
        self.state.set_resolved(resolved);
        Ok(PhaseOutcome::Completed)
    }

    fn run_build(&mut self) -> Result<PhaseOutcome, RecipeError> {
        self.backend.build().map_err(RecipeError::Build)?;
        Ok(PhaseOutcome::Completed)
    }

    fn run_test(&mut self) -> Result<PhaseOutcome, RecipeError> {
        let Some(ref name) = self.recipe.test_binary else {
            return Ok(PhaseOutcome::Skipped("no test binary declared".to_string()));
        };
        if !self.env.is_runnable() {
            let target = self
                .env
                .target()
                .map(|t| t.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            return Ok(PhaseOutcome::Skipped(format!(
                "target {} cannot run on this host",
                target
            )));
        }

        let binary = self.layout.test_binary(name);
        if !binary.is_file() {
            return Err(RecipeError::TestFailure {
                binary,
                code: None,
                diagnostic: "test binary not found".to_string(),
            });
        }

        let mut cmd = match self.env.runner() {
            Some([runner, args @ ..]) => {
                let mut cmd = Command::new(runner);
                cmd.args(args).arg(&binary);
                cmd
            }
            _ => Command::new(&binary),
        };
        let resolved = self.state.resolved().cloned().unwrap_or_default();
        cmd.current_dir(&self.layout.build_dir);
        cmd.envs(runtime_env(&resolved, &self.run_env, |k| std::env::var(k).ok()));

        let line = display_command(&cmd);
        let out = run_captured(&mut cmd).map_err(|e| RecipeError::TestFailure {
            binary: binary.clone(),
            code: None,
            diagnostic: format!("failed to start {}: {}", line, e),
        })?;
        if !out.status.success() {
            return Err(RecipeError::TestFailure {
                binary,
                code: out.status.code(),
                diagnostic: diagnostic(&out),
            });
        }
        Ok(PhaseOutcome::Completed)
    }

    // The install prefix the backend sees is the staging dir, not package_dir.
    fn run_package(&mut self) -> Result<PhaseOutcome, RecipeError> {
        let package_dir = self.layout.package_dir.clone();
        let stage_dir = stage::create_staging_dir(&package_dir)?;
        if let Err(e) = self.backend.install(&stage_dir) {
            stage::cleanup_staging_dir(&stage_dir);
            return Err(RecipeError::Package(e));
        }
        stage::commit_staging_dir(&stage_dir, &package_dir)?;
        Ok(PhaseOutcome::Completed)
    }

    fn run_publish_info(&mut self) -> Result<PhaseOutcome, RecipeError> {
        let recipe = &self.recipe;
        let mut descriptor =
            ArtifactDescriptor::new(&recipe.name, &recipe.version, &self.layout.package_dir);
        descriptor.package_type = recipe.package_type.clone();
        descriptor.libs = recipe.libs.clone();
        descriptor.bins = recipe.bins.clone();

        let path = self.layout.package_dir.join(DESCRIPTOR_FILE);
        if let Err(e) = descriptor.write_to(&path) {
            output::warning(&format!("could not write {}: {:#}", path.display(), e));
        }

        output::success(&format!("Published {}", recipe.reference()));
        self.registry.publish(descriptor.clone());
        self.state.set_descriptor(descriptor);
        Ok(PhaseOutcome::Completed)
    }
}
