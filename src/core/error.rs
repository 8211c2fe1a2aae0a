//! Recipe run error types.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use super::backend::BackendError;
use super::lifecycle::Phase;

/// Errors raised while loading or running a recipe.
#[derive(Error, Debug, Clone)]
pub enum RecipeError {
    #[error("duplicate {class} requirement: {name}")]
    DuplicateRequirement { name: String, class: String },

    #[error("declared source does not exist: {}", path.display())]
    MissingSource { path: PathBuf },

    #[error("failed to resolve {reference}: {reason}")]
    DependencyResolution { reference: String, reason: String },

    #[error("configure failed: {0}")]
    Configure(#[source] BackendError),

    #[error("build failed: {0}")]
    Build(#[source] BackendError),

    #[error("test binary {} failed (exit code: {code:?})\n{diagnostic}", binary.display())]
    TestFailure {
        binary: PathBuf,
        code: Option<i32>,
        diagnostic: String,
    },

    #[error("package failed: {0}")]
    Package(#[source] BackendError),

    #[error("invalid recipe: {0}")]
    InvalidRecipe(String),

    #[error("cannot enter {phase}: {missing} has not completed")]
    PhaseOrder { phase: Phase, missing: Phase },

    #[error("cannot enter {phase}: run halted at {halted_at}")]
    RunTerminated { phase: Phase, halted_at: Phase },

    #[error("{0} already ran in this run")]
    AlreadyRan(Phase),

    #[error("run cancelled before {0}")]
    Cancelled(Phase),

    #[error("IO error: {0}")]
    Io(Arc<std::io::Error>),
}

impl From<std::io::Error> for RecipeError {
    fn from(e: std::io::Error) -> Self {
        RecipeError::Io(Arc::new(e))
    }
}

impl RecipeError {
    /// Process exit code reported by the CLI for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            RecipeError::InvalidRecipe(_) => 2,
            RecipeError::DuplicateRequirement { .. } => 3,
            RecipeError::MissingSource { .. } => 4,
            RecipeError::DependencyResolution { .. } => 5,
            RecipeError::Configure(_) => 6,
            RecipeError::Build(_) => 7,
            RecipeError::TestFailure { .. } => 8,
            RecipeError::Package(_) => 9,
            RecipeError::PhaseOrder { .. }
            | RecipeError::RunTerminated { .. }
            | RecipeError::AlreadyRan(_) => 10,
            RecipeError::Cancelled(_) => 130,
            RecipeError::Io(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct_per_phase_error() {
        let configure = RecipeError::Configure(BackendError::new("configure", "cmake", Some(1), ""));
        let build = RecipeError::Build(BackendError::new("build", "cmake", Some(2), ""));
        let package = RecipeError::Package(BackendError::new("install", "cmake", Some(1), ""));
        assert_eq!(configure.exit_code(), 6);
        assert_eq!(build.exit_code(), 7);
        assert_eq!(package.exit_code(), 9);
    }

    #[test]
    fn test_io_errors_convert() {
        let err: RecipeError = std::io::Error::other("disk full").into();
        assert_eq!(err.exit_code(), 1);
        assert!(err.clone().to_string().contains("disk full"));
    }

    #[test]
    fn test_backend_diagnostic_is_surfaced() {
        let err = RecipeError::Configure(BackendError::new(
            "configure",
            "cmake -S src -B build",
            Some(1),
            "CMake Error at CMakeLists.txt:3",
        ));
        let msg = err.to_string();
        assert!(msg.contains("configure failed"));
        assert!(msg.contains("CMake Error at CMakeLists.txt:3"));
    }
}
