//! Dependency-aware build recipe executor
//!
//! A recipe is a Rhai script that declares a package: its identity, the
//! sources that take part in the build, its requirements and what it
//! publishes. The executor drives an external build tool through a fixed
//! sequence of phases and validates the result only when the produced binary
//! can actually run here.
//!
//! # Example Recipe
//!
//! ```rhai
//! let ctx = #{
//!     name: "cpp_template",
//!     version: "0.1.0",
//!     license: "MIT",
//!     exports: ["CMakeLists.txt", "src/*", "include/*", "test/*", "LICENSE"],
//!     requires: ["sdl/2.30.8"],
//!     build_requires: ["fmt/11.0.2"],
//!     test_requires: ["catch2/3.5.2"],
//!     test_binary: "unit_tests",
//!     libs: ["cpp_template"],
//! };
//! ```
//!
//! # Phases
//!
//! Export → Configure → Build → Test → Package → PublishInfo
//!
//! - Test is skipped (not failed) when the target cannot execute on the host
//!   and no runner is configured.
//! - A failing test binary is recorded but does not block Package unless
//!   `policy.strict_tests` is set.
//! - Any other failure is terminal for the run.
//!
//! # Variables Available in Recipes
//!
//! - `RECIPE_DIR` - Directory containing the recipe
//! - `ARCH` - Host architecture (x86_64, aarch64)
//! - `OS` - Host operating system
//! - `NPROC` - Number of CPUs

pub mod core;

pub use crate::core::artifact::{ArtifactDescriptor, ArtifactRegistry};
pub use crate::core::backend::{BackendContext, BackendError, BuildBackend, CMakeBackend, CommandBackend};
pub use crate::core::config::RecipeConfig;
pub use crate::core::deps::{DependencySet, Requirement, RequirementClass};
pub use crate::core::env::{probe, EnvironmentContext, RunnerConfig, Triple};
pub use crate::core::error::RecipeError;
pub use crate::core::lifecycle::{
    CancelToken, Halt, Phase, PhaseOutcome, RecipeRun, RecipeState, RunLayout, RunReport,
};
pub use crate::core::output;
pub use crate::core::recipe::Recipe;
pub use crate::core::resolve::{LocalStoreResolver, ResolvedDeps, ResolvedRequirement, Resolver};
