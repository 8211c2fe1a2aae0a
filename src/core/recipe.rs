//! Recipe loading
//!
//! A recipe is a Rhai script that declares its package in a `ctx` map:
//!
//! ```rhai
//! let ctx = #{
//!     name: "cpp_template",
//!     version: "0.0.1",
//!     license: "MIT",
//!     package_type: "header-library",
//!     exports: ["LICENSE.md", "CMakeLists.txt", "cmake/*", "include/*", "source/*", "test/*"],
//!     requires: ["sdl/2.30.8"],
//!     build_requires: ["fmt/11.0.2"],
//!     test_requires: ["catch2/3.5.2"],
//!     test_binary: "unit_tests",
//!     libs: ["cpp_template"],
//! };
//! ```
//!
//! The script runs once with `RECIPE_DIR`, `ARCH`, `OS` and `NPROC` in scope,
//! so values may be computed. The resulting map is deserialized into a
//! typed [`Recipe`]; nothing in the script runs after load.

use std::path::{Path, PathBuf};

use rhai::{Dynamic, Engine, Scope};
use serde::Deserialize;

use super::deps::{DependencySet, Requirement, RequirementClass};
use super::error::RecipeError;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RecipeCtx {
    name: String,
    version: String,
    #[serde(default)]
    license: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    package_type: Option<String>,
    #[serde(default)]
    exports: Vec<String>,
    #[serde(default)]
    requires: Vec<String>,
    #[serde(default)]
    build_requires: Vec<String>,
    #[serde(default)]
    test_requires: Vec<String>,
    #[serde(default)]
    test_binary: Option<String>,
    #[serde(default)]
    libs: Vec<String>,
    #[serde(default)]
    bins: Vec<String>,
}

/// A loaded, validated recipe.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    pub name: String,
    pub version: String,
    pub license: Option<String>,
    pub description: Option<String>,
    pub package_type: String,
    /// Directory containing the recipe; export patterns are relative to it
    pub recipe_dir: PathBuf,
    /// Glob patterns of sources participating in the build
    pub exports: Vec<String>,
    pub dependencies: DependencySet,
    /// File name of the test binary under `<build-dir>/test/`
    pub test_binary: Option<String>,
    pub libs: Vec<String>,
    pub bins: Vec<String>,
}

impl Recipe {
    /// Load a recipe file.
    pub fn load(path: &Path) -> Result<Self, RecipeError> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            RecipeError::InvalidRecipe(format!("failed to read {}: {}", path.display(), e))
        })?;
        let recipe_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::from_source(&source, &recipe_dir)
    }

    /// Evaluate recipe source as if it lived in `recipe_dir`.
    pub fn from_source(source: &str, recipe_dir: &Path) -> Result<Self, RecipeError> {
        let engine = recipe_engine();

        let mut scope = Scope::new();
        scope.push_constant("RECIPE_DIR", recipe_dir.to_string_lossy().to_string());
        scope.push_constant("ARCH", std::env::consts::ARCH);
        scope.push_constant("OS", std::env::consts::OS);
        scope.push_constant("NPROC", num_cpus::get() as i64);

        let ast = engine
            .compile(source)
            .map_err(|e| RecipeError::InvalidRecipe(format!("failed to compile recipe: {}", e)))?;
        engine
            .run_ast_with_scope(&mut scope, &ast)
            .map_err(|e| RecipeError::InvalidRecipe(format!("failed to run recipe: {}", e)))?;

        let ctx: rhai::Map = scope
            .get_value("ctx")
            .ok_or_else(|| RecipeError::InvalidRecipe("recipe missing 'let ctx = #{...}'".into()))?;
        let ctx: RecipeCtx = rhai::serde::from_dynamic(&Dynamic::from_map(ctx))
            .map_err(|e| RecipeError::InvalidRecipe(format!("invalid ctx: {}", e)))?;

        Self::from_ctx(ctx, recipe_dir)
    }

    fn from_ctx(ctx: RecipeCtx, recipe_dir: &Path) -> Result<Self, RecipeError> {
        if ctx.name.trim().is_empty() {
            return Err(RecipeError::InvalidRecipe("ctx.name is empty".into()));
        }
        if ctx.version.trim().is_empty() {
            return Err(RecipeError::InvalidRecipe("ctx.version is empty".into()));
        }

        let classes = [
            (ctx.build_requires, RequirementClass::Build),
            (ctx.requires, RequirementClass::Run),
            (ctx.test_requires, RequirementClass::TestOnly),
        ];
        let mut requirements = Vec::new();
        for (refs, class) in classes {
            for reference in refs {
                requirements.push(Requirement::parse(&reference, class)?);
            }
        }
        let dependencies = DependencySet::declare(requirements)?;

        if let Some(ref bin) = ctx.test_binary
            && (bin.is_empty() || bin.contains('/') || bin.contains('\\'))
        {
            return Err(RecipeError::InvalidRecipe(format!(
                "test_binary must be a plain file name, got '{}'",
                bin
            )));
        }

        Ok(Self {
            name: ctx.name,
            version: ctx.version,
            license: ctx.license,
            description: ctx.description,
            package_type: ctx.package_type.unwrap_or_else(|| "library".to_string()),
            recipe_dir: recipe_dir.to_path_buf(),
            exports: ctx.exports,
            dependencies,
            test_binary: ctx.test_binary,
            libs: ctx.libs,
            bins: ctx.bins,
        })
    }

    /// `name/version` reference used in logs.
    pub fn reference(&self) -> String {
        format!("{}/{}", self.name, self.version)
    }
}

/// Rhai engine for evaluating recipe declarations.
fn recipe_engine() -> Engine {
    let mut engine = Engine::new();
    engine.register_fn("env", |name: &str| std::env::var(name).unwrap_or_default());
    engine
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = r#"
let ctx = #{
    name: "cpp_template",
    version: "0.0.1",
    license: "MIT",
    package_type: "header-library",
    exports: ["LICENSE.md", "CMakeLists.txt", "cmake/*", "include/*", "source/*", "test/*"],
    requires: ["sdl/2.30.8"],
    build_requires: ["fmt/11.0.2"],
    test_requires: ["catch2/3.5.2"],
    test_binary: "unit_tests",
    libs: ["cpp_template"],
};
"#;

    #[test]
    fn test_load_template_recipe() {
        let recipe = Recipe::from_source(TEMPLATE, Path::new("/recipes/cpp_template")).unwrap();
        assert_eq!(recipe.reference(), "cpp_template/0.0.1");
        assert_eq!(recipe.package_type, "header-library");
        assert_eq!(recipe.exports.len(), 6);
        assert_eq!(recipe.test_binary.as_deref(), Some("unit_tests"));
        assert_eq!(recipe.libs, ["cpp_template"]);

        let run: Vec<_> = recipe
            .dependencies
            .for_class(RequirementClass::Run)
            .map(|r| r.reference())
            .collect();
        assert_eq!(run, ["sdl/2.30.8"]);
        let test: Vec<_> = recipe
            .dependencies
            .for_class(RequirementClass::TestOnly)
            .map(|r| r.reference())
            .collect();
        assert_eq!(test, ["catch2/3.5.2"]);
    }

    #[test]
    fn test_optional_fields_default() {
        let recipe = Recipe::from_source(
            r#"let ctx = #{ name: "tiny", version: "1.0" };"#,
            Path::new("."),
        )
        .unwrap();
        assert_eq!(recipe.package_type, "library");
        assert!(recipe.dependencies.is_empty());
        assert!(recipe.test_binary.is_none());
        assert!(recipe.exports.is_empty());
    }

    #[test]
    fn test_computed_values() {
        let recipe = Recipe::from_source(
            r#"
let deps = ["zlib/1.3"];
if OS == "linux" || OS != "linux" { deps.push("openssl/3.2.0"); }
let ctx = #{ name: "net", version: "2.0", requires: deps };
"#,
            Path::new("."),
        )
        .unwrap();
        assert_eq!(recipe.dependencies.len(), 2);
    }

    #[test]
    fn test_duplicate_requirement_rejected() {
        let err = Recipe::from_source(
            r#"let ctx = #{ name: "dup", version: "1.0", requires: ["sdl/2.30.8", "sdl/2.28.0"] };"#,
            Path::new("."),
        )
        .unwrap_err();
        assert!(matches!(err, RecipeError::DuplicateRequirement { .. }));
    }

    #[test]
    fn test_missing_ctx_rejected() {
        let err = Recipe::from_source("let name = \"x\";", Path::new(".")).unwrap_err();
        assert!(err.to_string().contains("missing 'let ctx"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = Recipe::from_source(
            r#"let ctx = #{ name: "x", version: "1", requirez: [] };"#,
            Path::new("."),
        )
        .unwrap_err();
        assert!(matches!(err, RecipeError::InvalidRecipe(_)));
    }

    #[test]
    fn test_test_binary_must_be_file_name() {
        let err = Recipe::from_source(
            r#"let ctx = #{ name: "x", version: "1", test_binary: "../escape" };"#,
            Path::new("."),
        )
        .unwrap_err();
        assert!(err.to_string().contains("plain file name"));
    }

    #[test]
    fn test_compile_error_reported() {
        let err = Recipe::from_source("let ctx = #{ name: ", Path::new(".")).unwrap_err();
        assert!(err.to_string().contains("failed to compile recipe"));
    }
}
