//! Run-time environment for executing target binaries
//!
//! Puts the library and binary directories of run-time and test-only
//! requirements in front of the inherited search paths so the test binary
//! can load its shared libraries.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::core::backend::join_search_path;
use crate::core::deps::RequirementClass;
use crate::core::resolve::ResolvedDeps;

/// Variable the dynamic loader searches for shared libraries.
pub fn library_path_var() -> &'static str {
    if cfg!(target_os = "macos") {
        "DYLD_LIBRARY_PATH"
    } else if cfg!(windows) {
        "PATH"
    } else {
        "LD_LIBRARY_PATH"
    }
}

/// Environment overrides for running a target binary.
///
/// `inherited` supplies the current value of a variable, so callers can pass
/// `|k| std::env::var(k).ok()` or a fixed map in tests.
pub fn runtime_env(
    resolved: &ResolvedDeps,
    base: &BTreeMap<String, String>,
    inherited: impl Fn(&str) -> Option<String>,
) -> BTreeMap<String, String> {
    let mut env = base.clone();

    let mut lib_dirs: Vec<PathBuf> = Vec::new();
    let mut bin_dirs: Vec<PathBuf> = Vec::new();
    for class in [RequirementClass::Run, RequirementClass::TestOnly] {
        for dep in resolved.for_class(class) {
            lib_dirs.extend(dep.lib_dirs());
            bin_dirs.extend(dep.bin_dirs());
        }
    }

    prepend(&mut env, library_path_var(), lib_dirs, &inherited);
    prepend(&mut env, "PATH", bin_dirs, &inherited);
    env
}

fn prepend(
    env: &mut BTreeMap<String, String>,
    var: &str,
    mut dirs: Vec<PathBuf>,
    inherited: &impl Fn(&str) -> Option<String>,
) {
    if dirs.is_empty() {
        return;
    }
    let current = env.get(var).cloned().or_else(|| inherited(var));
    if let Some(current) = current.filter(|c| !c.is_empty()) {
        dirs.extend(std::env::split_paths(&current));
    }
    let mut unique: Vec<PathBuf> = Vec::new();
    for dir in dirs {
        if !unique.contains(&dir) {
            unique.push(dir);
        }
    }
    env.insert(var.to_string(), join_search_path(&unique));
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::core::deps::{DependencySet, Requirement};
    use crate::core::resolve::{resolve_all, LocalStoreResolver};
    use tempfile::TempDir;

    fn resolved(store: &TempDir) -> ResolvedDeps {
        for (name, version) in [("sdl", "2.30.8"), ("fmt", "11.0.2"), ("catch2", "3.5.2")] {
            std::fs::create_dir_all(store.path().join(name).join(version)).unwrap();
        }
        let set = DependencySet::declare(vec![
            Requirement::new("sdl", "2.30.8", RequirementClass::Run),
            Requirement::new("fmt", "11.0.2", RequirementClass::Build),
            Requirement::new("catch2", "3.5.2", RequirementClass::TestOnly),
        ])
        .unwrap();
        resolve_all(&LocalStoreResolver::new(store.path()), &set).unwrap()
    }

    #[test]
    fn test_run_and_test_libs_prepended() {
        let store = TempDir::new().unwrap();
        let deps = resolved(&store);
        let env = runtime_env(&deps, &BTreeMap::new(), |k| {
            (k == "PATH").then(|| "/usr/bin:/bin".to_string())
        });

        let libs = &env[library_path_var()];
        assert!(libs.contains("sdl/2.30.8/lib"));
        assert!(libs.contains("catch2/3.5.2/lib"));
        assert!(!libs.contains("fmt"));

        let path = &env["PATH"];
        assert!(path.starts_with(&store.path().join("sdl/2.30.8/bin").to_string_lossy().to_string()));
        assert!(path.ends_with("/usr/bin:/bin"));
    }

    #[test]
    fn test_no_runtime_deps_leaves_env_alone() {
        let mut base = BTreeMap::new();
        base.insert("CC".to_string(), "clang".to_string());
        let env = runtime_env(&ResolvedDeps::default(), &base, |_| None);
        assert_eq!(env, base);
    }
}
