//! In-process backend that records calls and plays back scripted results.

#![allow(dead_code)]

use recipe_forge::{BackendError, BuildBackend, EnvironmentContext, ResolvedDeps};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// Resolved requirement references, in class order
    Configure(Vec<String>),
    Build,
    Install(PathBuf),
}

impl Call {
    pub fn name(&self) -> &'static str {
        match self {
            Call::Configure(_) => "configure",
            Call::Build => "build",
            Call::Install(_) => "install",
        }
    }
}

/// Backend double. Build writes the test binary script, install writes a
/// header and a static library.
pub struct ScriptedBackend {
    calls: Rc<RefCell<Vec<Call>>>,
    build_dir: PathBuf,
    fail_on: Option<&'static str>,
    test_script: Option<String>,
}

impl ScriptedBackend {
    pub fn new(build_dir: &Path) -> (Self, Rc<RefCell<Vec<Call>>>) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let backend = Self {
            calls: Rc::clone(&calls),
            build_dir: build_dir.to_path_buf(),
            fail_on: None,
            test_script: None,
        };
        (backend, calls)
    }

    /// Fail the named operation with a canned diagnostic.
    pub fn failing(mut self, operation: &'static str) -> Self {
        self.fail_on = Some(operation);
        self
    }

    /// Shell body of `<build-dir>/test/unit_tests`, written during build.
    pub fn with_test_script(mut self, body: &str) -> Self {
        self.test_script = Some(body.to_string());
        self
    }

    fn check(&self, operation: &str) -> Result<(), BackendError> {
        if self.fail_on == Some(operation) {
            return Err(BackendError::new(
                operation,
                format!("scripted {}", operation),
                Some(1),
                format!("scripted {} failure", operation),
            ));
        }
        Ok(())
    }
}

#[cfg(unix)]
fn write_test_binary(build_dir: &Path, body: &str) {
    super::fixtures::write_script(&build_dir.join("test").join("unit_tests"), body);
}

#[cfg(not(unix))]
fn write_test_binary(_build_dir: &Path, _body: &str) {}

impl BuildBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn configure(&mut self, deps: &ResolvedDeps, _env: &EnvironmentContext) -> Result<(), BackendError> {
        let refs = deps
            .iter()
            .map(|d| format!("{}/{}", d.requirement.name, d.version))
            .collect();
        self.calls.borrow_mut().push(Call::Configure(refs));
        self.check("configure")
    }

    fn build(&mut self) -> Result<(), BackendError> {
        self.calls.borrow_mut().push(Call::Build);
        self.check("build")?;

        if let Some(ref body) = self.test_script {
            write_test_binary(&self.build_dir, body);
        }
        Ok(())
    }

    fn install(&mut self, target_dir: &Path) -> Result<(), BackendError> {
        self.calls.borrow_mut().push(Call::Install(target_dir.to_path_buf()));
        self.check("install")?;

        let io = |e: std::io::Error| BackendError::new("install", "scripted install", None, e.to_string());
        fs::create_dir_all(target_dir.join("include")).map_err(io)?;
        fs::create_dir_all(target_dir.join("lib")).map_err(io)?;
        fs::write(target_dir.join("include/cpp_template.h"), "#pragma once\n").map_err(io)?;
        fs::write(target_dir.join("lib/libcpp_template.a"), "!<arch>\n").map_err(io)?;
        Ok(())
    }
}
