//! Shell-command backend for build tools without a dedicated adapter.
//!
//! Each operation is a shell template with `$SOURCE_DIR`, `$BUILD_DIR`,
//! `$INSTALL_DIR`, `$PREFIX_PATH`, `$BUILD_TYPE`, `$NPROC` and `$TARGET`
//! expanded before it runs in the build directory.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;

use serde::Deserialize;

use super::process::{expand_vars, run_checked, shell_quote};
use super::{join_search_path, BackendContext, BackendError, BuildBackend};
use crate::core::env::EnvironmentContext;
use crate::core::resolve::ResolvedDeps;

/// Shell templates for each operation. A missing template is a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CommandTemplates {
    pub configure: Option<String>,
    pub build: Option<String>,
    pub install: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CommandBackend {
    ctx: BackendContext,
    templates: CommandTemplates,
    vars: BTreeMap<String, String>,
}

impl CommandBackend {
    pub fn new(ctx: BackendContext, templates: CommandTemplates) -> Self {
        let mut vars = BTreeMap::new();
        vars.insert("SOURCE_DIR".to_string(), shell_quote(ctx.source_dir.display()));
        vars.insert("BUILD_DIR".to_string(), shell_quote(ctx.build_dir.display()));
        vars.insert("BUILD_TYPE".to_string(), shell_quote(&ctx.build_type));
        vars.insert("NPROC".to_string(), ctx.jobs.to_string());
        vars.insert("PREFIX_PATH".to_string(), "''".to_string());
        vars.insert("TARGET".to_string(), "''".to_string());
        Self {
            ctx,
            templates,
            vars,
        }
    }

    fn run(&self, operation: &str, template: Option<&str>, extra: &[(&str, String)]) -> Result<(), BackendError> {
        let Some(template) = template else {
            return Ok(());
        };

        std::fs::create_dir_all(&self.ctx.build_dir).map_err(|e| {
            BackendError::new(
                operation,
                format!("mkdir {}", self.ctx.build_dir.display()),
                None,
                e.to_string(),
            )
        })?;

        let mut vars = self.vars.clone();
        for (key, value) in extra {
            vars.insert((*key).to_string(), value.clone());
        }
        let script = expand_vars(template, &vars);

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&script)
            .current_dir(&self.ctx.build_dir)
            .envs(&self.ctx.env);
        run_checked(operation, &mut cmd)
    }

    pub(crate) fn var(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }
}

impl BuildBackend for CommandBackend {
    fn name(&self) -> &str {
        "command"
    }

    fn configure(&mut self, deps: &ResolvedDeps, env: &EnvironmentContext) -> Result<(), BackendError> {
        let prefixes = deps.prefix_paths();
        self.vars.insert(
            "PREFIX_PATH".to_string(),
            shell_quote(join_search_path(&prefixes)),
        );
        if let Some(target) = env.target() {
            self.vars.insert("TARGET".to_string(), shell_quote(target));
        }
        let template = self.templates.configure.clone();
        self.run("configure", template.as_deref(), &[])
    }

    fn build(&mut self) -> Result<(), BackendError> {
        self.run("build", self.templates.build.as_deref(), &[])
    }

    fn install(&mut self, target_dir: &Path) -> Result<(), BackendError> {
        self.run(
            "install",
            self.templates.install.as_deref(),
            &[("INSTALL_DIR", shell_quote(target_dir.display()))],
        )
    }
}
