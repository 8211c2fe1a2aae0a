//! CMake backend.

use std::path::{Path, PathBuf};
use std::process::Command;

use super::process::run_checked;
use super::{join_search_path, BackendContext, BackendError, BuildBackend};
use crate::core::config::ToolchainConfig;
use crate::core::env::EnvironmentContext;
use crate::core::resolve::ResolvedDeps;

/// Drives `cmake` configure, `cmake --build` and `cmake --install`.
#[derive(Debug, Clone)]
pub struct CMakeBackend {
    ctx: BackendContext,
    cmake: String,
    generator: Option<String>,
    toolchain_file: Option<PathBuf>,
}

impl CMakeBackend {
    pub fn new(ctx: BackendContext, toolchain: &ToolchainConfig) -> Self {
        Self {
            ctx,
            cmake: toolchain.cmake.clone(),
            generator: toolchain.generator.clone(),
            toolchain_file: toolchain.toolchain_file.clone(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.cmake);
        cmd.current_dir(&self.ctx.source_dir);
        cmd.envs(&self.ctx.env);
        cmd
    }

    pub(crate) fn configure_command(&self, deps: &ResolvedDeps, env: &EnvironmentContext) -> Command {
        let mut cmd = self.command();
        cmd.arg("-S")
            .arg(&self.ctx.source_dir)
            .arg("-B")
            .arg(&self.ctx.build_dir);

        if let Some(ref generator) = self.generator {
            cmd.args(["-G", generator]);
        }

        cmd.arg(format!("-DCMAKE_BUILD_TYPE={}", self.ctx.build_type));

        let prefixes = deps.prefix_paths();
        if !prefixes.is_empty() {
            // CMake lists are ';'-separated on every platform
            let joined = prefixes
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join(";");
            cmd.arg(format!("-DCMAKE_PREFIX_PATH={}", joined));
        }

        if let Some(ref file) = self.toolchain_file {
            cmd.arg(format!("-DCMAKE_TOOLCHAIN_FILE={}", file.display()));
        }

        if env.is_cross()
            && let Some(target) = env.target()
        {
            cmd.arg(format!("-DCMAKE_SYSTEM_PROCESSOR={}", target.arch));
            cmd.arg(format!("-DCMAKE_SYSTEM_NAME={}", cmake_system_name(&target.os)));
        }

        if let Some(runner) = env.runner() {
            cmd.arg(format!("-DCMAKE_CROSSCOMPILING_EMULATOR={}", runner.join(";")));
        }

        let lib_dirs: Vec<PathBuf> = deps.iter().flat_map(|d| d.lib_dirs()).collect();
        if !lib_dirs.is_empty() {
            cmd.env("LIBRARY_PATH", join_search_path(&lib_dirs));
        }

        cmd
    }

    pub(crate) fn build_command(&self) -> Command {
        let mut cmd = self.command();
        cmd.arg("--build")
            .arg(&self.ctx.build_dir)
            .args(["--config", &self.ctx.build_type])
            .args(["--parallel", &self.ctx.jobs.to_string()]);
        cmd
    }

    pub(crate) fn install_command(&self, target_dir: &Path) -> Command {
        let mut cmd = self.command();
        cmd.arg("--install")
            .arg(&self.ctx.build_dir)
            .args(["--config", &self.ctx.build_type])
            .arg("--prefix")
            .arg(target_dir);
        cmd
    }
}

fn cmake_system_name(os: &str) -> &str {
    match os {
        "linux" => "Linux",
        "darwin" => "Darwin",
        "windows" => "Windows",
        "android" => "Android",
        "freebsd" => "FreeBSD",
        "none" => "Generic",
        other => other,
    }
}

impl BuildBackend for CMakeBackend {
    fn name(&self) -> &str {
        "cmake"
    }

    fn configure(&mut self, deps: &ResolvedDeps, env: &EnvironmentContext) -> Result<(), BackendError> {
        std::fs::create_dir_all(&self.ctx.build_dir).map_err(|e| {
            BackendError::new(
                "configure",
                format!("mkdir {}", self.ctx.build_dir.display()),
                None,
                e.to_string(),
            )
        })?;
        run_checked("configure", &mut self.configure_command(deps, env))
    }

    fn build(&mut self) -> Result<(), BackendError> {
        run_checked("build", &mut self.build_command())
    }

    fn install(&mut self, target_dir: &Path) -> Result<(), BackendError> {
        run_checked("install", &mut self.install_command(target_dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::backend::process::display_command;
    use crate::core::env::{probe, RunnerConfig};
    use std::collections::BTreeMap;

    fn backend() -> CMakeBackend {
        let ctx = BackendContext {
            source_dir: PathBuf::from("/work/export"),
            build_dir: PathBuf::from("/work/build/Release"),
            build_type: "Release".to_string(),
            jobs: 8,
            env: BTreeMap::new(),
        };
        let toolchain = ToolchainConfig {
            generator: Some("Ninja".to_string()),
            ..ToolchainConfig::default()
        };
        CMakeBackend::new(ctx, &toolchain)
    }

    #[test]
    fn test_configure_command_native() {
        let env = probe(
            Some("x86_64-unknown-linux-gnu"),
            Some("x86_64-unknown-linux-gnu"),
            &RunnerConfig::default(),
        );
        let line = display_command(&backend().configure_command(&ResolvedDeps::default(), &env));
        assert_eq!(
            line,
            "cmake -S /work/export -B /work/build/Release -G Ninja -DCMAKE_BUILD_TYPE=Release"
        );
    }

    #[test]
    fn test_configure_command_native_gnu_triple() {
        let env = probe(
            Some("x86_64-unknown-linux-gnu"),
            Some("x86_64-linux-gnu"),
            &RunnerConfig::default(),
        );
        let line = display_command(&backend().configure_command(&ResolvedDeps::default(), &env));
        assert!(!line.contains("CMAKE_SYSTEM_"), "{}", line);
    }

    #[test]
    fn test_configure_command_cross_gnu_triple() {
        let env = probe(
            Some("x86_64-unknown-linux-gnu"),
            Some("aarch64-linux-gnu"),
            &RunnerConfig::default(),
        );
        let line = display_command(&backend().configure_command(&ResolvedDeps::default(), &env));
        assert!(line.contains("-DCMAKE_SYSTEM_NAME=Linux"));
    }

    #[test]
    fn test_configure_command_cross() {
        let env = probe(
            Some("x86_64-unknown-linux-gnu"),
            Some("aarch64-unknown-linux-gnu"),
            &RunnerConfig::default(),
        );
        let line = display_command(&backend().configure_command(&ResolvedDeps::default(), &env));
        assert!(line.contains("-DCMAKE_SYSTEM_PROCESSOR=aarch64"));
        assert!(line.contains("-DCMAKE_SYSTEM_NAME=Linux"));
    }

    #[test]
    fn test_build_and_install_commands() {
        let b = backend();
        assert_eq!(
            display_command(&b.build_command()),
            "cmake --build /work/build/Release --config Release --parallel 8"
        );
        assert_eq!(
            display_command(&b.install_command(Path::new("/work/package"))),
            "cmake --install /work/build/Release --config Release --prefix /work/package"
        );
    }
}
