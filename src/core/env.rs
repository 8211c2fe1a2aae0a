//! Environment probe
//!
//! Decides whether binaries built for the target can execute on the host.
//! The result is computed once per run and threaded through every phase.

use std::fmt;

/// A parsed `arch-vendor-os[-env]` target triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triple {
    pub arch: String,
    pub vendor: Option<String>,
    pub os: String,
    pub env: Option<String>,
}

impl Triple {
    /// Parse a triple. Accepts `arch-os`, `arch-vendor-os`, `arch-os-env`
    /// and `arch-vendor-os-env`. A three-part triple whose middle part is a
    /// known OS (`x86_64-linux-gnu`) is read as `arch-os-env`. Returns
    /// `None` for anything else.
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<&str> = s.trim().split('-').filter(|p| !p.is_empty()).collect();
        let (arch, vendor, os, env) = match parts.as_slice() {
            [arch, os] => (*arch, None, *os, None),
            [arch, os, env] if is_known_os(os) => (*arch, None, *os, Some(*env)),
            [arch, vendor, os] => (*arch, Some(*vendor), *os, None),
            [arch, vendor, os, env] => (*arch, Some(*vendor), *os, Some(*env)),
            _ => return None,
        };
        Some(Self {
            arch: normalize_arch(arch).to_string(),
            vendor: vendor.map(str::to_string),
            os: normalize_os(os).to_string(),
            env: env.map(str::to_string),
        })
    }

    /// Same architecture and operating system.
    pub fn can_execute(&self, other: &Triple) -> bool {
        self.arch == other.arch && self.os == other.os
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.arch)?;
        if let Some(ref vendor) = self.vendor {
            write!(f, "-{}", vendor)?;
        }
        write!(f, "-{}", self.os)?;
        if let Some(ref env) = self.env {
            write!(f, "-{}", env)?;
        }
        Ok(())
    }
}

fn normalize_arch(arch: &str) -> &str {
    match arch {
        "amd64" | "x64" => "x86_64",
        "arm64" => "aarch64",
        other => other,
    }
}

fn is_known_os(os: &str) -> bool {
    matches!(
        normalize_os(os),
        "linux"
            | "darwin"
            | "windows"
            | "freebsd"
            | "netbsd"
            | "openbsd"
            | "dragonfly"
            | "android"
            | "ios"
            | "none"
    )
}

fn normalize_os(os: &str) -> &str {
    match os {
        "darwin" | "macos" => "darwin",
        other => other,
    }
}

/// The triple of the machine this binary was compiled for.
pub fn host_triple() -> String {
    let arch = std::env::consts::ARCH;
    match std::env::consts::OS {
        "macos" => format!("{}-apple-darwin", arch),
        "windows" => format!("{}-pc-windows", arch),
        os => format!("{}-unknown-{}", arch, os),
    }
}

/// How target binaries may be executed on the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Emulator or wrapper argv, e.g. `["qemu-aarch64", "-L", "/usr/aarch64-linux-gnu"]`
    pub runner: Option<Vec<String>>,
    /// Explicit override; wins over every other rule
    pub can_run: Option<bool>,
}

/// Host/target facts for one recipe run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentContext {
    host: Option<Triple>,
    target: Option<Triple>,
    runner: Option<Vec<String>>,
    is_runnable: bool,
}

impl EnvironmentContext {
    pub fn host(&self) -> Option<&Triple> {
        self.host.as_ref()
    }

    pub fn target(&self) -> Option<&Triple> {
        self.target.as_ref()
    }

    /// Runner argv to prefix target binaries with, if one is configured.
    pub fn runner(&self) -> Option<&[String]> {
        self.runner.as_deref()
    }

    pub fn is_runnable(&self) -> bool {
        self.is_runnable
    }

    /// Host and target differ, or either is unknown.
    pub fn is_cross(&self) -> bool {
        match (&self.host, &self.target) {
            (Some(host), Some(target)) => !host.can_execute(target),
            _ => true,
        }
    }
}

/// Compute the environment context for a run.
///
/// Pure function of its inputs. Missing or unparseable triples yield
/// `is_runnable = false` unless a runner or explicit override says otherwise.
pub fn probe(host: Option<&str>, target: Option<&str>, config: &RunnerConfig) -> EnvironmentContext {
    let host = host.and_then(Triple::parse);
    let target = target.and_then(Triple::parse);
    let runner = config.runner.clone().filter(|argv| !argv.is_empty());

    let is_runnable = match config.can_run {
        Some(explicit) => explicit,
        None if runner.is_some() => true,
        None => match (&host, &target) {
            (Some(h), Some(t)) => h.can_execute(t),
            _ => false,
        },
    };

    EnvironmentContext {
        host,
        target,
        runner,
        is_runnable,
    }
}
