//! Staged package installs
//!
//! The backend installs into a staging directory next to the package
//! directory. Only a successful install replaces the package directory, so a
//! failed Package never leaves a half-written install behind.
//!
//! The backend only ever sees the staging path as its install prefix.
//! Anything that records the prefix at install time (absolute paths in
//! CMake package config files or pkg-config `.pc` files) points at the
//! staging directory, which no longer exists after the rename. Installs are
//! expected to be relocatable.

use std::fs;
use std::path::{Path, PathBuf};

/// Staging directory for `package_dir`, emptied and recreated.
pub fn create_staging_dir(package_dir: &Path) -> std::io::Result<PathBuf> {
    let name = package_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "package".to_string());
    let stage_dir = package_dir.with_file_name(format!(".{}.stage", name));
    if stage_dir.exists() {
        fs::remove_dir_all(&stage_dir)?;
    }
    fs::create_dir_all(&stage_dir)?;
    Ok(stage_dir)
}

/// Replace `package_dir` with the staged install.
pub fn commit_staging_dir(stage_dir: &Path, package_dir: &Path) -> std::io::Result<()> {
    if package_dir.exists() {
        fs::remove_dir_all(package_dir)?;
    }
    if let Some(parent) = package_dir.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::rename(stage_dir, package_dir)
}

/// Drop a staging directory without committing it.
pub fn cleanup_staging_dir(stage_dir: &Path) {
    let _ = fs::remove_dir_all(stage_dir);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_commit_replaces_previous_package() {
        let dir = TempDir::new().unwrap();
        let package = dir.path().join("package");
        fs::create_dir_all(package.join("lib")).unwrap();
        fs::write(package.join("lib/stale.a"), "old").unwrap();

        let stage = create_staging_dir(&package).unwrap();
        assert_eq!(stage, dir.path().join(".package.stage"));
        fs::create_dir_all(stage.join("include")).unwrap();
        fs::write(stage.join("include/cpp_template.h"), "#pragma once").unwrap();

        commit_staging_dir(&stage, &package).unwrap();
        assert!(package.join("include/cpp_template.h").exists());
        assert!(!package.join("lib/stale.a").exists());
        assert!(!stage.exists());
    }

    #[test]
    fn test_cleanup_keeps_package_intact() {
        let dir = TempDir::new().unwrap();
        let package = dir.path().join("package");
        fs::create_dir_all(&package).unwrap();
        fs::write(package.join("artifact.json"), "{}").unwrap();

        let stage = create_staging_dir(&package).unwrap();
        fs::write(stage.join("partial"), "x").unwrap();
        cleanup_staging_dir(&stage);

        assert!(!stage.exists());
        assert!(package.join("artifact.json").exists());
    }

    #[test]
    fn test_stale_stage_is_emptied() {
        let dir = TempDir::new().unwrap();
        let package = dir.path().join("package");
        let stage = create_staging_dir(&package).unwrap();
        fs::write(stage.join("leftover"), "x").unwrap();

        let stage = create_staging_dir(&package).unwrap();
        assert!(!stage.join("leftover").exists());
    }
}
