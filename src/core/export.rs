//! Source export
//!
//! Copies the files a recipe declares into the export folder the build
//! backend works from, and writes a manifest with a sha256 per file.

use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use super::error::RecipeError;

/// Manifest file written at the root of the export folder.
pub const MANIFEST_FILE: &str = "manifest.txt";

/// Result of an export: relative path -> sha256 of every exported file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportManifest {
    pub files: BTreeMap<String, String>,
}

impl ExportManifest {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// One `path: sha256` line per file, sorted by path.
    pub fn render(&self) -> String {
        self.files
            .iter()
            .map(|(path, hash)| format!("{}: {}\n", path, hash))
            .collect()
    }
}

/// Copy everything matching `patterns` (relative to `recipe_dir`) into `export_dir`.
///
/// Every pattern must match at least one path. Paths under any of
/// `excluded` are never copied, so an export folder inside the recipe
/// directory does not swallow itself.
pub fn export_sources(
    recipe_dir: &Path,
    patterns: &[String],
    export_dir: &Path,
    excluded: &[&Path],
) -> Result<ExportManifest, RecipeError> {
    fs::create_dir_all(export_dir)?;
    let mut manifest = ExportManifest::default();

    for pattern in patterns {
        let matches = expand_pattern(recipe_dir, pattern)?;
        if matches.is_empty() {
            return Err(RecipeError::MissingSource {
                path: recipe_dir.join(pattern),
            });
        }

        for src in matches {
            if is_excluded(&src, excluded) {
                continue;
            }
            if src.is_dir() {
                for entry in WalkDir::new(&src).follow_links(false) {
                    let entry = entry.map_err(|e| {
                        RecipeError::from(std::io::Error::other(format!(
                            "failed to walk {}: {}",
                            src.display(),
                            e
                        )))
                    })?;
                    if entry.file_type().is_file() && !is_excluded(entry.path(), excluded) {
                        copy_one(recipe_dir, entry.path(), export_dir, &mut manifest)?;
                    }
                }
            } else {
                copy_one(recipe_dir, &src, export_dir, &mut manifest)?;
            }
        }
    }

    fs::write(export_dir.join(MANIFEST_FILE), manifest.render())?;
    Ok(manifest)
}

fn expand_pattern(recipe_dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, RecipeError> {
    if Path::new(pattern).is_absolute() || pattern.split(['/', '\\']).any(|c| c == "..") {
        return Err(RecipeError::InvalidRecipe(format!(
            "export pattern must stay inside the recipe directory: {}",
            pattern
        )));
    }

    let full = format!(
        "{}/{}",
        glob::Pattern::escape(&recipe_dir.to_string_lossy()),
        pattern
    );
    let paths = glob::glob(&full)
        .map_err(|e| RecipeError::InvalidRecipe(format!("invalid export pattern '{}': {}", pattern, e)))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(paths)
}

fn is_excluded(path: &Path, excluded: &[&Path]) -> bool {
    excluded.iter().any(|ex| path.starts_with(ex))
}

fn copy_one(
    recipe_dir: &Path,
    src: &Path,
    export_dir: &Path,
    manifest: &mut ExportManifest,
) -> Result<(), RecipeError> {
    let rel = src.strip_prefix(recipe_dir).map_err(|_| {
        RecipeError::InvalidRecipe(format!(
            "export {} is outside {}",
            src.display(),
            recipe_dir.display()
        ))
    })?;
    let dest = export_dir.join(rel);
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(src, &dest)?;

    let key = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");
    manifest.files.insert(key, sha256_file(&dest)?);
    Ok(())
}

/// Hex sha256 of a file, streamed.
pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut f = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0; 8192];
    loop {
        let n = f.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::write(root.join("LICENSE.md"), "MIT").unwrap();
        fs::write(root.join("CMakeLists.txt"), "project(cpp_template)").unwrap();
        fs::create_dir_all(root.join("include/CGFS")).unwrap();
        fs::write(root.join("include/CGFS/Canvas.hpp"), "#pragma once").unwrap();
        fs::create_dir_all(root.join("test")).unwrap();
        fs::write(root.join("test/unit_test.cpp"), "int main() {}").unwrap();
        dir
    }

    #[test]
    fn test_export_copies_files_and_directories() {
        let dir = project();
        let out = TempDir::new().unwrap();
        let patterns = vec![
            "LICENSE.md".to_string(),
            "CMakeLists.txt".to_string(),
            "include/*".to_string(),
            "test/*".to_string(),
        ];
        let manifest = export_sources(dir.path(), &patterns, out.path(), &[]).unwrap();

        assert_eq!(manifest.len(), 4);
        assert!(out.path().join("include/CGFS/Canvas.hpp").exists());
        assert!(out.path().join("test/unit_test.cpp").exists());
        assert!(manifest.files.contains_key("include/CGFS/Canvas.hpp"));

        let written = fs::read_to_string(out.path().join(MANIFEST_FILE)).unwrap();
        assert!(written.starts_with("CMakeLists.txt: "));
    }

    #[test]
    fn test_manifest_hash_is_sha256() {
        let dir = project();
        let out = TempDir::new().unwrap();
        let manifest =
            export_sources(dir.path(), &["LICENSE.md".to_string()], out.path(), &[]).unwrap();
        let expected = hex::encode(Sha256::digest(b"MIT"));
        assert_eq!(manifest.files["LICENSE.md"], expected);
        assert_eq!(expected.len(), 64);
    }

    #[test]
    fn test_missing_declared_path_fails() {
        let dir = project();
        let out = TempDir::new().unwrap();
        let err = export_sources(dir.path(), &["source/*".to_string()], out.path(), &[]).unwrap_err();
        match err {
            RecipeError::MissingSource { path } => assert!(path.ends_with("source/*")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parent_escape_rejected() {
        let dir = project();
        let out = TempDir::new().unwrap();
        let err = export_sources(dir.path(), &["../secret".to_string()], out.path(), &[]).unwrap_err();
        assert!(matches!(err, RecipeError::InvalidRecipe(_)));
    }

    #[test]
    fn test_export_dir_inside_recipe_dir_is_excluded() {
        let dir = project();
        let export_dir = dir.path().join("out/export");
        let manifest =
            export_sources(dir.path(), &["*".to_string()], &export_dir, &[&dir.path().join("out")]).unwrap();
        assert!(manifest.files.keys().all(|k| !k.starts_with("out/")));
        assert!(manifest.files.contains_key("LICENSE.md"));
    }
}
