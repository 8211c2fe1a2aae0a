//! Test fixtures - a small C++ project, its recipe and a package store.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// Recipe for the template project, mirroring a typical library layout.
pub const TEMPLATE_RECIPE: &str = r#"
let ctx = #{
    name: "cpp_template",
    version: "0.1.0",
    license: "MIT",
    description: "Template C++ library",
    exports: ["LICENSE", "CMakeLists.txt", "include/*", "src/*", "test/*"],
    requires: ["sdl/2.30.8"],
    build_requires: ["fmt/11.0.2"],
    test_requires: ["catch2/3.5.2"],
    test_binary: "unit_tests",
    libs: ["cpp_template"],
};
"#;

/// Same package without a test binary.
pub const UNTESTED_RECIPE: &str = r#"
let ctx = #{
    name: "cpp_template",
    version: "0.1.0",
    exports: ["LICENSE", "CMakeLists.txt", "include/*", "src/*"],
    libs: ["cpp_template"],
};
"#;

/// Write the template project plus `recipe.rhai` into `dir`.
pub fn write_project(dir: &Path, recipe: &str) -> PathBuf {
    let files = [
        ("LICENSE", "MIT License\n"),
        (
            "CMakeLists.txt",
            "cmake_minimum_required(VERSION 3.20)\nproject(cpp_template CXX)\nadd_library(cpp_template src/cpp_template.cpp)\n",
        ),
        ("include/cpp_template.h", "#pragma once\nint answer();\n"),
        ("src/cpp_template.cpp", "#include \"cpp_template.h\"\nint answer() { return 42; }\n"),
        ("test/test_main.cpp", "int main() { return 0; }\n"),
    ];
    for (rel, content) in files {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
    let recipe_path = dir.join("recipe.rhai");
    fs::write(&recipe_path, recipe).unwrap();
    recipe_path
}

/// Populate a local store with the packages the template recipe requires.
pub fn write_store(store: &Path) {
    for (name, version) in [
        ("sdl", "2.28.0"),
        ("sdl", "2.30.8"),
        ("fmt", "11.0.2"),
        ("catch2", "3.5.2"),
    ] {
        let root = store.join(name).join(version);
        fs::create_dir_all(root.join("lib")).unwrap();
        fs::create_dir_all(root.join("include")).unwrap();
    }
}

/// Make `path` an executable shell script.
#[cfg(unix)]
pub fn write_script(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;

    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}
