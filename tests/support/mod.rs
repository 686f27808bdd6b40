#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

pub const SCRIPT: &str = "export class Hello { run() { return 1; } }\n";

/// Writes a minimal node project with an already bundled `dist/index.js`.
pub fn write_project(dir: &Path, package_json: &str) -> PathBuf {
    fs::create_dir_all(dir.join("dist")).unwrap();
    fs::write(dir.join("package.json"), package_json).unwrap();
    fs::write(dir.join("README.md"), "# hello\n\nDemo nodes.\n").unwrap();
    let script = dir.join("dist/index.js");
    fs::write(&script, SCRIPT).unwrap();
    script
}

pub fn default_package_json() -> &'static str {
    r#"{
  "name": "@acme/hello",
  "version": "1.0.0",
  "description": "demo nodes",
  "main": "dist/index.js",
  "author": {"name": "Dev", "email": "dev@example.com"},
  "license": "MIT",
  "keywords": ["demo"],
  "private": true
}"#
}

/// Config file pointing the `default` profile at `url` with a fixed token.
pub fn write_config(dir: &Path, url: &str) -> PathBuf {
    let path = dir.join("config.toml");
    fs::write(
        &path,
        format!(
            r#"
[registry.default]
url = "{url}"
token = "test-token"
"#
        ),
    )
    .unwrap();
    path
}
