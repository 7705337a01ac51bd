//! Ensures all workspace crates use `version.workspace = true` and that
//! the workspace version is consistent across all Cargo.toml files.

use std::path::{Path, PathBuf};

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(Path::parent)
        .unwrap()
        .to_path_buf()
}

fn read_toml(path: &Path) -> toml::Value {
    let raw = std::fs::read_to_string(path).unwrap();
    raw.parse().unwrap()
}

/// Workspace members listed in the root Cargo.toml.
fn members() -> Vec<String> {
    let doc = read_toml(&workspace_root().join("Cargo.toml"));
    doc["workspace"]["members"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m.as_str().unwrap().to_string())
        .collect()
}

#[test]
fn all_crates_use_workspace_version() {
    let members = members();
    assert_eq!(members.len(), 4);

    for krate in &members {
        let doc = read_toml(&workspace_root().join(krate).join("Cargo.toml"));
        let inherited = doc["package"]["version"]
            .get("workspace")
            .and_then(toml::Value::as_bool);
        assert_eq!(
            inherited,
            Some(true),
            "{krate} should use version.workspace = true"
        );
    }
}

#[test]
fn workspace_version_matches_cargo_pkg() {
    let doc = read_toml(&workspace_root().join("Cargo.toml"));
    let ws_version = doc["workspace"]["package"]["version"].as_str().unwrap();
    assert_eq!(ws_version, env!("CARGO_PKG_VERSION"));
    assert_eq!(gitbuilder_core::VERSION, ws_version);
}

#[test]
fn internal_dependencies_pin_workspace_version() {
    let doc = read_toml(&workspace_root().join("Cargo.toml"));
    let ws_version = doc["workspace"]["package"]["version"].as_str().unwrap();
    let deps = doc["workspace"]["dependencies"].as_table().unwrap();

    for name in ["gitbuilder-core", "gitbuilder-ci", "verdict-state"] {
        let pinned = deps[name]["version"].as_str().unwrap();
        assert_eq!(pinned, ws_version, "{name} pinned to {pinned}");
    }
}
