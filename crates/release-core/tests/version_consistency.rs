//! Every workspace member inherits the workspace version, and the internal
//! path dependencies pin that same version.

use std::path::{Path, PathBuf};

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .to_path_buf()
}

fn read_toml(path: &Path) -> toml::Value {
    let raw = std::fs::read_to_string(path).unwrap();
    raw.parse().unwrap()
}

#[test]
fn members_inherit_workspace_version() {
    let root = read_toml(&workspace_root().join("Cargo.toml"));
    let members = root["workspace"]["members"].as_array().unwrap();
    assert!(!members.is_empty());

    for member in members {
        let member = member.as_str().unwrap();
        let manifest = read_toml(&workspace_root().join(member).join("Cargo.toml"));
        let inherits = manifest["package"]["version"]
            .get("workspace")
            .and_then(|v| v.as_bool());
        assert_eq!(
            inherits,
            Some(true),
            "{} should use version.workspace = true",
            member
        );
    }
}

#[test]
fn internal_dependencies_pin_workspace_version() {
    let root = read_toml(&workspace_root().join("Cargo.toml"));
    let version = root["workspace"]["package"]["version"].as_str().unwrap();
    assert_eq!(version, env!("CARGO_PKG_VERSION"));

    let deps = root["workspace"]["dependencies"].as_table().unwrap();
    for (name, dep) in deps {
        if dep.get("path").is_some() {
            assert_eq!(
                dep.get("version").and_then(|v| v.as_str()),
                Some(version),
                "internal dependency {} should pin {}",
                name,
                version
            );
        }
    }
}
