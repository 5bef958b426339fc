//! Integration tests for polyjudge
//!
//! Sandbox tests need a `node` binary (22 or newer) on PATH.
//! Run with: cargo test -p polyjudge --features integration-tests
//!
//! Tests that reach the public CDN or execution service are marked `#[ignore]`.
//! To include them:
//!    cargo test -p polyjudge --features integration-tests -- --include-ignored

#![cfg(feature = "integration-tests")]

use std::fs;
use std::path::Path;

use polyjudge::VirtualFileMap;

mod bundling;
mod config_loading;
mod remote_service;
mod sandbox_execution;
mod test_runs;

const FIXTURES_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

/// Load a fixture project into a file map keyed by relative path
pub(crate) fn fixture_project(name: &str) -> VirtualFileMap {
    let root = format!("{FIXTURES_PATH}/projects/{name}");
    let mut files = VirtualFileMap::new();
    collect(Path::new(&root), Path::new(&root), &mut files);
    files
}

fn collect(root: &Path, dir: &Path, files: &mut VirtualFileMap) {
    let entries = fs::read_dir(dir).unwrap_or_else(|e| panic!("Failed to read {dir:?}: {e}"));
    for entry in entries {
        let path = entry.unwrap().path();
        if path.is_dir() {
            collect(root, &path, files);
        } else {
            let key = path
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/");
            files.insert(key, fs::read_to_string(&path).unwrap());
        }
    }
}

/// Build a file map from inline sources
pub(crate) fn project(entries: &[(&str, &str)]) -> VirtualFileMap {
    entries
        .iter()
        .map(|(path, source)| ((*path).to_owned(), (*source).to_owned()))
        .collect()
}
