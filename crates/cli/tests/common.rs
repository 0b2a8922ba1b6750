// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

// Allow unused items: test helpers are shared across multiple test binaries,
// and not every test file uses every helper.
#![allow(dead_code)]
#![allow(unused_imports)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;

pub use predicates::prelude::*;
pub use tempfile::TempDir;

/// `mk` pointed at `state` with a clean environment.
pub fn mk(state: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("mk");
    cmd.arg("-C").arg(state).env_remove("RUST_LOG");
    cmd
}

/// Run `mk add ...` and return the new local id.
pub fn add(state: &Path, args: &[&str]) -> String {
    let output = mk(state).arg("add").args(args).output().unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    String::from_utf8_lossy(&output.stdout)
        .split_whitespace()
        .last()
        .unwrap()
        .to_string()
}

/// A device state dir plus a shared remote folder.
pub struct Setup {
    pub temp: TempDir,
}

impl Setup {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("remote")).unwrap();
        Setup { temp }
    }

    pub fn device(&self, name: &str) -> std::path::PathBuf {
        self.temp.path().join(name)
    }

    pub fn remote(&self) -> std::path::PathBuf {
        self.temp.path().join("remote")
    }
}
