// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The compiled probe executables, run the way an external reporter runs
//! them: no arguments, fixture tree in the working directory, verdict in the
//! exit status.

use std::process::Command;

use anyhow::Result;
use assert_cmd::prelude::*;
use sc_fixtures::FixtureTree;
use sc_probes::{ProbeManifest, PROBES};

macro_rules! probe_bins {
    ($($name:literal),+ $(,)?) => {
        &[$(($name, env!(concat!("CARGO_BIN_EXE_", $name)))),+]
    };
}

const BINARIES: &[(&str, &str)] = probe_bins![
    "pwrite-with-append",
    "pwrite-with-append-buffered",
    "pwrite-with-access",
    "pread-with-access",
    "lseek",
    "fdopendir-with-access",
    "stat-dev-ino",
    "clock_getres-monotonic",
    "clock_gettime-monotonic",
    "sock_shutdown-not_sock",
    "sock_shutdown-invalid_fd",
    "fopen-with-no-access",
];

const MANIFEST_TOOL: &str = env!("CARGO_BIN_EXE_probe-manifest");

fn probe(name: &str) -> Command {
    let (_, path) = BINARIES
        .iter()
        .find(|(bin, _)| *bin == name)
        .unwrap_or_else(|| panic!("no executable for probe {}", name));
    let mut cmd = Command::new(path);
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn every_registered_probe_has_an_executable() {
    assert_eq!(BINARIES.len(), PROBES.len());
    for registered in PROBES {
        assert!(BINARIES.iter().any(|(bin, _)| *bin == registered.name), "{}", registered.name);
    }
}

#[test]
fn every_probe_exits_zero_in_a_fixture_tree() -> Result<()> {
    let tree = FixtureTree::temporary()?;
    for (name, _) in BINARIES {
        let output = probe(name).current_dir(tree.base()).assert().success().get_output().clone();
        assert!(output.stdout.is_empty(), "{} wrote to stdout", name);
        let stderr = sc_logging::test_utils::strip_ansi_codes(&String::from_utf8_lossy(&output.stderr));
        assert!(stderr.contains("contract held"), "{}: {}", name, stderr);
    }
    Ok(())
}

#[test]
fn rerun_after_reset_gives_the_same_verdict() -> Result<()> {
    let tree = FixtureTree::temporary()?;
    for _ in 0..2 {
        for (name, _) in BINARIES {
            probe(name).current_dir(tree.base()).assert().success();
        }
        tree.reset()?;
    }
    Ok(())
}

#[test]
fn fixture_probes_exit_one_without_a_tree() -> Result<()> {
    let empty = tempfile::tempdir()?;
    for registered in PROBES.iter().filter(|probe| !probe.dirs.is_empty()) {
        let output = probe(registered.name)
            .current_dir(empty.path())
            .assert()
            .code(1)
            .get_output()
            .clone();
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("precondition not met"), "{}: {}", registered.name, stderr);
    }
    Ok(())
}

#[test]
fn no_access_probe_passes_anywhere() -> Result<()> {
    let empty = tempfile::tempdir()?;
    probe("fopen-with-no-access").current_dir(empty.path()).assert().success();
    Ok(())
}

#[test]
fn tampered_fixture_fails_the_probe() -> Result<()> {
    let tree = FixtureTree::temporary()?;
    std::fs::write(tree.path(sc_fixtures::FOPENDIR_DIR).join("unexpected"), b"x")?;

    let output = probe("fdopendir-with-access")
        .current_dir(tree.base())
        .assert()
        .code(1)
        .get_output()
        .clone();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("directory-enumeration contract violated"), "{}", stderr);
    Ok(())
}

#[test]
fn manifest_tool_lists_every_probe() -> Result<()> {
    let output = Command::new(MANIFEST_TOOL).arg("list").assert().success().get_output().clone();
    let stdout = String::from_utf8(output.stdout)?;
    for registered in PROBES {
        let line = format!("{}\t{}", registered.name, registered.family);
        assert!(stdout.lines().any(|l| l == line), "missing {}", line);
    }
    Ok(())
}

#[test]
fn manifest_tool_shows_and_writes_manifests() -> Result<()> {
    let output = Command::new(MANIFEST_TOOL)
        .args(["show", "stat-dev-ino"])
        .assert()
        .success()
        .get_output()
        .clone();
    let shown: ProbeManifest = serde_json::from_slice(&output.stdout)?;
    assert_eq!(shown.dirs, ["fs-tests.dir"]);
    assert_eq!(shown.exit_code, 0);

    Command::new(MANIFEST_TOOL).args(["show", "nope"]).assert().failure();

    let out = tempfile::tempdir()?;
    Command::new(MANIFEST_TOOL)
        .args(["write", "--out-dir"])
        .arg(out.path())
        .assert()
        .success();
    for registered in PROBES {
        let written = std::fs::read(out.path().join(format!("{}.json", registered.name)))?;
        let manifest: ProbeManifest = serde_json::from_slice(&written)?;
        assert_eq!(manifest, registered.manifest());
    }
    Ok(())
}
