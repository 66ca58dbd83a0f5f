//! Integration tests for the kiln CLI binary.

use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Test context with an isolated kiln home
struct TestContext {
    temp_dir: TempDir,
    kiln_home: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let kiln_home = temp_dir.path().join(".kiln");
        Self {
            temp_dir,
            kiln_home,
        }
    }

    fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    fn kiln_cmd(&self) -> Command {
        let bin_path = env!("CARGO_BIN_EXE_kiln");
        let mut cmd = Command::new(bin_path);
        cmd.env("HOME", self.temp_dir.path());
        cmd.env("KILN_HOME", &self.kiln_home);
        cmd.env_remove("KILN_PREFIX");
        cmd
    }

    fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path().join(name);
        std::fs::write(&path, contents).expect("failed to write file");
        path
    }
}

fn bundled_recipe() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../recipes/tracy.toml")
}

#[test]
fn test_help_command() {
    let ctx = TestContext::new();
    let output = ctx.kiln_cmd().arg("--help").output().expect("failed to run kiln");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("smoke"));
}

#[test]
fn test_version_command() {
    let ctx = TestContext::new();
    let output = ctx
        .kiln_cmd()
        .arg("--version")
        .output()
        .expect("failed to run kiln");
    assert!(output.status.success());
}

#[test]
fn test_check_bundled_recipe() {
    let ctx = TestContext::new();
    let output = ctx
        .kiln_cmd()
        .arg("check")
        .arg(bundled_recipe())
        .output()
        .expect("failed to run kiln");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout.contains("Name: tracy"));
    assert!(stdout.contains("Artifacts: 9"));
    assert!(stdout.contains("Tracy Profiler 0.10"));
}

#[test]
fn test_check_rejects_duplicate_artifacts() {
    let ctx = TestContext::new();
    let recipe = ctx.write(
        "dup.toml",
        r#"
[package]
name = "dup"
version = "1.0"

[source]
url = "https://example.org/dup-1.0.tar.gz"
sha256 = "574ae7bef1863d31ae0e39dba4a968dcd18fd731bbd7fa5e7916eb8df427746a"

[[artifact]]
name = "tool"
kind = "executable"
command = "make"
output = "tool"
install_as = "tool"

[[artifact]]
name = "tool"
kind = "executable"
command = "make"
output = "tool2"
install_as = "tool2"
"#,
    );

    let output = ctx
        .kiln_cmd()
        .arg("check")
        .arg(&recipe)
        .output()
        .expect("failed to run kiln");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("duplicate artifact"), "stderr: {stderr}");
}

#[test]
fn test_hash_command() {
    let ctx = TestContext::new();
    let file = ctx.write("hello.txt", "hello\n");
    let output = ctx
        .kiln_cmd()
        .arg("hash")
        .arg(&file)
        .output()
        .expect("failed to run kiln");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03"));
}

#[test]
fn test_hash_missing_file_fails() {
    let ctx = TestContext::new();
    let output = ctx
        .kiln_cmd()
        .arg("hash")
        .arg(ctx.path().join("absent"))
        .output()
        .expect("failed to run kiln");
    assert!(!output.status.success());
}

#[cfg(unix)]
mod pipeline {
    use super::*;

    const TOOL: &str = r#"#!/bin/sh
if [ "$1" = "--help" ]; then echo "demo 2.1 usage"; exit 0; fi
exec sleep 30
"#;

    fn write_archive(path: &Path) -> String {
        let file = std::fs::File::create(path).unwrap();
        let enc = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(enc);
        let entries: &[(&str, &[u8], u32)] = &[
            ("demo-2.1/src/demo.sh", TOOL.as_bytes(), 0o755),
            ("demo-2.1/include/demo.h", b"#pragma once\n", 0o644),
        ];
        for (name, data, mode) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(*mode);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
        kiln_core::io::download::hash_file(path).unwrap()
    }

    fn recipe(ctx: &TestContext, sha256: &str) -> PathBuf {
        let archive = ctx.path().join("demo-2.1.tar.gz");
        ctx.write(
            "demo.toml",
            &format!(
                r#"
[package]
name = "demo"
version = "2.1"

[source]
url = "{}"
sha256 = "{sha256}"

[[artifact]]
name = "demo"
kind = "executable"
build_dir = "src"
command = "cp demo.sh demo-release"
output = "demo-release"
install_as = "demo"

[[artifact]]
name = "headers"
kind = "header-set"
output = "include"
install_as = "demo"

[smoke]
binary = "demo"
expect = "demo {{version}}"
settle_ms = 100
terminate_timeout_ms = 2000
"#,
                archive.display()
            ),
        )
    }

    #[test]
    fn test_run_json_report() {
        let ctx = TestContext::new();
        let sha = write_archive(&ctx.path().join("demo-2.1.tar.gz"));
        let recipe = recipe(&ctx, &sha);
        let prefix = ctx.path().join("prefix");

        let output = ctx
            .kiln_cmd()
            .args(["-q", "run", "--json", "--prefix"])
            .arg(&prefix)
            .arg(&recipe)
            .output()
            .expect("failed to run kiln");
        assert!(
            output.status.success(),
            "stderr: {}",
            String::from_utf8_lossy(&output.stderr)
        );

        let report: serde_json::Value =
            serde_json::from_slice(&output.stdout).expect("stdout is a JSON report");
        assert_eq!(report["package"], "demo");
        assert_eq!(report["source_sha256"], sha.as_str());
        assert_eq!(report["built"], serde_json::json!(["demo", "headers"]));
        assert_eq!(report["smoke"]["termination"], "graceful");

        assert!(prefix.join("bin/demo").is_file());
        assert!(prefix.join("include/demo/demo.h").is_file());
    }

    #[test]
    fn test_run_hash_mismatch_names_fetch_stage() {
        let ctx = TestContext::new();
        write_archive(&ctx.path().join("demo-2.1.tar.gz"));
        let recipe = recipe(&ctx, &"0".repeat(64));
        let prefix = ctx.path().join("prefix");

        let output = ctx
            .kiln_cmd()
            .args(["run", "--prefix"])
            .arg(&prefix)
            .arg(&recipe)
            .output()
            .expect("failed to run kiln");
        assert!(!output.status.success());
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("fetch stage failed"), "stderr: {stderr}");
        assert!(stderr.contains("integrity check failed"), "stderr: {stderr}");
        assert!(!prefix.exists());
    }

    #[test]
    fn test_fetch_then_build_and_smoke() {
        let ctx = TestContext::new();
        let sha = write_archive(&ctx.path().join("demo-2.1.tar.gz"));
        let recipe = recipe(&ctx, &sha);
        let prefix = ctx.path().join("prefix");

        let fetched = ctx
            .kiln_cmd()
            .arg("fetch")
            .arg(&recipe)
            .arg("--dest")
            .arg(ctx.path().join("src"))
            .output()
            .expect("failed to run kiln");
        assert!(fetched.status.success());
        let source = PathBuf::from(String::from_utf8_lossy(&fetched.stdout).trim());
        assert!(source.join("src/demo.sh").is_file());

        let built = ctx
            .kiln_cmd()
            .arg("build")
            .arg(&recipe)
            .arg("--source")
            .arg(&source)
            .arg("--prefix")
            .arg(&prefix)
            .output()
            .expect("failed to run kiln");
        assert!(
            built.status.success(),
            "stderr: {}",
            String::from_utf8_lossy(&built.stderr)
        );
        assert!(prefix.join("bin/demo").is_file());

        let smoked = ctx
            .kiln_cmd()
            .arg("smoke")
            .arg(&recipe)
            .arg("--prefix")
            .arg(&prefix)
            .output()
            .expect("failed to run kiln");
        assert!(
            smoked.status.success(),
            "stderr: {}",
            String::from_utf8_lossy(&smoked.stderr)
        );
    }
}
