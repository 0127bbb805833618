// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    // Re-run build script if git HEAD changes
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");
    println!("cargo::rerun-if-env-changed=CAMERA_SESSION_VERSION");

    // Packagers may pin the version string
    let version = if let Ok(v) = std::env::var("CAMERA_SESSION_VERSION") {
        v
    } else {
        describe_version().unwrap_or_else(env_version)
    };

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

fn env_version() -> String {
    std::env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "unknown".to_string())
}

/// `git describe` output normalised to "<tag>-<hash>" or "<tag>-dirty-<hash>"
fn describe_version() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--match", "v*"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }

    let described = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let described = described.strip_prefix('v').unwrap_or(&described).to_string();
    let hash = commit_hash()?;

    // A bare hash means no tag is reachable
    if described == hash {
        return Some(format!("{}-{}", env_version(), hash));
    }

    let parts: Vec<&str> = described.rsplitn(3, '-').collect();
    if parts.len() >= 3 {
        Some(format!("{}-dirty-{}", parts[2], hash))
    } else {
        Some(format!("{}-{}", described, hash))
    }
}

fn commit_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;

    if output.status.success() {
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        None
    }
}
