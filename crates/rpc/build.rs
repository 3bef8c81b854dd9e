use std::env;
use std::process::Command;

const COMMIT_ENV_VARS: [&str; 2] = ["GIT_COMMIT_HASH", "GITHUB_SHA"];

fn main() {
    for var in COMMIT_ENV_VARS {
        println!("cargo:rerun-if-env-changed={var}");
    }
    println!("cargo:rerun-if-changed=../../.git/HEAD");

    if let Some(commit) = commit_from_env().or_else(commit_from_git) {
        println!("cargo:rustc-env=GIT_COMMIT_HASH={commit}");
    }
}

fn commit_from_env() -> Option<String> {
    COMMIT_ENV_VARS.iter().find_map(|var| {
        env::var(var)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

fn commit_from_git() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short=12", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let commit = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!commit.is_empty()).then_some(commit)
}
