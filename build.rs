//! Embeds the source revision as `GIT_HASH` for the startup banner.
//! Builds from a source tarball fall back to the package version.

use std::process::{Command, Output};

fn git(args: &[&str]) -> Option<Output> {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|out| out.status.success())
}

fn revision() -> Option<String> {
    let head = git(&["rev-parse", "--short=10", "HEAD"])?;
    let hash = String::from_utf8_lossy(&head.stdout).trim().to_string();
    if hash.is_empty() {
        return None;
    }
    let modified = git(&["status", "--porcelain", "--untracked-files=no"])
        .is_some_and(|status| !status.stdout.is_empty());
    Some(if modified { format!("{}+modified", hash) } else { hash })
}

fn main() {
    let version = revision()
        .unwrap_or_else(|| format!("v{}", std::env::var("CARGO_PKG_VERSION").unwrap_or_default()));
    println!("cargo:rustc-env=GIT_HASH={}", version);
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");
}
