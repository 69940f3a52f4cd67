//! Embeds the git revision for `folio --version`.
//!
//! `GIT_HASH` is the short commit hash (empty outside a checkout) and
//! `ON_RELEASE_TAG` is `true` when HEAD is exactly a tag.

use std::process::{Command, Output};

fn git(args: &[&str]) -> Option<Output> {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|o| o.status.success())
}

fn main() {
    for watched in [".git/HEAD", ".git/refs"] {
        println!("cargo:rerun-if-changed={watched}");
    }

    let hash = git(&["rev-parse", "--short", "HEAD"])
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .unwrap_or_default();
    let on_tag = git(&["describe", "--exact-match", "--tags", "HEAD"]).is_some();

    println!("cargo:rustc-env=GIT_HASH={hash}");
    println!("cargo:rustc-env=ON_RELEASE_TAG={on_tag}");
}
