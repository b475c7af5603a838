use std::process::Command;

/// Short commit of the source tree, or `unknown` outside a git checkout.
/// Source tarballs can pin it with `TALLY_BUILD_COMMIT`.
fn commit_hash() -> String {
    if let Ok(pinned) = std::env::var("TALLY_BUILD_COMMIT") {
        if !pinned.trim().is_empty() {
            return pinned.trim().to_string();
        }
    }
    Command::new("git")
        .args(["rev-parse", "--short=7", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

fn main() {
    println!("cargo:rerun-if-env-changed=TALLY_BUILD_COMMIT");
    println!("cargo:rerun-if-changed=../../.git/HEAD");
    println!("cargo:rerun-if-changed=../../.git/refs/heads");

    // Both end up in `tally --version`
    println!("cargo:rustc-env=GIT_COMMIT_HASH={}", commit_hash());
    let target = std::env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=TARGET={target}");
}
