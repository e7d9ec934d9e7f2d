use std::path::{Path, PathBuf};
use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// HEAD plus the branch ref it points at, so new commits on the same branch
/// also trigger a rebuild
fn head_files(git_dir: &Path) -> Vec<PathBuf> {
    let head = git_dir.join("HEAD");
    let mut files = vec![head.clone()];

    if let Some(target) = std::fs::read_to_string(&head)
        .ok()
        .and_then(|s| s.strip_prefix("ref:").map(|r| r.trim().to_string()))
    {
        files.push(git_dir.join(target));
        // Branches whose loose ref was packed live here
        files.push(git_dir.join("packed-refs"));
    }

    // Missing paths would make cargo rerun the script on every build
    files.retain(|path| path.exists());
    files
}

fn main() {
    // Embed the commit so startup logs and `version` can report it
    let sha = git(&["rev-parse", "--short", "HEAD"]).unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=HPA_FLOOR_GUARD_GIT_SHA={sha}");

    println!("cargo:rerun-if-changed=build.rs");
    if let Some(git_dir) = git(&["rev-parse", "--git-dir"]) {
        for file in head_files(Path::new(&git_dir)) {
            println!("cargo:rerun-if-changed={}", file.display());
        }
    }
}
