//! Thin wrappers around the `git` binary used by the diff report.

use std::path::Path;
use std::process::Command;

use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};

fn git(repo: &Path, args: &[&str]) -> Result<std::process::Output> {
    Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        .output()
        .map_err(|e| SyncError::Git(format!("failed to launch git: {e}")))
}

/// JSON files under `models_dir` that changed relative to `base`, as paths
/// relative to `repo` (which may be a subdirectory of the work tree).
///
/// Tries `base...HEAD`, then `base HEAD`, then `HEAD~1 HEAD`; the first
/// strategy that yields files wins. An empty result is not an error.
pub fn changed_model_files(repo: &Path, base: &str, models_dir: &str) -> Result<Vec<String>> {
    let dir = models_dir.trim_end_matches('/');
    let pathspec = format!("{dir}/*.json");
    let merge_base = format!("{base}...HEAD");
    let strategies: [Vec<&str>; 3] = [
        vec!["diff", "--relative", "--name-only", merge_base.as_str(), "--", pathspec.as_str()],
        vec!["diff", "--relative", "--name-only", base, "HEAD", "--", pathspec.as_str()],
        vec!["diff", "--relative", "--name-only", "HEAD~1", "HEAD", "--", pathspec.as_str()],
    ];

    for args in &strategies {
        let output = git(repo, args)?;
        if !output.status.success() {
            debug!(
                args = ?args,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "git diff strategy failed, trying next"
            );
            continue;
        }
        let mut files: Vec<String> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && l.ends_with(".json"))
            .map(str::to_string)
            .collect();
        if !files.is_empty() {
            files.sort();
            files.dedup();
            info!(args = ?args, count = files.len(), "Found changed data model files");
            return Ok(files);
        }
    }

    warn!(base, "No changed data model files found by any git diff strategy");
    Ok(Vec::new())
}

/// Contents of `file` at `reference`, or `None` when it did not exist there.
pub fn file_at_ref(repo: &Path, file: &str, reference: &str) -> Result<Option<String>> {
    let spec = format!("{reference}:./{file}");
    let output = git(repo, &["show", spec.as_str()])?;
    if output.status.success() {
        Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()))
    } else {
        debug!(
            file,
            reference,
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "File not present at reference"
        );
        Ok(None)
    }
}
