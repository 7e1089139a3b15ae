//! Post-clone pruning of the working copy.
//!
//! Three independent passes: blocked paths (recursive), disallowed
//! extensions (top level only), blocked basenames (recursive). A missing
//! target is logged and skipped; pruning never fails the ingestion.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Result;
use walkdir::WalkDir;

use crate::config::Config;

/// Prune the working copy according to the configured block/allow lists.
///
/// Blocked paths go first so the extension pass does not touch files inside
/// directories that are about to disappear anyway.
pub fn prune(repo_dir: &Path, config: &Config) -> Result<()> {
    remove_blocked_paths(repo_dir, &config.blocked_file_paths);
    remove_disallowed_extensions(repo_dir, &config.allowed_file_extensions)?;
    remove_blocked_files(repo_dir, &config.blocked_files);
    Ok(())
}

fn remove_blocked_paths(repo_dir: &Path, blocked_paths: &[String]) {
    for rel in blocked_paths {
        let target = repo_dir.join(rel);
        let result = if target.is_dir() {
            std::fs::remove_dir_all(&target)
        } else {
            std::fs::remove_file(&target)
        };
        match result {
            Ok(()) => tracing::info!("Pruned blocked path {rel}"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Blocked path {rel} not present");
            }
            Err(e) => tracing::warn!("Could not prune {rel}: {e}"),
        }
    }
}

/// Delete top-level files whose extension is not allow-listed.
///
/// This pass is top-level only; recursive deletion is the job of the
/// blocked-path list. Files without any extension are left alone.
fn remove_disallowed_extensions(repo_dir: &Path, allowed: &[String]) -> Result<()> {
    let allowed: BTreeSet<&str> = allowed.iter().map(|s| s.as_str()).collect();

    let entries = match std::fs::read_dir(repo_dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Could not read {}: {e}", repo_dir.display());
            return Ok(());
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(ext) = path.extension() else {
            continue;
        };
        let dotted = format!(".{}", ext.to_string_lossy());
        if allowed.contains(dotted.as_str()) {
            continue;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => tracing::info!("Pruned {} (extension {dotted} not allowed)", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Could not prune {}: {e}", path.display()),
        }
    }
    Ok(())
}

fn remove_blocked_files(repo_dir: &Path, blocked_files: &[String]) {
    let blocked: BTreeSet<&str> = blocked_files.iter().map(|s| s.as_str()).collect();
    if blocked.is_empty() {
        return;
    }

    for entry in WalkDir::new(repo_dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !blocked.contains(name.as_ref()) {
            continue;
        }
        match std::fs::remove_file(entry.path()) {
            Ok(()) => tracing::info!("Pruned blocked file {}", entry.path().display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Could not prune {}: {e}", entry.path().display()),
        }
    }
}
