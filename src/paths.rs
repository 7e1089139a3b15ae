//! Deterministic filesystem paths derived from the configured GitHub URL.
//!
//! Every path-dependent component calls these functions instead of caching
//! the result, so a config change takes effect on the next operation.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;

use crate::error::Error;

static GITHUB_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:www\.)?github\.com/([^/\s]+)/([^/\s]+?)(?:\.git)?/?$").unwrap()
});

/// Extract `(owner, repo)` from a GitHub URL.
///
/// Accepts only `https://github.com/<owner>/<repo>` (http and a `www.`
/// prefix tolerated) with an optional `.git` suffix or trailing slash.
/// The pattern is anchored: URLs that merely contain `github.com/...`
/// somewhere inside, or that carry extra path segments, are rejected.
pub fn parse_github_url(url: &str) -> Result<(String, String)> {
    let caps = GITHUB_URL_RE
        .captures(url.trim())
        .ok_or_else(|| Error::InvalidUrl(url.to_string()))?;
    Ok((caps[1].to_string(), caps[2].to_string()))
}

/// Working-copy directory for the configured repository.
pub fn repo_dir(data_dir: &Path, url: &str) -> Result<PathBuf> {
    let (owner, repo) = parse_github_url(url)?;
    Ok(data_dir.join(format!("repo_{owner}_{repo}")))
}

/// Vector-database directory for the configured repository.
pub fn database_dir(data_dir: &Path, url: &str) -> Result<PathBuf> {
    let (owner, repo) = parse_github_url(url)?;
    Ok(data_dir.join(format!("database_{owner}_{repo}")))
}
