//! End-to-end pipeline tests over a synthetic repository working copy,
//! stopping short of the network (cloning, embedding APIs, and model calls
//! are covered by their own unit tests).

use std::fs;
use std::path::Path;

use repochat::config::Config;
use repochat::embedding::choose_embedding_provider;
use repochat::loader::load_documents;
use repochat::prune::prune;
use repochat::splitter::split_documents;

fn write_file(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// Build a small working copy resembling a freshly cloned repo.
fn synthetic_repo(root: &Path) {
    write_file(root, "a.md", "# Readme\n\nSome prose about the project.\n");
    write_file(root, "b.py", "print('hello')\n");
    write_file(root, "README.md", "top level readme\n");
    write_file(root, "src/lib.rs", &"fn work() {}\n".repeat(200));
    write_file(root, "src/__init__.py", "");
    write_file(root, "docs/guide.md", "## Guide\n\nUse it wisely.\n");
    write_file(root, ".git/config", "[core]\n");
    write_file(root, "package-lock.json", "{\"lockfileVersion\": 3}");
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.allowed_file_extensions = vec![".md".to_string(), ".rs".to_string()];
    config.blocked_file_paths = vec!["docs".to_string()];
    config.blocked_files = vec!["README.md".to_string(), "__init__.py".to_string()];
    config
}

#[test]
fn test_prune_then_load_produces_only_wanted_documents() {
    let dir = tempfile::tempdir().unwrap();
    synthetic_repo(dir.path());
    let config = test_config();

    prune(dir.path(), &config).unwrap();
    let docs = load_documents(dir.path());

    let paths: Vec<&str> = docs.iter().map(|d| d.relative_path.as_str()).collect();
    // Top-level extension filter removes b.py; blocked basenames and paths
    // are gone everywhere; hidden dirs and lockfiles are never loaded
    assert!(paths.contains(&"a.md"));
    assert!(paths.contains(&"src/lib.rs"));
    assert!(!paths.iter().any(|p| p.ends_with("b.py")));
    assert!(!paths.iter().any(|p| p.contains("README.md")));
    assert!(!paths.iter().any(|p| p.contains("__init__.py")));
    assert!(!paths.iter().any(|p| p.starts_with("docs")));
    assert!(!paths.iter().any(|p| p.contains(".git")));
    assert!(!paths.iter().any(|p| p.contains("package-lock")));
}

#[test]
fn test_prune_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    synthetic_repo(dir.path());
    let config = test_config();

    prune(dir.path(), &config).unwrap();
    let mut first: Vec<_> = load_documents(dir.path())
        .into_iter()
        .map(|d| d.relative_path)
        .collect();
    first.sort();

    prune(dir.path(), &config).unwrap();
    let mut second: Vec<_> = load_documents(dir.path())
        .into_iter()
        .map(|d| d.relative_path)
        .collect();
    second.sort();

    assert_eq!(first, second);
}

#[test]
fn test_pruned_repo_splits_into_bounded_overlapping_chunks() {
    let dir = tempfile::tempdir().unwrap();
    synthetic_repo(dir.path());
    let config = test_config();

    prune(dir.path(), &config).unwrap();
    let docs = load_documents(dir.path());
    let chunks = split_documents(&docs, 256, 32);

    assert!(!chunks.is_empty());
    for chunk in &chunks {
        assert!(chunk.text.chars().count() <= 256);
    }
    // src/lib.rs is long enough to split; its consecutive chunks must share
    // exactly the configured overlap
    let lib_chunks: Vec<_> = chunks
        .iter()
        .filter(|c| c.relative_path.ends_with("lib.rs"))
        .collect();
    assert!(lib_chunks.len() > 1);
    for pair in lib_chunks.windows(2) {
        let tail: String = pair[0]
            .text
            .chars()
            .rev()
            .take(32)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        let head: String = pair[1].text.chars().take(32).collect();
        assert_eq!(tail, head);
    }
}

#[test]
fn test_ambiguous_embedding_config_blocks_the_pipeline_early() {
    let mut config = Config::default();
    config.models.embedding.clear();
    for name in ["huggingface", "ollama"] {
        config.models.embedding.insert(
            name.to_string(),
            repochat::config::EmbeddingProviderConfig {
                model: "m".to_string(),
                enabled: true,
                base_url: None,
                api_key: None,
            },
        );
    }

    // Selection fails before any store directory could be created
    let dir = tempfile::tempdir().unwrap();
    assert!(choose_embedding_provider(&config).is_err());
    assert!(fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[test]
fn test_chunk_ids_are_stable_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    synthetic_repo(dir.path());
    let config = test_config();
    prune(dir.path(), &config).unwrap();

    let docs = load_documents(dir.path());
    let a = split_documents(&docs, 256, 32);
    let b = split_documents(&docs, 256, 32);
    let ids_a: Vec<_> = a.iter().map(|c| c.id.as_str()).collect();
    let ids_b: Vec<_> = b.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids_a, ids_b);
}
