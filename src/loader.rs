//! Document loading from a pruned working copy.
//!
//! Walks the tree, skipping dot-entries and dependency lockfiles, and reads
//! every remaining file as UTF-8 text. Files that fail to decode are
//! skipped and logged; partial success is the expected outcome for a
//! heterogeneous repository. Jupyter notebooks get cell-text extraction
//! instead of their raw JSON.

use std::path::Path;

use serde::Deserialize;
use walkdir::WalkDir;

/// A raw per-file document, prior to splitting.
#[derive(Debug, Clone)]
pub struct Document {
    pub relative_path: String,
    pub text: String,
}

const LOCKFILES: &[&str] = &[
    "package-lock.json",
    "Cargo.lock",
    "yarn.lock",
    "pnpm-lock.yaml",
    "poetry.lock",
    "Gemfile.lock",
    "composer.lock",
];

/// Load every text-like file under `repo_dir` as a [`Document`].
pub fn load_documents(repo_dir: &Path) -> Vec<Document> {
    let mut documents = Vec::new();

    for entry in WalkDir::new(repo_dir)
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();

        let name = entry.file_name().to_string_lossy();
        if LOCKFILES.contains(&name.as_ref()) {
            continue;
        }

        let relative = path
            .strip_prefix(repo_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string();

        let text = match std::fs::read_to_string(path) {
            Ok(raw) => {
                if path.extension().is_some_and(|e| e == "ipynb") {
                    match extract_notebook_cells(&raw) {
                        Some(cells) => cells,
                        None => {
                            tracing::debug!("Skipping {relative}: not a parseable notebook");
                            continue;
                        }
                    }
                } else {
                    raw
                }
            }
            Err(e) => {
                tracing::debug!("Skipping {relative}: {e}");
                continue;
            }
        };

        if text.trim().is_empty() {
            continue;
        }

        documents.push(Document {
            relative_path: relative,
            text,
        });
    }

    documents
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    // Root of the walk is exempt; everything else starting with '.' is skipped
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

#[derive(Deserialize)]
struct Notebook {
    cells: Vec<NotebookCell>,
}

#[derive(Deserialize)]
struct NotebookCell {
    #[serde(default)]
    source: CellSource,
}

/// Notebook cell sources are either one string or a list of line strings.
#[derive(Deserialize, Default)]
#[serde(untagged)]
enum CellSource {
    #[default]
    Empty,
    Joined(String),
    Lines(Vec<String>),
}

/// Pull the cell text (code and markdown alike) out of a notebook document.
fn extract_notebook_cells(raw: &str) -> Option<String> {
    let notebook: Notebook = serde_json::from_str(raw).ok()?;
    let mut out = String::new();
    for cell in notebook.cells {
        let text = match cell.source {
            CellSource::Empty => continue,
            CellSource::Joined(s) => s,
            CellSource::Lines(lines) => lines.concat(),
        };
        if text.trim().is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(&text);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loads_plain_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "# Title\n\nBody.").unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/main.rs"), "fn main() {}").unwrap();

        let mut docs = load_documents(dir.path());
        docs.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].relative_path, "a.md");
        assert_eq!(docs[1].relative_path, "src/main.rs");
    }

    #[test]
    fn test_skips_dot_entries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git/HEAD"), "ref: refs/heads/main").unwrap();
        std::fs::write(dir.path().join(".env"), "SECRET=1").unwrap();
        std::fs::write(dir.path().join("kept.txt"), "hello").unwrap();

        let docs = load_documents(dir.path());
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].relative_path, "kept.txt");
    }

    #[test]
    fn test_skips_lockfiles() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("package-lock.json"), "{}").unwrap();
        std::fs::write(dir.path().join("Cargo.lock"), "[[package]]").unwrap();
        std::fs::write(dir.path().join("index.js"), "console.log(1)").unwrap();

        let docs = load_documents(dir.path());
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].relative_path, "index.js");
    }

    #[test]
    fn test_skips_undecodable_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blob.bin"), [0xff, 0xfe, 0x00, 0x80]).unwrap();
        std::fs::write(dir.path().join("ok.txt"), "fine").unwrap();

        let docs = load_documents(dir.path());
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].relative_path, "ok.txt");
    }

    #[test]
    fn test_notebook_cell_extraction() {
        let notebook = r##"{
            "cells": [
                {"cell_type": "markdown", "source": ["# Intro\n", "Some prose.\n"]},
                {"cell_type": "code", "source": "print('hi')"},
                {"cell_type": "code", "source": []}
            ],
            "metadata": {"kernelspec": {"name": "python3"}},
            "nbformat": 4
        }"##;
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("nb.ipynb"), notebook).unwrap();

        let docs = load_documents(dir.path());
        assert_eq!(docs.len(), 1);
        let text = &docs[0].text;
        assert!(text.contains("# Intro"));
        assert!(text.contains("print('hi')"));
        assert!(!text.contains("kernelspec"));
    }

    #[test]
    fn test_malformed_notebook_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.ipynb"), "{not json").unwrap();
        let docs = load_documents(dir.path());
        assert!(docs.is_empty());
    }

    #[test]
    fn test_empty_files_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("empty.md"), "   \n").unwrap();
        assert!(load_documents(dir.path()).is_empty());
    }
}
