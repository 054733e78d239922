//! Dependency scanner: enumerate candidate metadata files and flag every one
//! whose raw text contains the target field name.
//!
//! Matching at this stage is a literal, case-sensitive substring test, with no XML
//! or language awareness. Structural judgement happens later, per removal rule.

use anyhow::{Context, Result};
use glob::glob;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use walkdir::WalkDir;

use crate::rules::{DocumentType, SCAN_SUFFIXES};

/// Directories never worth descending into.
const SKIP_DIRS: &[&str] = &["node_modules", ".git", ".sfdx", ".localdevserver", "target"];

/// One discovered usage of the field in one file.
///
/// A scan's result list is owned by the caller and fully replaced by the next
/// scan; nothing is diffed or merged incrementally.
#[derive(Debug, Clone, Serialize)]
pub struct Dependency {
    pub path: PathBuf,
    pub file_name: String,
    pub doc_type: DocumentType,
    /// Location descriptors. Currently a single "found in file" marker; line
    /// and offset detail can slot in here without changing the shape.
    pub locations: Vec<String>,
}

/// Advisory cancellation flag, checked at file boundaries only. A file already
/// being processed completes before cancellation takes effect.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Scan the given roots for files whose text contains `field`.
///
/// Files are visited in whatever order enumeration yields: deterministic
/// within one run, not guaranteed stable across runs. Unreadable files are
/// reported and skipped; they never abort the scan. On cancellation the
/// partial result set accumulated so far is returned.
pub fn find_dependencies(
    paths: &[PathBuf],
    field: &str,
    exclude: &[String],
    token: &CancelToken,
) -> Result<Vec<Dependency>> {
    let files = collect_candidate_files(paths, exclude)?;
    let mut dependencies = Vec::new();

    for file in files {
        if token.is_cancelled() {
            return Ok(dependencies);
        }

        let text = match fs::read_to_string(&file) {
            Ok(text) => text,
            Err(e) => {
                eprintln!("⚠️  Skipping unreadable file {}: {}", file.display(), e);
                continue;
            }
        };

        if text.contains(field) {
            dependencies.push(Dependency {
                file_name: file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                doc_type: DocumentType::from_path(&file),
                locations: vec!["found in file".to_string()],
                path: file,
            });
        }
    }

    Ok(dependencies)
}

fn is_candidate(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    SCAN_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

fn is_skipped_dir(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|name| SKIP_DIRS.contains(&name))
            .unwrap_or(false)
}

/// Expand paths (files, directories, glob patterns) into the candidate file
/// list, honoring exclude patterns.
pub fn collect_candidate_files(paths: &[PathBuf], exclude: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        let path_str = path.to_string_lossy();

        if path_str.contains('*') || path_str.contains('?') || path_str.contains('[') {
            for entry in glob(&path_str).context("Failed to parse glob pattern")? {
                match entry {
                    Ok(file_path) => {
                        if file_path.is_file() && is_candidate(&file_path) {
                            files.push(file_path);
                        }
                    }
                    Err(e) => eprintln!("Warning: Error reading glob entry: {}", e),
                }
            }
        } else if path.is_file() {
            if is_candidate(path) {
                files.push(path.clone());
            }
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .into_iter()
                .filter_entry(|e| !is_skipped_dir(e))
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file() && is_candidate(e.path()))
            {
                files.push(entry.path().to_path_buf());
            }
        }
    }

    if !exclude.is_empty() {
        files.retain(|file| {
            let file_str = file.to_string_lossy();
            !exclude.iter().any(|pattern| {
                if pattern.contains('*') || pattern.contains('?') || pattern.contains('[') {
                    glob::Pattern::new(pattern)
                        .map(|p| p.matches(&file_str))
                        .unwrap_or(false)
                } else {
                    file_str.contains(pattern.as_str())
                }
            })
        });
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn finds_and_classifies_containing_files() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "Account.layout-meta.xml",
            "<Layout><layoutItems><field>Account.MyField__c</field></layoutItems></Layout>",
        );
        write(
            dir.path(),
            "Convert.flow-meta.xml",
            "<Flow><field>Account.MyField__c</field></Flow>",
        );
        write(dir.path(), "Service.cls", "public class Service {}");

        let deps = find_dependencies(
            &[dir.path().to_path_buf()],
            "Account.MyField__c",
            &[],
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(deps.len(), 2);
        let mut types: Vec<DocumentType> = deps.iter().map(|d| d.doc_type).collect();
        types.sort_by_key(|t| format!("{t}"));
        assert_eq!(types, [DocumentType::Flow, DocumentType::Layout]);
        assert!(deps.iter().all(|d| !d.locations.is_empty()));
    }

    #[test]
    fn ignores_unrecognized_suffixes_and_excluded_paths() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "notes.txt", "Account.MyField__c");
        write(dir.path(), "Service.cls", "x = Account.MyField__c;");
        write(dir.path(), "Skipped.cls", "x = Account.MyField__c;");

        let deps = find_dependencies(
            &[dir.path().to_path_buf()],
            "Account.MyField__c",
            &["Skipped".to_string()],
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].file_name, "Service.cls");
    }

    #[test]
    fn skips_dependency_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nm = dir.path().join("node_modules");
        fs::create_dir(&nm).unwrap();
        write(&nm, "vendored.js", "Account.MyField__c");
        write(dir.path(), "app.js", "Account.MyField__c");

        let deps = find_dependencies(
            &[dir.path().to_path_buf()],
            "Account.MyField__c",
            &[],
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].file_name, "app.js");
    }

    #[test]
    fn cancellation_returns_partial_results() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.cls", "Account.MyField__c");
        write(dir.path(), "b.cls", "Account.MyField__c");

        let token = CancelToken::new();
        token.cancel();
        let deps = find_dependencies(
            &[dir.path().to_path_buf()],
            "Account.MyField__c",
            &[],
            &token,
        )
        .unwrap();
        assert!(deps.is_empty());
    }

    #[test]
    fn substring_containment_is_literal() {
        let dir = tempfile::tempdir().unwrap();
        // Superstring at scan level still counts as textual containment; the
        // structural rules are what enforce exact matching later.
        write(dir.path(), "a.cls", "x = Account.MyField__c2;");
        let deps = find_dependencies(
            &[dir.path().to_path_buf()],
            "Account.MyField__c",
            &[],
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(deps.len(), 1);
    }
}
