//! Eval case loader (spec §6): discovers files under `testDir` matching
//! `testMatch` glob patterns and parses each against the discriminated
//! case schema (§3). A single file's parse failure is skipped with a
//! warning; the caller decides whether an empty result is itself an
//! error. Composition via `EvalSuite.testFiles` is resolved relative to
//! the referencing file's own directory.
//!
//! Grounded on `adk_eval::schema::{TestFile::load, EvalSet::load}`'s
//! load-then-parse shape (see DESIGN.md); `glob` is used for the
//! `testMatch` pattern matching since no glob precedent exists elsewhere
//! in the corpus.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{EvalError, Result};
use crate::schema::{EvalCase, EvalSuite};

/// One parsed case plus the file it came from, for diagnostics.
#[derive(Debug, Clone)]
pub struct LoadedCase {
    pub case: EvalCase,
    pub source_file: PathBuf,
}

/// Discovers every file under `test_dir` matching any of `patterns`
/// (spec §6 default `["**/*.eval.json"]`), sorted for deterministic load
/// order. A pattern that fails to compile is skipped with a warning
/// rather than aborting discovery.
pub fn discover_files(test_dir: &Path, patterns: &[String]) -> Vec<PathBuf> {
    let mut found: HashSet<PathBuf> = HashSet::new();
    for pattern in patterns {
        let full_pattern = test_dir.join(pattern);
        let Some(pattern_str) = full_pattern.to_str() else { continue };
        let paths = match glob::glob(pattern_str) {
            Ok(paths) => paths,
            Err(e) => {
                tracing::warn!(pattern = %pattern, error = %e, "invalid testMatch pattern, skipping");
                continue;
            }
        };
        for entry in paths.filter_map(std::result::Result::ok) {
            if entry.is_file() {
                found.insert(entry);
            }
        }
    }
    let mut files: Vec<PathBuf> = found.into_iter().collect();
    files.sort();
    files
}

/// Loads and parses every discovered case file under `test_dir` (spec
/// §6). Each file's parse error is logged and that file is skipped; the
/// directory walk itself (`discover_files`) never fails per spec §7
/// ("Loader errors on a single file skip that file; loader errors on the
/// directory abort the run" — glob compilation errors are the only
/// directory-level failure mode, and are themselves per-pattern, not
/// fatal, so this function never returns `Err`).
pub fn load_cases(test_dir: &Path, patterns: &[String]) -> Vec<LoadedCase> {
    let mut loaded = Vec::new();
    for file in discover_files(test_dir, patterns) {
        match load_file(&file) {
            Ok(cases) => {
                for case in cases {
                    loaded.push(LoadedCase { case, source_file: file.clone() });
                }
            }
            Err(e) => {
                tracing::warn!(file = %file.display(), error = %e, "failed to parse eval case file, skipping");
            }
        }
    }
    loaded
}

/// Parses a single file: first as a bare `EvalCase`, then as an
/// `EvalSuite` (which may itself reference other files via `testFiles`,
/// resolved relative to this file's directory).
fn load_file(path: &Path) -> Result<Vec<EvalCase>> {
    let content = std::fs::read_to_string(path)?;

    if let Ok(case) = serde_json::from_str::<EvalCase>(&content) {
        return Ok(vec![case]);
    }

    let suite: EvalSuite = serde_json::from_str(&content).map_err(|e| EvalError::LoadError {
        path: path.to_path_buf(),
        source: Box::new(EvalError::ParseError(e.to_string())),
    })?;

    let mut cases = suite.cases;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    for referenced in &suite.test_files {
        let referenced_path = base_dir.join(referenced);
        match load_file(&referenced_path) {
            Ok(nested) => cases.extend(nested),
            Err(e) => tracing::warn!(
                file = %referenced_path.display(),
                error = %e,
                "failed to load referenced test file, skipping"
            ),
        }
    }
    Ok(cases)
}

/// Scans `rubrics_dir` (non-recursive) for `.md` files, returning each
/// one's filename-without-extension as a judge id (spec §4.2: "id =
/// filename without extension"). A missing directory yields no ids.
pub fn discover_rubric_ids(rubrics_dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(rubrics_dir) else {
        return Vec::new();
    };
    let mut ids: Vec<String> = entries
        .filter_map(std::result::Result::ok)
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "md"))
        .filter_map(|e| e.path().file_stem().map(|s| s.to_string_lossy().into_owned()))
        .collect();
    ids.sort();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn discovers_files_matching_default_pattern() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.eval.json", "{}");
        write(dir.path(), "nested/b.eval.json", "{}");
        write(dir.path(), "c.txt", "{}");

        let files = discover_files(dir.path(), &["**/*.eval.json".to_string()]);
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn loads_bare_case_file() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "b1.eval.json",
            r#"{"category":"basic","id":"b1","name":"n","prompt":"hi","judges":[]}"#,
        );

        let loaded = load_cases(dir.path(), &["**/*.eval.json".to_string()]);
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].case.id(), "b1");
    }

    #[test]
    fn loads_suite_file_with_multiple_cases() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "suite.eval.json",
            r#"{"name":"suite","cases":[
                {"category":"basic","id":"b1","name":"n","prompt":"hi","judges":[]},
                {"category":"basic","id":"b2","name":"n2","prompt":"yo","judges":[]}
            ]}"#,
        );

        let loaded = load_cases(dir.path(), &["**/*.eval.json".to_string()]);
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn suite_resolves_referenced_test_files_relative_to_itself() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "child.eval.json",
            r#"{"category":"basic","id":"child1","name":"n","prompt":"hi","judges":[]}"#,
        );
        write(
            dir.path(),
            "parent.eval.json",
            r#"{"name":"parent","testFiles":["child.eval.json"]}"#,
        );

        let loaded = load_cases(dir.path(), &["parent.eval.json".to_string()]);
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].case.id(), "child1");
    }

    #[test]
    fn malformed_file_is_skipped_not_fatal() {
        let dir = tempdir().unwrap();
        write(dir.path(), "broken.eval.json", "{not valid json");
        write(
            dir.path(),
            "ok.eval.json",
            r#"{"category":"basic","id":"ok1","name":"n","prompt":"hi","judges":[]}"#,
        );

        let loaded = load_cases(dir.path(), &["**/*.eval.json".to_string()]);
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].case.id(), "ok1");
    }

    #[test]
    fn discover_rubric_ids_strips_extension() {
        let dir = tempdir().unwrap();
        write(dir.path(), "clarity.md", "rubric");
        write(dir.path(), "correctness.md", "rubric");
        write(dir.path(), "README.txt", "not a rubric");

        let mut ids = discover_rubric_ids(dir.path());
        ids.sort();
        assert_eq!(ids, vec!["clarity".to_string(), "correctness".to_string()]);
    }

    #[test]
    fn missing_rubrics_dir_yields_empty() {
        assert!(discover_rubric_ids(Path::new("/nonexistent/rubrics")).is_empty());
    }
}
