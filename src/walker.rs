use std::path::{Path, PathBuf};

use globset::{Glob, GlobMatcher};

use crate::error::{Error, Result};

/// File-name pattern the acquisition job writes: `<topic>_docs.json`.
pub const DEFAULT_PATTERN: &str = "*_docs.json";

/// A chunk-store file produced by the acquisition job.
#[derive(Debug, Clone)]
pub struct DocsFile {
    /// Path relative to the docs directory.
    pub relative_path: PathBuf,
    /// Fully resolved absolute path.
    pub absolute_path: PathBuf,
}

/// Compile a file-name glob such as `*_docs.json`.
pub fn compile_pattern(pattern: &str) -> Result<GlobMatcher> {
    Ok(Glob::new(pattern)
        .map_err(|e| Error::Config(format!("invalid glob pattern: {e}")))?
        .compile_matcher())
}

/// Recursively find docs files under `root` whose file name matches
/// `pattern`.
///
/// Hidden files and directories (names starting with `.`) are skipped.
/// Results are sorted by relative path so every rebuild sees the same
/// chunk order.
pub fn discover_docs_files(
    root: &Path,
    pattern: &GlobMatcher,
) -> Result<Vec<DocsFile>> {
    let canonical_root = root.canonicalize()?;
    let mut results = Vec::new();
    walk_dir(&canonical_root, &canonical_root, pattern, &mut results)?;
    results.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(results)
}

fn walk_dir(
    root: &Path,
    current: &Path,
    pattern: &GlobMatcher,
    results: &mut Vec<DocsFile>,
) -> Result<()> {
    for entry in std::fs::read_dir(current)? {
        let entry = entry?;
        let file_name = entry.file_name();
        if file_name.to_string_lossy().starts_with('.') {
            continue;
        }

        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            walk_dir(root, &entry.path(), pattern, results)?;
        } else if file_type.is_symlink() {
            // Only follow links to files; directory links could cycle.
            let Ok(resolved) = entry.path().canonicalize() else {
                continue;
            };
            if resolved.is_file() && pattern.is_match(&file_name) {
                results.push(docs_file(root, &entry.path(), resolved));
            }
        } else if file_type.is_file() && pattern.is_match(&file_name) {
            let absolute = entry.path().canonicalize()?;
            results.push(docs_file(root, &entry.path(), absolute));
        }
    }

    Ok(())
}

fn docs_file(root: &Path, original: &Path, absolute: PathBuf) -> DocsFile {
    DocsFile {
        relative_path: original
            .strip_prefix(root)
            .unwrap_or(original)
            .to_path_buf(),
        absolute_path: absolute,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(files: &[DocsFile]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.relative_path.to_string_lossy().to_string())
            .collect()
    }

    fn default_pattern() -> GlobMatcher {
        compile_pattern(DEFAULT_PATTERN).unwrap()
    }

    #[test]
    fn matches_docs_files_only() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("segment_docs.json"), "[]").unwrap();
        std::fs::write(tmp.path().join("lytics_docs.json"), "[]").unwrap();
        std::fs::write(tmp.path().join("notes.json"), "[]").unwrap();
        std::fs::write(tmp.path().join("readme.md"), "hi").unwrap();

        let files = discover_docs_files(tmp.path(), &default_pattern()).unwrap();
        assert_eq!(names(&files), vec!["lytics_docs.json", "segment_docs.json"]);
    }

    #[test]
    fn custom_pattern() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.json"), "[]").unwrap();
        std::fs::write(tmp.path().join("b_docs.json"), "[]").unwrap();

        let pattern = compile_pattern("*.json").unwrap();
        let files = discover_docs_files(tmp.path(), &pattern).unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn skips_hidden_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let hidden = tmp.path().join(".cache");
        std::fs::create_dir(&hidden).unwrap();
        std::fs::write(hidden.join("zeotap_docs.json"), "[]").unwrap();
        std::fs::write(tmp.path().join(".old_docs.json"), "[]").unwrap();
        std::fs::write(tmp.path().join("zeotap_docs.json"), "[]").unwrap();

        let files = discover_docs_files(tmp.path(), &default_pattern()).unwrap();
        assert_eq!(names(&files), vec!["zeotap_docs.json"]);
    }

    #[test]
    fn recurses_and_sorts() {
        let tmp = tempfile::tempdir().unwrap();
        let sub = tmp.path().join("2024");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("mparticle_docs.json"), "[]").unwrap();
        std::fs::write(tmp.path().join("segment_docs.json"), "[]").unwrap();

        let files = discover_docs_files(tmp.path(), &default_pattern()).unwrap();
        assert_eq!(
            names(&files),
            vec!["2024/mparticle_docs.json", "segment_docs.json"]
        );
    }

    #[test]
    fn invalid_pattern_is_config_error() {
        let err = compile_pattern("[").unwrap_err();
        assert!(err.to_string().contains("invalid glob pattern"));
    }

    #[test]
    fn empty_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let files = discover_docs_files(tmp.path(), &default_pattern()).unwrap();
        assert!(files.is_empty());
    }
}
