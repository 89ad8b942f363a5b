//! Source discovery via glob expansion.

use glob::glob;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error during source discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// A source pattern is not valid glob syntax
    #[error("Invalid glob pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
    /// A matched path could not be read
    #[error("Failed to read matched path: {0}")]
    Io(#[from] std::io::Error),
}

/// Expand a stage's source patterns under the project root.
///
/// Returns project-relative file paths, deduplicated and sorted so runs are
/// deterministic regardless of filesystem enumeration order. Directories
/// matched by a pattern are skipped.
pub fn discover_sources(root: &Path, patterns: &[String]) -> Result<Vec<PathBuf>, DiscoveryError> {
    let mut found = BTreeSet::new();

    for pattern in patterns {
        let absolute = root.join(pattern);
        let pattern_str = absolute.to_string_lossy();

        let entries = glob(&pattern_str).map_err(|source| DiscoveryError::InvalidPattern {
            pattern: pattern.clone(),
            source,
        })?;

        for entry in entries {
            let path = match entry {
                Ok(p) => p,
                // Unreadable directory entries are skipped, not fatal
                Err(_) => continue,
            };
            if !path.is_file() {
                continue;
            }
            let rel = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
            found.insert(rel);
        }
    }

    Ok(found.into_iter().collect())
}

/// Modification time of a source file, relative to the project root.
pub fn source_mtime(root: &Path, rel: &Path) -> std::io::Result<std::time::SystemTime> {
    std::fs::metadata(root.join(rel))?.modified()
}

/// The literal directory prefix of a glob pattern.
///
/// `src/assets/img/src/**/*` yields `src/assets/img/src`; used both to
/// preserve source subtrees under a stage destination and to pick watch
/// roots for the filesystem watcher.
pub fn glob_base(pattern: &str) -> PathBuf {
    let mut base = PathBuf::new();
    for component in Path::new(pattern).components() {
        let s = component.as_os_str().to_string_lossy();
        if s.contains(['*', '?', '[', '{']) {
            break;
        }
        base.push(component);
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"x").unwrap();
    }

    #[test]
    fn test_discover_flat_pattern() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "src/pages/index.tera");
        touch(temp.path(), "src/pages/about.tera");
        touch(temp.path(), "src/pages/notes.txt");

        let sources =
            discover_sources(temp.path(), &["src/pages/*.tera".to_string()]).unwrap();
        assert_eq!(
            sources,
            vec![PathBuf::from("src/pages/about.tera"), PathBuf::from("src/pages/index.tera")]
        );
    }

    #[test]
    fn test_discover_recursive_pattern() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "src/assets/img/src/a.png");
        touch(temp.path(), "src/assets/img/src/nested/b.jpg");

        let sources =
            discover_sources(temp.path(), &["src/assets/img/src/**/*".to_string()]).unwrap();
        assert_eq!(sources.len(), 2);
        assert!(sources.contains(&PathBuf::from("src/assets/img/src/nested/b.jpg")));
    }

    #[test]
    fn test_discover_dedupes_overlapping_patterns() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "src/js/common.js");

        let sources = discover_sources(
            temp.path(),
            &["src/js/*.js".to_string(), "src/js/**/*.js".to_string()],
        )
        .unwrap();
        assert_eq!(sources, vec![PathBuf::from("src/js/common.js")]);
    }

    #[test]
    fn test_discover_skips_directories() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("src/fonts/subdir")).unwrap();
        touch(temp.path(), "src/fonts/a.woff2");

        let sources = discover_sources(temp.path(), &["src/fonts/*".to_string()]).unwrap();
        assert_eq!(sources, vec![PathBuf::from("src/fonts/a.woff2")]);
    }

    #[test]
    fn test_discover_empty_match_is_ok() {
        let temp = TempDir::new().unwrap();
        let sources = discover_sources(temp.path(), &["src/js/*.js".to_string()]).unwrap();
        assert!(sources.is_empty());
    }

    #[test]
    fn test_discover_invalid_pattern() {
        let temp = TempDir::new().unwrap();
        let result = discover_sources(temp.path(), &["src/[".to_string()]);
        assert!(matches!(result, Err(DiscoveryError::InvalidPattern { .. })));
    }

    #[test]
    fn test_glob_base() {
        assert_eq!(glob_base("src/assets/img/src/**/*"), PathBuf::from("src/assets/img/src"));
        assert_eq!(glob_base("src/pages/*.tera"), PathBuf::from("src/pages"));
        assert_eq!(glob_base("src/fonts"), PathBuf::from("src/fonts"));
        assert_eq!(glob_base("**/*"), PathBuf::new());
    }

    #[test]
    fn test_source_mtime() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "src/js/common.js");
        assert!(source_mtime(temp.path(), Path::new("src/js/common.js")).is_ok());
        assert!(source_mtime(temp.path(), Path::new("src/js/missing.js")).is_err());
    }
}
