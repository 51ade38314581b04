//! Local filesystem pattern expansion used by local listings.
//!
//! # Examples
//!
//! ```no_run
//! use seqpack::io::glob::{expand_glob, list_dir_files};
//!
//! // All netCDF files in a directory
//! let files = expand_glob("/data/in/*.nc")?;
//!
//! // Every regular file directly under a directory
//! let all = list_dir_files(std::path::Path::new("/data/in"))?;
//! # Ok::<(), seqpack::error::SeqError>(())
//! ```

use crate::error::{ErrorKind, Result, ResultExt, from_io};
use glob::{Pattern, glob};
use std::path::{Path, PathBuf};

/// Expand a glob pattern into a sorted vector of matching file paths.
///
/// Supports standard glob patterns:
/// - `*` matches any sequence of characters within a path component
/// - `?` matches any single character
/// - `**` matches zero or more directories
/// - `[abc]` matches any character in the set
///
/// Directories are never returned. No matches is an empty vector, not an error.
///
/// # Errors
///
/// Returns `InvalidUri` if the pattern is invalid, `Transport` on I/O errors
/// while walking the filesystem
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let paths = glob(pattern)
        .context_kind(ErrorKind::InvalidUri, || format!("invalid glob pattern: {pattern}"))?;

    let mut result = Vec::new();
    for entry in paths {
        let path = entry.context_kind(ErrorKind::Transport, || {
            format!("error reading glob entry for pattern: {pattern}")
        })?;
        if path.is_file() {
            result.push(path);
        }
    }

    result.sort();
    Ok(result)
}

/// Regular files directly inside `dir`, sorted. A path naming a file lists itself.
///
/// # Errors
///
/// Returns `SourceNotFound` if `dir` does not exist, otherwise as [`expand_glob`]
pub fn list_dir_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let metadata = std::fs::metadata(dir).map_err(|e| from_io(&e, &dir.display().to_string()))?;
    if metadata.is_file() {
        return Ok(vec![dir.to_path_buf()]);
    }

    let escaped = Pattern::escape(&dir.to_string_lossy());
    let pattern = format!("{}/*", escaped.trim_end_matches('/'));
    expand_glob(&pattern)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn lists_files_only_and_sorted() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("b.txt"), b"b").unwrap();
        fs::write(tmp.path().join("a.nc"), b"a").unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("sub").join("c.txt"), b"c").unwrap();

        let files = list_dir_files(tmp.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.nc", "b.txt"]);
    }

    #[test]
    fn glob_metacharacters_in_directory_names_are_literal() {
        let tmp = TempDir::new().unwrap();
        let odd = tmp.path().join("[x]");
        fs::create_dir(&odd).unwrap();
        fs::write(odd.join("f.txt"), b"f").unwrap();
        assert_eq!(list_dir_files(&odd).unwrap(), vec![odd.join("f.txt")]);
    }

    #[test]
    fn missing_directory_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = list_dir_files(&tmp.path().join("nope")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::SourceNotFound);
    }

    #[test]
    fn expand_glob_filters_directories() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("x.nc"), b"x").unwrap();
        fs::create_dir(tmp.path().join("y.nc")).unwrap();
        let pattern = format!("{}/*.nc", tmp.path().display());
        assert_eq!(expand_glob(&pattern).unwrap(), vec![tmp.path().join("x.nc")]);
    }
}
