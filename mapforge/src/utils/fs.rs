//! File system utilities
//!
//! Path-component sanitization for cache layouts and replace-on-write
//! publication of cache files.

use crate::error::{Error, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Sanitize a string to be safe for use as a filename or directory name
///
/// Replaces characters that are unsafe or problematic in filenames with underscores.
/// Preserves alphanumeric characters, hyphens, dots and underscores.
/// Collapses multiple consecutive underscores into one.
pub fn sanitize_filename(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut last_was_underscore = false;

    for c in input.chars() {
        if c.is_alphanumeric() || c == '-' || c == '.' {
            result.push(c);
            last_was_underscore = false;
        } else if !last_was_underscore {
            // '_' itself and every unsafe char collapse to a single underscore
            result.push('_');
            last_was_underscore = true;
        }
    }

    let trimmed = result.trim_matches('_');
    // "." and ".." would escape the cache layout
    if trimmed.is_empty() || trimmed.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Create a temp file next to `target`, so the final rename stays on one filesystem.
pub fn temp_file_beside(target: &Path) -> Result<NamedTempFile> {
    let dir = parent_dir(target);
    fs::create_dir_all(&dir).map_err(|source| Error::CacheWrite {
        path: target.to_path_buf(),
        source,
    })?;
    NamedTempFile::new_in(&dir).map_err(|source| Error::CacheWrite {
        path: target.to_path_buf(),
        source,
    })
}

/// Move a fully written temp file over `target`. Readers see either the old
/// file or the new one, never a partial write.
pub fn publish(tmp: NamedTempFile, target: &Path) -> Result<()> {
    tmp.persist(target).map_err(|e| Error::CacheWrite {
        path: target.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

/// Write `data` to `target` through a temp file and an atomic rename.
pub fn atomic_write(target: &Path, data: &[u8]) -> Result<()> {
    let mut tmp = temp_file_beside(target)?;
    tmp.write_all(data)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|source| Error::CacheWrite {
            path: target.to_path_buf(),
            source,
        })?;
    publish(tmp, target)
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
