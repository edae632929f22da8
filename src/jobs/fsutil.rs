//! Filesystem helpers shared by the housekeeping jobs.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

/// Every regular file under `root`, recursively, in sorted order.
/// Symbolic links are neither followed nor listed.
pub fn list_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.with_context(|| format!("failed to read {}", root.display()))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Copies the tree under `source` into `target`, creating folders as needed.
/// Existing files are replaced only when `overwrite` is set. Symbolic links
/// are skipped.
pub fn copy_dir(source: &Path, target: &Path, overwrite: bool) -> Result<usize> {
    fs::create_dir_all(target).with_context(|| format!("failed to create {}", target.display()))?;
    let mut copied = 0;
    for entry in WalkDir::new(source).min_depth(1).follow_links(false) {
        let entry = entry.with_context(|| format!("failed to read {}", source.display()))?;
        let Ok(relative) = entry.path().strip_prefix(source) else {
            continue;
        };
        let dest = target.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest)
                .with_context(|| format!("failed to create {}", dest.display()))?;
        } else if entry.file_type().is_file() && (overwrite || !dest.exists()) {
            fs::copy(entry.path(), &dest).with_context(|| {
                format!("failed to copy {} to {}", entry.path().display(), dest.display())
            })?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Removes everything inside `dir` but keeps the folder itself.
pub fn clear_dir_contents(dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        }
        .with_context(|| format!("failed to remove {}", path.display()))?;
    }
    Ok(())
}

/// Moves a file, falling back to copy + delete across filesystems.
pub fn move_file(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    if fs::rename(from, to).is_err() {
        fs::copy(from, to)
            .with_context(|| format!("failed to move {} to {}", from.display(), to.display()))?;
        fs::remove_file(from)?;
    }
    Ok(())
}

/// Deepest folder containing every path in `paths`.
pub fn common_dir(paths: &[PathBuf]) -> Option<PathBuf> {
    let mut iter = paths.iter();
    let mut common = iter.next()?.parent()?.to_path_buf();
    for path in iter {
        while !path.starts_with(&common) {
            if !common.pop() {
                return None;
            }
        }
    }
    Some(common)
}

/// Normalises `png`, `.png` and `*.png` to `png`, lowercased.
/// `*` and `*.*` become the wildcard `*`.
pub fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim();
    if ext == "*" || ext == "*.*" {
        return "*".to_string();
    }
    ext.trim_start_matches('*')
        .trim_start_matches('.')
        .to_ascii_lowercase()
}

/// True when `path` matches one of the normalised `extensions`.
pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
    if extensions.iter().any(|e| e == "*") {
        return true;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
}
