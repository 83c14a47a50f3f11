//! Repository discovery and working-tree helpers. All commands resolve the
//! repository by walking upward from the current directory until the
//! metadata directory is seen.

use std::env;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::internal::errors::GyattError;

/// Name of the repository metadata directory.
pub const ROOT_DIR: &str = ".gyatt";
/// Name of the ignore file at the repository root.
pub const IGNORE_FILE: &str = ".gyattignore";

pub fn cur_dir() -> PathBuf {
    env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Walk upward from the current directory looking for the metadata dir.
pub fn try_get_storage_path() -> Result<PathBuf, GyattError> {
    let mut dir = env::current_dir()?;
    loop {
        let candidate = dir.join(ROOT_DIR);
        if candidate.is_dir() {
            return Ok(candidate);
        }
        if !dir.pop() {
            return Err(GyattError::NotARepository);
        }
    }
}

pub fn storage_path() -> Result<PathBuf, GyattError> {
    try_get_storage_path()
}

/// The repository root, parent of the metadata directory.
pub fn working_dir() -> Result<PathBuf, GyattError> {
    let storage = try_get_storage_path()?;
    storage
        .parent()
        .map(Path::to_path_buf)
        .ok_or(GyattError::NotARepository)
}

pub fn check_repo_exist() -> bool {
    try_get_storage_path().is_ok()
}

/// Convert an absolute path to a repository-root-relative POSIX-style path.
pub fn to_workdir_path(path: &Path) -> Result<PathBuf, GyattError> {
    let workdir = working_dir()?;
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cur_dir().join(path)
    };
    pathdiff::diff_paths(&absolute, &workdir)
        .filter(|rel| !rel.starts_with(".."))
        .ok_or(GyattError::PathOutsideRepo(path.to_path_buf()))
}

/// Render a relative path with forward slashes regardless of platform.
pub fn path_to_string(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Write a small state file atomically: temp file in the same directory,
/// then rename over the target. Refs, the index, and config all go through
/// this so no partial file is ever observable.
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<(), GyattError> {
    let parent = path
        .parent()
        .ok_or_else(|| GyattError::BadFormat(format!("path without parent: {}", path.display())))?;
    std::fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    use std::io::Write;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|e| GyattError::IoError(e.error))?;
    Ok(())
}

/// Lazily walk the working tree, yielding file paths relative to the root.
/// The metadata directory is skipped entirely; file symlinks are followed,
/// directory symlinks are not (cycle prevention). Ignore filtering is the
/// caller's concern.
pub fn list_workdir_files() -> Result<Vec<PathBuf>, GyattError> {
    let workdir = working_dir()?;
    let mut files = Vec::new();
    let walker = WalkDir::new(&workdir)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.file_name() != std::ffi::OsStr::new(ROOT_DIR));
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                tracing::warn!("skipping unreadable path: {err}");
                continue;
            }
        };
        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }
        if file_type.is_symlink() && !entry.path().is_file() {
            // dangling or directory symlink
            continue;
        }
        if let Some(rel) = pathdiff::diff_paths(entry.path(), &workdir) {
            files.push(rel);
        }
    }
    files.sort();
    Ok(files)
}
