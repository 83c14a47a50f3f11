//! Path builders for repository storage locations relative to the metadata
//! directory.

use std::path::PathBuf;

use crate::internal::errors::GyattError;
use crate::utils::util;

pub fn index() -> Result<PathBuf, GyattError> {
    Ok(util::storage_path()?.join("index"))
}

pub fn objects() -> Result<PathBuf, GyattError> {
    Ok(util::storage_path()?.join("objects"))
}

pub fn refs_heads() -> Result<PathBuf, GyattError> {
    Ok(util::storage_path()?.join("refs").join("heads"))
}

pub fn refs_remotes(remote: &str) -> Result<PathBuf, GyattError> {
    Ok(util::storage_path()?
        .join("refs")
        .join("remotes")
        .join(remote))
}

pub fn head() -> Result<PathBuf, GyattError> {
    Ok(util::storage_path()?.join("HEAD"))
}

pub fn config() -> Result<PathBuf, GyattError> {
    Ok(util::storage_path()?.join("config"))
}

pub fn ipfs_refs() -> Result<PathBuf, GyattError> {
    Ok(util::storage_path()?.join("ipfs-refs"))
}

pub fn github_token() -> Result<PathBuf, GyattError> {
    Ok(util::storage_path()?.join("github_token"))
}
