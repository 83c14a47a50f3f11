//! One module per CLI verb, each exposing a clap `Args` struct and an
//! `execute` entry point, plus small object helpers shared across commands.

pub mod add;
pub mod branch;
pub mod checkout;
pub mod clone;
pub mod commit;
pub mod diff;
pub mod init;
pub mod ipfs;
pub mod log;
pub mod push;
pub mod remote;
pub mod show;
pub mod status;

use std::path::Path;

use crate::internal::errors::GyattError;
use crate::internal::hash::ObjectHash;
use crate::utils::client_storage::ClientStorage;
use crate::utils::path;

/// Open the current repository's object store.
pub fn object_storage() -> Result<ClientStorage, GyattError> {
    ClientStorage::init(path::objects()?)
}

/// Blob id of a working-tree file, computed over the typed envelope so it is
/// directly comparable with stored blob ids.
pub fn calc_file_blob_hash(path: &Path) -> Result<ObjectHash, GyattError> {
    ObjectHash::from_file(path).map(|(id, _)| id)
}
