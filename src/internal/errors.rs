//! Error taxonomy shared by the whole crate. Library APIs return these
//! structured values; only the CLI layer formats them for the user.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GyattError {
    #[error("not a gyatt repository (or any of the parent directories)")]
    NotARepository,

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("invalid hex object id: {0}")]
    BadHex(String),

    #[error("malformed {0}")]
    BadFormat(String),

    #[error("corrupt object {0}")]
    CorruptObject(String),

    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("nothing to commit")]
    NothingToCommit,

    #[error("no commits yet")]
    NoCommitsYet,

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("path is outside the repository: {0}")]
    PathOutsideRepo(PathBuf),

    #[error("cannot delete the currently checked out branch '{0}'")]
    CurrentBranch(String),

    #[error("your local changes would be overwritten; commit them or retry with --force")]
    UncommittedChanges,

    #[error("authentication required: set GITHUB_TOKEN or store a token in the repository")]
    AuthRequired,

    #[error("remote rejected {step} with status {status}: {body}")]
    RemoteError {
        step: &'static str,
        status: u16,
        body: String,
    },

    #[error("network error: {0}")]
    NetworkError(String),

    #[error("archive extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("ipfs daemon is not reachable")]
    IpfsOffline,

    #[error("ipfs error: {0}")]
    IpfsError(String),
}

impl GyattError {
    /// Process exit code for the CLI layer. Misuse (exit 2) is produced by
    /// clap itself before execution reaches a command.
    pub fn exit_code(&self) -> i32 {
        1
    }
}
