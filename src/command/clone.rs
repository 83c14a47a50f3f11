//! Clone a repository: another on-disk repository is copied file by file;
//! a forge URL is bootstrapped from a downloaded branch archive.

use std::io::Read;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use clap::Parser;
use flate2::read::GzDecoder;

use crate::command::add::{self, AddArgs};
use crate::command::commit::{self, CommitArgs};
use crate::command::init;
use crate::internal::config::Config;
use crate::internal::errors::GyattError;
use crate::internal::protocol::github::GithubClient;
use crate::internal::protocol::local_client;
use crate::utils::util;

/// Branch names tried for the archive download when the default branch's
/// archive is unavailable.
const FALLBACK_BRANCHES: &[&str] = &["main", "master", "trunk", "develop"];

#[derive(Parser, Debug, Default)]
pub struct CloneArgs {
    /// Source: a local repository path or a forge URL
    pub remote_repo: String,

    /// Target directory (defaults to the repository name)
    pub local_path: Option<String>,
}

pub async fn execute(args: CloneArgs) -> Result<(), GyattError> {
    let target = match &args.local_path {
        Some(dir) => PathBuf::from(dir),
        None => PathBuf::from(derive_dir_name(&args.remote_repo)),
    };

    let source = Path::new(&args.remote_repo);
    if source.join(util::ROOT_DIR).is_dir() {
        println!(
            "Cloning local repository '{}' into '{}'",
            args.remote_repo,
            target.display()
        );
        local_client::clone_local(source, &target)?;
        let source_abs = source
            .canonicalize()
            .unwrap_or_else(|_| source.to_path_buf());
        with_dir(&target, || {
            Config::add_remote("origin", &source_abs.to_string_lossy())
        })?;
        return Ok(());
    }

    clone_forge(&args.remote_repo, &target).await
}

/// Name of the target directory derived from the source: last path segment,
/// `.git` suffix stripped.
fn derive_dir_name(source: &str) -> String {
    let trimmed = source.trim_end_matches('/');
    let last = trimmed
        .rsplit(['/', ':'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("repository");
    last.strip_suffix(".git").unwrap_or(last).to_string()
}

/// Run `f` with the working directory switched to `dir`, restoring after.
fn with_dir<T>(
    dir: &Path,
    f: impl FnOnce() -> Result<T, GyattError>,
) -> Result<T, GyattError> {
    let previous = util::cur_dir();
    std::env::set_current_dir(dir)?;
    let result = f();
    std::env::set_current_dir(previous)?;
    result
}

async fn clone_forge(url: &str, target: &Path) -> Result<(), GyattError> {
    if target.exists() && std::fs::read_dir(target)?.next().is_some() {
        return Err(GyattError::AlreadyExists(format!(
            "target directory '{}'",
            target.display()
        )));
    }

    let client = GithubClient::from_url(url)?;
    let info = client
        .repo_info()
        .await?
        .ok_or_else(|| GyattError::NotFound(format!("repository '{}'", client.repo_name())))?;

    // the default branch first, then common names, then whatever exists
    let mut candidates = vec![info.default_branch.clone()];
    candidates.extend(FALLBACK_BRANCHES.iter().map(|s| s.to_string()));
    for branch in client.list_branches().await.unwrap_or_default() {
        candidates.push(branch.name);
    }
    candidates.dedup();

    let mut archive = None;
    for candidate in &candidates {
        if let Some(bytes) = client.download_tarball(candidate).await? {
            println!("Downloading {} ({candidate})", client.repo_name());
            archive = Some(bytes);
            break;
        }
    }
    let archive = archive.ok_or_else(|| {
        GyattError::NotFound(format!(
            "downloadable archive for '{}'",
            client.repo_name()
        ))
    })?;

    extract_tarball(&archive, target)?;
    init::init_repo(target)?;

    // stage everything extracted and record one synthetic commit
    let previous = util::cur_dir();
    std::env::set_current_dir(target)?;
    let bootstrap = async {
        add::execute(AddArgs {
            all: true,
            ..Default::default()
        })
        .await?;
        commit::execute(CommitArgs {
            message: format!("Clone of {}", client.repo_name()),
            allow_empty: true,
        })
        .await?;
        Config::add_remote("origin", url)
    }
    .await;
    std::env::set_current_dir(previous)?;
    bootstrap?;

    println!("Cloned into '{}'", target.display());
    Ok(())
}

/// Unpack a gzip-compressed tar archive, stripping the single top-level
/// directory component the forge wraps the tree in.
fn extract_tarball(bytes: &Bytes, target: &Path) -> Result<(), GyattError> {
    let decoder = GzDecoder::new(&bytes[..]);
    let mut archive = tar::Archive::new(decoder);
    let entries = archive
        .entries()
        .map_err(|e| GyattError::ExtractionFailed(e.to_string()))?;

    std::fs::create_dir_all(target)?;
    for entry in entries {
        let mut entry = entry.map_err(|e| GyattError::ExtractionFailed(e.to_string()))?;
        let path = entry
            .path()
            .map_err(|e| GyattError::ExtractionFailed(e.to_string()))?
            .into_owned();
        let stripped: PathBuf = path.components().skip(1).collect();
        if stripped.as_os_str().is_empty() {
            continue;
        }
        let dest = target.join(&stripped);
        if entry.header().entry_type().is_dir() {
            std::fs::create_dir_all(&dest)?;
            continue;
        }
        if !entry.header().entry_type().is_file() {
            continue;
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut content = Vec::new();
        entry
            .read_to_end(&mut content)
            .map_err(|e| GyattError::ExtractionFailed(e.to_string()))?;
        std::fs::write(&dest, content)?;
    }
    Ok(())
}
