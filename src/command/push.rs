//! Update a remote with the current branch: the GitHub Git Data pipeline
//! (parallel blob batch → tree → commit → ref), the local filesystem copier,
//! or the P2P content store, selected by the remote's URL.

use std::str::FromStr;

use chrono::{FixedOffset, Offset, TimeZone, Utc};
use clap::Parser;
use colored::Colorize;

use crate::internal::branch::Branch;
use crate::internal::config::{Config, RemoteProtocol};
use crate::internal::errors::GyattError;
use crate::internal::hash::ObjectHash;
use crate::internal::head::Head;
use crate::internal::object::commit::Commit;
use crate::internal::object::signature::Signature;
use crate::internal::object::tree::{Tree, TreeItemMode};
use crate::internal::protocol::github::{
    CommitAuthor, CreateTreeEntry, GithubClient, SYSTEM_DENY_LIST,
};
use crate::internal::protocol::ipfs::IpfsStore;
use crate::internal::protocol::local_client;
use crate::utils::object_ext::{CommitExt, TreeExt};
use crate::utils::util;

#[derive(Parser, Debug, Default)]
pub struct PushArgs {
    /// Remote to push to (default: origin)
    pub repository: Option<String>,

    /// Branch to push (default: current branch)
    pub refspec: Option<String>,
}

pub async fn execute(args: PushArgs) -> Result<(), GyattError> {
    let branch = match args.refspec {
        Some(name) => name,
        None => Head::current_branch()?
            .ok_or_else(|| GyattError::BadFormat("push from a detached HEAD".to_string()))?,
    };
    let repository = args.repository.unwrap_or_else(|| "origin".to_string());
    let url = Config::remote_url(&repository)?
        .ok_or_else(|| GyattError::NotFound(format!("remote '{repository}'")))?;

    let local = Branch::find_branch(&branch, None)?
        .ok_or_else(|| GyattError::NotFound(format!("branch '{branch}'")))?;

    println!("pushing {branch}({}) to {repository}({url})", local.commit);

    if url.starts_with("ipfs://") || url == "ipfs" {
        return push_ipfs().await;
    }
    match RemoteProtocol::from_url(&url) {
        RemoteProtocol::Https => push_github(&url, &branch, &repository, &local).await,
        RemoteProtocol::Local => {
            let target = std::path::Path::new(url.strip_prefix("file://").unwrap_or(&url));
            local_client::push_local(target, &branch, &local.commit)?;
            Branch::update_branch(&branch, &local.commit, Some(&repository))?;
            println!("{}", "Push success".green());
            Ok(())
        }
        RemoteProtocol::Ssh | RemoteProtocol::Unknown => Err(GyattError::BadFormat(format!(
            "unsupported remote url '{url}'"
        ))),
    }
}

async fn push_ipfs() -> Result<(), GyattError> {
    let storage = crate::command::object_storage()?;
    let store = IpfsStore::open()?;
    let stats = store.push_all(&storage).await?;
    let manifest_cid = store.publish_manifest(&storage).await?;
    println!(
        "uploaded {} objects ({} already present, {} failed)",
        stats.uploaded, stats.cached, stats.failed
    );
    println!("manifest: {manifest_cid}");
    Ok(())
}

fn tree_entry_mode(mode: TreeItemMode) -> &'static str {
    match mode {
        TreeItemMode::BlobExecutable => "100755",
        _ => "100644",
    }
}

fn denied(path: &std::path::Path) -> bool {
    path.components().any(|c| {
        SYSTEM_DENY_LIST
            .iter()
            .any(|deny| c.as_os_str() == std::ffi::OsStr::new(deny))
    })
}

async fn push_github(
    url: &str,
    branch: &str,
    repository: &str,
    local: &Branch,
) -> Result<(), GyattError> {
    let client = GithubClient::from_url(url)?;
    let storage = crate::command::object_storage()?;

    let commit = Commit::load(&storage, &local.commit)?;
    let tree = Tree::load(&storage, &commit.tree_id)?;

    // the committed tree is pushed verbatim; only system cruft that should
    // never be in a tree at all is dropped
    let items: Vec<_> = tree
        .get_plain_items(&storage)?
        .into_iter()
        .filter(|(path, _, _)| !denied(path))
        .collect();

    // 1. ensure the remote repository exists
    if client.repo_info().await?.is_none() {
        println!("remote repository not found, creating {}", client.repo_name());
        client.create_repo().await?;
    }

    // 2. empty-repository fallback: seed the first file through the
    //    Contents API, which creates the initial commit
    if client.list_branches().await?.is_empty() {
        let Some((path, blob_id, _)) = items.first() else {
            return Err(GyattError::NothingToCommit);
        };
        let (data, _) = storage.get(blob_id)?;
        client
            .create_initial_file(
                &util::path_to_string(path),
                &data,
                commit.summary(),
                branch,
            )
            .await?;
        Branch::update_branch(branch, &local.commit, Some(repository))?;
        println!("{}", "Push success (bootstrap)".green());
        return Ok(());
    }

    // 3. remote ref state supplies the parent commit
    let remote_ref = client.get_ref(branch).await?;
    let parent_sha = remote_ref.as_ref().map(|r| r.object.sha.clone());

    // 4. parallel blob creation, outcomes in input order
    let mut contents = Vec::with_capacity(items.len());
    for (_, blob_id, _) in &items {
        let (data, _) = storage.get(blob_id)?;
        contents.push(data);
    }
    let outcomes = client.create_blobs(contents).await?;
    let mut blob_shas = Vec::with_capacity(items.len());
    let mut failed = 0usize;
    for ((path, _, _), outcome) in items.iter().zip(outcomes) {
        match outcome {
            Ok(sha) => blob_shas.push(sha),
            Err(err) => {
                eprintln!("warning: blob upload failed for {}: {err}", path.display());
                failed += 1;
            }
        }
    }
    if failed > 0 {
        return Err(GyattError::NetworkError(format!(
            "{failed} of {} blob uploads failed, aborting before tree creation",
            items.len()
        )));
    }

    // 5. tree creation on top of the parent commit's tree
    let base_tree = match &parent_sha {
        Some(sha) => Some(client.get_commit(sha).await?.tree.sha),
        None => None,
    };
    let entries = items
        .iter()
        .zip(&blob_shas)
        .map(|((path, _, mode), sha)| CreateTreeEntry {
            path: util::path_to_string(path),
            mode: tree_entry_mode(*mode).to_string(),
            entry_type: "blob".to_string(),
            sha: sha.clone(),
        })
        .collect();
    let tree_sha = client.create_tree(entries, base_tree).await?;

    // 6. commit creation, carrying both recorded identities so the remote
    //    rebuilds the same commit object
    let commit_sha = client
        .create_commit(
            &commit.message,
            &tree_sha,
            parent_sha.clone().into_iter().collect(),
            signature_payload(&commit.author),
            signature_payload(&commit.committer),
        )
        .await?;

    // 7. ref update
    client
        .update_ref(branch, &commit_sha, remote_ref.is_some())
        .await?;

    // the remote-tracking ref records what the server actually created; a
    // divergence from the local commit id means the remote rebuilt a
    // different commit object and must not pass silently
    let remote_commit = ObjectHash::from_str(&commit_sha)
        .map_err(|_| GyattError::BadFormat(format!("remote commit sha '{commit_sha}'")))?;
    Branch::update_branch(branch, &remote_commit, Some(repository))?;
    if remote_commit != local.commit {
        return Err(GyattError::HashMismatch {
            expected: local.commit.to_string(),
            actual: commit_sha,
        });
    }
    println!("{}", "Push success".green());
    Ok(())
}

/// ISO-8601 rendering of a recorded identity, keeping its timezone offset.
fn signature_payload(sig: &Signature) -> CommitAuthor {
    let offset = FixedOffset::east_opt(sig.tz_offset_minutes() * 60).unwrap_or_else(|| Utc.fix());
    let date = offset
        .timestamp_opt(sig.timestamp as i64, 0)
        .single()
        .map(|t| t.format("%Y-%m-%dT%H:%M:%S%:z").to_string())
        .unwrap_or_default();
    CommitAuthor {
        name: sig.name.clone(),
        email: sig.email.clone(),
        date,
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn deny_list_blocks_system_paths() {
        assert!(denied(Path::new(".gyatt/index")));
        assert!(denied(Path::new("sub/.git/config")));
        assert!(denied(Path::new(".DS_Store")));
        assert!(!denied(Path::new("src/main.rs")));
    }

    #[test]
    fn modes_map_to_git_data_strings() {
        assert_eq!(tree_entry_mode(TreeItemMode::Blob), "100644");
        assert_eq!(tree_entry_mode(TreeItemMode::BlobExecutable), "100755");
    }

    #[test]
    fn signature_payload_keeps_recorded_offset() {
        use crate::internal::object::signature::SignatureType;

        let sig = Signature {
            signature_type: SignatureType::Author,
            name: "A U Thor".to_string(),
            email: "author@example.com".to_string(),
            timestamp: 1736000000,
            timezone: "+0130".to_string(),
        };
        // 1736000000 is 2025-01-04T14:13:20 UTC
        let payload = signature_payload(&sig);
        assert_eq!(payload.name, "A U Thor");
        assert_eq!(payload.date, "2025-01-04T15:43:20+01:30");

        let negative = Signature {
            timezone: "-0500".to_string(),
            ..sig
        };
        assert_eq!(
            signature_payload(&negative).date,
            "2025-01-04T09:13:20-05:00"
        );
    }
}
