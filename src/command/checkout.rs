//! Switch HEAD to another branch and rewrite the working tree from the
//! target commit's tree.

use std::collections::HashMap;
use std::path::PathBuf;

use clap::Parser;

use crate::command::status;
use crate::internal::branch::Branch;
use crate::internal::errors::GyattError;
use crate::internal::hash::ObjectHash;
use crate::internal::head::Head;
use crate::internal::index::Index;
use crate::internal::object::blob::Blob;
use crate::internal::object::commit::Commit;
use crate::internal::object::tree::{Tree, TreeItemMode};
use crate::utils::object_ext::{BlobExt, CommitExt, TreeExt};
use crate::utils::{path, util};

#[derive(Parser, Debug, Default)]
pub struct CheckoutArgs {
    /// Branch to switch to
    pub branch: String,

    /// Discard local modifications instead of refusing
    #[arg(short, long)]
    pub force: bool,
}

pub async fn execute(args: CheckoutArgs) -> Result<(), GyattError> {
    let target = Branch::find_branch(&args.branch, None)?
        .ok_or_else(|| GyattError::NotFound(format!("branch '{}'", args.branch)))?;

    if Head::current_branch()?.as_deref() == Some(args.branch.as_str()) {
        println!("Already on '{}'", args.branch);
        return Ok(());
    }

    if !args.force && !status::is_clean()? {
        return Err(GyattError::UncommittedChanges);
    }

    restore_worktree(&target.commit)?;
    Head::update(Head::Branch(args.branch.clone()))?;

    let index_path = path::index()?;
    let mut index = Index::load(&index_path)?;
    index.clear();
    index.save(&index_path)?;

    println!("Switched to branch '{}'", args.branch);
    Ok(())
}

/// Replace tracked working-tree content with the target commit's tree:
/// files tracked now but absent from the target are removed, everything in
/// the target is written out. Untracked files are left alone.
fn restore_worktree(target_commit: &ObjectHash) -> Result<(), GyattError> {
    let storage = crate::command::object_storage()?;
    let workdir = util::working_dir()?;

    let index = Index::load(path::index()?)?;
    let current: HashMap<PathBuf, (ObjectHash, TreeItemMode)> =
        status::tracked_snapshot(&index)?.into_iter().collect();

    let commit = Commit::load(&storage, target_commit)?;
    let tree = Tree::load(&storage, &commit.tree_id)?;
    let target: HashMap<PathBuf, (ObjectHash, TreeItemMode)> = tree
        .get_plain_items(&storage)?
        .into_iter()
        .map(|(p, id, mode)| (p, (id, mode)))
        .collect();

    for file in current.keys() {
        if !target.contains_key(file) {
            if let Err(err) = std::fs::remove_file(workdir.join(file)) {
                tracing::warn!("cannot remove {}: {err}", file.display());
            }
        }
    }

    for (file, (id, mode)) in &target {
        let abs = workdir.join(file);
        if let Some(parent) = abs.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let blob = Blob::load(&storage, id)?;
        std::fs::write(&abs, &blob.data)?;
        #[cfg(unix)]
        if *mode == TreeItemMode::BlobExecutable {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&abs, std::fs::Permissions::from_mode(0o755))?;
        }
        #[cfg(not(unix))]
        let _ = mode;
    }
    Ok(())
}
