//! Record staged changes: build the tree from the tracked snapshot, write
//! the commit object, advance the current branch ref (atomically, last),
//! then truncate the index.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Parser;

use crate::command::status;
use crate::internal::config::Config;
use crate::internal::errors::GyattError;
use crate::internal::hash::ObjectHash;
use crate::internal::head::Head;
use crate::internal::index::Index;
use crate::internal::object::commit::Commit;
use crate::internal::object::signature::{Signature, SignatureType};
use crate::internal::object::tree::{Tree, TreeItem, TreeItemMode};
use crate::utils::client_storage::ClientStorage;
use crate::utils::object_ext::{CommitExt, TreeExt};
use crate::utils::path;

pub const FALLBACK_NAME: &str = "gyatt-user";
pub const FALLBACK_EMAIL: &str = "gyatt@localhost";

#[derive(Parser, Debug, Default)]
pub struct CommitArgs {
    /// Commit message
    #[arg(short, long, required = true)]
    pub message: String,

    /// Allow recording a commit with an empty index
    #[arg(long)]
    pub allow_empty: bool,
}

pub async fn execute(args: CommitArgs) -> Result<(), GyattError> {
    let index_path = path::index()?;
    let mut index = Index::load(&index_path)?;
    if index.is_empty() && !args.allow_empty {
        return Err(GyattError::NothingToCommit);
    }

    let storage = crate::command::object_storage()?;
    let snapshot = status::tracked_snapshot(&index)?;
    let items: Vec<(PathBuf, ObjectHash, TreeItemMode)> = snapshot
        .into_iter()
        .map(|(path, (hash, mode))| (path, hash, mode))
        .collect();
    let tree = create_tree(&storage, &items)?;

    let parent = Head::current_commit()?;
    let (author, committer) = signatures()?;
    let commit = Commit::new(
        author,
        committer,
        tree.id,
        parent.into_iter().collect(),
        &args.message,
    )?;
    commit.save(&storage)?;

    // the ref moves last, atomically; failure before this point leaves only
    // orphan objects behind
    let branch_label = match Head::current()? {
        Head::Branch(name) => {
            crate::internal::branch::Branch::update_branch(&name, &commit.id, None)?;
            name
        }
        Head::Detached(_) => {
            Head::update(Head::Detached(commit.id))?;
            "HEAD".to_string()
        }
    };

    index.clear();
    index.save(&index_path)?;

    println!(
        "[{branch_label} {}] {}",
        &commit.id.to_string()[..7],
        commit.summary()
    );
    Ok(())
}

fn signatures() -> Result<(Signature, Signature), GyattError> {
    let name = Config::get("user", None, "name")?.unwrap_or_else(|| FALLBACK_NAME.to_string());
    let email = Config::get("user", None, "email")?.unwrap_or_else(|| FALLBACK_EMAIL.to_string());
    Ok((
        Signature::new(SignatureType::Author, name.clone(), email.clone()),
        Signature::new(SignatureType::Committer, name, email),
    ))
}

/// Recursively build trees from flattened items: entries are grouped by
/// their first path component, leaves become blob entries, groups become
/// subtrees. Every tree is written to the store on the way up.
pub fn create_tree(
    storage: &ClientStorage,
    items: &[(PathBuf, ObjectHash, TreeItemMode)],
) -> Result<Tree, GyattError> {
    let mut leaves: Vec<TreeItem> = Vec::new();
    let mut groups: BTreeMap<String, Vec<(PathBuf, ObjectHash, TreeItemMode)>> = BTreeMap::new();

    for (item_path, hash, mode) in items {
        let mut components = item_path.components();
        let Some(first) = components.next() else {
            continue;
        };
        let name = first.as_os_str().to_string_lossy().into_owned();
        let rest: PathBuf = components.collect();
        if rest.as_os_str().is_empty() {
            leaves.push(TreeItem {
                mode: *mode,
                id: *hash,
                name,
            });
        } else {
            groups.entry(name).or_default().push((rest, *hash, *mode));
        }
    }

    for (name, sub_items) in groups {
        let sub_tree = create_tree(storage, &sub_items)?;
        leaves.push(TreeItem {
            mode: TreeItemMode::Tree,
            id: sub_tree.id,
            name,
        });
    }

    let tree = if leaves.is_empty() {
        Tree::empty()
    } else {
        Tree::from_tree_items(leaves)?
    };
    tree.save(storage)?;
    Ok(tree)
}
