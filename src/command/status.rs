//! Working-tree status: the three-way diff between the HEAD tree, the
//! staging index, and the working tree. The index is truncated after each
//! commit, so tracked state is the HEAD tree overlaid with live index
//! entries (tombstones subtract); every classification works against that
//! snapshot.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;

use crate::command::{calc_file_blob_hash, object_storage};
use crate::internal::errors::GyattError;
use crate::internal::hash::ObjectHash;
use crate::internal::head::Head;
use crate::internal::index::Index;
use crate::internal::object::commit::Commit;
use crate::internal::object::tree::{Tree, TreeItemMode};
use crate::utils::ignore::IgnoreMatcher;
use crate::utils::object_ext::{CommitExt, TreeExt};
use crate::utils::{path, util};

#[derive(Parser, Debug, Default)]
pub struct StatusArgs {}

/// One bucket of classified paths, all workdir-relative.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Changes {
    pub new: Vec<PathBuf>,
    pub modified: Vec<PathBuf>,
    pub deleted: Vec<PathBuf>,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }
}

/// Flattened HEAD tree: path → (blob id, mode).
pub fn head_tree_items() -> Result<HashMap<PathBuf, (ObjectHash, TreeItemMode)>, GyattError> {
    let Some(commit_id) = Head::current_commit()? else {
        return Ok(HashMap::new());
    };
    let storage = object_storage()?;
    let commit = Commit::load(&storage, &commit_id)?;
    let tree = Tree::load(&storage, &commit.tree_id)?;
    Ok(tree
        .get_plain_items(&storage)?
        .into_iter()
        .map(|(path, id, mode)| (path, (id, mode)))
        .collect())
}

/// The tracked snapshot: HEAD tree entries overlaid with the index. Live
/// index entries win over HEAD; tombstoned entries remove the path.
pub fn tracked_snapshot(
    index: &Index,
) -> Result<BTreeMap<PathBuf, (ObjectHash, TreeItemMode)>, GyattError> {
    let mut snapshot: BTreeMap<PathBuf, (ObjectHash, TreeItemMode)> =
        head_tree_items()?.into_iter().collect();
    for entry in index.entries() {
        let path = PathBuf::from(&entry.name);
        if entry.is_removed() {
            snapshot.remove(&path);
        } else {
            let mode = TreeItemMode::from_mode(entry.mode).unwrap_or(TreeItemMode::Blob);
            snapshot.insert(path, (entry.hash, mode));
        }
    }
    Ok(snapshot)
}

/// Index vs the HEAD tree: what the next commit would change.
pub fn changes_to_be_committed() -> Result<Changes, GyattError> {
    let index = Index::load(path::index()?)?;
    let head_items = head_tree_items()?;

    let mut changes = Changes::default();
    for entry in index.entries() {
        let item_path = PathBuf::from(&entry.name);
        if entry.is_removed() {
            changes.deleted.push(item_path);
            continue;
        }
        match head_items.get(&item_path) {
            None => changes.new.push(item_path),
            Some((head_hash, _)) if head_hash != &entry.hash => changes.modified.push(item_path),
            Some(_) => {}
        }
    }
    Ok(changes)
}

/// The tracked snapshot vs the working tree, plus untracked discovery.
/// Per-file read errors are reported as warnings, never fatal.
pub fn changes_to_be_staged() -> Result<Changes, GyattError> {
    let index = Index::load(path::index()?)?;
    let snapshot = tracked_snapshot(&index)?;
    let workdir = util::working_dir()?;
    let matcher = IgnoreMatcher::load()?;

    let mut changes = Changes::default();
    for (file, (tracked_hash, _)) in &snapshot {
        let abs = workdir.join(file);
        if !abs.exists() {
            changes.deleted.push(file.clone());
            continue;
        }
        let name = util::path_to_string(file);
        // stat fast path only applies to entries the index has metadata for
        if index.get(&name).is_some() && !index.is_modified(&name, &workdir) {
            continue;
        }
        match calc_file_blob_hash(&abs) {
            Ok(actual) => {
                if &actual != tracked_hash {
                    changes.modified.push(file.clone());
                }
            }
            Err(err) => {
                tracing::warn!("cannot hash {}: {err}", file.display());
            }
        }
    }

    for file in matcher.filter_workdir_paths(util::list_workdir_files()?) {
        if !snapshot.contains_key(&file) {
            changes.new.push(file);
        }
    }
    Ok(changes)
}

pub fn is_clean() -> Result<bool, GyattError> {
    Ok(changes_to_be_committed()?.is_empty() && changes_to_be_staged()?.is_empty())
}

pub async fn execute(_args: StatusArgs) -> Result<(), GyattError> {
    match Head::current()? {
        Head::Branch(branch) => println!("On branch {branch}"),
        Head::Detached(commit) => println!("HEAD detached at {}", &commit.to_string()[..8]),
    }
    if Head::current_commit()?.is_none() {
        println!("\nNo commits yet\n");
    }

    let staged = changes_to_be_committed()?;
    let unstaged = changes_to_be_staged()?;

    if staged.is_empty() && unstaged.is_empty() {
        println!("nothing to commit, working tree clean");
        return Ok(());
    }

    if !staged.is_empty() {
        println!("Changes to be committed:");
        for f in &staged.new {
            println!("{}", format!("\tnew file: {}", f.display()).bright_green());
        }
        for f in &staged.modified {
            println!("{}", format!("\tmodified: {}", f.display()).bright_green());
        }
        for f in &staged.deleted {
            println!("{}", format!("\tdeleted: {}", f.display()).bright_green());
        }
    }

    if !unstaged.modified.is_empty() || !unstaged.deleted.is_empty() {
        println!("Changes not staged for commit:");
        println!("  use \"gyatt add <file>...\" to update what will be committed");
        for f in &unstaged.modified {
            println!("{}", format!("\tmodified: {}", f.display()).bright_red());
        }
        for f in &unstaged.deleted {
            println!("{}", format!("\tdeleted: {}", f.display()).bright_red());
        }
    }

    if !unstaged.new.is_empty() {
        println!("Untracked files:");
        println!("  use \"gyatt add <file>...\" to include in what will be committed");
        for f in &unstaged.new {
            println!("{}", format!("\t{}", f.display()).bright_red());
        }
    }
    Ok(())
}
