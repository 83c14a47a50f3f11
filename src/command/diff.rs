//! Unified diffs between the HEAD tree, the index, and the working tree.

use std::path::Path;

use clap::Parser;

use crate::command::status;
use crate::internal::errors::GyattError;
use crate::internal::hash::ObjectHash;
use crate::internal::index::Index;
use crate::internal::object::blob::Blob;
use crate::utils::client_storage::ClientStorage;
use crate::utils::object_ext::BlobExt;
use crate::utils::{path, util};

#[derive(Parser, Debug, Default)]
pub struct DiffArgs {
    /// Compare the index against HEAD instead of the working tree against
    /// the tracked snapshot
    #[arg(long)]
    pub staged: bool,

    /// Limit the diff to the given paths
    pub pathspec: Vec<String>,
}

fn blob_text(storage: &ClientStorage, id: &ObjectHash) -> Result<String, GyattError> {
    let blob = Blob::load(storage, id)?;
    Ok(String::from_utf8_lossy(&blob.data).into_owned())
}

fn print_unified(file: &Path, old: &str, new: &str) {
    let diff = similar::TextDiff::from_lines(old, new);
    let display = file.display();
    println!("diff --gyatt a/{display} b/{display}");
    print!(
        "{}",
        diff.unified_diff()
            .context_radius(3)
            .header(&format!("a/{display}"), &format!("b/{display}"))
    );
}

fn selected(pathspec: &[String], file: &Path) -> bool {
    pathspec.is_empty()
        || pathspec
            .iter()
            .any(|spec| file == Path::new(spec) || file.starts_with(spec))
}

pub async fn execute(args: DiffArgs) -> Result<(), GyattError> {
    let storage = crate::command::object_storage()?;
    let workdir = util::working_dir()?;

    if args.staged {
        let head_items = status::head_tree_items()?;
        let index = Index::load(path::index()?)?;
        let staged = status::changes_to_be_committed()?;

        for file in staged.new.iter().chain(&staged.modified) {
            if !selected(&args.pathspec, file) {
                continue;
            }
            let old = match head_items.get(file) {
                Some((id, _)) => blob_text(&storage, id)?,
                None => String::new(),
            };
            let name = util::path_to_string(file);
            let new = match index.get(&name) {
                Some(entry) => blob_text(&storage, &entry.hash)?,
                None => String::new(),
            };
            print_unified(file, &old, &new);
        }
        for file in &staged.deleted {
            if !selected(&args.pathspec, file) {
                continue;
            }
            if let Some((id, _)) = head_items.get(file) {
                print_unified(file, &blob_text(&storage, id)?, "");
            }
        }
        return Ok(());
    }

    let index = Index::load(path::index()?)?;
    let snapshot = status::tracked_snapshot(&index)?;
    let unstaged = status::changes_to_be_staged()?;

    for file in &unstaged.modified {
        if !selected(&args.pathspec, file) {
            continue;
        }
        let Some((tracked, _)) = snapshot.get(file) else {
            continue;
        };
        let old = blob_text(&storage, tracked)?;
        let new = std::fs::read_to_string(workdir.join(file)).unwrap_or_default();
        print_unified(file, &old, &new);
    }
    for file in &unstaged.deleted {
        if !selected(&args.pathspec, file) {
            continue;
        }
        if let Some((tracked, _)) = snapshot.get(file) {
            print_unified(file, &blob_text(&storage, tracked)?, "");
        }
    }
    Ok(())
}
