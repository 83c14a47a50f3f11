//! Stage file contents: write blobs into the object store and record
//! path → (hash, mode, size, mtime) entries in the index. Removals of
//! tracked files are staged as tombstone entries.

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::command::status;
use crate::internal::errors::GyattError;
use crate::internal::index::{Index, IndexEntry};
use crate::internal::object::blob::Blob;
use crate::utils::ignore::IgnoreMatcher;
use crate::utils::object_ext::BlobExt;
use crate::utils::{path, util};

#[derive(Parser, Debug, Default)]
pub struct AddArgs {
    /// Files or directories to stage
    pub pathspec: Vec<String>,

    /// Stage all changes in the working tree, including deletions
    #[arg(short = 'A', long)]
    pub all: bool,

    /// Stage files even when the ignore rules match them
    #[arg(short, long)]
    pub force: bool,

    /// Report each staged path
    #[arg(short, long)]
    pub verbose: bool,
}

pub async fn execute(args: AddArgs) -> Result<(), GyattError> {
    if args.pathspec.is_empty() && !args.all {
        println!("Nothing specified, nothing added.");
        return Ok(());
    }

    let workdir = util::working_dir()?;
    let index_path = path::index()?;
    let mut index = Index::load(&index_path)?;
    let matcher = IgnoreMatcher::load()?;
    let snapshot = status::tracked_snapshot(&index)?;

    let mut to_stage: Vec<PathBuf> = Vec::new();
    let mut to_remove: Vec<PathBuf> = Vec::new();

    if args.all {
        to_stage = util::list_workdir_files()?;
        for file in snapshot.keys() {
            if !workdir.join(file).exists() {
                to_remove.push(file.clone());
            }
        }
    } else {
        for spec in &args.pathspec {
            let rel = util::to_workdir_path(Path::new(spec))?;
            let abs = workdir.join(&rel);
            if abs.is_dir() {
                let prefix = rel.clone();
                to_stage.extend(
                    util::list_workdir_files()?
                        .into_iter()
                        .filter(|f| f.starts_with(&prefix)),
                );
            } else if abs.is_file() {
                to_stage.push(rel);
            } else if snapshot.contains_key(&rel) {
                to_remove.push(rel);
            } else {
                eprintln!("warning: pathspec '{spec}' did not match any files");
            }
        }
    }

    let storage = crate::command::object_storage()?;
    let mut staged = 0usize;
    for file in to_stage {
        let name = util::path_to_string(&file);
        if !args.force && !index.tracked(&name) && matcher.is_ignored(&file) {
            continue;
        }
        let abs = workdir.join(&file);
        let blob = match Blob::from_file(&abs) {
            Ok(blob) => blob,
            Err(err) => {
                eprintln!("warning: cannot read {}: {err}", file.display());
                continue;
            }
        };
        blob.save(&storage)?;
        index.update(IndexEntry::new_from_file(&file, blob.id, &workdir)?);
        staged += 1;
        if args.verbose {
            println!("add '{name}'");
        }
    }

    for file in to_remove {
        let name = util::path_to_string(&file);
        index.update(IndexEntry::removal(name.clone()));
        staged += 1;
        if args.verbose {
            println!("remove '{name}'");
        }
    }

    if staged > 0 {
        index.save(&index_path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serial_test::serial;
    use tempfile::tempdir;

    use super::*;
    use crate::utils::test::{setup_with_new_gyatt_in, ChangeDirGuard};

    async fn add(paths: &[&str]) {
        execute(AddArgs {
            pathspec: paths.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    #[serial]
    async fn add_stages_blob_and_entry() {
        let dir = tempdir().unwrap();
        setup_with_new_gyatt_in(dir.path());
        let _guard = ChangeDirGuard::new(dir.path());
        std::fs::write("a.txt", "hello\n").unwrap();

        add(&["a.txt"]).await;

        let index = Index::load(path::index().unwrap()).unwrap();
        let entry = index.get("a.txt").unwrap();
        assert_eq!(
            entry.hash.to_string(),
            "ce013625030ba8dba906f756967f9e9ca394464a"
        );
        assert_eq!(entry.size, 6);
        assert!(crate::command::object_storage()
            .unwrap()
            .exist(&entry.hash));
    }

    #[tokio::test]
    #[serial]
    async fn add_directory_recurses() {
        let dir = tempdir().unwrap();
        setup_with_new_gyatt_in(dir.path());
        let _guard = ChangeDirGuard::new(dir.path());
        std::fs::create_dir_all("src/nested").unwrap();
        std::fs::write("src/lib.rs", "pub fn f() {}\n").unwrap();
        std::fs::write("src/nested/deep.rs", "// deep\n").unwrap();

        add(&["src"]).await;

        let index = Index::load(path::index().unwrap()).unwrap();
        assert!(index.tracked("src/lib.rs"));
        assert!(index.tracked("src/nested/deep.rs"));
    }

    #[tokio::test]
    #[serial]
    async fn ignored_files_are_skipped_without_force() {
        let dir = tempdir().unwrap();
        setup_with_new_gyatt_in(dir.path());
        let _guard = ChangeDirGuard::new(dir.path());
        std::fs::write(".gyattignore", "*.log\n").unwrap();
        std::fs::write("x.log", "noise").unwrap();

        add(&["x.log"]).await;
        let index = Index::load(path::index().unwrap()).unwrap();
        assert!(!index.tracked("x.log"));

        execute(AddArgs {
            pathspec: vec!["x.log".to_string()],
            force: true,
            ..Default::default()
        })
        .await
        .unwrap();
        let index = Index::load(path::index().unwrap()).unwrap();
        assert!(index.tracked("x.log"));
    }

    #[tokio::test]
    #[serial]
    async fn all_flag_stages_everything() {
        let dir = tempdir().unwrap();
        setup_with_new_gyatt_in(dir.path());
        let _guard = ChangeDirGuard::new(dir.path());
        std::fs::write("one.txt", "1").unwrap();
        std::fs::write("two.txt", "2").unwrap();

        execute(AddArgs {
            all: true,
            ..Default::default()
        })
        .await
        .unwrap();

        let index = Index::load(path::index().unwrap()).unwrap();
        assert!(index.tracked("one.txt"));
        assert!(index.tracked("two.txt"));
        // the ignore file itself is implicitly ignored
        assert!(!index.tracked(".gyattignore"));
    }
}
