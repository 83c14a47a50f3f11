//! Initialize a new repository: metadata directory, HEAD on the default
//! branch, config, description, and the default ignore file.

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::internal::errors::GyattError;
use crate::utils::ignore::DEFAULT_IGNORE;
use crate::utils::util;

pub const DEFAULT_BRANCH: &str = "main";

#[derive(Debug, Parser, Default)]
pub struct InitArgs {
    /// Repository directory (default: current directory)
    #[arg(default_value = ".")]
    pub repo_directory: PathBuf,

    /// Suppress non-essential output
    #[arg(long, short)]
    pub quiet: bool,
}

pub async fn execute(args: InitArgs) -> Result<(), GyattError> {
    let root = if args.repo_directory.is_absolute() {
        args.repo_directory.clone()
    } else {
        util::cur_dir().join(&args.repo_directory)
    };
    if root.join(util::ROOT_DIR).is_dir() {
        if !args.quiet {
            println!(
                "Reinitialized existing gyatt repository in {}",
                root.join(util::ROOT_DIR).display()
            );
        }
        return Ok(());
    }
    init_repo(&root)?;
    if !args.quiet {
        println!(
            "Initialized empty gyatt repository in {}",
            root.join(util::ROOT_DIR).display()
        );
    }
    Ok(())
}

/// Scaffold a repository at `root`. Idempotent pieces are skipped when
/// already present so re-running never destroys state.
pub fn init_repo(root: &Path) -> Result<(), GyattError> {
    let meta = root.join(util::ROOT_DIR);
    std::fs::create_dir_all(meta.join("objects"))?;
    std::fs::create_dir_all(meta.join("refs").join("heads"))?;
    std::fs::create_dir_all(meta.join("refs").join("remotes"))?;

    let head = meta.join("HEAD");
    if !head.exists() {
        util::atomic_write(&head, format!("ref: refs/heads/{DEFAULT_BRANCH}\n").as_bytes())?;
    }

    let config = meta.join("config");
    if !config.exists() {
        util::atomic_write(&config, b"[core]\n\tbare = false\n")?;
    }

    let description = meta.join("description");
    if !description.exists() {
        util::atomic_write(
            &description,
            b"Unnamed repository; edit this file to name the repository.\n",
        )?;
    }

    let ignore = root.join(util::IGNORE_FILE);
    if !ignore.exists() {
        util::atomic_write(&ignore, DEFAULT_IGNORE.as_bytes())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serial_test::serial;
    use tempfile::tempdir;

    use super::*;

    #[tokio::test]
    #[serial]
    async fn init_creates_expected_layout() {
        let dir = tempdir().unwrap();
        execute(InitArgs {
            repo_directory: dir.path().to_path_buf(),
            quiet: true,
        })
        .await
        .unwrap();

        let meta = dir.path().join(".gyatt");
        assert!(meta.join("objects").is_dir());
        assert!(meta.join("refs/heads").is_dir());
        assert_eq!(
            std::fs::read_to_string(meta.join("HEAD")).unwrap(),
            "ref: refs/heads/main\n"
        );
        assert!(meta.join("config").exists());
        assert!(meta.join("description").exists());
        assert!(dir.path().join(".gyattignore").exists());
    }

    #[tokio::test]
    #[serial]
    async fn double_init_preserves_state() {
        let dir = tempdir().unwrap();
        let args = || InitArgs {
            repo_directory: dir.path().to_path_buf(),
            quiet: true,
        };
        execute(args()).await.unwrap();

        // move HEAD, then re-init: it must survive
        std::fs::write(
            dir.path().join(".gyatt/HEAD"),
            "ref: refs/heads/feature\n",
        )
        .unwrap();
        execute(args()).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join(".gyatt/HEAD")).unwrap(),
            "ref: refs/heads/feature\n"
        );
    }

    #[tokio::test]
    #[serial]
    async fn default_ignore_covers_metadata() {
        let dir = tempdir().unwrap();
        execute(InitArgs {
            repo_directory: dir.path().to_path_buf(),
            quiet: true,
        })
        .await
        .unwrap();
        let content = std::fs::read_to_string(dir.path().join(".gyattignore")).unwrap();
        assert!(content.contains(".gyatt/"));
        assert!(content.contains("target/"));
    }
}
