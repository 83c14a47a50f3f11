//! List, create, or delete branches.

use clap::Parser;
use colored::Colorize;

use crate::internal::branch::{is_valid_branch_name, Branch};
use crate::internal::errors::GyattError;
use crate::internal::head::Head;

#[derive(Parser, Debug, Default)]
pub struct BranchArgs {
    /// Create a branch with this name at the current commit
    pub new_branch: Option<String>,

    /// Delete the named branch
    #[arg(short = 'd', long = "delete", conflicts_with = "new_branch")]
    pub delete: Option<String>,
}

pub async fn execute(args: BranchArgs) -> Result<(), GyattError> {
    if let Some(name) = args.delete {
        return delete_branch(&name);
    }
    if let Some(name) = args.new_branch {
        return create_branch(&name);
    }
    list_branches()
}

pub fn create_branch(name: &str) -> Result<(), GyattError> {
    if !is_valid_branch_name(name) {
        return Err(GyattError::InvalidName(name.to_string()));
    }
    if Branch::exists(name, None) {
        return Err(GyattError::AlreadyExists(format!("branch '{name}'")));
    }
    let commit = Head::current_commit()?.ok_or(GyattError::NoCommitsYet)?;
    Branch::update_branch(name, &commit, None)
}

pub fn delete_branch(name: &str) -> Result<(), GyattError> {
    if Head::current_branch()?.as_deref() == Some(name) {
        return Err(GyattError::CurrentBranch(name.to_string()));
    }
    Branch::delete_branch(name, None)
}

fn list_branches() -> Result<(), GyattError> {
    let current = Head::current_branch()?;
    for branch in Branch::list_branches(None)? {
        if current.as_deref() == Some(branch.name.as_str()) {
            println!("* {}", branch.name.green());
        } else {
            println!("  {}", branch.name);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serial_test::serial;
    use tempfile::tempdir;

    use super::*;
    use crate::command::add::{self, AddArgs};
    use crate::command::commit::{self, CommitArgs};
    use crate::utils::test::{setup_with_new_gyatt_in, ChangeDirGuard};

    async fn first_commit() {
        std::fs::write("a.txt", "hello\n").unwrap();
        add::execute(AddArgs {
            pathspec: vec!["a.txt".to_string()],
            ..Default::default()
        })
        .await
        .unwrap();
        commit::execute(CommitArgs {
            message: "first".to_string(),
            allow_empty: false,
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    #[serial]
    async fn create_requires_a_commit() {
        let dir = tempdir().unwrap();
        setup_with_new_gyatt_in(dir.path());
        let _guard = ChangeDirGuard::new(dir.path());

        assert!(matches!(
            create_branch("feature"),
            Err(GyattError::NoCommitsYet)
        ));
    }

    #[tokio::test]
    #[serial]
    async fn create_and_duplicate() {
        let dir = tempdir().unwrap();
        setup_with_new_gyatt_in(dir.path());
        let _guard = ChangeDirGuard::new(dir.path());
        first_commit().await;

        create_branch("feature").unwrap();
        let feature = Branch::find_branch("feature", None).unwrap().unwrap();
        assert_eq!(Some(feature.commit), Head::current_commit().unwrap());

        assert!(matches!(
            create_branch("feature"),
            Err(GyattError::AlreadyExists(_))
        ));
        assert!(matches!(
            create_branch("bad/name"),
            Err(GyattError::InvalidName(_))
        ));
    }

    #[tokio::test]
    #[serial]
    async fn cannot_delete_current_branch() {
        let dir = tempdir().unwrap();
        setup_with_new_gyatt_in(dir.path());
        let _guard = ChangeDirGuard::new(dir.path());
        first_commit().await;

        assert!(matches!(
            delete_branch("main"),
            Err(GyattError::CurrentBranch(_))
        ));

        create_branch("feature").unwrap();
        delete_branch("feature").unwrap();
        assert!(!Branch::exists("feature", None));
        assert!(matches!(
            delete_branch("feature"),
            Err(GyattError::NotFound(_))
        ));
    }
}
