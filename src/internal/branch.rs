//! Branch refs: one file per branch under `refs/heads/<name>` (or
//! `refs/remotes/<remote>/<name>` for remote-tracking refs) holding
//! `<40-hex>\n`. All writes are atomic.

use std::path::PathBuf;
use std::str::FromStr;

use crate::internal::errors::GyattError;
use crate::internal::hash::ObjectHash;
use crate::utils::{path, util};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Branch {
    pub name: String,
    pub commit: ObjectHash,
    pub remote: Option<String>,
}

/// Branch names are single path components: no separators, whitespace, or
/// backslashes, no leading dash, not empty.
pub fn is_valid_branch_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('-')
        && name != "HEAD"
        && !name
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_whitespace())
}

fn ref_dir(remote: Option<&str>) -> Result<PathBuf, GyattError> {
    match remote {
        Some(r) => path::refs_remotes(r),
        None => path::refs_heads(),
    }
}

impl Branch {
    pub fn find_branch(name: &str, remote: Option<&str>) -> Result<Option<Branch>, GyattError> {
        let file = ref_dir(remote)?.join(name);
        if !file.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&file)?;
        let commit = ObjectHash::from_str(content.trim_end())
            .map_err(|_| GyattError::BadFormat(format!("ref file for '{name}'")))?;
        Ok(Some(Branch {
            name: name.to_string(),
            commit,
            remote: remote.map(str::to_string),
        }))
    }

    pub fn exists(name: &str, remote: Option<&str>) -> bool {
        matches!(Branch::find_branch(name, remote), Ok(Some(_)))
    }

    /// Create or advance a ref, atomically.
    pub fn update_branch(
        name: &str,
        commit: &ObjectHash,
        remote: Option<&str>,
    ) -> Result<(), GyattError> {
        let file = ref_dir(remote)?.join(name);
        util::atomic_write(&file, format!("{commit}\n").as_bytes())
    }

    pub fn delete_branch(name: &str, remote: Option<&str>) -> Result<(), GyattError> {
        let file = ref_dir(remote)?.join(name);
        if !file.exists() {
            return Err(GyattError::NotFound(format!("branch '{name}'")));
        }
        std::fs::remove_file(file)?;
        Ok(())
    }

    pub fn list_branches(remote: Option<&str>) -> Result<Vec<Branch>, GyattError> {
        let dir = ref_dir(remote)?;
        let mut branches = Vec::new();
        if !dir.exists() {
            return Ok(branches);
        }
        // Nested directories (legacy directory-style refs) are readable even
        // though the validator never lets the core create them.
        let mut stack = vec![PathBuf::new()];
        while let Some(prefix) = stack.pop() {
            for entry in std::fs::read_dir(dir.join(&prefix))? {
                let entry = entry?;
                let rel = prefix.join(entry.file_name());
                if entry.file_type()?.is_dir() {
                    stack.push(rel);
                    continue;
                }
                let name = util::path_to_string(&rel);
                if let Some(branch) = Branch::find_branch(&name, remote)? {
                    branches.push(branch);
                }
            }
        }
        branches.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(branches)
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;
    use tempfile::tempdir;

    use super::*;
    use crate::internal::object::blob::Blob;
    use crate::utils::test::{setup_with_new_gyatt_in, ChangeDirGuard};

    #[test]
    fn name_validation() {
        assert!(is_valid_branch_name("feature"));
        assert!(is_valid_branch_name("fix-42"));
        assert!(!is_valid_branch_name(""));
        assert!(!is_valid_branch_name("a/b"));
        assert!(!is_valid_branch_name("a b"));
        assert!(!is_valid_branch_name("a\\b"));
        assert!(!is_valid_branch_name("-oops"));
        assert!(!is_valid_branch_name("HEAD"));
    }

    #[test]
    #[serial]
    fn update_find_delete_cycle() {
        let dir = tempdir().unwrap();
        setup_with_new_gyatt_in(dir.path());
        let _guard = ChangeDirGuard::new(dir.path());

        let commit = Blob::from_content("pretend commit").id;
        Branch::update_branch("main", &commit, None).unwrap();

        let found = Branch::find_branch("main", None).unwrap().unwrap();
        assert_eq!(found.commit, commit);

        let listed = Branch::list_branches(None).unwrap();
        assert_eq!(listed.len(), 1);

        Branch::delete_branch("main", None).unwrap();
        assert!(Branch::find_branch("main", None).unwrap().is_none());
        assert!(matches!(
            Branch::delete_branch("main", None),
            Err(GyattError::NotFound(_))
        ));
    }

    #[test]
    #[serial]
    fn remote_tracking_refs_are_separate() {
        let dir = tempdir().unwrap();
        setup_with_new_gyatt_in(dir.path());
        let _guard = ChangeDirGuard::new(dir.path());

        let commit = Blob::from_content("c").id;
        Branch::update_branch("main", &commit, Some("origin")).unwrap();
        assert!(Branch::find_branch("main", None).unwrap().is_none());
        assert!(Branch::exists("main", Some("origin")));
    }

    #[test]
    #[serial]
    fn ref_file_format_is_hex_line() {
        let dir = tempdir().unwrap();
        setup_with_new_gyatt_in(dir.path());
        let _guard = ChangeDirGuard::new(dir.path());

        let commit = Blob::from_content("c").id;
        Branch::update_branch("main", &commit, None).unwrap();
        let content =
            std::fs::read_to_string(path::refs_heads().unwrap().join("main")).unwrap();
        assert_eq!(content, format!("{commit}\n"));
    }
}
