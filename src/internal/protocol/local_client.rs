//! Copying a repository to and from another filesystem path: the clone
//! source for `gyatt clone <dir>` and the push target for local remotes.

use std::path::Path;

use crate::internal::errors::GyattError;
use crate::internal::hash::ObjectHash;
use crate::utils::util;

/// Clone an on-disk repository. The source must contain a metadata
/// directory; the target must be empty or absent. All regular files are
/// copied, working tree included.
pub fn clone_local(source: &Path, target: &Path) -> Result<(), GyattError> {
    if !source.join(util::ROOT_DIR).is_dir() {
        return Err(GyattError::NotARepository);
    }
    if target.exists() {
        let occupied = std::fs::read_dir(target)?.next().is_some();
        if occupied {
            return Err(GyattError::AlreadyExists(format!(
                "target directory '{}'",
                target.display()
            )));
        }
    }
    copy_dir(source, target)
}

fn copy_dir(source: &Path, target: &Path) -> Result<(), GyattError> {
    std::fs::create_dir_all(target)?;
    for entry in std::fs::read_dir(source)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let dest = target.join(entry.file_name());
        if file_type.is_dir() {
            copy_dir(&entry.path(), &dest)?;
        } else if file_type.is_file() {
            std::fs::copy(entry.path(), dest)?;
        }
        // symlinks and special files are not carried over
    }
    Ok(())
}

/// Push the current object database and one branch ref into a peer
/// repository at `target`.
pub fn push_local(target: &Path, branch: &str, commit: &ObjectHash) -> Result<(), GyattError> {
    let peer_meta = target.join(util::ROOT_DIR);
    if !peer_meta.is_dir() {
        return Err(GyattError::NotARepository);
    }

    let local_objects = util::storage_path()?.join("objects");
    if local_objects.is_dir() {
        copy_dir(&local_objects, &peer_meta.join("objects"))?;
    }

    util::atomic_write(
        &peer_meta.join("refs").join("heads").join(branch),
        format!("{commit}\n").as_bytes(),
    )
}

#[cfg(test)]
mod tests {
    use serial_test::serial;
    use tempfile::tempdir;

    use super::*;
    use crate::internal::branch::Branch;
    use crate::internal::object::blob::Blob;
    use crate::utils::test::{setup_with_new_gyatt_in, ChangeDirGuard};

    #[test]
    #[serial]
    fn clone_requires_a_repository() {
        let source = tempdir().unwrap();
        let target = tempdir().unwrap();
        assert!(matches!(
            clone_local(source.path(), &target.path().join("out")),
            Err(GyattError::NotARepository)
        ));
    }

    #[test]
    #[serial]
    fn clone_refuses_occupied_target() {
        let source = tempdir().unwrap();
        setup_with_new_gyatt_in(source.path());
        let target = tempdir().unwrap();
        std::fs::write(target.path().join("occupied"), "x").unwrap();
        assert!(matches!(
            clone_local(source.path(), target.path()),
            Err(GyattError::AlreadyExists(_))
        ));
    }

    #[test]
    #[serial]
    fn clone_copies_metadata_and_worktree() {
        let source = tempdir().unwrap();
        setup_with_new_gyatt_in(source.path());
        std::fs::write(source.path().join("a.txt"), "hello\n").unwrap();

        let target_root = tempdir().unwrap();
        let target = target_root.path().join("copy");
        clone_local(source.path(), &target).unwrap();

        assert!(target.join(".gyatt/HEAD").exists());
        assert_eq!(
            std::fs::read_to_string(target.join("a.txt")).unwrap(),
            "hello\n"
        );
    }

    #[test]
    #[serial]
    fn push_local_copies_objects_and_ref() {
        let local = tempdir().unwrap();
        setup_with_new_gyatt_in(local.path());
        let peer = tempdir().unwrap();
        setup_with_new_gyatt_in(peer.path());

        let _guard = ChangeDirGuard::new(local.path());
        let storage =
            crate::utils::client_storage::ClientStorage::init(local.path().join(".gyatt/objects"))
                .unwrap();
        let blob = Blob::from_content("shared");
        storage
            .put(&blob.id, &blob.data, crate::internal::object::types::ObjectType::Blob)
            .unwrap();

        push_local(peer.path(), "main", &blob.id).unwrap();

        let hex = blob.id.to_string();
        assert!(peer
            .path()
            .join(".gyatt/objects")
            .join(&hex[..2])
            .join(&hex[2..])
            .exists());
        assert_eq!(
            std::fs::read_to_string(peer.path().join(".gyatt/refs/heads/main")).unwrap(),
            format!("{}\n", blob.id)
        );
    }

    #[test]
    #[serial]
    fn branch_helper_is_reachable_from_clone_target() {
        // clone then read refs through the normal API
        let source = tempdir().unwrap();
        setup_with_new_gyatt_in(source.path());
        let target_root = tempdir().unwrap();
        let target = target_root.path().join("copy");
        clone_local(source.path(), &target).unwrap();

        let _guard = ChangeDirGuard::new(&target);
        assert!(Branch::list_branches(None).unwrap().is_empty());
    }
}
