//! Load/save sugar tying the object model to a [`ClientStorage`], plus the
//! recursive tree flattening used by status, push, and checkout.

use std::path::PathBuf;

use crate::internal::errors::GyattError;
use crate::internal::hash::ObjectHash;
use crate::internal::object::blob::Blob;
use crate::internal::object::commit::Commit;
use crate::internal::object::tree::{Tree, TreeItemMode};
use crate::internal::object::types::ObjectType;
use crate::internal::object::ObjectTrait;
use crate::utils::client_storage::ClientStorage;

pub trait BlobExt: Sized {
    fn load(storage: &ClientStorage, id: &ObjectHash) -> Result<Self, GyattError>;
    fn save(&self, storage: &ClientStorage) -> Result<ObjectHash, GyattError>;
}

pub trait TreeExt: Sized {
    fn load(storage: &ClientStorage, id: &ObjectHash) -> Result<Self, GyattError>;
    fn save(&self, storage: &ClientStorage) -> Result<ObjectHash, GyattError>;

    /// Flatten the tree into `(workdir-relative path, blob id, mode)` leaves,
    /// walking subtrees depth-first.
    fn get_plain_items(
        &self,
        storage: &ClientStorage,
    ) -> Result<Vec<(PathBuf, ObjectHash, TreeItemMode)>, GyattError>;
}

pub trait CommitExt: Sized {
    fn load(storage: &ClientStorage, id: &ObjectHash) -> Result<Self, GyattError>;
    fn try_load(storage: &ClientStorage, id: &ObjectHash) -> Option<Self>;
    fn save(&self, storage: &ClientStorage) -> Result<ObjectHash, GyattError>;
}

fn load_typed<T: ObjectTrait>(
    storage: &ClientStorage,
    id: &ObjectHash,
    expected: ObjectType,
) -> Result<T, GyattError> {
    let (data, obj_type) = storage.get(id)?;
    if obj_type != expected {
        return Err(GyattError::BadFormat(format!(
            "object {id} is a {obj_type}, expected {expected}"
        )));
    }
    T::from_bytes(&data, *id)
}

fn save_typed<T: ObjectTrait>(
    obj: &T,
    id: &ObjectHash,
    storage: &ClientStorage,
) -> Result<ObjectHash, GyattError> {
    storage.put(id, &obj.to_data()?, obj.get_type())?;
    Ok(*id)
}

impl BlobExt for Blob {
    fn load(storage: &ClientStorage, id: &ObjectHash) -> Result<Blob, GyattError> {
        load_typed(storage, id, ObjectType::Blob)
    }

    fn save(&self, storage: &ClientStorage) -> Result<ObjectHash, GyattError> {
        save_typed(self, &self.id, storage)
    }
}

impl TreeExt for Tree {
    fn load(storage: &ClientStorage, id: &ObjectHash) -> Result<Tree, GyattError> {
        load_typed(storage, id, ObjectType::Tree)
    }

    fn save(&self, storage: &ClientStorage) -> Result<ObjectHash, GyattError> {
        save_typed(self, &self.id, storage)
    }

    fn get_plain_items(
        &self,
        storage: &ClientStorage,
    ) -> Result<Vec<(PathBuf, ObjectHash, TreeItemMode)>, GyattError> {
        let mut items = Vec::new();
        let mut stack: Vec<(PathBuf, Tree)> = vec![(PathBuf::new(), self.clone())];
        while let Some((prefix, tree)) = stack.pop() {
            for item in &tree.tree_items {
                let path = prefix.join(&item.name);
                if item.mode.is_tree() {
                    stack.push((path, Tree::load(storage, &item.id)?));
                } else {
                    items.push((path, item.id, item.mode));
                }
            }
        }
        items.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(items)
    }
}

impl CommitExt for Commit {
    fn load(storage: &ClientStorage, id: &ObjectHash) -> Result<Commit, GyattError> {
        load_typed(storage, id, ObjectType::Commit)
    }

    fn try_load(storage: &ClientStorage, id: &ObjectHash) -> Option<Commit> {
        Commit::load(storage, id).ok()
    }

    fn save(&self, storage: &ClientStorage) -> Result<ObjectHash, GyattError> {
        save_typed(self, &self.id, storage)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::internal::object::tree::TreeItem;

    #[test]
    fn plain_items_flatten_nested_trees() {
        let dir = tempdir().unwrap();
        let storage = ClientStorage::init(dir.path().join("objects")).unwrap();

        let blob_a = Blob::from_content("a");
        let blob_b = Blob::from_content("b");
        blob_a.save(&storage).unwrap();
        blob_b.save(&storage).unwrap();

        let sub = Tree::from_tree_items(vec![TreeItem {
            mode: TreeItemMode::Blob,
            id: blob_b.id,
            name: "b.txt".to_string(),
        }])
        .unwrap();
        sub.save(&storage).unwrap();

        let root = Tree::from_tree_items(vec![
            TreeItem {
                mode: TreeItemMode::Blob,
                id: blob_a.id,
                name: "a.txt".to_string(),
            },
            TreeItem {
                mode: TreeItemMode::Tree,
                id: sub.id,
                name: "sub".to_string(),
            },
        ])
        .unwrap();
        root.save(&storage).unwrap();

        let items = root.get_plain_items(&storage).unwrap();
        assert_eq!(
            items,
            vec![
                (PathBuf::from("a.txt"), blob_a.id, TreeItemMode::Blob),
                (PathBuf::from("sub/b.txt"), blob_b.id, TreeItemMode::Blob),
            ]
        );
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let dir = tempdir().unwrap();
        let storage = ClientStorage::init(dir.path().join("objects")).unwrap();
        let blob = Blob::from_content("not a tree");
        blob.save(&storage).unwrap();
        assert!(Tree::load(&storage, &blob.id).is_err());
    }
}
