//! Tree objects: ordered directory listings. Each entry is encoded as
//! `<octal-mode> <name>\0<20-byte-hash>`; the kind of the child is carried by
//! the mode word alone.

use crate::internal::errors::GyattError;
use crate::internal::hash::{ObjectHash, HASH_SIZE};
use crate::internal::object::types::ObjectType;
use crate::internal::object::ObjectTrait;

pub const MODE_FILE: u32 = 0o100644;
pub const MODE_EXEC: u32 = 0o100755;
pub const MODE_DIR: u32 = 0o040000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TreeItemMode {
    Blob,
    BlobExecutable,
    Tree,
}

impl TreeItemMode {
    /// Octal form used in the disk encoding. Trees serialize as `40000`
    /// without the leading zero, matching the envelope produced historically.
    pub fn to_bytes(&self) -> &'static [u8] {
        match self {
            TreeItemMode::Blob => b"100644",
            TreeItemMode::BlobExecutable => b"100755",
            TreeItemMode::Tree => b"40000",
        }
    }

    pub fn from_mode(mode: u32) -> Result<TreeItemMode, GyattError> {
        match mode {
            MODE_FILE => Ok(TreeItemMode::Blob),
            MODE_EXEC => Ok(TreeItemMode::BlobExecutable),
            MODE_DIR => Ok(TreeItemMode::Tree),
            other => Err(GyattError::BadFormat(format!("tree entry mode {other:o}"))),
        }
    }

    pub fn from_octal(bytes: &[u8]) -> Result<TreeItemMode, GyattError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| GyattError::BadFormat("tree entry mode".to_string()))?;
        match text {
            "100644" | "0100644" => Ok(TreeItemMode::Blob),
            "100755" | "0100755" => Ok(TreeItemMode::BlobExecutable),
            "40000" | "040000" => Ok(TreeItemMode::Tree),
            other => Err(GyattError::BadFormat(format!("tree entry mode '{other}'"))),
        }
    }

    pub fn to_mode(&self) -> u32 {
        match self {
            TreeItemMode::Blob => MODE_FILE,
            TreeItemMode::BlobExecutable => MODE_EXEC,
            TreeItemMode::Tree => MODE_DIR,
        }
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, TreeItemMode::Tree)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeItem {
    pub mode: TreeItemMode,
    pub id: ObjectHash,
    /// A single path component.
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tree {
    pub id: ObjectHash,
    pub tree_items: Vec<TreeItem>,
}

impl Tree {
    /// Build a tree from items, sorting by name before hashing. Rejects
    /// empty and duplicate names; entries must be single components.
    pub fn from_tree_items(mut items: Vec<TreeItem>) -> Result<Tree, GyattError> {
        for item in &items {
            if item.name.is_empty() || item.name.contains('/') {
                return Err(GyattError::InvalidName(item.name.clone()));
            }
        }
        items.sort_by(|a, b| a.name.cmp(&b.name));
        if items.windows(2).any(|w| w[0].name == w[1].name) {
            return Err(GyattError::BadFormat("duplicate tree entry".to_string()));
        }

        let mut tree = Tree {
            id: ObjectHash::default(),
            tree_items: items,
        };
        let data = tree.to_data()?;
        tree.id = ObjectHash::from_type_and_data(ObjectType::Tree, &data);
        Ok(tree)
    }

    /// The empty tree (an empty index commits to this).
    pub fn empty() -> Tree {
        Tree {
            id: ObjectHash::from_type_and_data(ObjectType::Tree, &[]),
            tree_items: Vec::new(),
        }
    }
}

impl ObjectTrait for Tree {
    fn get_type(&self) -> ObjectType {
        ObjectType::Tree
    }

    fn from_bytes(data: &[u8], id: ObjectHash) -> Result<Tree, GyattError> {
        let mut tree_items = Vec::new();
        let mut rest = data;
        while !rest.is_empty() {
            let space = rest
                .iter()
                .position(|&b| b == b' ')
                .ok_or_else(|| GyattError::BadFormat("tree entry: missing mode".to_string()))?;
            let mode = TreeItemMode::from_octal(&rest[..space])?;
            rest = &rest[space + 1..];

            let nul = rest
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| GyattError::BadFormat("tree entry: missing name".to_string()))?;
            let name = String::from_utf8(rest[..nul].to_vec())
                .map_err(|_| GyattError::BadFormat("tree entry: non-utf8 name".to_string()))?;
            rest = &rest[nul + 1..];

            if rest.len() < HASH_SIZE {
                return Err(GyattError::BadFormat(
                    "tree entry: truncated hash".to_string(),
                ));
            }
            let id = ObjectHash::from_bytes(&rest[..HASH_SIZE])?;
            rest = &rest[HASH_SIZE..];

            tree_items.push(TreeItem { mode, id, name });
        }
        Ok(Tree { id, tree_items })
    }

    fn to_data(&self) -> Result<Vec<u8>, GyattError> {
        let mut data = Vec::new();
        for item in &self.tree_items {
            data.extend_from_slice(item.mode.to_bytes());
            data.push(b' ');
            data.extend_from_slice(item.name.as_bytes());
            data.push(0);
            data.extend_from_slice(item.id.as_bytes());
        }
        Ok(data)
    }
}
