//! The blob/tree/commit object model. Objects are immutable value records
//! keyed by their content hash; encode/decode here, storage in
//! [`crate::utils::client_storage`].

pub mod blob;
pub mod commit;
pub mod signature;
pub mod tree;
pub mod types;

use crate::internal::errors::GyattError;
use crate::internal::hash::ObjectHash;

use self::blob::Blob;
use self::commit::Commit;
use self::tree::Tree;
use self::types::ObjectType;

pub trait ObjectTrait: Sized {
    fn get_type(&self) -> ObjectType;

    /// Decode the raw payload (without the `<type> <len>\0` envelope).
    /// `id` is the content hash the payload was stored under.
    fn from_bytes(data: &[u8], id: ObjectHash) -> Result<Self, GyattError>;

    /// Canonical payload bytes, the exact input of the content hash.
    fn to_data(&self) -> Result<Vec<u8>, GyattError>;
}

/// Tagged sum over the three object kinds, for callers that do not know the
/// kind up front (`show`, integrity walks).
#[derive(Clone, Debug)]
pub enum Object {
    Blob(Blob),
    Tree(Tree),
    Commit(Commit),
}

impl Object {
    pub fn from_raw(
        obj_type: ObjectType,
        data: &[u8],
        id: ObjectHash,
    ) -> Result<Object, GyattError> {
        Ok(match obj_type {
            ObjectType::Blob => Object::Blob(Blob::from_bytes(data, id)?),
            ObjectType::Tree => Object::Tree(Tree::from_bytes(data, id)?),
            ObjectType::Commit => Object::Commit(Commit::from_bytes(data, id)?),
        })
    }

    pub fn get_type(&self) -> ObjectType {
        match self {
            Object::Blob(_) => ObjectType::Blob,
            Object::Tree(_) => ObjectType::Tree,
            Object::Commit(_) => ObjectType::Commit,
        }
    }
}
