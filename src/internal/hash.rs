//! Content hashing. Every object id is the SHA-1 digest of the typed payload
//! `<type> <decimal-length>\0<raw>`; the lowercase 40-char hex form is the
//! canonical identifier everywhere outside this module.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use sha1::{Digest, Sha1};

use crate::internal::errors::GyattError;
use crate::internal::object::types::ObjectType;

pub const HASH_SIZE: usize = 20;

const FILE_CHUNK_SIZE: usize = 8192;

#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHash(pub [u8; HASH_SIZE]);

impl ObjectHash {
    /// Hash a complete typed payload held in memory.
    pub fn from_type_and_data(obj_type: ObjectType, data: &[u8]) -> ObjectHash {
        let mut hasher = Sha1::new();
        hasher.update(obj_type.as_str().as_bytes());
        hasher.update(b" ");
        hasher.update(data.len().to_string().as_bytes());
        hasher.update([0u8]);
        hasher.update(data);
        ObjectHash(hasher.finalize().into())
    }

    /// Hash a file's content as a blob, streaming in fixed-size chunks.
    /// Returns the id together with the file size used in the envelope.
    pub fn from_file(path: impl AsRef<Path>) -> Result<(ObjectHash, u64), GyattError> {
        let mut file = File::open(path.as_ref())?;
        let size = file.metadata()?.len();

        let mut hasher = Sha1::new();
        hasher.update(ObjectType::Blob.as_str().as_bytes());
        hasher.update(b" ");
        hasher.update(size.to_string().as_bytes());
        hasher.update([0u8]);

        let mut buf = [0u8; FILE_CHUNK_SIZE];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok((ObjectHash(hasher.finalize().into()), size))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<ObjectHash, GyattError> {
        let raw: [u8; HASH_SIZE] = bytes
            .try_into()
            .map_err(|_| GyattError::BadFormat(format!("{}-byte object id", bytes.len())))?;
        Ok(ObjectHash(raw))
    }

    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }
}

impl fmt::Display for ObjectHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ObjectHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectHash({})", self)
    }
}

impl FromStr for ObjectHash {
    type Err = GyattError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != HASH_SIZE * 2 {
            return Err(GyattError::BadHex(s.to_string()));
        }
        let raw = hex::decode(s).map_err(|_| GyattError::BadHex(s.to_string()))?;
        ObjectHash::from_bytes(&raw)
    }
}
