//! The staging area. Persisted as a little-endian binary file:
//!
//! ```text
//! magic(4) = "GYAT"   version(4) = 1   count(4)
//! repeat count times:
//!     path_len(2)  path(path_len)  hash(20)  mode(4)
//!     size(8)      mtime(8)        flags(4)
//! ```
//!
//! Entries are kept unique by path and emitted in ascending path order.
//! Saves are atomic (temp file + rename).

use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::internal::errors::GyattError;
use crate::internal::hash::{ObjectHash, HASH_SIZE};
use crate::utils::util;

pub const INDEX_MAGIC: &[u8; 4] = b"GYAT";
pub const INDEX_VERSION: u32 = 1;

/// Flag bit marking a staged removal: the path leaves the next commit's tree.
pub const FLAG_REMOVED: u32 = 1;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    /// Repository-root-relative POSIX path.
    pub name: String,
    pub hash: ObjectHash,
    pub mode: u32,
    pub size: u64,
    pub mtime: u64,
    pub flags: u32,
}

impl IndexEntry {
    /// Build an entry for a file that exists in the working tree, capturing
    /// its current stat metadata.
    pub fn new_from_file(
        rel: &Path,
        hash: ObjectHash,
        workdir: &Path,
    ) -> Result<IndexEntry, GyattError> {
        let meta = std::fs::metadata(workdir.join(rel))?;
        let mtime = meta
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Ok(IndexEntry {
            name: util::path_to_string(rel),
            hash,
            mode: file_mode(&meta),
            size: meta.len(),
            mtime,
            flags: 0,
        })
    }

    /// Tombstone staging the removal of a tracked path.
    pub fn removal(name: String) -> IndexEntry {
        IndexEntry {
            name,
            hash: ObjectHash::default(),
            mode: 0,
            size: 0,
            mtime: 0,
            flags: FLAG_REMOVED,
        }
    }

    pub fn is_removed(&self) -> bool {
        self.flags & FLAG_REMOVED != 0
    }
}

#[cfg(unix)]
fn file_mode(meta: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    if meta.permissions().mode() & 0o111 != 0 {
        0o100755
    } else {
        0o100644
    }
}

#[cfg(not(unix))]
fn file_mode(_meta: &std::fs::Metadata) -> u32 {
    0o100644
}

#[derive(Clone, Debug, Default)]
pub struct Index {
    entries: BTreeMap<String, IndexEntry>,
}

impl Index {
    /// Load from disk; a missing file yields an empty index.
    pub fn load(path: impl AsRef<Path>) -> Result<Index, GyattError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Index::default());
        }
        let data = std::fs::read(path)?;
        Index::from_bytes(&data)
    }

    fn from_bytes(data: &[u8]) -> Result<Index, GyattError> {
        let mut cursor = Cursor::new(data);

        let mut magic = [0u8; 4];
        cursor
            .read_exact(&mut magic)
            .map_err(|_| GyattError::CorruptIndex("truncated header".to_string()))?;
        if &magic != INDEX_MAGIC {
            return Err(GyattError::CorruptIndex("bad magic".to_string()));
        }
        let version = cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| GyattError::CorruptIndex("truncated header".to_string()))?;
        if version != INDEX_VERSION {
            return Err(GyattError::CorruptIndex(format!(
                "unsupported version {version}"
            )));
        }
        let count = cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| GyattError::CorruptIndex("truncated header".to_string()))?;

        let truncated = |_| GyattError::CorruptIndex("truncated entry".to_string());
        let mut entries = BTreeMap::new();
        for _ in 0..count {
            let path_len = cursor.read_u16::<LittleEndian>().map_err(truncated)? as usize;
            let mut path_buf = vec![0u8; path_len];
            cursor.read_exact(&mut path_buf).map_err(truncated)?;
            let name = String::from_utf8(path_buf)
                .map_err(|_| GyattError::CorruptIndex("non-utf8 path".to_string()))?;

            let mut hash_buf = [0u8; HASH_SIZE];
            cursor.read_exact(&mut hash_buf).map_err(truncated)?;

            let entry = IndexEntry {
                name: name.clone(),
                hash: ObjectHash(hash_buf),
                mode: cursor.read_u32::<LittleEndian>().map_err(truncated)?,
                size: cursor.read_u64::<LittleEndian>().map_err(truncated)?,
                mtime: cursor.read_u64::<LittleEndian>().map_err(truncated)?,
                flags: cursor.read_u32::<LittleEndian>().map_err(truncated)?,
            };
            entries.insert(name, entry);
        }
        Ok(Index { entries })
    }

    /// Persist atomically via temp file + rename.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), GyattError> {
        util::atomic_write(path.as_ref(), &self.to_bytes()?)
    }

    fn to_bytes(&self) -> Result<Vec<u8>, GyattError> {
        let mut buf = Vec::new();
        buf.extend_from_slice(INDEX_MAGIC);
        buf.write_u32::<LittleEndian>(INDEX_VERSION)?;
        buf.write_u32::<LittleEndian>(self.entries.len() as u32)?;
        // BTreeMap iteration gives the required ascending path order.
        for entry in self.entries.values() {
            let path_bytes = entry.name.as_bytes();
            if path_bytes.len() > u16::MAX as usize {
                return Err(GyattError::InvalidName(entry.name.clone()));
            }
            buf.write_u16::<LittleEndian>(path_bytes.len() as u16)?;
            buf.extend_from_slice(path_bytes);
            buf.extend_from_slice(entry.hash.as_bytes());
            buf.write_u32::<LittleEndian>(entry.mode)?;
            buf.write_u64::<LittleEndian>(entry.size)?;
            buf.write_u64::<LittleEndian>(entry.mtime)?;
            buf.write_u32::<LittleEndian>(entry.flags)?;
        }
        Ok(buf)
    }

    /// Insert or replace by path.
    pub fn update(&mut self, entry: IndexEntry) {
        self.entries.insert(entry.name.clone(), entry);
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&IndexEntry> {
        self.entries.get(name)
    }

    /// True when the path has a live (non-tombstone) entry.
    pub fn tracked(&self, name: &str) -> bool {
        self.entries.get(name).map(|e| !e.is_removed()).unwrap_or(false)
    }

    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }

    pub fn tracked_entries(&self) -> Vec<&IndexEntry> {
        self.entries.values().filter(|e| !e.is_removed()).collect()
    }

    pub fn tracked_files(&self) -> Vec<PathBuf> {
        self.entries
            .values()
            .filter(|e| !e.is_removed())
            .map(|e| PathBuf::from(&e.name))
            .collect()
    }

    pub fn removed_files(&self) -> Vec<PathBuf> {
        self.entries
            .values()
            .filter(|e| e.is_removed())
            .map(|e| PathBuf::from(&e.name))
            .collect()
    }

    pub fn verify_hash(&self, name: &str, hash: &ObjectHash) -> bool {
        self.entries.get(name).map(|e| &e.hash == hash).unwrap_or(false)
    }

    /// Cheap stat-based modification probe; a hash check decides for real.
    pub fn is_modified(&self, name: &str, workdir: &Path) -> bool {
        let Some(entry) = self.entries.get(name) else {
            return true;
        };
        let Ok(meta) = std::fs::metadata(workdir.join(name)) else {
            return true;
        };
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);
        meta.len() != entry.size || mtime != entry.mtime
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
