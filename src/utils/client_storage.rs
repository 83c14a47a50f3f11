//! Filesystem-backed, content-addressed object store. One file per object at
//! `objects/<first-2-hex>/<remaining-38-hex>`, holding the typed payload
//! `<type> <decimal-length>\0<raw>`. Objects are written once and never
//! mutated or deleted.

use std::fs;
use std::path::PathBuf;

use crate::internal::errors::GyattError;
use crate::internal::hash::ObjectHash;
use crate::internal::object::types::ObjectType;
use crate::utils::util;

#[derive(Clone, Debug)]
pub struct ClientStorage {
    base_path: PathBuf,
}

impl ClientStorage {
    pub fn init(base_path: PathBuf) -> Result<ClientStorage, GyattError> {
        fs::create_dir_all(&base_path)?;
        Ok(ClientStorage { base_path })
    }

    fn object_path(&self, obj_id: &ObjectHash) -> PathBuf {
        let hex = obj_id.to_string();
        self.base_path.join(&hex[..2]).join(&hex[2..])
    }

    /// Store a payload under its id. At-most-once semantics: an existing
    /// file is left untouched.
    pub fn put(
        &self,
        obj_id: &ObjectHash,
        content: &[u8],
        obj_type: ObjectType,
    ) -> Result<(), GyattError> {
        let path = self.object_path(obj_id);
        if path.exists() {
            return Ok(());
        }
        util::atomic_write(&path, &encode_envelope(obj_type, content))
    }

    /// Read and verify an object. The stored payload is re-hashed and
    /// compared against the requested id; any disagreement (including a
    /// truncated or padded file) is `CorruptObject`, never silent data.
    pub fn get(&self, obj_id: &ObjectHash) -> Result<(Vec<u8>, ObjectType), GyattError> {
        let path = self.object_path(obj_id);
        if !path.exists() {
            return Err(GyattError::NotFound(format!("object {obj_id}")));
        }
        let raw = fs::read(&path)?;
        let (obj_type, data) =
            decode_envelope(&raw).map_err(|_| GyattError::CorruptObject(obj_id.to_string()))?;
        let actual = ObjectHash::from_type_and_data(obj_type, data);
        if &actual != obj_id {
            return Err(GyattError::CorruptObject(obj_id.to_string()));
        }
        Ok((data.to_vec(), obj_type))
    }

    pub fn exist(&self, obj_id: &ObjectHash) -> bool {
        self.object_path(obj_id).exists()
    }

    pub fn get_object_type(&self, obj_id: &ObjectHash) -> Result<ObjectType, GyattError> {
        self.get(obj_id).map(|(_, t)| t)
    }

    /// Enumerate every stored object id from the two-level fan-out layout.
    pub fn list(&self) -> Result<Vec<ObjectHash>, GyattError> {
        let mut ids = Vec::new();
        if !self.base_path.exists() {
            return Ok(ids);
        }
        for fanout in fs::read_dir(&self.base_path)? {
            let fanout = fanout?;
            if !fanout.file_type()?.is_dir() {
                continue;
            }
            let prefix = fanout.file_name().to_string_lossy().into_owned();
            if prefix.len() != 2 {
                continue;
            }
            for entry in fs::read_dir(fanout.path())? {
                let entry = entry?;
                let rest = entry.file_name().to_string_lossy().into_owned();
                if let Ok(id) = format!("{prefix}{rest}").parse() {
                    ids.push(id);
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Find ids whose hex form starts with `prefix`.
    pub fn search(&self, prefix: &str) -> Vec<ObjectHash> {
        self.list()
            .unwrap_or_default()
            .into_iter()
            .filter(|id| id.to_string().starts_with(prefix))
            .collect()
    }

    /// Size on disk of one object file, if present.
    pub fn object_file_len(&self, obj_id: &ObjectHash) -> Option<u64> {
        fs::metadata(self.object_path(obj_id)).ok().map(|m| m.len())
    }
}

/// `<type> <decimal-length>\0<raw>`
pub fn encode_envelope(obj_type: ObjectType, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 16);
    out.extend_from_slice(obj_type.as_str().as_bytes());
    out.push(b' ');
    out.extend_from_slice(data.len().to_string().as_bytes());
    out.push(0);
    out.extend_from_slice(data);
    out
}

/// Parse the envelope, verifying the type tag and the declared length.
pub fn decode_envelope(raw: &[u8]) -> Result<(ObjectType, &[u8]), GyattError> {
    let nul = raw
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| GyattError::BadFormat("object envelope: missing NUL".to_string()))?;
    let header = std::str::from_utf8(&raw[..nul])
        .map_err(|_| GyattError::BadFormat("object envelope: non-utf8 header".to_string()))?;
    let (tag, len_str) = header
        .split_once(' ')
        .ok_or_else(|| GyattError::BadFormat("object envelope: missing length".to_string()))?;
    let obj_type = ObjectType::from_tag(tag)?;
    let declared: usize = len_str
        .parse()
        .map_err(|_| GyattError::BadFormat(format!("object envelope: length '{len_str}'")))?;
    let data = &raw[nul + 1..];
    if data.len() != declared {
        return Err(GyattError::BadFormat(format!(
            "object envelope: declared {declared} bytes, found {}",
            data.len()
        )));
    }
    Ok((obj_type, data))
}
