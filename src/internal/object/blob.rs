use std::path::Path;

use crate::internal::errors::GyattError;
use crate::internal::hash::ObjectHash;
use crate::internal::object::types::ObjectType;
use crate::internal::object::ObjectTrait;

/// Opaque byte sequence; the value is the file content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Blob {
    pub id: ObjectHash,
    pub data: Vec<u8>,
}

impl Blob {
    pub fn from_content(content: &str) -> Blob {
        Blob::from_content_bytes(content.as_bytes().to_vec())
    }

    pub fn from_content_bytes(data: Vec<u8>) -> Blob {
        let id = ObjectHash::from_type_and_data(ObjectType::Blob, &data);
        Blob { id, data }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Blob, GyattError> {
        let data = std::fs::read(path.as_ref())?;
        Ok(Blob::from_content_bytes(data))
    }
}

impl ObjectTrait for Blob {
    fn get_type(&self) -> ObjectType {
        ObjectType::Blob
    }

    fn from_bytes(data: &[u8], id: ObjectHash) -> Result<Blob, GyattError> {
        Ok(Blob {
            id,
            data: data.to_vec(),
        })
    }

    fn to_data(&self) -> Result<Vec<u8>, GyattError> {
        Ok(self.data.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_is_stable() {
        let blob = Blob::from_content("hello\n");
        assert_eq!(
            blob.id.to_string(),
            "ce013625030ba8dba906f756967f9e9ca394464a"
        );
    }

    #[test]
    fn data_round_trip() {
        let blob = Blob::from_content_bytes(vec![0, 159, 146, 150]);
        let back = Blob::from_bytes(&blob.to_data().unwrap(), blob.id).unwrap();
        assert_eq!(back, blob);
    }
}
