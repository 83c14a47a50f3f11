//! P2P content store. Every local object can be mirrored onto an IPFS node;
//! the CID assigned by the daemon is remembered under
//! `ipfs-refs/<ab>/<remaining-38>` so uploads are idempotent. Retrieval
//! re-hashes the fetched payload against the requested object id, so a
//! misbehaving node can never inject altered content silently.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::internal::branch::Branch;
use crate::internal::errors::GyattError;
use crate::internal::hash::ObjectHash;
use crate::internal::protocol::http::{HttpPool, HttpRequest};
use crate::utils::client_storage::{decode_envelope, encode_envelope, ClientStorage};
use crate::utils::{path, util};

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:5001";
const ONLINE_CHECK_TIMEOUT: Duration = Duration::from_secs(2);
pub const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestEntry {
    pub commit: String,
    pub cid: String,
}

/// Small document enumerating branch heads, published to the network so a
/// peer can locate every object of the repository.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Manifest {
    pub version: u32,
    pub branches: BTreeMap<String, ManifestEntry>,
}

pub struct IpfsClient {
    api_base: String,
}

impl IpfsClient {
    pub fn new() -> IpfsClient {
        IpfsClient {
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    pub fn with_api_base(api_base: impl Into<String>) -> IpfsClient {
        IpfsClient {
            api_base: api_base.into(),
        }
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/api/v0/{name}", self.api_base)
    }

    /// The daemon's version endpoint must answer within a short timeout.
    pub async fn is_online(&self) -> bool {
        let req = HttpRequest::new(Method::POST, self.endpoint("version"))
            .timeout(ONLINE_CHECK_TIMEOUT);
        matches!(
            HttpPool::global().request(req).await,
            Ok(response) if response.is_success()
        )
    }

    pub async fn add(&self, content: Vec<u8>, name: &str) -> Result<String, GyattError> {
        let response = HttpPool::global()
            .post_multipart(&self.endpoint("add"), "file", name, content, None)
            .await
            .map_err(|_| GyattError::IpfsOffline)?;
        if !response.is_success() {
            return Err(GyattError::IpfsError(format!(
                "add failed with status {}",
                response.status
            )));
        }
        let parsed: AddResponse = response.json()?;
        Ok(parsed.hash)
    }

    pub async fn cat(&self, cid: &str) -> Result<Vec<u8>, GyattError> {
        let req = HttpRequest::new(Method::POST, format!("{}?arg={cid}", self.endpoint("cat")));
        let response = HttpPool::global()
            .request(req)
            .await
            .map_err(|_| GyattError::IpfsOffline)?;
        if !response.is_success() {
            return Err(GyattError::IpfsError(format!(
                "cat {cid} failed with status {}",
                response.status
            )));
        }
        Ok(response.body.to_vec())
    }

    pub async fn pin_add(&self, cid: &str) -> Result<(), GyattError> {
        self.simple_call("pin/add", Some(cid)).await.map(|_| ())
    }

    pub async fn pin_rm(&self, cid: &str) -> Result<(), GyattError> {
        self.simple_call("pin/rm", Some(cid)).await.map(|_| ())
    }

    /// CIDs currently pinned by the daemon.
    pub async fn pin_ls(&self) -> Result<Vec<String>, GyattError> {
        #[derive(Deserialize)]
        struct PinLsResponse {
            #[serde(rename = "Keys", default)]
            keys: std::collections::BTreeMap<String, serde_json::Value>,
        }
        let body = self.simple_call("pin/ls", None).await?;
        let parsed: PinLsResponse = serde_json::from_slice(&body)
            .map_err(|e| GyattError::IpfsError(e.to_string()))?;
        Ok(parsed.keys.into_keys().collect())
    }

    /// CIDs present in the daemon's local blockstore.
    pub async fn refs_local(&self) -> Result<Vec<String>, GyattError> {
        #[derive(Deserialize)]
        struct RefLine {
            #[serde(rename = "Ref")]
            reference: String,
        }
        let body = self.simple_call("refs/local", None).await?;
        // streaming endpoint: one JSON object per line
        let mut refs = Vec::new();
        for line in body.split(|&b| b == b'\n') {
            if line.is_empty() {
                continue;
            }
            if let Ok(parsed) = serde_json::from_slice::<RefLine>(line) {
                refs.push(parsed.reference);
            }
        }
        Ok(refs)
    }

    async fn simple_call(
        &self,
        name: &str,
        arg: Option<&str>,
    ) -> Result<bytes::Bytes, GyattError> {
        let url = match arg {
            Some(arg) => format!("{}?arg={arg}", self.endpoint(name)),
            None => self.endpoint(name),
        };
        let response = HttpPool::global()
            .request(HttpRequest::new(Method::POST, url))
            .await
            .map_err(|_| GyattError::IpfsOffline)?;
        if !response.is_success() {
            return Err(GyattError::IpfsError(format!(
                "{name} failed with status {}",
                response.status
            )));
        }
        Ok(response.body)
    }
}

impl Default for IpfsClient {
    fn default() -> Self {
        IpfsClient::new()
    }
}

/// Per-repository SHA→CID mapping plus the upload/download flows.
pub struct IpfsStore {
    client: IpfsClient,
    refs_dir: PathBuf,
}

#[derive(Debug, Default)]
pub struct PushStats {
    pub uploaded: usize,
    pub cached: usize,
    pub failed: usize,
}

impl IpfsStore {
    /// Open the store for the current repository. The daemon endpoint can
    /// be overridden with `[ipfs] api = <url>` in the config.
    pub fn open() -> Result<IpfsStore, GyattError> {
        let client = match crate::internal::config::Config::get("ipfs", None, "api")? {
            Some(api) => IpfsClient::with_api_base(api),
            None => IpfsClient::new(),
        };
        Ok(IpfsStore {
            client,
            refs_dir: path::ipfs_refs()?,
        })
    }

    pub fn client(&self) -> &IpfsClient {
        &self.client
    }

    fn mapping_path(&self, id: &ObjectHash) -> PathBuf {
        let hex = id.to_string();
        self.refs_dir.join(&hex[..2]).join(&hex[2..])
    }

    /// CID previously assigned to this object, if any.
    pub fn lookup(&self, id: &ObjectHash) -> Result<Option<String>, GyattError> {
        let file = self.mapping_path(id);
        if !file.exists() {
            return Ok(None);
        }
        let cid = std::fs::read_to_string(file)?.trim().to_string();
        Ok(if cid.is_empty() { None } else { Some(cid) })
    }

    fn store_mapping(&self, id: &ObjectHash, cid: &str) -> Result<(), GyattError> {
        util::atomic_write(&self.mapping_path(id), format!("{cid}\n").as_bytes())
    }

    /// Upload one object (as its typed envelope) and persist the mapping.
    /// A cached mapping short-circuits the network round trip.
    pub async fn put_object(
        &self,
        id: &ObjectHash,
        envelope: Vec<u8>,
    ) -> Result<String, GyattError> {
        if let Some(cid) = self.lookup(id)? {
            return Ok(cid);
        }
        let cid = self.client.add(envelope, &id.to_string()).await?;
        if let Err(err) = self.client.pin_add(&cid).await {
            tracing::warn!("pin of {cid} failed: {err}");
        }
        self.store_mapping(id, &cid)?;
        Ok(cid)
    }

    /// Fetch one object and verify it: the payload is re-hashed with its
    /// type tag and compared to the requested id. A mismatch is
    /// `HashMismatch`, never silently accepted.
    pub async fn get_object(&self, id: &ObjectHash) -> Result<Vec<u8>, GyattError> {
        let cid = self
            .lookup(id)?
            .ok_or_else(|| GyattError::NotFound(format!("ipfs mapping for {id}")))?;
        let envelope = self.client.cat(&cid).await?;
        verify_fetched_envelope(id, &envelope)
    }

    /// Stream every local object through [`IpfsStore::put_object`].
    /// Per-object failures are counted and reported, not fatal.
    pub async fn push_all(&self, storage: &ClientStorage) -> Result<PushStats, GyattError> {
        if !self.client.is_online().await {
            return Err(GyattError::IpfsOffline);
        }
        let mut stats = PushStats::default();
        for id in storage.list()? {
            if self.lookup(&id)?.is_some() {
                stats.cached += 1;
                continue;
            }
            let (data, obj_type) = match storage.get(&id) {
                Ok(pair) => pair,
                Err(err) => {
                    tracing::warn!("skipping unreadable object {id}: {err}");
                    stats.failed += 1;
                    continue;
                }
            };
            match self.put_object(&id, encode_envelope(obj_type, &data)).await {
                Ok(_) => stats.uploaded += 1,
                Err(err) => {
                    tracing::warn!("upload of {id} failed: {err}");
                    stats.failed += 1;
                }
            }
        }
        Ok(stats)
    }

    /// Build and upload the branch manifest; returns its CID. Branches whose
    /// head commit has no CID mapping yet are uploaded first.
    pub async fn publish_manifest(&self, storage: &ClientStorage) -> Result<String, GyattError> {
        let mut branches = BTreeMap::new();
        for branch in Branch::list_branches(None)? {
            let cid = match self.lookup(&branch.commit)? {
                Some(cid) => cid,
                None => {
                    let (data, obj_type) = storage.get(&branch.commit)?;
                    self.put_object(&branch.commit, encode_envelope(obj_type, &data))
                        .await?
                }
            };
            branches.insert(
                branch.name,
                ManifestEntry {
                    commit: branch.commit.to_string(),
                    cid,
                },
            );
        }
        let manifest = Manifest {
            version: MANIFEST_VERSION,
            branches,
        };
        let body = serde_json::to_vec(&manifest)
            .map_err(|e| GyattError::BadFormat(e.to_string()))?;
        self.client.add(body, "manifest.json").await
    }
}

/// Integrity gate for fetched payloads: parse the typed envelope and
/// compare the re-hash against the requested id.
fn verify_fetched_envelope(id: &ObjectHash, envelope: &[u8]) -> Result<Vec<u8>, GyattError> {
    let (obj_type, data) =
        decode_envelope(envelope).map_err(|_| GyattError::CorruptObject(id.to_string()))?;
    let actual = ObjectHash::from_type_and_data(obj_type, data);
    if &actual != id {
        return Err(GyattError::HashMismatch {
            expected: id.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(data.to_vec())
}

#[cfg(test)]
mod tests {
    use serial_test::serial;
    use tempfile::tempdir;

    use super::*;
    use crate::utils::test::{setup_with_new_gyatt_in, ChangeDirGuard};

    #[test]
    #[serial]
    fn mapping_layout_mirrors_object_store() {
        let dir = tempdir().unwrap();
        setup_with_new_gyatt_in(dir.path());
        let _guard = ChangeDirGuard::new(dir.path());

        let store = IpfsStore::open().unwrap();
        let id: ObjectHash = "ce013625030ba8dba906f756967f9e9ca394464a".parse().unwrap();
        let mapping = store.mapping_path(&id);
        assert!(mapping.ends_with("ipfs-refs/ce/013625030ba8dba906f756967f9e9ca394464a"));

        assert_eq!(store.lookup(&id).unwrap(), None);
        store.store_mapping(&id, "QmExample").unwrap();
        assert_eq!(store.lookup(&id).unwrap().as_deref(), Some("QmExample"));
        assert_eq!(
            std::fs::read_to_string(mapping).unwrap(),
            "QmExample\n"
        );
    }

    #[test]
    fn altered_bytes_trigger_hash_mismatch() {
        use crate::internal::object::types::ObjectType;

        let data = b"trustworthy bytes";
        let id = ObjectHash::from_type_and_data(ObjectType::Blob, data);

        // faithful server
        let ok = verify_fetched_envelope(&id, &encode_envelope(ObjectType::Blob, data)).unwrap();
        assert_eq!(ok, data);

        // same length, altered content
        let altered = encode_envelope(ObjectType::Blob, b"tampered bytes!!!");
        assert!(matches!(
            verify_fetched_envelope(&id, &altered),
            Err(GyattError::HashMismatch { .. })
        ));

        // damaged envelope
        assert!(matches!(
            verify_fetched_envelope(&id, b"garbage"),
            Err(GyattError::CorruptObject(_))
        ));
    }

    #[test]
    fn manifest_json_is_deterministic() {
        let mut branches = BTreeMap::new();
        branches.insert(
            "main".to_string(),
            ManifestEntry {
                commit: "a".repeat(40),
                cid: "QmMain".to_string(),
            },
        );
        branches.insert(
            "feature".to_string(),
            ManifestEntry {
                commit: "b".repeat(40),
                cid: "QmFeat".to_string(),
            },
        );
        let manifest = Manifest {
            version: MANIFEST_VERSION,
            branches,
        };
        let json = serde_json::to_string(&manifest).unwrap();
        // BTreeMap ordering freezes the byte-for-byte shape.
        assert_eq!(
            json,
            format!(
                "{{\"version\":1,\"branches\":{{\"feature\":{{\"commit\":\"{}\",\"cid\":\"QmFeat\"}},\"main\":{{\"commit\":\"{}\",\"cid\":\"QmMain\"}}}}}}",
                "b".repeat(40),
                "a".repeat(40)
            )
        );
        let back: Manifest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, manifest);
    }
}
