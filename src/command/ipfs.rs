//! Mirror the object database onto the P2P content network.

use std::io::Write;
use std::str::FromStr;

use clap::Subcommand;

use crate::internal::errors::GyattError;
use crate::internal::hash::ObjectHash;
use crate::internal::protocol::ipfs::{IpfsClient, IpfsStore};

#[derive(Subcommand, Debug)]
pub enum IpfsCmds {
    /// Upload every local object and publish the branch manifest
    Push,
    /// Fetch one object by id, verifying its content hash
    Get {
        /// Object id
        hash: String,
    },
    /// Unpin one previously uploaded object
    Unpin {
        /// Object id
        hash: String,
    },
    /// Check whether the daemon is reachable
    Status,
}

pub async fn execute(cmd: IpfsCmds) -> Result<(), GyattError> {
    match cmd {
        IpfsCmds::Push => {
            let storage = crate::command::object_storage()?;
            let store = IpfsStore::open()?;
            let stats = store.push_all(&storage).await?;
            let manifest_cid = store.publish_manifest(&storage).await?;
            println!(
                "uploaded {} objects ({} already present, {} failed)",
                stats.uploaded, stats.cached, stats.failed
            );
            println!("manifest: {manifest_cid}");
            Ok(())
        }
        IpfsCmds::Get { hash } => {
            let id = ObjectHash::from_str(&hash)?;
            let store = IpfsStore::open()?;
            let data = store.get_object(&id).await?;
            std::io::stdout().write_all(&data)?;
            Ok(())
        }
        IpfsCmds::Unpin { hash } => {
            let id = ObjectHash::from_str(&hash)?;
            let store = IpfsStore::open()?;
            let cid = store
                .lookup(&id)?
                .ok_or_else(|| GyattError::NotFound(format!("ipfs mapping for {id}")))?;
            store.client().pin_rm(&cid).await?;
            println!("unpinned {cid}");
            Ok(())
        }
        IpfsCmds::Status => {
            let client = IpfsClient::new();
            if !client.is_online().await {
                println!("ipfs daemon: offline");
                return Ok(());
            }
            println!("ipfs daemon: online");
            if let Ok(refs) = client.refs_local().await {
                println!("local blocks: {}", refs.len());
            }
            if let Ok(pins) = client.pin_ls().await {
                println!("pinned objects: {}", pins.len());
            }
            Ok(())
        }
    }
}
