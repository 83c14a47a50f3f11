//! Transport layer: the pooled HTTP client, the GitHub Git Data client, the
//! IPFS content store, and the local filesystem copier.

pub mod github;
pub mod http;
pub mod ipfs;
pub mod local_client;
