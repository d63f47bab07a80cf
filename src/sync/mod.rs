pub mod policy;

use anyhow::{anyhow, Result};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrustLevel {
    Full,
    ReadOnly,
    Quarantine,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PeerInfo {
    pub id: String,  // did:web / did:key
    pub url: String, // https://peer
    pub trust: TrustLevel,
}

/// Accept either a literal base URL or the id of a peer configured in
/// peers.toml.
pub fn resolve_peer_url(guard: &policy::PeerGuard, peer: &str) -> Result<String> {
    if peer.contains("://") {
        return Ok(peer.to_string());
    }
    guard
        .peer(peer)
        .map(|p| p.url.clone())
        .ok_or_else(|| anyhow!("unknown peer id: {peer}"))
}

/// POST a signed record to a peer gateway and return its response body.
pub fn push_record(peer_url: &str, record: &crate::record::Record) -> Result<serde_json::Value> {
    let url = format!("{}/v1/records", peer_url.trim_end_matches('/'));
    let resp = ureq::post(&url)
        .send_json(serde_json::to_value(record)?)
        .map_err(|e| anyhow!("push to {url} failed: {e}"))?;
    Ok(resp.into_json()?)
}

/// Merkle root over the full sorted digest set of a store; the integrity
/// summary a gateway reports after each ingest.
pub fn store_root(digests: &[String]) -> Result<String> {
    let tree = crate::merkle::MerkleTree::build(digests)?;
    Ok(tree.root().to_string())
}
