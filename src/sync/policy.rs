use crate::sync::{PeerInfo, TrustLevel};
use serde::Deserialize;
use std::{collections::HashMap, fs, path::PathBuf, sync::LazyLock};

#[derive(Debug, Default, Deserialize)]
pub struct PeerConfig {
    #[serde(default)]
    pub peers: Vec<PeerInfo>,
}

impl PeerConfig {
    fn load_from(path: &PathBuf) -> Option<Self> {
        let data = fs::read_to_string(path).ok()?;
        toml::from_str::<Self>(&data).ok()
    }
}

/// Peer registry + ingest policy. With no configured peers every actor is
/// accepted; once peers are listed, ingest requires an entry with full
/// trust.
pub struct PeerGuard {
    peers: HashMap<String, PeerInfo>,
}

impl PeerGuard {
    fn new() -> Self {
        let path = std::env::var("LEAFBOOK_PEERS_TOML")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                let mut p = dirs::home_dir()?;
                p.push(".leafbook");
                p.push("peers.toml");
                Some(p)
            });
        let cfg = path
            .and_then(|p| PeerConfig::load_from(&p))
            .unwrap_or_default();
        Self::from_config(cfg)
    }

    #[must_use]
    pub fn from_config(cfg: PeerConfig) -> Self {
        let peers = cfg
            .peers
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();
        Self { peers }
    }

    #[must_use]
    pub fn allowed(&self, actor_id: &str) -> bool {
        if self.peers.is_empty() {
            return true;
        }
        self.peers
            .get(actor_id)
            .is_some_and(|p| matches!(p.trust, TrustLevel::Full))
    }

    /// Look up a configured peer by id.
    #[must_use]
    pub fn peer(&self, id: &str) -> Option<&PeerInfo> {
        self.peers.get(id)
    }
}

pub static PEER_GUARD: LazyLock<PeerGuard> = LazyLock::new(PeerGuard::new);
