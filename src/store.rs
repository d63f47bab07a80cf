use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Entry {
    pub kind: String,   // "record" | "root" | "unknown"
    pub digest: String, // hex blake3 of the stored JSON
}

fn store_dir() -> Result<PathBuf> {
    if let Ok(custom) = std::env::var("LEAFBOOK_STORE_DIR") {
        let dir = PathBuf::from(custom);
        std::fs::create_dir_all(&dir)?;
        return Ok(dir);
    }
    let home = dirs::home_dir().ok_or_else(|| anyhow!("no home dir"))?;
    let dir = home.join(".leafbook").join("store");
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Persist JSON bytes content-addressed by their blake3 digest.
pub fn add_json(bytes: &[u8]) -> Result<String> {
    let digest = crate::merkle::leaf_hex(bytes);
    let path = store_dir()?.join(format!("{digest}.json"));
    std::fs::write(&path, bytes)?;
    Ok(digest)
}

pub fn get_json(digest: &str) -> Result<Vec<u8>> {
    checked_digest(digest)?;
    let path = store_dir()?.join(format!("{digest}.json"));
    let data = std::fs::read(&path).map_err(|_| anyhow!("no stored document for {digest}"))?;
    Ok(data)
}

// Digests name files; anything but plain lowercase hex could escape the
// store directory.
fn checked_digest(digest: &str) -> Result<()> {
    let plain_hex = !digest.is_empty()
        && digest
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
    if plain_hex {
        Ok(())
    } else {
        Err(anyhow!("invalid digest {digest:?}: expected lowercase hex"))
    }
}

pub fn list() -> Result<Vec<Entry>> {
    let dir = store_dir()?;
    let mut out = Vec::new();
    for ent in std::fs::read_dir(&dir)? {
        let ent = ent?;
        let name = ent.file_name().to_string_lossy().to_string();
        let Some(digest) = name.strip_suffix(".json") else {
            continue;
        };
        let bytes = match std::fs::read(ent.path()) {
            Ok(b) => b,
            Err(e) => {
                log::warn!("skipping unreadable store entry {name}: {e}");
                continue;
            }
        };
        out.push(Entry {
            kind: classify(&bytes),
            digest: digest.to_string(),
        });
    }
    out.sort_by(|a, b| a.digest.cmp(&b.digest));
    Ok(out)
}

fn classify(bytes: &[u8]) -> String {
    if let Ok(v) = serde_json::from_slice::<serde_json::Value>(bytes) {
        if crate::schema::validate_record(&v).is_ok() {
            return "record".into();
        }
        if crate::schema::validate_root(&v).is_ok() {
            return "root".into();
        }
    }
    "unknown".into()
}
