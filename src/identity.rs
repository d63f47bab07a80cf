use std::env;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use dirs::home_dir;
use ed25519_dalek::{Keypair, PublicKey, SecretKey};
use getrandom::getrandom;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Safe characters for a did:web path segment; everything else is escaped.
const DID_WEB_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_');

const MULTICODEC_ED25519_PREFIX: [u8; 2] = [0xed, 0x01];

#[derive(Serialize, Deserialize)]
struct ActorKeyFile {
    alg: String,
    /// hex-encoded 32-byte ed25519 seed
    seed: String,
    #[serde(default)]
    did: Option<String>,
}

impl ActorKeyFile {
    fn seed_bytes(&self) -> Result<Vec<u8>> {
        if self.alg.to_lowercase() != "ed25519" {
            return Err(anyhow!("unsupported actor key algorithm: {}", self.alg));
        }
        hex::decode(self.seed.trim()).map_err(|e| anyhow!("invalid actor key encoding: {e}"))
    }
}

/// Resolve the DID stamped onto records: explicit override first, then
/// did:web composed from an explicit domain + subject, then a local
/// did:key generated on first use.
#[allow(clippy::missing_errors_doc)]
pub fn resolve_actor_did() -> Result<String> {
    if let Some(did) = env_trimmed("LEAFBOOK_ACTOR_DID") {
        return Ok(did);
    }
    if let Some(did) = did_web_from_env() {
        return Ok(did);
    }
    let kp = load_actor_keypair()?;
    Ok(did_key_from_public(kp.public.as_bytes()))
}

fn did_web_from_env() -> Option<String> {
    // did:web requires a domain that actually hosts the DID document; we
    // do not rewrite dots.
    let domain = env_trimmed("LEAFBOOK_DID_WEB_DOMAIN")?;
    let subject = env_trimmed("LEAFBOOK_ACTOR_SUBJECT")?;
    let encoded = utf8_percent_encode(&subject, DID_WEB_SEGMENT).to_string();
    Some(format!("did:web:{domain}:users:{encoded}"))
}

/// Load the local actor keypair, generating and persisting a fresh seed
/// on first use (key dir 0700, key file 0600 on unix).
#[allow(clippy::missing_errors_doc)]
pub fn load_actor_keypair() -> Result<Keypair> {
    let path = actor_key_path()?;
    if !path.exists() {
        return generate_and_store(&path);
    }
    let bytes = fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
    let file: ActorKeyFile =
        serde_json::from_slice(&bytes).map_err(|e| anyhow!("bad actor.key json: {e}"))?;
    let mut seed = file.seed_bytes()?;
    let secret =
        SecretKey::from_bytes(&seed).map_err(|e| anyhow!("invalid actor seed: {e}"))?;
    seed.zeroize();
    let public = PublicKey::from(&secret);
    Ok(Keypair { secret, public })
}

fn generate_and_store(path: &Path) -> Result<Keypair> {
    let key_dir = path
        .parent()
        .ok_or_else(|| anyhow!("invalid actor key path"))?;
    if !key_dir.exists() {
        fs::create_dir_all(key_dir).with_context(|| format!("creating {}", key_dir.display()))?;
        set_mode(key_dir, 0o700)?;
    }

    let mut seed = [0u8; 32];
    getrandom(&mut seed).map_err(|e| anyhow!("getrandom error: {e}"))?;
    let secret = SecretKey::from_bytes(&seed).map_err(|e| anyhow!("secret key error: {e}"))?;
    let public = PublicKey::from(&secret);

    let file = ActorKeyFile {
        alg: "ed25519".into(),
        seed: hex::encode(seed),
        did: Some(did_key_from_public(public.as_bytes())),
    };
    seed.zeroize();

    let mut out = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    set_mode(path, 0o600)?;
    out.write_all(&serde_json::to_vec_pretty(&file)?)
        .with_context(|| format!("writing {}", path.display()))?;

    Ok(Keypair { secret, public })
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .with_context(|| format!("setting permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

fn actor_key_path() -> Result<PathBuf> {
    if let Some(p) = env_trimmed("LEAFBOOK_ACTOR_KEY_PATH") {
        if let Some(stripped) = p.strip_prefix("~/") {
            let mut home =
                home_dir().ok_or_else(|| anyhow!("unable to determine home directory"))?;
            home.push(stripped);
            return Ok(home);
        }
        return Ok(PathBuf::from(p));
    }
    let mut dir = home_dir().ok_or_else(|| anyhow!("unable to determine home directory"))?;
    dir.push(".leafbook");
    dir.push("actor.key");
    Ok(dir)
}

fn did_key_from_public(public_key: &[u8]) -> String {
    let mut data = Vec::with_capacity(MULTICODEC_ED25519_PREFIX.len() + public_key.len());
    data.extend_from_slice(&MULTICODEC_ED25519_PREFIX);
    data.extend_from_slice(public_key);
    format!("did:key:z{}", bs58::encode(data).into_string())
}

fn env_trimmed(key: &str) -> Option<String> {
    let s = env::var(key).ok()?.trim().to_string();
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn did_key_has_multibase_prefix() {
        let mut seed = [0u8; 32];
        seed[0] = 1;
        let secret = SecretKey::from_bytes(&seed).unwrap();
        let public = PublicKey::from(&secret);
        assert!(did_key_from_public(public.as_bytes()).starts_with("did:key:z"));
    }

    #[test]
    fn did_web_subject_encoding() {
        let cases = [
            ("Alice Bob", "Alice%20Bob"),
            ("alice/bob", "alice%2Fbob"),
            ("ALICE@ORG", "ALICE%40ORG"),
            ("team:blue", "team%3Ablue"),
        ];
        for (sub, expected) in cases {
            let encoded = utf8_percent_encode(sub, DID_WEB_SEGMENT).to_string();
            assert_eq!(encoded, expected);
        }
    }

    #[test]
    fn key_file_rejects_unknown_alg() {
        let file = ActorKeyFile {
            alg: "rsa".into(),
            seed: "00".repeat(32),
            did: None,
        };
        assert!(file.seed_bytes().is_err());
    }
}
