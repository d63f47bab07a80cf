use crate::context::collect_context;
use crate::identity::resolve_actor_did;
use crate::merkle::ProofStep;
use anyhow::{anyhow, Result};
use base64::Engine as _;
use ed25519_dalek::{Keypair, PublicKey, Signature, Signer, Verifier};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("record already terminal ({from}); cannot transition")]
    AlreadyTerminal { from: Status },
}

/// Record lifecycle. Pending is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Completed,
    Failed,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Pending => "pending",
            Status::Completed => "completed",
            Status::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Actor {
    pub id: String,
}

/// Merkle binding for a sealed set: the proof folds the record's leaf to
/// the published root for `date`.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Anchor {
    pub date: String,
    pub proof: Vec<ProofStep>,
    pub root: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Sign {
    #[serde(rename = "pub")]
    pub pub_: String,
    pub sig: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Record {
    pub id: String,
    pub kind: String,
    pub ts: String,
    pub actor: Actor,
    pub context: BTreeMap<String, String>,
    pub payload: Value,
    pub status: Status,
    /// blake3 hex of the canonical payload (derived fields stripped).
    pub leaf: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor: Option<Anchor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sign: Option<Sign>,
}

impl Record {
    /// Create a pending record for a caller-supplied payload. The actor
    /// DID and host context are resolved from the environment.
    pub fn new(kind: impl Into<String>, payload: Value) -> Result<Self> {
        let actor = Actor {
            id: resolve_actor_did()?,
        };
        let ts = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let mut rec = Record {
            id: ulid::Ulid::new().to_string(),
            kind: kind.into(),
            ts,
            actor,
            context: collect_context(),
            payload,
            status: Status::Pending,
            leaf: String::new(),
            anchor: None,
            sign: None,
        };
        rec.leaf = canonical_leaf_hex(&rec);
        Ok(rec)
    }

    pub fn complete(&mut self) -> Result<(), RecordError> {
        self.transition(Status::Completed)
    }

    pub fn fail(&mut self) -> Result<(), RecordError> {
        self.transition(Status::Failed)
    }

    fn transition(&mut self, to: Status) -> Result<(), RecordError> {
        if self.status != Status::Pending {
            return Err(RecordError::AlreadyTerminal { from: self.status });
        }
        self.status = to;
        // status is part of the hashed payload; the old leaf, anchor and
        // signature no longer bind
        self.anchor = None;
        self.sign = None;
        self.leaf = canonical_leaf_hex(self);
        Ok(())
    }
}

fn sort_json(v: Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut b = BTreeMap::new();
            for (k, val) in map {
                b.insert(k, sort_json(val));
            }
            Value::Object(b.into_iter().collect())
        }
        Value::Array(arr) => Value::Array(arr.into_iter().map(sort_json).collect()),
        _ => v,
    }
}

fn strip_derived(mut v: Value) -> Value {
    if let Value::Object(ref mut m) = v {
        m.remove("leaf");
        m.remove("anchor");
        m.remove("sign");
    }
    v
}

/// Canonical JSON: derived fields removed, every object key sorted.
#[must_use]
pub fn canonical_payload_json(rec: &Record) -> String {
    let v = serde_json::to_value(rec).expect("serialize");
    let v = sort_json(strip_derived(v));
    serde_json::to_string(&v).expect("serialize")
}

#[must_use]
pub fn canonical_leaf_hex(rec: &Record) -> String {
    crate::merkle::leaf_hex(canonical_payload_json(rec).as_bytes())
}

/// Sign the canonical digest with an ed25519 actor key.
pub fn sign_record(mut rec: Record, kp: &Keypair) -> Result<Record> {
    rec.sign = None;
    let digest_hex = canonical_leaf_hex(&rec);
    let sig: Signature = kp.sign(digest_hex.as_bytes());
    let b64 = base64::engine::general_purpose::STANDARD;
    rec.sign = Some(Sign {
        pub_: b64.encode(kp.public.as_bytes()),
        sig: b64.encode(sig.to_bytes()),
        alg: Some("ed25519".to_string()),
    });
    Ok(rec)
}

pub fn verify_record(rec: &Record) -> Result<()> {
    let sign = rec.sign.as_ref().ok_or_else(|| anyhow!("missing sign"))?;
    let b64 = base64::engine::general_purpose::STANDARD;
    let pub_bytes = b64
        .decode(sign.pub_.as_bytes())
        .map_err(|e| anyhow!("bad public b64: {e}"))?;
    let sig_bytes = b64
        .decode(sign.sig.as_bytes())
        .map_err(|e| anyhow!("bad signature b64: {e}"))?;
    let pk = PublicKey::from_bytes(&pub_bytes).map_err(|e| anyhow!("bad public: {e}"))?;
    let sig = Signature::from_bytes(&sig_bytes).map_err(|e| anyhow!("bad signature: {e}"))?;

    let digest_hex = canonical_leaf_hex(rec);
    pk.verify(digest_hex.as_bytes(), &sig)
        .map_err(|e| anyhow!("signature verify failed: {e}"))
}
