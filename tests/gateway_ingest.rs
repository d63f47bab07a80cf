use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use ed25519_dalek::{Keypair, PublicKey, SecretKey};
use serde_json::Value;
use std::io::Write;
use tempfile::tempdir;
use tower::ServiceExt;

use leafbook::gateway;
use leafbook::record::{self, Record};

fn test_keypair() -> Keypair {
    let mut seed = [0u8; 32];
    seed[3] = 7;
    let secret = SecretKey::from_bytes(&seed).unwrap();
    let public = PublicKey::from(&secret);
    Keypair { secret, public }
}

fn make_record(actor: &str) -> Record {
    std::env::set_var("LEAFBOOK_ACTOR_DID", actor);
    Record::new("scan", serde_json::json!({"target": "host-1"})).unwrap()
}

async fn post_record(rec: &Record) -> (StatusCode, Value) {
    let bytes = serde_json::to_vec(rec).unwrap();
    let resp = gateway::router()
        .oneshot(
            Request::post("/v1/records")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(bytes))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = resp.status();
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    // error responses are plain text, success is JSON
    let v = serde_json::from_slice(&body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()));
    (status, v)
}

#[tokio::test]
async fn ingest_enforces_policy_signature_and_canonical_leaf() {
    let store = tempdir().unwrap();
    std::env::set_var("LEAFBOOK_STORE_DIR", store.path());

    let cfg_dir = tempdir().unwrap();
    let peers_path = cfg_dir.path().join("peers.toml");
    std::fs::File::create(&peers_path)
        .unwrap()
        .write_all(
            br#"
[[peers]]
id = "did:key:zAllowed"
url = "http://127.0.0.1:9"
trust = "full"

[[peers]]
id = "did:key:zParked"
url = "http://127.0.0.1:9"
trust = "quarantine"
"#,
        )
        .unwrap();
    std::env::set_var("LEAFBOOK_PEERS_TOML", &peers_path);

    let kp = test_keypair();

    // unlisted actor is refused before any crypto checks
    let stranger = record::sign_record(make_record("did:key:zStranger"), &kp).unwrap();
    let (status, _) = post_record(&stranger).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // listed but not fully trusted
    let parked = record::sign_record(make_record("did:key:zParked"), &kp).unwrap();
    let (status, _) = post_record(&parked).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // missing signature
    let unsigned = make_record("did:key:zAllowed");
    let (status, _) = post_record(&unsigned).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // tampering after signing breaks the signature
    let mut tampered = record::sign_record(make_record("did:key:zAllowed"), &kp).unwrap();
    tampered.payload = serde_json::json!({"target": "host-evil"});
    let (status, _) = post_record(&tampered).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // valid signature but a leaf that does not match the canonical form
    let mut skewed = record::sign_record(make_record("did:key:zAllowed"), &kp).unwrap();
    skewed.leaf = leafbook::merkle::leaf_hex(b"someone else's leaf");
    let (status, body) = post_record(&skewed).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body.as_str().unwrap_or_default().contains("leaf mismatch"));

    // well-formed signed record is stored; with a single record in the
    // store the reported root equals its digest
    let good = record::sign_record(make_record("did:key:zAllowed"), &kp).unwrap();
    let (status, body) = post_record(&good).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "stored");
    let digest = body["record_digest"].as_str().unwrap();
    assert_eq!(digest.len(), 64);
    assert_eq!(body["store_root"], body["record_digest"]);

    let stored = leafbook::store::get_json(digest).unwrap();
    let round: Record = serde_json::from_slice(&stored).unwrap();
    assert_eq!(round.leaf, good.leaf);
}

#[tokio::test]
async fn record_fetch_rejects_traversal_digests() {
    let resp = gateway::router()
        .oneshot(
            Request::get("/v1/records/..%2F..%2Fsecret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
