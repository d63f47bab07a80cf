use axum::{
    extract::Path,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::time::Duration;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::merkle::{verify_proof, ProofStep};
use crate::record;
use crate::schema;
use crate::store;
use crate::sync::policy::PEER_GUARD;
use crate::sync::store_root;

pub async fn health() -> &'static str {
    "ok"
}

/// Return stored record JSON by digest.
///
/// # Errors
/// Returns an error when the digest is unknown or the store read fails.
pub async fn get_record(Path(digest): Path<String>) -> Result<String, (StatusCode, String)> {
    let data = store::get_json(&digest).map_err(|e| (StatusCode::NOT_FOUND, e.to_string()))?;
    Ok(String::from_utf8_lossy(&data).into_owned())
}

/// Ingest a signed record pushed by a peer.
///
/// # Errors
/// Returns an error when the record is malformed, the actor is not
/// allow-listed, signature validation fails, or the store cannot persist.
pub async fn post_record(Json(body): Json<Value>) -> Result<Json<Value>, (StatusCode, String)> {
    tokio::time::timeout(Duration::from_secs(15), async move { ingest(&body) })
        .await
        .map_err(|_| (StatusCode::REQUEST_TIMEOUT, "request_timeout".to_string()))?
}

fn ingest(body: &Value) -> Result<Json<Value>, (StatusCode, String)> {
    schema::validate_record(body).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let rec: record::Record = serde_json::from_value(body.clone())
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    if !PEER_GUARD.allowed(&rec.actor.id) {
        let msg = format!("actor not allowed: {}", rec.actor.id);
        return Err((StatusCode::FORBIDDEN, msg));
    }

    record::verify_record(&rec).map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;

    if record::canonical_leaf_hex(&rec) != rec.leaf {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "leaf mismatch: record not canonical".to_string(),
        ));
    }

    let bytes =
        serde_json::to_vec(body).map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let digest = store::add_json(&bytes)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let digests: Vec<String> = store::list()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .into_iter()
        .filter(|e| e.kind == "record")
        .map(|e| e.digest)
        .collect();
    let root = store_root(&digests)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(json!({
        "status": "stored",
        "record_digest": digest,
        "store_root": root
    })))
}

#[derive(serde::Deserialize)]
pub struct VerifyRequest {
    pub leaf: String,
    pub proof: Vec<ProofStep>,
    pub root: String,
}

/// Stateless proof check: fold the positional proof from `leaf` and
/// compare against `root`.
pub async fn post_verify(Json(req): Json<VerifyRequest>) -> Json<Value> {
    let ok = verify_proof(&req.leaf, &req.proof, &req.root);
    Json(json!({ "verified": ok }))
}

#[must_use]
pub fn router() -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/records/:digest", get(get_record))
        .route("/v1/records", post(post_record))
        .route("/v1/verify", post(post_verify))
        .layer(TraceLayer::new_for_http())
        .layer(ConcurrencyLimitLayer::new(64))
}

/// Launch the HTTP gateway on the provided socket address.
///
/// # Errors
/// Returns an error when the listener fails to bind or the server
/// terminates unexpectedly.
pub async fn run(addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("gateway listening on {addr}");
    axum::serve(listener, router()).await?;
    Ok(())
}
