#![allow(clippy::missing_errors_doc)]
use anyhow::{anyhow, Result};
use jsonschema::{Draft, JSONSchema};
use serde_json::json;
use serde_json::Value;

// Minimal shape guards; refine over time.
pub static RECORD_SCHEMA: std::sync::LazyLock<Value> = std::sync::LazyLock::new(|| {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "$id": "https://leafbook.dev/schema/record.json",
        "type": "object",
        "required": ["id", "kind", "ts", "actor", "payload", "status", "leaf"],
        "properties": {
            "id": {"type": "string"},
            "kind": {"type": "string"},
            "ts": {"type": "string", "format": "date-time"},
            "actor": {"type": "object", "required": ["id"], "properties": {"id": {"type":"string"}}},
            "context": {"type": "object"},
            "payload": {},
            "status": {"enum": ["pending", "completed", "failed"]},
            "leaf": {"type": "string", "pattern": "^[0-9a-f]+$"},
            "anchor": {
                "type": ["object", "null"],
                "required": ["date", "proof", "root"],
                "properties": {
                    "date": {"type": "string"},
                    "proof": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["sibling", "position"],
                            "properties": {
                                "sibling": {"type": "string"},
                                "position": {"enum": ["left", "right"]}
                            }
                        }
                    },
                    "root": {"type": "string"}
                }
            },
            "sign": {"type": ["object", "null"]}
        },
        "additionalProperties": true
    })
});

pub static ROOT_SCHEMA: std::sync::LazyLock<Value> = std::sync::LazyLock::new(|| {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "$id": "https://leafbook.dev/schema/root.json",
        "type": "object",
        "required": ["date", "root", "count"],
        "properties": {
            "date": {"type": "string"},
            "root": {"type": "string", "pattern": "^[0-9a-f]+$"},
            "count": {"type": "integer", "minimum": 1}
        },
        "additionalProperties": true
    })
});

fn validate_against(schema: &Value, v: &Value, what: &str) -> Result<()> {
    let compiled = JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(schema)
        .map_err(|e| anyhow!("invalid {what} schema: {e}"))?;
    if let Err(errs) = compiled.validate(v) {
        let msgs: Vec<String> = errs.map(|e| e.to_string()).collect();
        return Err(anyhow!("{what} schema violation: {}", msgs.join("; ")));
    }
    Ok(())
}

pub fn validate_record(v: &Value) -> Result<()> {
    validate_against(&RECORD_SCHEMA, v, "record")
}

pub fn validate_root(v: &Value) -> Result<()> {
    validate_against(&ROOT_SCHEMA, v, "root")
}
