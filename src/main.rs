use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;

use leafbook::merkle::{verify_proof, MerkleTree};
use leafbook::record::{self, Record, Status};
use leafbook::{gateway, identity, store, sync};

#[derive(Parser)]
#[command(name = "leafbook")]
#[command(about = "Leafbook CLI — records, Merkle anchoring, verification")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Record operations
    Record {
        #[command(subcommand)]
        cmd: RecordCmd,
    },
    /// Build a Merkle root over all record leaves in a directory
    Seal {
        /// Date label for the sealed set (YYYY-MM-DD)
        #[arg(long)]
        date: String,
        /// Directory containing record JSON files
        #[arg(long, default_value = ".")]
        dir: String,
        /// Output path for the root document
        #[arg(long)]
        out: String,
    },
    /// Embed a record's Merkle proof computed from a directory of records
    Anchor {
        /// Path to record JSON
        #[arg(long)]
        record: String,
        /// Directory containing ALL records for the sealed set
        #[arg(long)]
        dir: String,
        /// Date label (YYYY-MM-DD)
        #[arg(long)]
        date: String,
        /// Output path for the anchored record
        #[arg(long)]
        out: String,
    },
    /// Verify a record against a published root document
    Verify {
        /// Path to record JSON
        #[arg(long)]
        record: String,
        /// Path to root document JSON
        #[arg(long)]
        root: String,
        /// Also require a terminal status and a valid signature
        #[arg(long, default_value_t = false)]
        strict: bool,
    },
    /// Store operations
    Store {
        #[command(subcommand)]
        cmd: StoreCmd,
    },
    /// Push a signed record to a peer gateway
    Push {
        /// Path to record JSON
        #[arg(long)]
        record: String,
        /// Peer base URL, or the id of a peer from peers.toml
        #[arg(long)]
        peer: String,
    },
    /// Run the HTTP gateway
    Serve {
        #[arg(long, default_value = "127.0.0.1:8733")]
        addr: String,
    },
}

#[derive(Subcommand)]
enum RecordCmd {
    /// Create a pending record from a payload JSON file
    Emit {
        #[arg(long)]
        kind: String,
        #[arg(long)]
        payload: String,
        #[arg(long)]
        out: String,
    },
    /// Transition a pending record to completed
    Complete {
        #[arg(long)]
        record: String,
        #[arg(long)]
        out: String,
    },
    /// Transition a pending record to failed
    Fail {
        #[arg(long)]
        record: String,
        #[arg(long)]
        out: String,
    },
    /// Sign a record with the local actor key
    Sign {
        #[arg(long)]
        record: String,
        #[arg(long)]
        out: String,
    },
}

#[derive(Subcommand)]
enum StoreCmd {
    /// Add a JSON document, content-addressed by its digest
    Add {
        #[arg(long)]
        file: String,
    },
    /// Print a stored document by digest
    Get {
        #[arg(long)]
        digest: String,
    },
    /// List stored documents with their classified kinds
    List,
}

fn read_record(path: &str) -> Result<Record> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn write_json<T: serde::Serialize>(path: &str, t: &T) -> Result<()> {
    fs::write(path, serde_json::to_string_pretty(t)?)?;
    Ok(())
}

/// Sorted leaf digests of every record JSON in a directory. Sorting makes
/// the sealed tree deterministic for a given record set.
fn collect_leaves(dir: &str) -> Result<Vec<String>> {
    let mut leaves = Vec::new();
    for entry in fs::read_dir(dir)? {
        let p = entry?.path();
        if p.extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        match serde_json::from_slice::<Record>(&fs::read(&p)?) {
            Ok(rec) => leaves.push(rec.leaf),
            Err(e) => log::warn!("skipping {}: {e}", p.display()),
        }
    }
    leaves.sort();
    Ok(leaves)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Record { cmd } => match cmd {
            RecordCmd::Emit { kind, payload, out } => {
                let payload: Value = serde_json::from_slice(&fs::read(&payload)?)?;
                let rec = Record::new(kind, payload)?;
                write_json(&out, &rec)?;
                println!("EMITTED {out}");
            }
            RecordCmd::Complete { record, out } => {
                let mut rec = read_record(&record)?;
                rec.complete()?;
                write_json(&out, &rec)?;
                println!("COMPLETED {out}");
            }
            RecordCmd::Fail { record, out } => {
                let mut rec = read_record(&record)?;
                rec.fail()?;
                write_json(&out, &rec)?;
                println!("FAILED {out}");
            }
            RecordCmd::Sign { record, out } => {
                let rec = read_record(&record)?;
                let kp = identity::load_actor_keypair()?;
                let rec = record::sign_record(rec, &kp)?;
                write_json(&out, &rec)?;
                println!("SIGNED {out}");
            }
        },
        Cmd::Seal { date, dir, out } => {
            let leaves = collect_leaves(&dir)?;
            let tree = MerkleTree::build(&leaves)?;
            let root_doc = json!({
                "date": date,
                "root": tree.root(),
                "count": tree.leaf_count()
            });
            write_json(&out, &root_doc)?;
            println!("SEALED {out}");
        }
        Cmd::Anchor {
            record,
            dir,
            date,
            out,
        } => {
            let mut rec = read_record(&record)?;
            let leaves = collect_leaves(&dir)?;
            let index = leaves
                .iter()
                .position(|l| *l == rec.leaf)
                .ok_or_else(|| anyhow!("leaf not found in set; ensure dir is the sealed set"))?;
            let tree = MerkleTree::build(&leaves)?;
            let proof = tree.proof(index)?;
            rec.anchor = Some(record::Anchor {
                date,
                proof,
                root: tree.root().to_string(),
            });
            write_json(&out, &rec)?;
            println!("ANCHORED {out}");
        }
        Cmd::Verify {
            record,
            root,
            strict,
        } => {
            let rec = read_record(&record)?;
            if record::canonical_leaf_hex(&rec) != rec.leaf {
                return Err(anyhow!("leaf mismatch: record tampered or not canonical"));
            }
            let root_doc: Value = serde_json::from_slice(&fs::read(&root)?)?;
            let root_hex = root_doc
                .get("root")
                .and_then(|v| v.as_str())
                .ok_or_else(|| anyhow!("invalid root document"))?;
            let anchor = rec
                .anchor
                .as_ref()
                .ok_or_else(|| anyhow!("record has no anchor; run `leafbook anchor` first"))?;
            if !verify_proof(&rec.leaf, &anchor.proof, root_hex) {
                return Err(anyhow!("proof->root mismatch"));
            }
            if strict {
                if rec.status == Status::Pending {
                    return Err(anyhow!("strict: record still pending"));
                }
                record::verify_record(&rec).map_err(|e| anyhow!("strict: {e}"))?;
            }
            println!("VERIFIED");
        }
        Cmd::Store { cmd } => match cmd {
            StoreCmd::Add { file } => {
                let bytes = fs::read(Path::new(&file))?;
                let digest = store::add_json(&bytes)?;
                println!("{digest}");
            }
            StoreCmd::Get { digest } => {
                let bytes = store::get_json(&digest)?;
                println!("{}", String::from_utf8_lossy(&bytes));
            }
            StoreCmd::List => {
                for entry in store::list()? {
                    println!("{}\t{}", entry.kind, entry.digest);
                }
            }
        },
        Cmd::Push { record, peer } => {
            let rec = read_record(&record)?;
            let url = sync::resolve_peer_url(&sync::policy::PEER_GUARD, &peer)?;
            let resp = sync::push_record(&url, &rec)?;
            println!("{}", serde_json::to_string_pretty(&resp)?);
        }
        Cmd::Serve { addr } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(gateway::run(&addr))?;
        }
    }
    Ok(())
}
