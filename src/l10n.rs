use std::{collections::BTreeSet, path::PathBuf};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use tracing::warn;

use crate::store;

const BACKUP: &str = ".backup";

#[derive(Parser)]
pub struct Args {
    #[command(subcommand)]
    mode: Mode,
    #[arg(from_global)]
    dry_run: bool
}

#[derive(Subcommand)]
enum Mode {
    /// List keys of the base file missing from each target
    Check {
        base: PathBuf,
        #[arg(required = true)]
        targets: Vec<PathBuf>
    },
    /// Copy keys missing from each target over from the base file
    Sync {
        base: PathBuf,
        #[arg(required = true)]
        targets: Vec<PathBuf>
    }
}

fn collect_paths(value: &Value, prefix: &str, out: &mut BTreeSet<String>) {
    let Value::Object(map) = value else { return };
    for (key, child) in map {
        let path = if prefix.is_empty() { key.clone() } else { format!("{prefix}.{key}") };
        collect_paths(child, &path, out);
        out.insert(path);
    }
}

/// Dotted path of every object key, sorted.
pub fn key_paths(value: &Value) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    collect_paths(value, "", &mut out);
    out
}

pub fn missing_keys(base: &Value, target: &Value) -> Vec<String> {
    let have = key_paths(target);
    key_paths(base).into_iter().filter(|k| !have.contains(k)).collect()
}

fn merge(base: &Map<String, Value>, target: &Map<String, Value>, prefix: &str, conflicts: &mut Vec<String>) -> Map<String, Value> {
    let mut out = target.clone();
    for (key, from_base) in base {
        let path = if prefix.is_empty() { key.clone() } else { format!("{prefix}.{key}") };
        match (from_base, target.get(key)) {
            (_, None) => { out.insert(key.clone(), from_base.clone()); },
            (Value::Object(b), Some(Value::Object(t))) => {
                out.insert(key.clone(), Value::Object(merge(b, t, &path, conflicts)));
            },
            (Value::Object(_), Some(_)) => conflicts.push(path),
            _ => ()
        }
    }
    out
}

/// New target with every key missing from it copied from `base`.
/// Where the target holds a non-object in place of a base object, the target wins and the path is reported.
pub fn merge_missing(base: &Value, target: &Value) -> (Value, Vec<String>) {
    let mut conflicts = Vec::new();
    let merged = match (base, target) {
        (Value::Object(b), Value::Object(t)) => Value::Object(merge(b, t, "", &mut conflicts)),
        _ => target.clone()
    };
    (merged, conflicts)
}

pub fn run(args: Args) -> anyhow::Result<()> {
    match args.mode {
        Mode::Check { base, targets } => {
            let base_doc: Value = store::read(&base)?;
            println!("{}: {} keys", base.display(), key_paths(&base_doc).len());
            for target in targets {
                let doc: Value = store::read(&target)?;
                let missing = missing_keys(&base_doc, &doc);
                println!("{}: {} missing", target.display(), missing.len());
                for key in missing {
                    println!("  {key}");
                }
            }
        },
        Mode::Sync { base, targets } => {
            let base_doc: Value = store::read(&base)?;
            for target in targets {
                if !target.exists() {
                    warn!("{} does not exist", target.display());
                    continue;
                }
                let doc: Value = store::read(&target)?;
                let (merged, conflicts) = merge_missing(&base_doc, &doc);
                for path in conflicts.iter() {
                    warn!("{}: kept non-object value at {path}", target.display());
                }
                let added = key_paths(&merged).len() - key_paths(&doc).len();
                println!("{}: {added} keys added", target.display());
                if added > 0 {
                    store::commit(&target, &merged, BACKUP, args.dry_run)?;
                }
            }
        }
    }
    Ok(())
}
