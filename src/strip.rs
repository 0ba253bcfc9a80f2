use std::path::PathBuf;
use clap::Parser;
use serde_json::{Map, Value};
use tracing::info;

use crate::store;

const BACKUP: &str = ".bak";

#[derive(Parser)]
pub struct Args {
    #[arg(help = "JSON document to rewrite")]
    file: PathBuf,
    #[arg(required = true, help = "object keys to remove, e.g. greeting")]
    keys: Vec<String>,
    #[arg(from_global)]
    dry_run: bool
}

/// New tree without any object entry named in `keys`, at any depth, plus the number removed.
pub fn strip_keys(value: &Value, keys: &[String]) -> (Value, usize) {
    match value {
        Value::Object(map) => {
            let mut removed = 0;
            let mut out = Map::new();
            for (k, v) in map {
                if keys.contains(k) {
                    removed += 1;
                    continue;
                }
                let (v, n) = strip_keys(v, keys);
                removed += n;
                out.insert(k.clone(), v);
            }
            (Value::Object(out), removed)
        },
        Value::Array(items) => {
            let mut removed = 0;
            let items = items.iter()
                .map(|v| {
                    let (v, n) = strip_keys(v, keys);
                    removed += n;
                    v
                })
                .collect();
            (Value::Array(items), removed)
        },
        v => (v.clone(), 0)
    }
}

pub fn run(args: Args) -> anyhow::Result<()> {
    let doc: Value = store::read(&args.file)?;
    let (doc, removed) = strip_keys(&doc, &args.keys);
    println!("{}: removed {removed} entries", args.file.display());
    if removed == 0 {
        info!("nothing to strip");
        return Ok(());
    }
    store::commit(&args.file, &doc, BACKUP, args.dry_run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn removes_keys_at_any_depth() {
        let doc = json!({
            "greeting": "top",
            "saints": [
                { "name": "聖モニカ", "greeting": "x", "type": "memorial" },
                { "name": "聖アウグスチノ", "meta": { "greeting": "y" } }
            ]
        });
        let (out, removed) = strip_keys(&doc, &["greeting".to_owned()]);
        assert_eq!(removed, 3);
        assert_eq!(out, json!({
            "saints": [
                { "name": "聖モニカ", "type": "memorial" },
                { "name": "聖アウグスチノ", "meta": {} }
            ]
        }));
        let keys: Vec<_> = out["saints"][0].as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["name", "type"]);
    }

    #[test]
    fn leaves_string_values_alone() {
        let doc = json!({ "note": "greeting", "list": ["greeting"] });
        let (out, removed) = strip_keys(&doc, &["greeting".to_owned()]);
        assert_eq!(removed, 0);
        assert_eq!(out, doc);
    }
}
