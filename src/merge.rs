use std::{collections::HashSet, path::{Path, PathBuf}};
use anyhow::Context as _;
use clap::Parser;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::{parish::Parish, store};

const BACKUP: &str = ".bak";

#[derive(Parser)]
pub struct Args {
    #[arg(help = "directory holding one subdirectory per diocese")]
    root: PathBuf,
    #[arg(help = "dioceses to merge (default: every subdirectory)")]
    dioceses: Vec<String>,
    #[arg(from_global)]
    dry_run: bool
}

/// Parishes of one file: its `parishes` list, a lone parish object, or a top-level array.
pub fn file_parishes(doc: Value) -> Vec<Parish> {
    let items = match doc {
        Value::Object(mut map) => match map.remove("parishes") {
            Some(Value::Array(items)) => items,
            Some(other) => {
                map.insert("parishes".to_owned(), other);
                vec![Value::Object(map)]
            },
            None => vec![Value::Object(map)]
        },
        Value::Array(items) => items,
        _ => Vec::new()
    };
    items.into_iter()
        .filter_map(|v| match v {
            Value::Object(map) => Some(Parish(map)),
            _ => None
        })
        .collect()
}

/// Innermost directory below the diocese, else the file stem unless it names the diocese.
pub fn deanery(file: &Path, diocese_dir: &Path) -> Option<String> {
    let rel = file.strip_prefix(diocese_dir).unwrap_or(file);
    if let Some(dir) = rel.parent().and_then(Path::file_name) {
        return dir.to_str().map(str::to_owned);
    }
    let stem = file.file_stem()?.to_str()?;
    let diocese = diocese_dir.file_name().and_then(|n| n.to_str());
    (Some(stem) != diocese).then(|| stem.to_owned())
}

/// `id` when present, else `name|address`, else the name, else the whole record.
pub fn parish_key(parish: &Parish) -> String {
    match parish.get("id") {
        Some(Value::String(id)) if !id.is_empty() => return id.clone(),
        Some(Value::Number(id)) => return id.to_string(),
        _ => ()
    }
    match (parish.str("name").filter(|s| !s.is_empty()), parish.str("address").filter(|s| !s.is_empty())) {
        (Some(name), Some(address)) => format!("{name}|{address}"),
        (Some(name), None) => name.to_owned(),
        _ => serde_json::to_string(&parish.0).unwrap_or_default()
    }
}

/// Every parish below `dir`, tagged with its diocese and deanery; the first of each key wins.
pub fn merge_diocese(dir: &Path, name: &str) -> anyhow::Result<Vec<Parish>> {
    let own = format!("{name}.json");
    let files = store::json_files_recursive(dir, &["dioceses.json", own.as_str()])?;
    info!("{name}: {} files", files.len());

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for file in files {
        let deanery = deanery(&file, dir);
        let doc: Value = match store::read(&file) {
            Ok(doc) => doc,
            Err(e) => {
                warn!("skipping {}: {e:#}", file.display());
                continue;
            }
        };
        let parishes = file_parishes(doc);
        info!("{}: {} parishes (deanery: {})", file.display(), parishes.len(), deanery.as_deref().unwrap_or("none"));
        for mut parish in parishes {
            parish.set("diocese", json!(name));
            parish.set("deanery", json!(deanery));
            if seen.insert(parish_key(&parish)) {
                out.push(parish);
            } else {
                info!("skipping duplicate {}", parish.name());
            }
        }
    }
    Ok(out)
}

fn diocese_names(root: &Path) -> anyhow::Result<Vec<String>> {
    let mut names = std::fs::read_dir(root)
        .with_context(|| format!("couldn't list {}", root.display()))?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().to_str().map(str::to_owned))
        .collect::<Vec<_>>();
    names.sort();
    Ok(names)
}

pub fn run(args: Args) -> anyhow::Result<()> {
    let dioceses = if args.dioceses.is_empty() { diocese_names(&args.root)? } else { args.dioceses };
    for name in dioceses {
        let parishes = merge_diocese(&args.root.join(&name), &name)?;
        if parishes.is_empty() {
            warn!("no parishes found for {name}");
            continue;
        }
        let out = args.root.join(format!("{name}.json"));
        let count = parishes.len();
        let doc = json!({ "diocese": name, "parishes": parishes });
        if out.exists() {
            store::commit(&out, &doc, BACKUP, args.dry_run)?;
        } else if args.dry_run {
            info!("dry run: not writing {}", out.display());
        } else {
            store::write(&out, &doc)?;
        }
        println!("{}: {count} parishes", out.display());
    }
    Ok(())
}
