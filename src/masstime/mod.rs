mod format;
mod parse;
pub mod tables;

use std::{collections::BTreeMap, path::PathBuf};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::{parish::{Parish, ParishDocument}, store};
use tables::{Language, Weekday};

pub use parse::{parse, SENTINEL};

const BACKUP_SUFFIX: &str = ".bak";
const EXCLUDE: &[&str] = &["dioceses.json"];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignTime {
    pub time: String,
    pub language: Language,
    /// "2nd Sunday" when the mass only happens on some weeks, otherwise empty.
    pub note: String
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timetable {
    #[serde(rename = "massTimes")]
    pub regular: BTreeMap<Weekday, Vec<String>>,
    #[serde(rename = "foreignMassTimes")]
    pub foreign: BTreeMap<Weekday, Vec<ForeignTime>>
}

impl Timetable {
    pub fn is_empty(&self) -> bool {
        self.regular.values().all(Vec::is_empty) && self.foreign.values().all(Vec::is_empty)
    }

    /// Ignored when a foreign entry already holds this day and time.
    pub fn add_regular(&mut self, day: Weekday, time: &str) {
        if self.foreign.get(&day).is_some_and(|fs| fs.iter().any(|f| f.time == time)) {
            return;
        }
        let times = self.regular.entry(day).or_default();
        if !times.iter().any(|t| t == time) {
            times.push(time.to_owned());
        }
    }

    /// Takes the day and time away from the regular table.
    pub fn add_foreign(&mut self, day: Weekday, entry: ForeignTime) {
        if let Some(times) = self.regular.get_mut(&day) {
            times.retain(|t| *t != entry.time);
            if times.is_empty() {
                self.regular.remove(&day);
            }
        }
        let entries = self.foreign.entry(day).or_default();
        if !entries.contains(&entry) {
            entries.push(entry);
        }
    }
}

#[derive(Parser)]
pub struct Args {
    #[command(subcommand)]
    mode: Mode,
    #[arg(from_global)]
    dry_run: bool
}

#[derive(Clone, Subcommand)]
enum Mode {
    /// Print the timetable of one schedule string
    Parse { text: String },
    /// Rebuild massTimes/foreignMassTimes of parish documents from massTime
    Apply {
        #[arg(long, help = "only fill parishes whose tables are empty")]
        empty_only: bool,
        #[arg(required = true, help = "parish documents or directories of them")]
        paths: Vec<PathBuf>
    }
}

fn table_is_empty(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) => true,
        Some(Value::Object(m)) => m.values().all(|v| v.as_array().map_or(true, Vec::is_empty)),
        Some(_) => false
    }
}

/// The parish with its tables rebuilt, or `None` if nothing would change.
pub fn regenerate(parish: &Parish, empty_only: bool) -> anyhow::Result<Option<Parish>> {
    let Some(text) = parish.str("massTime").map(str::trim).filter(|t| !t.is_empty() && *t != SENTINEL) else {
        return Ok(None);
    };

    let old_regular = parish.get("massTimes");
    let old_foreign = parish.get("foreignMassTimes");
    if empty_only && !(table_is_empty(old_regular) && table_is_empty(old_foreign)) {
        return Ok(None);
    }

    let tt = parse(text);
    if empty_only && tt.is_empty() {
        return Ok(None);
    }

    let regular = serde_json::to_value(&tt.regular)?;
    let foreign = serde_json::to_value(&tt.foreign)?;
    if old_regular == Some(&regular) && old_foreign == Some(&foreign) {
        return Ok(None);
    }

    let mut new = parish.clone();
    new.set("massTimes", regular);
    new.set("foreignMassTimes", foreign);
    Ok(Some(new))
}

/// Returns the rebuilt document and how many parishes changed.
pub fn regenerate_document(doc: &ParishDocument, empty_only: bool) -> anyhow::Result<(ParishDocument, usize)> {
    let mut changed = 0;
    let parishes = doc.parishes()?.into_iter()
        .map(|p| Ok(match regenerate(&p, empty_only)? {
            Some(new) => { changed += 1; new },
            None => p
        }))
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok((doc.with_parishes(parishes)?, changed))
}

pub fn run(args: Args) -> anyhow::Result<()> {
    match args.mode {
        Mode::Parse { text } => {
            let tt = parse(&text);
            println!("{}", store::to_string(&tt)?);
        },
        Mode::Apply { empty_only, paths } => {
            let (mut modified, mut total) = (0, 0);
            for path in store::expand(&paths, EXCLUDE)? {
                info!("processing {}", path.display());
                let doc: ParishDocument = store::read(&path)?;
                let (new, changed) = match regenerate_document(&doc, empty_only) {
                    Ok(r) => r,
                    Err(e) => {
                        warn!("skipping {}: {e}", path.display());
                        continue;
                    }
                };
                let count = new.parishes()?.len();
                total += count;
                modified += changed;

                if changed == 0 {
                    println!("{}: no changes ({count} parishes)", path.display());
                    continue;
                }
                store::commit(&path, &new, BACKUP_SUFFIX, args.dry_run)?;
                println!("{}: {changed}/{count} parishes updated", path.display());
            }
            println!("done: {modified}/{total} parishes updated");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parish(v: Value) -> Parish {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn regenerates_tables_from_schedule_string() {
        let p = parish(json!({ "name": "カトリック関口教会", "massTime": "主日：09:30 / 第2・第4日曜14:00(英語)" }));
        let new = regenerate(&p, false).unwrap().unwrap();
        assert_eq!(new.get("massTimes"), Some(&json!({ "sunday": ["09:30"] })));
        assert_eq!(new.get("foreignMassTimes"), Some(&json!({ "sunday": [
            { "time": "14:00", "language": "EN", "note": "2nd Sunday" },
            { "time": "14:00", "language": "EN", "note": "4th Sunday" }
        ] })));
        assert_eq!(new.str("massTime"), p.str("massTime"));
    }

    #[test]
    fn unchanged_parish_is_not_rewritten() {
        let p = parish(json!({
            "massTime": "主日：09:30",
            "massTimes": { "sunday": ["09:30"] },
            "foreignMassTimes": {}
        }));
        assert_eq!(regenerate(&p, false).unwrap(), None);
    }

    #[test]
    fn sentinel_and_missing_strings_are_skipped() {
        assert_eq!(regenerate(&parish(json!({ "massTime": SENTINEL })), false).unwrap(), None);
        assert_eq!(regenerate(&parish(json!({ "name": "x" })), false).unwrap(), None);
    }

    #[test]
    fn empty_only_leaves_filled_parishes() {
        let filled = parish(json!({ "massTime": "主日：10:00", "massTimes": { "sunday": ["09:00"] } }));
        assert_eq!(regenerate(&filled, true).unwrap(), None);

        let empty = parish(json!({ "massTime": "主日：10:00", "massTimes": { "sunday": [] }, "foreignMassTimes": {} }));
        let new = regenerate(&empty, true).unwrap().unwrap();
        assert_eq!(new.get("massTimes"), Some(&json!({ "sunday": ["10:00"] })));

        let unparseable = parish(json!({ "massTime": "詳細は教会へ", "massTimes": {} }));
        assert_eq!(regenerate(&unparseable, true).unwrap(), None);
    }

    #[test]
    fn document_counts_changes() {
        let doc = ParishDocument(json!({ "parishes": [
            { "name": "a", "massTime": "主日：09:00" },
            { "name": "b", "massTime": SENTINEL },
            { "name": "c", "massTime": "土曜：18:00" }
        ] }));
        let (new, changed) = regenerate_document(&doc, false).unwrap();
        assert_eq!(changed, 2);
        let parishes = new.parishes().unwrap();
        assert_eq!(parishes[2].get("massTimes"), Some(&json!({ "saturday": ["18:00"] })));
        assert_eq!(parishes[1].get("massTimes"), None);
    }

    #[test]
    fn apply_writes_backup_and_document() {
        let dir = store::tests::scratch_dir("masstimes");
        let path = dir.join("tokyo.json");
        store::write(&path, &json!({ "parishes": [{ "name": "a", "massTime": "主日：09:00" }] })).unwrap();
        store::write(&dir.join("dioceses.json"), &json!({ "dioceses": [] })).unwrap();

        run(Args {
            mode: Mode::Apply { empty_only: false, paths: vec![dir.clone()] },
            dry_run: false
        }).unwrap();

        let doc: Value = store::read(&path).unwrap();
        assert_eq!(doc["parishes"][0]["massTimes"], json!({ "sunday": ["09:00"] }));
        let old: Value = store::read(&dir.join("tokyo.json.bak")).unwrap();
        assert!(old["parishes"][0].get("massTimes").is_none());
        assert!(!dir.join("dioceses.json.bak").exists());
    }
}
