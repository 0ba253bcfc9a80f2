use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use super::{NameLang, SaintRecord, SaintsDocument};
use crate::store;

const BACKUP: &str = ".bak";
const SUMMARY_LIMIT: usize = 30;
/// Shorter normalized names only match on equality.
const MIN_SUBSTRING_CHARS: usize = 3;

#[derive(Parser)]
pub struct Args {
    /// Saints calendar JSON file
    file: PathBuf,
    #[arg(from_global)]
    dry_run: bool
}

fn names_match(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let shorter = a.chars().count().min(b.chars().count());
    shorter >= MIN_SUBSTRING_CHARS && (a.contains(b) || b.contains(a))
}

/// Two records describe the same commemoration if any language's normalized names match.
pub fn equivalent(a: &SaintRecord, b: &SaintRecord) -> bool {
    if let (Some(x), Some(y)) = (a.date(), b.date()) {
        if x != y {
            return false;
        }
    }
    NameLang::ALL.iter().any(|&lang| {
        match (a.name_in(lang), b.name_in(lang)) {
            (Some(x), Some(y)) => {
                let (x, y) = (super::normalize(x), super::normalize(y));
                !x.is_empty() && !y.is_empty() && names_match(&x, &y)
            },
            _ => false
        }
    })
}

/// Total order on records; the greater one is kept when two are equivalent.
pub fn canonical_cmp(a: &SaintRecord, b: &SaintRecord) -> Ordering {
    let chars = |r: &SaintRecord, lang| r.name_in(lang).map_or(0, |s| s.chars().count());
    a.rank().cmp(&b.rank())
        .then_with(|| a.filled_fields().cmp(&b.filled_fields()))
        .then_with(|| chars(a, NameLang::En).cmp(&chars(b, NameLang::En)))
        .then_with(|| chars(a, NameLang::Ja).cmp(&chars(b, NameLang::Ja)))
        .then_with(|| {
            let key = |r: &SaintRecord| serde_json::to_string(r).unwrap_or_default();
            key(a).cmp(&key(b))
        })
}

struct Slot {
    pos: usize,
    record: SaintRecord
}

/// Winner of a merge, with names it lacks or writes shorter taken from the loser.
fn absorb(winner: SaintRecord, loser: &SaintRecord) -> SaintRecord {
    let mut out = winner;
    for lang in NameLang::ALL {
        let Some(theirs) = loser.name_in(lang) else { continue };
        let take = match out.name_in(lang) {
            None => true,
            Some(ours) => {
                let key = super::normalize(ours);
                theirs.chars().count() > ours.chars().count()
                    && !key.is_empty()
                    && super::normalize(theirs).contains(&key)
            }
        };
        if take {
            let theirs = theirs.to_owned();
            out = out.with_name(lang, theirs);
        }
    }
    out
}

/// Absorbs every kept slot equivalent to the incoming one until no match remains.
/// The survivor takes the earliest position among the absorbed; losers go to `removed`.
fn insert(kept: &mut Vec<Slot>, mut merged: Slot, removed: &mut Vec<SaintRecord>) {
    let mut first: Option<usize> = None;
    while let Some(i) = kept.iter().position(|s| equivalent(&s.record, &merged.record)) {
        let existing = kept.remove(i);
        first = Some(first.map_or(i, |f| f.min(i)));
        let (winner, loser) = match canonical_cmp(&existing.record, &merged.record) {
            Ordering::Less => (merged.record, existing.record),
            _ => (existing.record, merged.record)
        };
        let record = absorb(winner, &loser);
        removed.push(loser);
        merged = Slot { pos: existing.pos.min(merged.pos), record };
    }
    match first {
        Some(f) => kept.insert(f, merged),
        None => kept.push(merged)
    }
}

fn dedup_slots(slots: impl IntoIterator<Item = Slot>) -> (Vec<Slot>, Vec<SaintRecord>) {
    let mut kept = Vec::new();
    let mut removed = Vec::new();
    for slot in slots {
        insert(&mut kept, slot, &mut removed);
    }
    (kept, removed)
}

fn dedup_with_removed(records: Vec<SaintRecord>) -> (Vec<SaintRecord>, Vec<SaintRecord>) {
    let (kept, removed) = dedup_slots(records.into_iter().enumerate().map(|(pos, record)| Slot { pos, record }));
    (kept.into_iter().map(|s| s.record).collect(), removed)
}

/// Collapses equivalent records. The result is pairwise non-equivalent, keeps first-seen order,
/// and passing it through again changes nothing.
pub fn dedup(records: Vec<SaintRecord>) -> Vec<SaintRecord> {
    dedup_with_removed(records).0
}

#[derive(Debug, Default, PartialEq)]
pub struct DayChange {
    pub month: u32,
    pub day: u32,
    pub before: usize,
    pub after: usize,
    pub removed: Vec<String>
}

#[derive(Debug, Default, PartialEq)]
pub struct DedupReport {
    pub before: usize,
    pub after: usize,
    pub days: Vec<DayChange>
}

impl DedupReport {
    fn record(&mut self, month: u32, day: u32, before: usize, after: usize, removed: &[SaintRecord]) {
        self.before += before;
        self.after += after;
        if removed.is_empty() {
            return;
        }
        let removed = removed.iter().map(|r| r.display_name().to_owned()).collect();
        self.days.push(DayChange { month, day, before, after, removed });
    }
}

/// Dedups a flat list per (month, day). Undated records pass through untouched.
fn dedup_flat(records: Vec<SaintRecord>, report: &mut DedupReport) -> Vec<SaintRecord> {
    let mut groups: BTreeMap<(u32, u32), Vec<Slot>> = BTreeMap::new();
    let mut out = Vec::new();
    for (pos, record) in records.into_iter().enumerate() {
        match record.date() {
            Some(date) => groups.entry(date).or_default().push(Slot { pos, record }),
            None => {
                report.before += 1;
                report.after += 1;
                out.push(Slot { pos, record })
            }
        }
    }
    for ((month, day), slots) in groups {
        let before = slots.len();
        let (kept, removed) = dedup_slots(slots);
        report.record(month, day, before, kept.len(), &removed);
        out.extend(kept);
    }
    out.sort_by_key(|s| s.pos);
    out.into_iter().map(|s| s.record).collect()
}

/// Dedups every date group of the document independently.
pub fn dedup_document(doc: SaintsDocument) -> (SaintsDocument, DedupReport) {
    let mut report = DedupReport::default();
    let SaintsDocument { days, saints, japanese_saints, extra } = doc;

    let days = days.map(|days| days.into_iter().map(|mut group| {
        let before = std::mem::take(&mut group.saints);
        let count = before.len();
        let (after, removed) = dedup_with_removed(before);
        let (month, day) = group.date().unwrap_or((0, 0));
        report.record(month, day, count, after.len(), &removed);
        group.saints = after;
        group
    }).collect());
    let saints = saints.map(|s| dedup_flat(s, &mut report));
    let japanese_saints = japanese_saints.map(|s| dedup_flat(s, &mut report));

    report.days.sort_by_key(|d| (d.month, d.day));
    (SaintsDocument { days, saints, japanese_saints, extra }, report)
}

pub fn run(args: Args) -> Result<()> {
    let doc: SaintsDocument = store::read(&args.file)
        .with_context(|| format!("could not load saints calendar {}", args.file.display()))?;
    let (doc, report) = dedup_document(doc);

    for change in report.days.iter().take(SUMMARY_LIMIT) {
        println!("{:02}-{:02}: {} -> {} (removed {})",
            change.month, change.day, change.before, change.after, change.removed.join(", "));
    }
    if report.days.len() > SUMMARY_LIMIT {
        println!("... and {} more days", report.days.len() - SUMMARY_LIMIT);
    }
    info!(before = report.before, after = report.after, days = report.days.len(), "deduplicated saints");

    if report.before == report.after {
        info!("no duplicates found");
        return Ok(());
    }
    store::commit(&args.file, &doc, BACKUP, args.dry_run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn saint(v: serde_json::Value) -> SaintRecord {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn higher_rank_wins() {
        let records = vec![
            saint(json!({ "month": 8, "day": 27, "name": "モニカ", "nameEn": "Monica", "type": "memorial" })),
            saint(json!({ "month": 8, "day": 27, "nameEn": "Saint Monica", "type": "solemnity" }))
        ];
        let out = dedup(records);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name_en.as_deref(), Some("Saint Monica"));
    }

    #[test]
    fn solemnity_keeps_the_longer_name_either_way() {
        let memorial = saint(json!({ "month": 8, "day": 27, "nameEn": "Saint Monica", "type": "memorial" }));
        let solemnity = saint(json!({ "month": 8, "day": 27, "nameEn": "Monica", "type": "solemnity" }));
        for records in [vec![memorial.clone(), solemnity.clone()], vec![solemnity, memorial]] {
            let out = dedup(records);
            assert_eq!(out.len(), 1);
            assert_eq!(out[0].rank(), Some(super::super::FeastRank::Solemnity));
            assert_eq!(out[0].name_en.as_deref(), Some("Saint Monica"));
            assert_eq!(dedup(out.clone()), out);
        }
    }

    #[test]
    fn winner_gains_missing_names() {
        let records = vec![
            saint(json!({ "name": "聖モニカ", "nameKo": "성녀 모니카", "nameEn": "Monica" })),
            saint(json!({ "nameEn": "Saint Monica", "type": "memorial" }))
        ];
        let out = dedup(records);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].rank.as_deref(), Some("memorial"));
        assert_eq!(out[0].name.as_deref(), Some("聖モニカ"));
        assert_eq!(out[0].name_ko.as_deref(), Some("성녀 모니카"));
        assert_eq!(out[0].name_en.as_deref(), Some("Saint Monica"));
    }

    #[test]
    fn more_fields_win_at_equal_rank() {
        let records = vec![
            saint(json!({ "nameEn": "Saint Monica", "type": "memorial" })),
            saint(json!({ "name": "聖モニカ", "nameEn": "Monica", "nameKo": "성녀 모니카", "type": "memorial" }))
        ];
        let out = dedup(records);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name.as_deref(), Some("聖モニカ"));
    }

    #[test]
    fn short_names_need_exact_match() {
        let a = saint(json!({ "nameEn": "Jo" }));
        let b = saint(json!({ "nameEn": "John" }));
        assert!(!equivalent(&a, &b));
        let c = saint(json!({ "nameEn": "Saint John" }));
        let d = saint(json!({ "nameEn": "John the Baptist" }));
        assert!(equivalent(&c, &d));
    }

    #[test]
    fn different_dates_never_merge() {
        let a = saint(json!({ "month": 1, "day": 1, "nameEn": "Mary" }));
        let b = saint(json!({ "month": 1, "day": 2, "nameEn": "Mary" }));
        assert_eq!(dedup(vec![a, b]).len(), 2);
    }

    #[test]
    fn bridging_record_collapses_group() {
        // "Anne" matches both neighbours; they must not survive side by side.
        let records = vec![
            saint(json!({ "nameEn": "Joachim", "name": "ヨアキム" })),
            saint(json!({ "nameEn": "Anne", "name": "アンナ" })),
            saint(json!({ "nameEn": "Joachim and Anne", "name": "アンナ", "type": "memorial" }))
        ];
        let out = dedup(records.clone());
        for (i, a) in out.iter().enumerate() {
            for b in &out[i + 1..] {
                assert!(!equivalent(a, b));
            }
        }
        assert!(out.len() <= records.len());
        assert_eq!(dedup(out.clone()), out);
    }

    #[test]
    fn keeps_first_seen_order() {
        let records = vec![
            saint(json!({ "nameEn": "Peter" })),
            saint(json!({ "nameEn": "Paul" })),
            saint(json!({ "nameEn": "Saint Peter", "type": "solemnity" }))
        ];
        let out = dedup(records);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].name_en.as_deref(), Some("Saint Peter"));
        assert_eq!(out[1].name_en.as_deref(), Some("Paul"));
    }

    #[test]
    fn cmp_is_total() {
        let a = saint(json!({ "nameEn": "Ab", "name": "x" }));
        let b = saint(json!({ "nameEn": "Ab", "name": "y" }));
        assert_eq!(canonical_cmp(&a, &b), canonical_cmp(&b, &a).reverse());
        assert_ne!(canonical_cmp(&a, &b), Ordering::Equal);
        assert_eq!(canonical_cmp(&a, &a), Ordering::Equal);
    }

    #[test]
    fn deduplicates_grouped_document_per_day() {
        let doc: SaintsDocument = serde_json::from_value(json!({
            "version": 2,
            "days": [
                { "month": 8, "day": 27, "saints": [
                    { "name": "モニカ", "nameEn": "Monica", "type": "memorial" },
                    { "nameEn": "Saint Monica", "type": "solemnity" }
                ]},
                { "month": 8, "day": 28, "saints": [{ "nameEn": "Monica" }] }
            ]
        })).unwrap();
        let (doc, report) = dedup_document(doc);
        let days = doc.days.as_ref().unwrap();
        assert_eq!(days[0].saints.len(), 1);
        assert_eq!(days[1].saints.len(), 1);
        assert_eq!(report.before, 3);
        assert_eq!(report.after, 2);
        assert_eq!(report.days, vec![DayChange {
            month: 8, day: 27, before: 2, after: 1, removed: vec!["Monica".into()]
        }]);
        assert_eq!(doc.extra["version"], json!(2));

        let (again, report) = dedup_document(doc.clone());
        assert_eq!(again, doc);
        assert!(report.days.is_empty());
    }

    #[test]
    fn deduplicates_flat_lists_by_date() {
        let doc: SaintsDocument = serde_json::from_value(json!({
            "saints": [
                { "month": 1, "day": 2, "nameEn": "Basil" },
                { "month": 1, "day": 1, "nameEn": "Mary" },
                { "nameEn": "Undated" },
                { "month": 1, "day": 2, "nameEn": "Saint Basil the Great" }
            ]
        })).unwrap();
        let (doc, report) = dedup_document(doc);
        let names: Vec<_> = doc.saints.unwrap().iter().map(|s| s.display_name().to_owned()).collect();
        assert_eq!(names, ["Saint Basil the Great", "Mary", "Undated"]);
        assert_eq!(report.before, 4);
        assert_eq!(report.after, 3);
    }

    #[test]
    fn run_rewrites_file_with_backup() {
        let dir = store::tests::scratch_dir("dedup-run");
        let file = dir.join("saints.json");
        std::fs::write(&file, json!({
            "saints": [
                { "month": 8, "day": 27, "nameEn": "Monica" },
                { "month": 8, "day": 27, "nameEn": "St. Monica" }
            ]
        }).to_string()).unwrap();
        run(Args { file: file.clone(), dry_run: false }).unwrap();
        let doc: SaintsDocument = store::read(&file).unwrap();
        assert_eq!(doc.saints.unwrap().len(), 1);
        assert!(store::backup_path(&file, BACKUP).exists());
    }
}
