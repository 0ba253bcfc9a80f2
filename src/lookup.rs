use std::{path::{Path, PathBuf}, time::Duration};
use anyhow::Context as _;
use chrono::{Datelike, NaiveDate};
use clap::Parser;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::{config, llm::{self, ChatClient}, saints::{self, SaintRecord, SaintsDocument}, store};

const BACKUP: &str = ".backup";
const THROTTLE: Duration = Duration::from_secs(1);
const MAX_TOKENS: u32 = 500;
// leap year, so February 29 is asked about too
const CALENDAR_YEAR: i32 = 2024;

#[derive(Parser)]
pub struct Args {
    #[arg(help = "saints calendar JSON file")]
    file: PathBuf,
    #[arg(value_parser = clap::value_parser!(u32).range(1..=12), help = "months to check (default: all)")]
    months: Vec<u32>,
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..), help = "only check every Nth day of each month")]
    every: u32,
    #[arg(from_global)]
    dry_run: bool
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoundSaint {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub name_en: Option<String>,
    #[serde(rename = "type", default)]
    pub rank: Option<String>
}

#[derive(Deserialize)]
struct LookupReply {
    #[serde(default)]
    saints: Vec<FoundSaint>
}

const SYSTEM: &str = "You are an expert on the Roman Catholic liturgical calendar as celebrated in Japan.";

fn prompt(month: u32, day: u32) -> String {
    format!(
        "List every saint, blessed, and feast commemorated on {month}月{day}日 in the General Roman Calendar \
        and the proper calendar of Japan.\n\
        Reply only with JSON of the form \
        {{\"saints\": [{{\"name\": \"Japanese name\", \"nameEn\": \"English name\", \"type\": \"solemnity|feast|memorial\"}}]}}"
    )
}

pub fn parse_lookup_reply(reply: &str) -> anyhow::Result<Vec<FoundSaint>> {
    let json = llm::extract_json_object(reply).context("no JSON object in reply")?;
    let reply: LookupReply = serde_json::from_str(json).context("reply is not a saints list")?;
    Ok(reply.saints.into_iter().filter(|s| !s.name.trim().is_empty()).collect())
}

fn to_record(found: FoundSaint, month: u32, day: u32) -> SaintRecord {
    let mut extra = Map::new();
    extra.insert("isJapanese".to_owned(), Value::Bool(false));
    SaintRecord {
        month: Some(month),
        day: Some(day),
        name: Some(found.name.trim().to_owned()),
        name_en: found.name_en.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty()),
        rank: Some(found.rank
            .as_deref()
            .and_then(saints::FeastRank::parse)
            .unwrap_or(saints::FeastRank::Memorial)
            .as_str()
            .to_owned()),
        extra,
        ..Default::default()
    }
}

/// Found saints not equivalent to anything already recorded on the date.
pub fn missing(found: Vec<FoundSaint>, existing: &[&SaintRecord], month: u32, day: u32) -> Vec<SaintRecord> {
    let mut out: Vec<SaintRecord> = Vec::new();
    for record in found.into_iter().map(|f| to_record(f, month, day)) {
        let known = existing.iter().any(|e| saints::dedup::equivalent(e, &record))
            || out.iter().any(|e| saints::dedup::equivalent(e, &record));
        if !known {
            out.push(record);
        }
    }
    out
}

fn dates(months: &[u32], every: u32) -> Vec<(u32, u32)> {
    let all: Vec<u32> = (1..=12).collect();
    let months = if months.is_empty() { &all[..] } else { months };
    let step = every.max(1) as usize;
    months.iter()
        .flat_map(|&m| {
            let first = NaiveDate::from_ymd_opt(CALENDAR_YEAR, m, 1);
            first.into_iter()
                .flat_map(|d| d.iter_days())
                .take_while(move |d| d.month() == m)
                .step_by(step)
                .map(|d| (d.month(), d.day()))
        })
        .collect()
}

pub async fn run(env: &Path, args: Args) -> anyhow::Result<()> {
    let env = config::load_env(env)?;
    let client = ChatClient::new(
        env.require(config::OPENAI_API_KEY)?.to_owned(),
        env.get(config::OPENAI_MODEL).unwrap_or(llm::DEFAULT_MODEL).to_owned()
    )?;

    let doc: SaintsDocument = store::read(&args.file)
        .with_context(|| format!("could not load saints calendar {}", args.file.display()))?;

    let dates = dates(&args.months, args.every);
    let mut added = Vec::new();
    for (i, &(month, day)) in dates.iter().enumerate() {
        info!("[{}/{}] looking up {month:02}-{day:02}", i + 1, dates.len());
        let found = match client.ask(SYSTEM, &prompt(month, day), MAX_TOKENS).await
            .and_then(|reply| parse_lookup_reply(&reply))
        {
            Ok(found) => found,
            Err(e) => {
                warn!("lookup failed for {month:02}-{day:02}: {e:#}");
                tokio::time::sleep(THROTTLE).await;
                continue;
            }
        };
        let new = missing(found, &doc.on_date(month, day), month, day);
        for saint in new.iter() {
            println!("{month:02}-{day:02}: {} ({})",
                saint.name.as_deref().unwrap_or(""),
                saint.name_en.as_deref().unwrap_or("-"));
        }
        added.extend(new);
        tokio::time::sleep(THROTTLE).await;
    }

    println!("{} missing saints across {} days", added.len(), dates.len());
    if added.is_empty() {
        return Ok(());
    }
    store::commit(&args.file, &doc.with_added(added), BACKUP, args.dry_run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_fenced_reply() {
        let reply = "```json\n{\"saints\": [\
            {\"name\": \"聖モニカ\", \"nameEn\": \"Saint Monica\", \"type\": \"memorial\"},\
            {\"name\": \" \"}]}\n```";
        let found = parse_lookup_reply(reply).unwrap();
        assert_eq!(found, vec![FoundSaint {
            name: "聖モニカ".into(),
            name_en: Some("Saint Monica".into()),
            rank: Some("memorial".into())
        }]);
        assert!(parse_lookup_reply("I don't know").is_err());
    }

    #[test]
    fn adds_only_unknown_saints() {
        let existing: SaintRecord = serde_json::from_value(json!({ "name": "聖モニカ", "nameEn": "Monica" })).unwrap();
        let found = vec![
            FoundSaint { name: "モニカ".into(), name_en: Some("Saint Monica".into()), rank: None },
            FoundSaint { name: "聖アウグスチノ".into(), name_en: None, rank: Some("Solemnity".into()) },
            FoundSaint { name: "聖アウグスチノ司教".into(), name_en: None, rank: None }
        ];
        let new = missing(found, &[&existing], 8, 27);
        assert_eq!(new.len(), 1);
        assert_eq!(serde_json::to_value(&new[0]).unwrap(), json!({
            "month": 8, "day": 27, "name": "聖アウグスチノ", "type": "solemnity", "isJapanese": false
        }));
    }

    #[test]
    fn missing_type_defaults_to_memorial() {
        let new = missing(vec![FoundSaint { name: "x".into(), ..Default::default() }], &[], 1, 1);
        assert_eq!(new[0].rank.as_deref(), Some("memorial"));
    }

    #[test]
    fn enumerates_sampled_dates() {
        assert_eq!(dates(&[], 1).len(), 366);
        assert_eq!(dates(&[2], 1).last(), Some(&(2, 29)));
        assert_eq!(dates(&[1], 10), vec![(1, 1), (1, 11), (1, 21), (1, 31)]);
    }
}
