use std::{path::PathBuf, time::Duration};
use anyhow::{bail, Context as _};
use clap::Parser;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use tracing::{info, warn};

use crate::{saints::{NameLang, SaintsDocument}, store};

const BASE_URL: &str = "https://www.pauline.or.jp/calendariosanti/saint365.php?id=";
const MONTH_CODES: [&str; 12] = ["jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec"];
const TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
pub struct Args {
    #[arg(help = "saints calendar JSON file")]
    file: PathBuf,
    #[arg(value_parser = clap::value_parser!(u32).range(1..=12), help = "months to crawl (default: all)")]
    months: Vec<u32>
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrawledSaint {
    pub day: u32,
    pub name: String
}

static ROW: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<tr[^>]*>(.*?)</tr>").unwrap());
static CELL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<td[^>]*>(.*?)</td>").unwrap());
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static DAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{1,2})日").unwrap());

fn decode_entities(text: &str) -> String {
    const ENTITIES: &[(&str, &str)] = &[
        ("&nbsp;", " "),
        ("&lt;", "<"),
        ("&gt;", ">"),
        ("&quot;", "\""),
        ("&#39;", "'"),
        // last, so "&amp;lt;" stays "&lt;"
        ("&amp;", "&")
    ];
    let mut text = text.to_owned();
    for &(entity, ch) in ENTITIES {
        text = text.replace(entity, ch);
    }
    text
}

fn cell_text(html: &str) -> String {
    decode_entities(&TAG.replace_all(html, "")).trim().to_owned()
}

/// One entry per non-empty cell following a `N日` cell, in page order.
pub fn parse_month_page(html: &str) -> Vec<CrawledSaint> {
    let mut out = Vec::new();
    for row in ROW.captures_iter(html) {
        let mut cells = CELL.captures_iter(&row[1]).map(|c| cell_text(&c[1]));
        let Some(first) = cells.next() else { continue };
        let Some(day) = DAY.captures(&first).and_then(|c| c[1].parse::<u32>().ok()) else { continue };
        if !(1..=31).contains(&day) {
            continue;
        }
        out.extend(cells.filter(|c| !c.is_empty()).map(|name| CrawledSaint { day, name }));
    }
    out
}

/// Crawled names with no record of the same primary name on that day.
pub fn find_missing(crawled: &[CrawledSaint], doc: &SaintsDocument, month: u32) -> Vec<CrawledSaint> {
    crawled.iter()
        .filter(|c| !doc.on_date(month, c.day).iter().any(|s| s.name_in(NameLang::Ja) == Some(c.name.as_str())))
        .cloned()
        .collect()
}

async fn fetch_month(client: &Client, month: u32) -> anyhow::Result<String> {
    let code = (month as usize).checked_sub(1)
        .and_then(|i| MONTH_CODES.get(i))
        .context("month out of range")?;
    let res = client.get(format!("{BASE_URL}{code}")).send().await?;
    if !res.status().is_success() {
        bail!("{code}: {}", res.status());
    }
    Ok(res.text().await?)
}

pub async fn run(args: Args) -> anyhow::Result<()> {
    let doc: SaintsDocument = store::read(&args.file)
        .with_context(|| format!("could not load saints calendar {}", args.file.display()))?;
    let client = Client::builder().timeout(TIMEOUT).build()?;
    let months = if args.months.is_empty() { (1..=12).collect() } else { args.months };

    let mut total = 0;
    for month in months {
        let html = match fetch_month(&client, month).await {
            Ok(html) => html,
            Err(e) => {
                warn!("couldn't crawl month {month}: {e:#}");
                continue;
            }
        };
        let crawled = parse_month_page(&html);
        let missing = find_missing(&crawled, &doc, month);
        info!("month {month}: {} crawled, {} missing", crawled.len(), missing.len());
        for saint in missing.iter() {
            println!("{month:02}-{:02}: {}", saint.day, saint.name);
        }
        total += missing.len();
    }
    println!("{total} saints missing");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PAGE: &str = r#"
<html><body>
<table class="cal">
<tr><th>日</th><th>聖人</th></tr>
<tr><td class="d"><b>1日</b></td><td><a href="gen_saint365.php?id=010101">神の母聖マリア</a></td></tr>
<tr><td>2日</td><td>聖バジリオと聖グレゴリオ</td><td>&nbsp;</td></tr>
<TR><TD>3日</TD><TD>イエスの聖名</TD><TD>聖ジュヌヴィエーヴ &amp; 仲間</TD></TR>
<tr><td>備考</td><td>ignored</td></tr>
</table>
</body></html>
"#;

    #[test]
    fn parses_day_rows() {
        let saints = parse_month_page(PAGE);
        let got: Vec<_> = saints.iter().map(|s| (s.day, s.name.as_str())).collect();
        assert_eq!(got, [
            (1, "神の母聖マリア"),
            (2, "聖バジリオと聖グレゴリオ"),
            (3, "イエスの聖名"),
            (3, "聖ジュヌヴィエーヴ & 仲間")
        ]);
    }

    #[test]
    fn decodes_entities_once() {
        assert_eq!(decode_entities("a &amp;lt; b &lt; c"), "a &lt; b < c");
        assert_eq!(cell_text("<i>&quot;x&quot;</i>&nbsp;"), "\"x\"");
    }

    #[test]
    fn reports_names_absent_from_that_day() {
        let doc: SaintsDocument = serde_json::from_value(json!({
            "saints": [
                { "month": 1, "day": 1, "name": "神の母聖マリア" },
                { "month": 1, "day": 3, "name": "聖ジュヌヴィエーヴ & 仲間" }
            ]
        })).unwrap();
        let missing = find_missing(&parse_month_page(PAGE), &doc, 1);
        let names: Vec<_> = missing.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["聖バジリオと聖グレゴリオ", "イエスの聖名"]);
        assert_eq!(find_missing(&parse_month_page(PAGE), &doc, 2).len(), 4);
    }
}
