pub mod dedup;

use anyhow::ensure;
use clap::ValueEnum;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Liturgical importance; `Ord` follows memorial < feast < solemnity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FeastRank {
    Memorial,
    Feast,
    Solemnity
}

impl FeastRank {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memorial" => Some(Self::Memorial),
            "feast" => Some(Self::Feast),
            "solemnity" => Some(Self::Solemnity),
            _ => None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memorial => "memorial",
            Self::Feast => "feast",
            Self::Solemnity => "solemnity"
        }
    }
}

/// Languages a saint's name is kept in. `Ja` is the primary `name` field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
pub enum NameLang {
    Ja,
    En,
    Ko,
    Zh,
    Vi,
    Es,
    Pt
}

impl NameLang {
    pub const ALL: [NameLang; 7] = [Self::Ja, Self::En, Self::Ko, Self::Zh, Self::Vi, Self::Es, Self::Pt];

    pub fn field(self) -> &'static str {
        match self {
            Self::Ja => "name",
            Self::En => "nameEn",
            Self::Ko => "nameKo",
            Self::Zh => "nameZh",
            Self::Vi => "nameVi",
            Self::Es => "nameEs",
            Self::Pt => "namePt"
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaintRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_en: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_ko: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_zh: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_vi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_es: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_pt: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty()
    }
}

impl SaintRecord {
    fn slot(&self, lang: NameLang) -> &Option<String> {
        match lang {
            NameLang::Ja => &self.name,
            NameLang::En => &self.name_en,
            NameLang::Ko => &self.name_ko,
            NameLang::Zh => &self.name_zh,
            NameLang::Vi => &self.name_vi,
            NameLang::Es => &self.name_es,
            NameLang::Pt => &self.name_pt
        }
    }

    /// Trimmed, `None` when absent or blank.
    pub fn name_in(&self, lang: NameLang) -> Option<&str> {
        self.slot(lang).as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn with_name(mut self, lang: NameLang, value: String) -> Self {
        let slot = match lang {
            NameLang::Ja => &mut self.name,
            NameLang::En => &mut self.name_en,
            NameLang::Ko => &mut self.name_ko,
            NameLang::Zh => &mut self.name_zh,
            NameLang::Vi => &mut self.name_vi,
            NameLang::Es => &mut self.name_es,
            NameLang::Pt => &mut self.name_pt
        };
        *slot = Some(value);
        self
    }

    pub fn rank(&self) -> Option<FeastRank> {
        self.rank.as_deref().and_then(FeastRank::parse)
    }

    pub fn date(&self) -> Option<(u32, u32)> {
        Some((self.month?, self.day?))
    }

    pub fn display_name(&self) -> &str {
        self.name_in(NameLang::En).or(self.name_in(NameLang::Ja)).unwrap_or("")
    }

    /// Non-empty fields other than the date.
    pub fn filled_fields(&self) -> usize {
        let names = NameLang::ALL.iter().filter(|&&l| self.name_in(l).is_some()).count();
        let rank = self.rank.as_deref().is_some_and(|r| !r.trim().is_empty()) as usize;
        names + rank + self.extra.values().filter(|v| truthy(v)).count()
    }
}

static HONORIFIC_WORDS: Lazy<Regex> = Lazy::new(|| Regex::new(
    r"\b(?:saints?|sts?\.?|blessed|bl\.|san|santa|santo|são|thánh)\s+"
).unwrap());

static HONORIFIC_CJK: Lazy<Regex> = Lazy::new(|| Regex::new(
    r"^\s*(?:聖|圣|성)|(?:聖人|성인)\s*$"
).unwrap());

/// Comparison key for a name: lowercase, honorifics and whitespace removed.
pub fn normalize(name: &str) -> String {
    let name = name.trim().to_lowercase();
    let name = HONORIFIC_WORDS.replace_all(&name, "");
    let name = HONORIFIC_CJK.replace_all(&name, "");
    name.chars().filter(|c| !c.is_whitespace()).collect()
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DayGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<u32>,
    #[serde(default)]
    pub saints: Vec<SaintRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>
}

impl DayGroup {
    pub fn date(&self) -> Option<(u32, u32)> {
        Some((self.month?, self.day?))
    }
}

/// The feast-day calendar, either grouped by `days` or as flat `saints`/`japaneseSaints` lists.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaintsDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<Vec<DayGroup>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saints: Option<Vec<SaintRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub japanese_saints: Option<Vec<SaintRecord>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>
}

impl SaintsDocument {
    /// `days` groups flattened in order, else the `saints` list.
    pub fn main_records(&self) -> Vec<SaintRecord> {
        match &self.days {
            Some(days) => days.iter().flat_map(|g| g.saints.iter().cloned()).collect(),
            None => self.saints.clone().unwrap_or_default()
        }
    }

    /// Inverse of [`main_records`](Self::main_records); the record count must not change.
    pub fn with_main_records(mut self, records: Vec<SaintRecord>) -> anyhow::Result<Self> {
        match self.days.as_mut() {
            Some(days) => {
                let total: usize = days.iter().map(|g| g.saints.len()).sum();
                ensure!(total == records.len(), "expected {total} records, got {}", records.len());
                let mut records = records.into_iter();
                for group in days.iter_mut() {
                    group.saints = records.by_ref().take(group.saints.len()).collect();
                }
            },
            None => self.saints = Some(records)
        }
        Ok(self)
    }

    pub fn japanese_records(&self) -> Vec<SaintRecord> {
        self.japanese_saints.clone().unwrap_or_default()
    }

    pub fn with_japanese_records(mut self, records: Vec<SaintRecord>) -> Self {
        if self.japanese_saints.is_some() || !records.is_empty() {
            self.japanese_saints = Some(records);
        }
        self
    }

    /// Every record commemorated on the date, from whichever layout the document uses.
    pub fn on_date(&self, month: u32, day: u32) -> Vec<&SaintRecord> {
        let grouped = self.days.iter().flatten()
            .filter(|g| g.date() == Some((month, day)))
            .flat_map(|g| g.saints.iter());
        let flat = self.saints.iter().flatten()
            .chain(self.japanese_saints.iter().flatten())
            .filter(|s| s.date() == Some((month, day)));
        grouped.chain(flat).collect()
    }

    /// Appends dated records to their day group (created if missing) or to `saints`.
    pub fn with_added(mut self, records: Vec<SaintRecord>) -> Self {
        match self.days.as_mut() {
            Some(days) => for record in records {
                let date = record.date();
                match days.iter_mut().find(|g| g.date().is_some() && g.date() == date) {
                    Some(group) => group.saints.push(record),
                    None => days.push(DayGroup {
                        month: record.month,
                        day: record.day,
                        saints: vec![record],
                        extra: Map::new()
                    })
                }
            },
            None => self.saints.get_or_insert_with(Vec::new).extend(records)
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_honorifics_and_spaces() {
        assert_eq!(normalize("Saint Monica"), "monica");
        assert_eq!(normalize("St. Monica"), "monica");
        assert_eq!(normalize("Monica"), "monica");
        assert_eq!(normalize("聖モニカ"), "モニカ");
        assert_eq!(normalize("성 모니카"), "모니카");
        assert_eq!(normalize("Santa Mónica"), "mónica");
        assert_eq!(normalize("Thánh Mônica"), "mônica");
        assert_eq!(normalize("聖　フランシスコ・ザビエル"), "フランシスコ・ザビエル");
        assert_eq!(normalize("Sandra"), "sandra");
    }

    #[test]
    fn record_round_trips_unknown_fields() {
        let v = json!({
            "month": 8, "day": 27, "name": "聖モニカ", "nameEn": "Saint Monica",
            "type": "memorial", "isJapanese": false, "description": "母"
        });
        let r: SaintRecord = serde_json::from_value(v.clone()).unwrap();
        assert_eq!(r.rank(), Some(FeastRank::Memorial));
        assert_eq!(r.extra["isJapanese"], json!(false));
        assert_eq!(serde_json::to_value(&r).unwrap(), v);
    }

    #[test]
    fn counts_filled_fields() {
        let r: SaintRecord = serde_json::from_value(json!({
            "month": 1, "day": 1, "name": "神の母聖マリア", "nameEn": "", "type": "solemnity",
            "isJapanese": false, "greeting": "x"
        })).unwrap();
        assert_eq!(r.filled_fields(), 3);
    }

    #[test]
    fn finds_records_by_date_in_both_layouts() {
        let grouped: SaintsDocument = serde_json::from_value(json!({
            "days": [{ "month": 8, "day": 27, "saints": [{ "name": "聖モニカ" }] }]
        })).unwrap();
        assert_eq!(grouped.on_date(8, 27).len(), 1);
        assert!(grouped.on_date(8, 28).is_empty());

        let flat: SaintsDocument = serde_json::from_value(json!({
            "saints": [{ "month": 8, "day": 27, "name": "聖モニカ" }],
            "japaneseSaints": [{ "month": 8, "day": 27, "name": "聖X" }]
        })).unwrap();
        assert_eq!(flat.on_date(8, 27).len(), 2);
    }

    #[test]
    fn main_records_round_trip_through_groups() {
        let doc: SaintsDocument = serde_json::from_value(json!({
            "days": [
                { "month": 1, "day": 1, "saints": [{ "name": "a" }, { "name": "b" }] },
                { "month": 1, "day": 2, "saints": [{ "name": "c" }] }
            ]
        })).unwrap();
        let records: Vec<_> = doc.main_records().into_iter()
            .map(|r| r.with_name(NameLang::Ko, "k".into()))
            .collect();
        let new = doc.with_main_records(records).unwrap();
        let days = new.days.unwrap();
        assert_eq!(days[0].saints.len(), 2);
        assert_eq!(days[1].saints[0].name_in(NameLang::Ko), Some("k"));
    }

    #[test]
    fn added_records_join_their_day() {
        let doc: SaintsDocument = serde_json::from_value(json!({
            "days": [{ "month": 1, "day": 1, "saints": [] }]
        })).unwrap();
        let a = SaintRecord { month: Some(1), day: Some(1), name: Some("a".into()), ..Default::default() };
        let b = SaintRecord { month: Some(1), day: Some(2), name: Some("b".into()), ..Default::default() };
        let days = doc.with_added(vec![a, b]).days.unwrap();
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].saints.len(), 1);
        assert_eq!(days[1].date(), Some((1, 2)));
    }
}
