use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday
}

use Weekday::*;

impl Weekday {
    pub const ALL: [Weekday; 7] = [Monday, Tuesday, Wednesday, Thursday, Friday, Saturday, Sunday];

    pub fn from_kanji(c: char) -> Option<Self> {
        Some(match c {
            '月' => Monday,
            '火' => Tuesday,
            '水' => Wednesday,
            '木' => Thursday,
            '金' => Friday,
            '土' => Saturday,
            '日' => Sunday,
            _ => return None
        })
    }

    pub fn kanji(self) -> char {
        match self {
            Monday => '月',
            Tuesday => '火',
            Wednesday => '水',
            Thursday => '木',
            Friday => '金',
            Saturday => '土',
            Sunday => '日'
        }
    }

    pub fn english(self) -> &'static str {
        match self {
            Monday => "Monday",
            Tuesday => "Tuesday",
            Wednesday => "Wednesday",
            Thursday => "Thursday",
            Friday => "Friday",
            Saturday => "Saturday",
            Sunday => "Sunday"
        }
    }

    pub fn from_english(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.english().eq_ignore_ascii_case(s))
    }

    /// Inclusive, wrapping past sunday.
    pub fn range(from: Self, to: Self) -> Vec<Self> {
        let (a, b) = (from as usize, to as usize);
        if a <= b {
            Self::ALL[a..=b].to_vec()
        } else {
            Self::ALL[a..].iter().chain(&Self::ALL[..=b]).copied().collect()
        }
    }
}

/// Every day but sunday.
pub const WEEKDAYS: &[Weekday] = &[Monday, Tuesday, Wednesday, Thursday, Friday, Saturday];

/// Checked in order; longer labels precede their prefixes.
pub const WEEKDAY_LABELS: &[(&str, &[Weekday])] = &[
    ("平日", WEEKDAYS),
    ("月曜日", &[Monday]),
    ("月曜", &[Monday]),
    ("火曜日", &[Tuesday]),
    ("火曜", &[Tuesday]),
    ("水曜日", &[Wednesday]),
    ("水曜", &[Wednesday]),
    ("木曜日", &[Thursday]),
    ("木曜", &[Thursday]),
    ("金曜日", &[Friday]),
    ("金曜", &[Friday]),
    ("前土曜", &[Saturday]),
    ("土曜日", &[Saturday]),
    ("土曜", &[Saturday]),
    ("主日", &[Sunday]),
    ("日曜日", &[Sunday]),
    ("日曜", &[Sunday])
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "EN")] English,
    #[serde(rename = "ES")] Spanish,
    #[serde(rename = "CN")] Chinese,
    #[serde(rename = "PH")] Filipino,
    #[serde(rename = "PT")] Portuguese,
    #[serde(rename = "KR")] Korean,
    #[serde(rename = "FR")] French,
    #[serde(rename = "DE")] German,
    #[serde(rename = "IT")] Italian,
    #[serde(rename = "VI")] Vietnamese,
    #[serde(rename = "TH")] Thai,
    #[serde(rename = "ID")] Indonesian,
    #[serde(rename = "PL")] Polish,
    #[serde(rename = "SIGN")] Sign,
    #[serde(rename = "JA")] Japanese
}

use Language::*;

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            English => "EN",
            Spanish => "ES",
            Chinese => "CN",
            Filipino => "PH",
            Portuguese => "PT",
            Korean => "KR",
            French => "FR",
            German => "DE",
            Italian => "IT",
            Vietnamese => "VI",
            Thai => "TH",
            Indonesian => "ID",
            Polish => "PL",
            Sign => "SIGN",
            Japanese => "JA"
        }
    }

    /// How a schedule string names the language.
    pub fn marker(self) -> &'static str {
        match self {
            English => "英語",
            Spanish => "スペイン語",
            Chinese => "中国語",
            Filipino => "フィリピン語",
            Portuguese => "ポルトガル語",
            Korean => "韓国語",
            French => "フランス語",
            German => "ドイツ語",
            Italian => "イタリア語",
            Vietnamese => "ベトナム語",
            Thai => "タイ語",
            Indonesian => "インドネシア語",
            Polish => "ポーランド語",
            Sign => "手話",
            Japanese => "日本語"
        }
    }

    pub fn is_local(self) -> bool {
        self == Japanese
    }
}

const LANGUAGE_PATTERNS: &[(&str, Language)] = &[
    (r"英語|(?i:english)|\[E\]", English),
    (r"スペイン語|(?i:spanish|español)|\[S\]", Spanish),
    (r"中国語|中文|(?i:chinese)", Chinese),
    (r"フィリピン|タガログ|(?i:filipino|tagalog)", Filipino),
    (r"ポルトガル|(?i:português|portuguese)|\[P\]", Portuguese),
    (r"韓国語|(?i:korean)", Korean),
    (r"フランス語|(?i:french|français)", French),
    (r"ドイツ語|(?i:german|deutsch)", German),
    (r"イタリア語|(?i:italian|italiano)", Italian),
    (r"ベトナム|(?i:vietnamese)|\[V\]", Vietnamese),
    (r"タイ語|[(（]タイ[)）]|(?i:\bthai\b)|\[T\]", Thai),
    (r"インドネシア|(?i:indonesian)|\[O\]", Indonesian),
    (r"ポーランド|(?i:polish)", Polish),
    (r"手話|(?i:sign language)", Sign),
    (r"日本語|\[J\]", Japanese)
];

static LANGUAGES: Lazy<Box<[(Regex, Language)]>> = Lazy::new(|| LANGUAGE_PATTERNS.iter()
    .map(|&(pat, lang)| (Regex::new(pat).expect("language pattern"), lang))
    .collect());

/// First matching language in table order.
pub fn detect_language(text: &str) -> Option<Language> {
    LANGUAGES.iter().find(|(re, _)| re.is_match(text)).map(|&(_, lang)| lang)
}
