use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use super::{ForeignTime, Timetable, tables::{detect_language, Language, Weekday, WEEKDAY_LABELS}};

/// "please inquire"
pub const SENTINEL: &str = "要問い合わせ";

const SEGMENT_SEPARATOR: &str = " / ";

static TIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{1,2}):(\d{2})").unwrap());

static DAY_RANGE: Lazy<Regex> = Lazy::new(|| Regex::new(
    r"^([月火水木金土日])曜日?から([月火水木金土日])曜日?(?:まで)?"
).unwrap());

static DAY_LIST: Lazy<Regex> = Lazy::new(|| Regex::new(
    r"^[月火水木金土日](?:曜日?)?(?:\s*[、,・]\s*[月火水木金土日](?:曜日?)?)+"
).unwrap());

static ORDINAL_JA: Lazy<Regex> = Lazy::new(|| Regex::new(
    r"第\s*(\d)\s*(?:[・と&]\s*第?\s*(\d)\s*)?(主日|[月火水木金土日]曜日?|週)"
).unwrap());

static ORDINAL_EN: Lazy<Regex> = Lazy::new(|| Regex::new(
    r"(?i)\b(\d)(?:st|nd|rd|th)(?:\s*(?:and|&|,|/)\s*(\d)(?:st|nd|rd|th))?\s+(monday|tuesday|wednesday|thursday|friday|saturday|sunday)s?\b"
).unwrap());

static EXCEPTION: Lazy<Regex> = Lazy::new(|| Regex::new(
    r"([月火水木金土日])曜日?は([^・)）、,/]+)"
).unwrap());

fn strip_separator(s: &str) -> &str {
    s.strip_prefix(['：', ':']).unwrap_or(s).trim_start()
}

/// Weekdays named at the start of `s`, and what follows them.
fn leading_days(s: &str) -> Option<(Vec<Weekday>, &str)> {
    if let Some(m) = DAY_RANGE.captures(s) {
        let from = m[1].chars().next().and_then(Weekday::from_kanji)?;
        let to = m[2].chars().next().and_then(Weekday::from_kanji)?;
        let rest = &s[m.get(0)?.end()..];
        return Some((Weekday::range(from, to), strip_separator(rest)));
    }

    if let Some(m) = DAY_LIST.find(s).filter(|m| m.as_str().contains('曜')) {
        let mut days = Vec::new();
        let mut prev = None;
        for c in m.as_str().chars() {
            if prev != Some('曜') {
                if let Some(day) = Weekday::from_kanji(c).filter(|d| !days.contains(d)) {
                    days.push(day);
                }
            }
            prev = Some(c);
        }
        return Some((days, strip_separator(&s[m.end()..])));
    }

    WEEKDAY_LABELS.iter()
        .find_map(|&(label, days)| s.strip_prefix(label).map(|rest| (days.to_vec(), strip_separator(rest))))
}

/// Applies [`leading_days`] until nothing more is recognized; the innermost label wins
/// (`平日：月曜日から土曜日まで` binds monday to saturday).
fn all_leading_days(mut s: &str) -> (Option<Vec<Weekday>>, &str) {
    let mut found = None;
    while let Some((days, rest)) = leading_days(s) {
        if rest.len() >= s.len() { break }
        found = Some(days);
        s = rest;
    }
    (found, s)
}

fn ordinal_suffix(n: u8) -> &'static str {
    match n {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th"
    }
}

pub fn ordinal_note(n: u8, day: Weekday) -> String {
    format!("{n}{} {}", ordinal_suffix(n), day.english())
}

/// (N, weekday) pairs of an "Nth [and Mth] <weekday>" qualifier.
fn ordinals(s: &str, days: &[Weekday]) -> Vec<(u8, Weekday)> {
    if let Some(m) = ORDINAL_JA.captures(s) {
        let targets = match &m[3] {
            "主日" => vec![Weekday::Sunday],
            "週" => days.to_vec(),
            d => d.chars().next().and_then(Weekday::from_kanji).into_iter().collect()
        };
        return numbers(m.get(1), m.get(2)).into_iter()
            .flat_map(|n| targets.iter().map(move |&d| (n, d)))
            .collect();
    }
    if let Some(m) = ORDINAL_EN.captures(s) {
        let Some(day) = Weekday::from_english(&m[3]) else { return Vec::new() };
        return numbers(m.get(1), m.get(2)).into_iter().map(|n| (n, day)).collect();
    }
    Vec::new()
}

fn numbers(a: Option<regex::Match>, b: Option<regex::Match>) -> Vec<u8> {
    let mut ns: Vec<u8> = [a, b].into_iter()
        .flatten()
        .filter_map(|m| m.as_str().parse().ok())
        .collect();
    ns.dedup();
    ns
}

/// Zero-padded `HH:MM`, or `None` for something that only looks like a time.
fn normalize_time(hour: &str, minute: &str) -> Option<String> {
    let h: u8 = hour.parse().ok()?;
    let m: u8 = minute.parse().ok()?;
    (h <= 24 && m <= 59).then(|| format!("{h:02}:{m:02}"))
}

pub fn times(s: &str) -> Vec<String> {
    TIME.captures_iter(s)
        .filter_map(|c| {
            let t = normalize_time(&c[1], &c[2]);
            if t.is_none() {
                debug!("dropping malformed time {:?}", &c[0]);
            }
            t
        })
        .collect()
}

fn foreign_language(s: &str) -> Option<Language> {
    detect_language(s).filter(|l| !l.is_local())
}

/// A "X曜日は<language>" clause singling out one day of a multi-day entry.
fn exception(segment: &str) -> Option<(Weekday, Language)> {
    let m = EXCEPTION.captures(segment)?;
    let day = m[1].chars().next().and_then(Weekday::from_kanji)?;
    Some((day, foreign_language(&m[2])?))
}

/// Splits on `,`/`、` outside of parentheses.
fn sub_items(s: &str) -> impl Iterator<Item = &str> {
    let mut depth = 0usize;
    s.split(move |c: char| {
        match c {
            '(' | '（' => depth += 1,
            ')' | '）' => depth = depth.saturating_sub(1),
            _ => ()
        }
        depth == 0 && matches!(c, ',' | '、')
    })
    .map(str::trim)
    .filter(|s| !s.is_empty())
}

struct Parser {
    out: Timetable,
    carried: Option<Vec<Weekday>>
}

impl Parser {
    fn segment(&mut self, segment: &str) {
        let (days, rest) = all_leading_days(segment);
        if days.is_some() {
            self.carried = days;
        }
        let exception = exception(rest);

        for item in sub_items(rest) {
            let (days, item) = all_leading_days(item);
            if days.is_some() && TIME.is_match(item) {
                self.carried = days;
            }
            self.item(item, exception);
        }
    }

    fn item(&mut self, item: &str, exception: Option<(Weekday, Language)>) {
        let times = times(item);
        if times.is_empty() {
            debug!("no times in {item:?}");
            return;
        }

        let days = self.carried.get_or_insert_with(|| vec![Weekday::Sunday]).clone();
        let ordinals = ordinals(item, &days);
        if !ordinals.is_empty() {
            let mut ordinal_days = Vec::new();
            for &(_, day) in ordinals.iter() {
                if !ordinal_days.contains(&day) {
                    ordinal_days.push(day);
                }
            }
            self.carried = Some(ordinal_days);
        }
        let language = foreign_language(&EXCEPTION.replace_all(item, ""));

        for time in times {
            if !ordinals.is_empty() {
                for &(n, day) in ordinals.iter() {
                    match language {
                        Some(language) => self.out.add_foreign(day, ForeignTime {
                            time: time.clone(),
                            language,
                            note: ordinal_note(n, day)
                        }),
                        // local-language mass on ordinal weeks only; kept as a regular time
                        None => self.out.add_regular(day, &time)
                    }
                }
                continue;
            }

            for &day in days.iter() {
                let language = match exception {
                    Some((eday, elang)) if eday == day => Some(elang),
                    _ => language
                };
                match language {
                    Some(language) => self.out.add_foreign(day, ForeignTime {
                        time: time.clone(),
                        language,
                        note: String::new()
                    }),
                    None => self.out.add_regular(day, &time)
                }
            }
        }
    }
}

pub fn parse(text: &str) -> Timetable {
    let text = text.trim();
    if text.is_empty() || text == SENTINEL {
        return Timetable::default();
    }

    let mut parser = Parser { out: Timetable::default(), carried: None };
    for segment in text.split(SEGMENT_SEPARATOR).map(str::trim).filter(|s| !s.is_empty()) {
        parser.segment(segment);
    }
    parser.out
}
