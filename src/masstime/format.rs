use std::fmt::Write as _;
use super::{ForeignTime, Timetable, tables::Weekday};

fn label(day: Weekday) -> String {
    format!("{}曜", day.kanji())
}

impl ForeignTime {
    /// N of an "Nth <weekday>" note.
    pub fn ordinal(&self) -> Option<u8> {
        let digits: String = self.note.chars().take_while(char::is_ascii_digit).collect();
        digits.parse().ok().filter(|&n| n > 0)
    }
}

impl Timetable {
    /// Canonical schedule string; parsing it gives back an equivalent timetable.
    pub fn to_schedule_text(&self) -> String {
        let mut segments = Vec::new();

        for day in Weekday::ALL {
            let mut items: Vec<String> = self.regular.get(&day).into_iter().flatten().cloned().collect();

            for f in self.foreign.get(&day).into_iter().flatten() {
                let mut item = String::new();
                if let Some(n) = f.ordinal() {
                    let _ = write!(item, "第{n}{}", label(day));
                }
                let _ = write!(item, "{}({})", f.time, f.language.marker());
                items.push(item);
            }

            if !items.is_empty() {
                segments.push(format!("{}：{}", label(day), items.join("、")));
            }
        }

        segments.join(" / ")
    }
}
