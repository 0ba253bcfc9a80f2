use std::fmt::Display;
use crate::saints::NameLang;

/// How a target language writes saints' names, given to the model as guidance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub lang: NameLang,
    pub name: &'static str,
    pub honorific: &'static str,
    pub examples: &'static [&'static str]
}

impl Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Language: {} | Honorific: {}", self.name, self.honorific)?;
        if !self.examples.is_empty() {
            write!(f, " | Examples: {}", self.examples.join(", "))?;
        }
        Ok(())
    }
}

pub static TARGETS: &[Target] = &[
    Target {
        lang: NameLang::En,
        name: "English",
        honorific: "Saint",
        examples: &["Saint John", "Saint Mary"]
    },
    Target {
        lang: NameLang::Ko,
        name: "Korean",
        honorific: "성",
        examples: &["성 요한", "성 마리아"]
    },
    Target {
        lang: NameLang::Zh,
        name: "Traditional Chinese",
        honorific: "聖",
        examples: &["聖若望", "聖瑪利亞"]
    },
    Target {
        lang: NameLang::Vi,
        name: "Vietnamese",
        honorific: "Thánh",
        examples: &["Thánh Gioan", "Thánh Maria"]
    },
    Target {
        lang: NameLang::Es,
        name: "Spanish",
        honorific: "San / Santa",
        examples: &["San Juan", "Santa María"]
    },
    Target {
        lang: NameLang::Pt,
        name: "Portuguese",
        honorific: "São / Santa",
        examples: &["São João", "Santa Maria"]
    }
];

pub fn target(lang: NameLang) -> Option<&'static Target> {
    TARGETS.iter().find(|t| t.lang == lang)
}
