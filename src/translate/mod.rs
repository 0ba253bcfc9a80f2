mod targets;

use std::{collections::HashMap, ops::Range, path::{Path, PathBuf}, time::Duration};
use anyhow::{bail, Context as _};
use clap::Parser;
use tracing::{info, warn};

use crate::{config, llm::{self, ChatClient}, saints::{NameLang, SaintRecord, SaintsDocument}, store};
use targets::Target;

const BACKUP: &str = ".backup";
const THROTTLE: Duration = Duration::from_millis(100);
const MAX_TOKENS: u32 = 100;

#[derive(Parser)]
pub struct Args {
    #[arg(help = "saints calendar JSON file")]
    file: PathBuf,
    #[arg(default_value_t = 0, help = "index of the first record to translate")]
    start: usize,
    #[arg(help = "translate at most this many records")]
    max: Option<usize>,
    #[arg(long, value_enum, value_delimiter = ',', default_value = "ko,zh,vi,es,pt")]
    lang: Vec<NameLang>,
    #[arg(from_global)]
    dry_run: bool
}

/// Translations made during one run, keyed by (source name, target language).
#[derive(Debug, Default)]
pub struct TranslationCache(HashMap<(String, NameLang), String>);

impl TranslationCache {
    pub fn get(&self, source: &str, lang: NameLang) -> Option<&str> {
        self.0.get(&(source.to_owned(), lang)).map(String::as_str)
    }

    pub fn insert(&mut self, source: &str, lang: NameLang, translation: String) {
        self.0.insert((source.to_owned(), lang), translation);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

fn prompt(saint: &SaintRecord, source: &str, target: &Target) -> String {
    let mut prompt = format!("Japanese name: {source}\n");
    if let Some(en) = saint.name_in(NameLang::En).filter(|_| target.lang != NameLang::En) {
        prompt.push_str(&format!("English name: {en}\n"));
    }
    prompt.push_str(&format!("{target}\nReply with the {} name only.", target.name));
    prompt
}

const SYSTEM: &str = "You translate the names of Catholic saints and feasts from Japanese, \
    using the form customary in the Church of the target language.";

/// First line of the reply with wrapping quotes removed.
fn clean_reply(reply: &str) -> Option<String> {
    let line = reply.lines().map(str::trim).find(|l| !l.is_empty())?;
    let line = line.trim_matches(|c: char| matches!(c, '"' | '\'' | '「' | '」' | '“' | '”'));
    (!line.is_empty()).then(|| line.to_owned())
}

/// Cached translation, or one model request followed by the throttle delay.
pub async fn translate_name(
    client: &ChatClient,
    cache: &mut TranslationCache,
    saint: &SaintRecord,
    lang: NameLang
) -> Option<String> {
    let source = saint.name_in(NameLang::Ja)?;
    if let Some(hit) = cache.get(source, lang) {
        return Some(hit.to_owned());
    }
    let target = targets::target(lang)?;

    let reply = client.ask(SYSTEM, &prompt(saint, source, target), MAX_TOKENS).await;
    tokio::time::sleep(THROTTLE).await;
    match reply {
        Ok(reply) => {
            let name = clean_reply(&reply)?;
            cache.insert(source, lang, name.clone());
            Some(name)
        },
        Err(e) => {
            warn!("couldn't translate {source} into {}: {e:#}", target.name);
            None
        }
    }
}

async fn fill_record(
    client: &ChatClient,
    cache: &mut TranslationCache,
    saint: SaintRecord,
    langs: &[NameLang],
    filled: &mut usize
) -> SaintRecord {
    let mut saint = saint;
    for &lang in langs {
        if saint.name_in(lang).is_some() {
            continue;
        }
        if let Some(name) = translate_name(client, cache, &saint, lang).await {
            info!("{} -> {name}", saint.display_name());
            saint = saint.with_name(lang, name);
            *filled += 1;
        }
    }
    saint
}

fn selection(len: usize, start: usize, max: Option<usize>) -> Range<usize> {
    let start = start.min(len);
    let end = max.map_or(len, |m| start.saturating_add(m).min(len));
    start..end
}

pub async fn run(env: &Path, args: Args) -> anyhow::Result<()> {
    if args.lang.contains(&NameLang::Ja) {
        bail!("the primary name can't be a translation target");
    }
    let env = config::load_env(env)?;
    let client = ChatClient::new(
        env.require(config::OPENAI_API_KEY)?.to_owned(),
        env.get(config::OPENAI_MODEL).unwrap_or(llm::DEFAULT_MODEL).to_owned()
    )?;

    let doc: SaintsDocument = store::read(&args.file)
        .with_context(|| format!("could not load saints calendar {}", args.file.display()))?;
    let mut cache = TranslationCache::default();
    let mut filled = 0;

    let main = doc.main_records();
    let range = selection(main.len(), args.start, args.max);
    info!("translating records {}..{} of {}", range.start, range.end, main.len());
    let mut records = Vec::with_capacity(main.len());
    for (i, saint) in main.into_iter().enumerate() {
        records.push(if range.contains(&i) {
            fill_record(&client, &mut cache, saint, &args.lang, &mut filled).await
        } else {
            saint
        });
    }

    let japanese = doc.japanese_records();
    let mut japanese_records = Vec::with_capacity(japanese.len());
    for saint in japanese {
        japanese_records.push(fill_record(&client, &mut cache, saint, &args.lang, &mut filled).await);
    }

    let doc = doc.with_main_records(records)?.with_japanese_records(japanese_records);
    println!("filled {filled} names ({} distinct translations)", cache.len());
    if filled == 0 {
        return Ok(());
    }
    store::commit(&args.file, &doc, BACKUP, args.dry_run)
}
