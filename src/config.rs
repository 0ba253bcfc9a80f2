use std::{io::Read, path::{Path, PathBuf}};
use anyhow::{Context as _, anyhow};
use clap::Parser;

pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const OPENAI_MODEL: &str = "OPENAI_MODEL";
pub const GOOGLE_MAPS_API_KEY: &str = "GOOGLE_MAPS_API_KEY";

#[derive(Parser)]
pub struct Args {
    #[arg(help = "only report whether this key is set")]
    name: Option<String>
}

/// `KEY=value` pairs in file order.
#[derive(Clone, Debug, Default)]
pub struct Env {
    path: PathBuf,
    vars: Vec<(String, String)>
}

impl Env {
    fn collect<R: Read>(path: &Path, iter: dotenvy::Iter<R>) -> anyhow::Result<Self> {
        let vars = iter.collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("malformed env file {}", path.display()))?;
        Ok(Self { path: path.to_owned(), vars })
    }

    /// Parses `text` as the contents of an env file at `path`.
    pub fn parse(path: &Path, text: &str) -> anyhow::Result<Self> {
        Self::collect(path, dotenvy::from_read_iter(text.as_bytes()))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }

    pub fn require(&self, key: &str) -> anyhow::Result<&str> {
        self.get(key).ok_or_else(|| anyhow!("{key} is not set in {}", self.path.display()))
    }
}

/// Reads the file without touching the process environment.
pub fn load_env(path: &Path) -> anyhow::Result<Env> {
    let iter = dotenvy::from_path_iter(path)
        .with_context(|| format!("couldn't read env file {}", path.display()))?;
    Env::collect(path, iter)
}

fn mask(value: &str) -> String {
    let shown: String = value.chars().take(4).collect();
    if value.chars().count() <= 8 {
        "*".repeat(value.chars().count())
    } else {
        format!("{shown}…")
    }
}

pub fn run(env: &Path, args: Args) -> anyhow::Result<()> {
    let env = load_env(env)?;
    match args.name {
        None => {
            for (name, value) in env.vars.iter() {
                println!("{name} = {}", mask(value));
            }
        },
        Some(name) => match env.get(&name) {
            Some(value) => println!("{name} = {}", mask(value)),
            None => println!("{name} is not set")
        }
    }
    Ok(())
}
