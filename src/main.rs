mod config;
mod store;
mod parish;
mod merge;
mod masstime;
mod saints;
mod l10n;
mod strip;
#[cfg(feature = "online")]
mod llm;
#[cfg(feature = "online")]
mod translate;
#[cfg(feature = "online")]
mod lookup;
#[cfg(feature = "online")]
mod geocode;
#[cfg(feature = "online")]
mod crawl;

use std::path::PathBuf;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

#[derive(Parser)]
struct Args {
    #[arg(short, long, global = true, default_value = ".env", help = "path to the KEY=value secrets file")]
    env: PathBuf,
    #[arg(short = 'n', global = true, help = "don't actually write any files")]
    dry_run: bool,
    #[command(subcommand)]
    command: Command
}

#[derive(Subcommand)]
enum Command {
    /// Parse mass schedule text and rebuild parish timetables
    Masstimes(masstime::Args),
    /// Merge duplicate saints in a feast-day calendar
    Dedup(saints::dedup::Args),
    /// Fill missing saint names with model translations
    #[cfg(feature = "online")]
    Translate(translate::Args),
    /// Ask the model for saints missing from a calendar
    #[cfg(feature = "online")]
    Lookup(lookup::Args),
    /// Add coordinates to parishes that lack them
    #[cfg(feature = "online")]
    Geocode(geocode::Args),
    /// Compare a calendar against the reference site
    #[cfg(feature = "online")]
    Crawl(crawl::Args),
    /// Merge a diocese's deanery files into one document
    Merge(merge::Args),
    /// Check or sync localization keys
    L10n(l10n::Args),
    /// Remove keys from a JSON document
    Strip(strip::Args),
    /// Show configured secrets
    Config(config::Args)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "feastdata=info".into())
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    use Command::*;
    match args.command {
        Masstimes(margs) => masstime::run(margs),
        Dedup(margs) => saints::dedup::run(margs),
        #[cfg(feature = "online")]
        Translate(margs) => translate::run(&args.env, margs).await,
        #[cfg(feature = "online")]
        Lookup(margs) => lookup::run(&args.env, margs).await,
        #[cfg(feature = "online")]
        Geocode(margs) => geocode::run(&args.env, margs).await,
        #[cfg(feature = "online")]
        Crawl(margs) => crawl::run(margs).await,
        Merge(margs) => merge::run(margs),
        L10n(margs) => l10n::run(margs),
        Strip(margs) => strip::run(margs),
        Config(margs) => config::run(&args.env, margs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_flag_works_after_subcommand() {
        let args = Args::try_parse_from(["feastdata", "config", "-e", "secrets.env"]).unwrap();
        assert_eq!(args.env, PathBuf::from("secrets.env"));
        let args = Args::try_parse_from(["feastdata", "strip", "doc.json", "greeting", "-n"]).unwrap();
        assert!(args.dry_run);
        assert_eq!(args.env, PathBuf::from(".env"));
    }
}
