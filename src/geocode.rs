use std::{path::PathBuf, time::Duration};
use anyhow::bail;
use clap::Parser;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::{config, parish::{Parish, ParishDocument}, store};

const ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode/json";
const TIMEOUT: Duration = Duration::from_secs(10);
const THROTTLE: Duration = Duration::from_millis(100);
const BACKUP: &str = ".bak";
const EXCLUDE: &[&str] = &["dioceses.json"];

#[derive(Parser)]
pub struct Args {
    #[arg(required = true, help = "parish documents, or directories of them")]
    paths: Vec<PathBuf>,
    #[arg(from_global)]
    dry_run: bool
}

static POSTAL_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"〒?\d{3}-?\d{4}\s*").unwrap());

/// Address with postal codes removed.
pub fn clean_address(address: &str) -> String {
    POSTAL_CODE.replace_all(address, "").trim().to_owned()
}

fn location(res: &Value) -> Option<(f64, f64)> {
    let status = res.get("status").and_then(Value::as_str).unwrap_or("");
    if status != "OK" {
        info!("geocoder status: {status}");
        return None;
    }
    let loc = res.pointer("/results/0/geometry/location")?;
    Some((loc.get("lat")?.as_f64()?, loc.get("lng")?.as_f64()?))
}

/// `Ok(None)` when the geocoder has no result for the address.
pub async fn geocode(client: &Client, key: &str, address: &str) -> anyhow::Result<Option<(f64, f64)>> {
    let address = clean_address(address);
    if address.is_empty() {
        return Ok(None);
    }
    let res = client.get(ENDPOINT)
        .query(&[("address", address.as_str()), ("key", key), ("language", "ja"), ("region", "jp")])
        .send().await?;
    if !res.status().is_success() {
        let status = res.status();
        bail!("geocoding failed with {status}: {}", res.text().await?);
    }
    Ok(location(&res.json::<Value>().await?))
}

fn needs_coordinates(parish: &Parish) -> bool {
    let set = |key: &str| parish.number(key).is_some_and(|n| n != 0.0);
    !(set("latitude") && set("longitude"))
}

pub async fn run(env: &std::path::Path, args: Args) -> anyhow::Result<()> {
    let env = config::load_env(env)?;
    let key = env.require(config::GOOGLE_MAPS_API_KEY)?;
    let client = Client::builder().timeout(TIMEOUT).build()?;

    for path in store::expand(&args.paths, EXCLUDE)? {
        info!("processing {}", path.display());
        let doc: ParishDocument = store::read(&path)?;
        let mut found = 0;
        let mut parishes = Vec::new();
        for parish in doc.parishes()? {
            if !needs_coordinates(&parish) {
                parishes.push(parish);
                continue;
            }
            let Some(address) = parish.str("address").filter(|a| !a.trim().is_empty()) else {
                warn!("{} has no address", parish.name());
                parishes.push(parish);
                continue;
            };
            let result = geocode(&client, key, address).await;
            tokio::time::sleep(THROTTLE).await;
            match result {
                Ok(Some((lat, lng))) => {
                    info!("{} -> ({lat}, {lng})", parish.name());
                    let mut parish = parish;
                    parish.set("latitude", json!(lat));
                    parish.set("longitude", json!(lng));
                    parishes.push(parish);
                    found += 1;
                },
                Ok(None) => {
                    warn!("{}: not found", parish.name());
                    parishes.push(parish);
                },
                Err(e) => {
                    warn!("{}: {e:#}", parish.name());
                    parishes.push(parish);
                }
            }
        }
        println!("{}: {found} parishes geocoded", path.display());
        if found > 0 {
            store::commit(&path, &doc.with_parishes(parishes)?, BACKUP, args.dry_run)?;
        }
    }
    Ok(())
}
