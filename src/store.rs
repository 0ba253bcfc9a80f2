use std::{fs, io::Write as _, path::{Path, PathBuf}};
use anyhow::Context as _;
use serde::{de::DeserializeOwned, Serialize};
use tracing::info;

pub fn read<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("couldn't read {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("{} is not a valid document", path.display()))
}

/// Two-space indentation, non-ASCII characters written as-is.
pub fn to_string<T: Serialize>(doc: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(doc)?)
}

pub fn write<T: Serialize>(path: &Path, doc: &T) -> anyhow::Result<()> {
    let text = to_string(doc)?;
    let mut f = fs::File::create(path)
        .with_context(|| format!("couldn't create {}", path.display()))?;
    f.write_all(text.as_bytes())?;
    Ok(())
}

/// `tokyo.json` + `.bak` -> `tokyo.json.bak`
pub fn backup_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_owned();
    name.push(suffix);
    path.with_file_name(name)
}

pub fn backup(path: &Path, suffix: &str) -> anyhow::Result<PathBuf> {
    let dest = backup_path(path, suffix);
    fs::copy(path, &dest)
        .with_context(|| format!("couldn't back up {} to {}", path.display(), dest.display()))?;
    Ok(dest)
}

/// Backs up the current file, then replaces it with `doc`.
pub fn commit<T: Serialize>(path: &Path, doc: &T, suffix: &str, dry_run: bool) -> anyhow::Result<()> {
    if dry_run {
        info!("dry run: not writing {}", path.display());
        return Ok(());
    }
    let dest = backup(path, suffix)?;
    info!("backup written to {}", dest.display());
    write(path, doc)?;
    info!("updated {}", path.display());
    Ok(())
}

fn is_document(path: &Path, exclude: &[&str]) -> bool {
    path.extension().is_some_and(|e| e == "json")
        && path.file_name().and_then(|n| n.to_str()).is_some_and(|n| !exclude.contains(&n))
}

pub fn json_files(dir: &Path, exclude: &[&str]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = fs::read_dir(dir)
        .with_context(|| format!("couldn't list {}", dir.display()))?
        .map(|e| e.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    files.retain(|p| p.is_file() && is_document(p, exclude));
    files.sort();
    Ok(files)
}

/// Like [`json_files`], descending into subdirectories. `exclude` also skips directories by name.
pub fn json_files_recursive(dir: &Path, exclude: &[&str]) -> anyhow::Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("couldn't list {}", dir.display()))?
        .map(|e| e.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort();
    let mut out = Vec::new();
    for path in entries {
        if path.file_name().and_then(|n| n.to_str()).is_some_and(|n| exclude.contains(&n)) {
            continue;
        }
        if path.is_dir() {
            out.extend(json_files_recursive(&path, exclude)?);
        } else if path.is_file() && is_document(&path, exclude) {
            out.push(path);
        }
    }
    Ok(out)
}

/// Files are taken as given, directories are expanded to their documents.
pub fn expand(paths: &[PathBuf], exclude: &[&str]) -> anyhow::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for path in paths {
        if path.is_dir() {
            out.extend(json_files(path, exclude)?);
        } else {
            out.push(path.clone());
        }
    }
    Ok(out)
}
