//! Credential file backups.
//!
//! Two flavours: a sync copy that mirrors each credential file under its own
//! name, refreshed every minute, and an archive copy written on demand as
//! `<stem>_<YYYYmmdd_HHMMSS>.json` plus `<stem>_latest.json`.

use chrono::{DateTime, Local, NaiveDateTime};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tracing::debug;

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

/// Text before the first `.`, so `userData.json` → `userData`.
fn stem(path: &Path) -> Option<String> {
    let name = file_name(path)?;
    name.split('.').next().map(str::to_string)
}

/// Copy every existing file into `dir` under its own name.
pub fn sync_backup(files: &[PathBuf], dir: &Path) -> std::io::Result<usize> {
    std::fs::create_dir_all(dir)?;
    let mut copied = 0;
    for src in files.iter().filter(|p| p.exists()) {
        let Some(name) = file_name(src) else { continue };
        std::fs::copy(src, dir.join(name))?;
        copied += 1;
    }
    debug!(dir = %dir.display(), copied, "sync backup");
    Ok(copied)
}

/// Write a timestamped and a `_latest` copy of every existing file.
pub fn archive_backup(
    files: &[PathBuf],
    dir: &Path,
    now: NaiveDateTime,
) -> std::io::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let stamp = now.format("%Y%m%d_%H%M%S");
    let mut written = Vec::new();
    for src in files.iter().filter(|p| p.exists()) {
        let Some(stem) = stem(src) else { continue };
        for target in [
            dir.join(format!("{stem}_{stamp}.json")),
            dir.join(format!("{stem}_latest.json")),
        ] {
            std::fs::copy(src, &target)?;
            written.push(target);
        }
    }
    Ok(written)
}

/// Size and modification time of each credential file.
pub fn describe_files(files: &[PathBuf]) -> Value {
    let entries: Vec<Value> = files
        .iter()
        .map(|path| {
            let name = file_name(path).unwrap_or_default();
            match std::fs::metadata(path) {
                Ok(meta) => {
                    let modified = meta
                        .modified()
                        .ok()
                        .map(|t| DateTime::<Local>::from(t).naive_local().to_string());
                    json!({"file": name, "size": meta.len(), "modified": modified})
                }
                Err(_) => json!({"file": name, "status": "not found"}),
            }
        })
        .collect();
    Value::Array(entries)
}
