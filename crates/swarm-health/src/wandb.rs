//! Weights & Biases run directory listing.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Every folder and file below the W&B log directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WandbListing {
    pub folders: BTreeSet<PathBuf>,
    pub files: BTreeSet<PathBuf>,
}

impl WandbListing {
    pub fn is_empty(&self) -> bool {
        self.folders.is_empty() && self.files.is_empty()
    }
}

/// Walk `dir` recursively. A missing directory is an empty listing;
/// unreadable entries are skipped.
pub fn scan(dir: &Path) -> WandbListing {
    let mut listing = WandbListing::default();
    if !dir.is_dir() {
        return listing;
    }
    for entry in WalkDir::new(dir).min_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "skipping wandb entry");
                continue;
            }
        };
        if entry.file_type().is_dir() {
            listing.folders.insert(entry.into_path());
        } else {
            listing.files.insert(entry.into_path());
        }
    }
    listing
}
