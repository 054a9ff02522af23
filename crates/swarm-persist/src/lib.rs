//! JSON file-backed persistence for swarmnode caches.
//!
//! Provides [`JsonFile`], a single-document store: one serde value per file,
//! read on demand and rewritten in full on every save. Used by the peer
//! identity cache and the EOA cache, both of which are best-effort
//! accelerators, so load failures degrade to "nothing cached".

#![forbid(unsafe_code)]

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A JSON document at a fixed path.
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the document. Returns `None` if the file is missing or corrupt.
    pub fn load<T: DeserializeOwned>(&self) -> Option<T> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "corrupt cache file, ignoring");
                    None
                }
            },
            Err(_) => {
                debug!(path = %self.path.display(), "no cache file");
                None
            }
        }
    }

    /// Save the document as pretty JSON. Creates parent directories as needed.
    pub fn save<T: Serialize>(&self, value: &T) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
        std::fs::write(&self.path, content)
    }
}
