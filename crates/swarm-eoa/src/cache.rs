//! Day-scoped EOA cache.

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use swarm_persist::JsonFile;
use tracing::{debug, error, warn};

use crate::EoaSource;

/// On-disk layout: `{"date": "YYYY-MM-DD", "mapping": {peer_id: address}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EoaCacheDoc {
    pub date: NaiveDate,
    #[serde(default)]
    pub mapping: BTreeMap<String, String>,
}

pub struct EoaCache<S> {
    file: JsonFile,
    source: S,
}

impl<S: EoaSource> EoaCache<S> {
    pub fn new(path: impl Into<PathBuf>, source: S) -> Self {
        Self {
            file: JsonFile::new(path),
            source,
        }
    }

    /// Look up addresses as of the local calendar day.
    pub async fn lookup(&self, peer_ids: &[String]) -> BTreeMap<String, String> {
        self.lookup_on(Local::now().date_naive(), peer_ids).await
    }

    /// A file written on `today` is returned as-is; anything else asks the
    /// source. Source failures come back as `"Error: ..."` per id and are not
    /// cached.
    pub async fn lookup_on(&self, today: NaiveDate, peer_ids: &[String]) -> BTreeMap<String, String> {
        if let Some(doc) = self.file.load::<EoaCacheDoc>() {
            if doc.date == today {
                debug!(entries = doc.mapping.len(), "eoa cache hit");
                return doc.mapping;
            }
            debug!(cached = %doc.date, %today, "eoa cache is from another day");
        }

        match self.source.get_eoa(peer_ids).await {
            Ok(addresses) => {
                let mapping: BTreeMap<String, String> =
                    peer_ids.iter().cloned().zip(addresses).collect();
                let doc = EoaCacheDoc {
                    date: today,
                    mapping,
                };
                if let Err(e) = self.file.save(&doc) {
                    warn!(path = %self.file.path().display(), error = %e, "failed to write eoa cache");
                }
                doc.mapping
            }
            Err(e) => {
                error!(error = %e, "eoa lookup failed");
                peer_ids
                    .iter()
                    .map(|id| (id.clone(), format!("Error: {e}")))
                    .collect()
            }
        }
    }
}
