//! Read-through peer identity cache.
//!
//! A hit is returned as-is and never re-validated against the log; a miss
//! falls through to the [`IdentitySource`] and repopulates the cache file.

use chrono::Utc;
use std::path::PathBuf;
use swarm_persist::JsonFile;
use swarm_proto::PeerIdentity;
use tracing::{debug, info, warn};

use crate::log::SwarmLog;

/// Where a fresh identity comes from on a cache miss.
pub trait IdentitySource: Send + Sync {
    fn discover(&self) -> Option<PeerIdentity>;
}

impl IdentitySource for SwarmLog {
    fn discover(&self) -> Option<PeerIdentity> {
        self.peer_identity()
    }
}

/// Anything that can report the current peer identity, cached or not.
pub trait IdentityProvider: Send + Sync {
    fn current(&self) -> Option<PeerIdentity>;
}

/// JSON cache of the last discovered [`PeerIdentity`].
pub struct PeerCache<S = SwarmLog> {
    file: JsonFile,
    source: S,
}

impl PeerCache<SwarmLog> {
    pub fn for_log(cache_path: impl Into<PathBuf>, log_path: impl Into<PathBuf>) -> Self {
        Self::new(cache_path, SwarmLog::new(log_path))
    }
}

impl<S: IdentitySource> PeerCache<S> {
    pub fn new(cache_path: impl Into<PathBuf>, source: S) -> Self {
        Self {
            file: JsonFile::new(cache_path),
            source,
        }
    }

    /// Cached identity if valid, otherwise a fresh discovery (which is cached).
    pub fn read(&self) -> Option<PeerIdentity> {
        if let Some(cached) = self.cached() {
            return Some(cached);
        }

        let discovered = self.source.discover()?;
        info!(
            peer_name = discovered.name().unwrap_or("-"),
            peer_id = discovered.id().unwrap_or("-"),
            "discovered peer identity"
        );
        let stamped = discovered.stamped(Utc::now());
        self.write(&stamped);
        Some(stamped)
    }

    /// The cached identity, without falling through to the source.
    pub fn cached(&self) -> Option<PeerIdentity> {
        let cached: PeerIdentity = self.file.load()?;
        if cached.is_populated() {
            Some(cached)
        } else {
            debug!(path = %self.file.path().display(), "cached identity is empty");
            None
        }
    }

    /// Overwrite the cache. Returns whether the write succeeded.
    pub fn write(&self, identity: &PeerIdentity) -> bool {
        match self.file.save(identity) {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %self.file.path().display(), error = %e, "failed to write peer cache");
                false
            }
        }
    }
}

impl<S: IdentitySource> IdentityProvider for PeerCache<S> {
    fn current(&self) -> Option<PeerIdentity> {
        self.read()
    }
}
