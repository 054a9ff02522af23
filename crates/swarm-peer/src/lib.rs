//! Peer identity discovery for swarmnode.
//!
//! The swarm worker announces itself in its launcher log with a line like
//! `[ts][...][INFO] - Hello ... [<peer name>] ... [<peer id>]`. [`log`] scrapes
//! that line (and recent round activity) from the log tail; [`cache`] keeps the
//! last discovered identity on disk so the log is not re-read every cycle.

#![forbid(unsafe_code)]

pub mod cache;
pub mod log;

pub use cache::{IdentityProvider, IdentitySource, PeerCache};
pub use log::{SwarmLog, log_activity, parse_peer_identity, parse_peer_line};
