//! Swarm launcher log scraping.

use chrono::NaiveDateTime;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use swarm_proto::{LogActivity, PeerIdentity};
use tracing::debug;

/// How many trailing lines are scanned for the `Hello` announcement.
pub const IDENTITY_SCAN_LINES: usize = 1000;

/// How many trailing lines are scanned for round activity.
pub const ACTIVITY_SCAN_LINES: usize = 50;

const HELLO_MARKER: &str = "Hello";
const MESSAGE_SEPARATOR: &str = "] - ";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const TAIL_CHUNK: u64 = 8 * 1024;

/// The swarm launcher log on disk.
#[derive(Debug, Clone)]
pub struct SwarmLog {
    path: PathBuf,
}

impl SwarmLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn peer_identity(&self) -> Option<PeerIdentity> {
        parse_peer_identity(&self.path)
    }

    pub fn activity(&self) -> Option<LogActivity> {
        log_activity(&self.path)
    }
}

/// Read the last `n` lines of a file. Invalid UTF-8 is replaced, not rejected.
///
/// Reads backwards from the end in fixed-size chunks, so the cost follows
/// `n` rather than the file size.
pub fn tail_lines(path: &Path, n: usize) -> std::io::Result<Vec<String>> {
    if n == 0 {
        return Ok(Vec::new());
    }
    let mut file = File::open(path)?;
    let mut start = file.metadata()?.len();
    let mut buf: Vec<u8> = Vec::new();
    // `n` separators before the end mean the last `n` lines are complete.
    while start > 0 && separators(&buf) < n {
        let step = TAIL_CHUNK.min(start);
        start -= step;
        file.seek(SeekFrom::Start(start))?;
        let mut chunk = vec![0u8; step as usize];
        file.read_exact(&mut chunk)?;
        chunk.extend_from_slice(&buf);
        buf = chunk;
    }

    let text = String::from_utf8_lossy(&buf);
    let lines: Vec<&str> = text.lines().collect();
    let first = lines.len().saturating_sub(n);
    Ok(lines[first..].iter().map(|l| l.to_string()).collect())
}

/// Newlines in `buf`, not counting one that ends it.
fn separators(buf: &[u8]) -> usize {
    let body = buf.strip_suffix(b"\n").unwrap_or(buf);
    body.iter().filter(|&&b| b == b'\n').count()
}

/// Find the most recent `Hello` announcement in the log tail.
///
/// Never fails: a missing file, an I/O error or the absence of a complete
/// announcement all yield `None`.
pub fn parse_peer_identity(path: &Path) -> Option<PeerIdentity> {
    let lines = match tail_lines(path, IDENTITY_SCAN_LINES) {
        Ok(lines) => lines,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "swarm log unreadable");
            return None;
        }
    };

    lines
        .iter()
        .rev()
        .find_map(|line| parse_peer_line(line))
        .map(|(name, id)| PeerIdentity::new(name, id))
}

/// Extract `(peer_name, peer_id)` from a single announcement line.
///
/// Takes the first two bracketed groups after the first `Hello`; both must be
/// non-empty once trimmed.
pub fn parse_peer_line(line: &str) -> Option<(String, String)> {
    let (_, after) = line.split_once(HELLO_MARKER)?;
    let mut groups = BracketGroups::new(after);
    let name = groups.next()?.trim();
    let id = groups.next()?.trim();
    if name.is_empty() || id.is_empty() {
        return None;
    }
    Some((name.to_string(), id.to_string()))
}

/// Iterator over the contents of non-empty `[...]` groups, left to right.
struct BracketGroups<'a> {
    rest: &'a str,
}

impl<'a> BracketGroups<'a> {
    fn new(text: &'a str) -> Self {
        Self { rest: text }
    }
}

impl<'a> Iterator for BracketGroups<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        loop {
            let open = self.rest.find('[')?;
            let after = &self.rest[open + 1..];
            match after.find(']') {
                // `[]` carries nothing; resume scanning from the `]`.
                Some(0) => self.rest = after,
                Some(close) => {
                    self.rest = &after[close + 1..];
                    return Some(&after[..close]);
                }
                None => {
                    self.rest = "";
                    return None;
                }
            }
        }
    }
}

/// Latest activity timestamp and round markers from the log tail.
///
/// Returns `None` only when the log cannot be read.
pub fn log_activity(path: &Path) -> Option<LogActivity> {
    let lines = tail_lines(path, ACTIVITY_SCAN_LINES).ok()?;
    let mut activity = LogActivity::default();

    for line in lines.iter().rev() {
        let Some((_, message)) = line.split_once(MESSAGE_SEPARATOR) else {
            continue;
        };
        let Some(ts) = line_timestamp(line) else {
            continue;
        };
        let message = message.trim();

        if activity.timestamp.is_none() {
            activity.timestamp = Some(ts);
        }
        if activity.joining.is_none() && message.contains("Joining round") {
            activity.joining = Some(message.to_string());
        }
        if activity.starting.is_none() && message.contains("Starting round") {
            activity.starting = Some(message.to_string());
        }
        if activity.joining.is_some() && activity.starting.is_some() {
            break;
        }
    }

    Some(activity)
}

/// Parse `[2024-01-01 10:00:00,123]...` into a timestamp, dropping milliseconds.
fn line_timestamp(line: &str) -> Option<NaiveDateTime> {
    let first = line.split(']').next()?;
    let raw = first.get(1..)?;
    let raw = raw.split(',').next()?;
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).ok()
}

/// Pull the first integer out of a round line, e.g. `Joining round: 812` → `812`.
pub fn round_number(message: &str) -> Option<&str> {
    let start = message.find(|c: char| c.is_ascii_digit())?;
    let rest = &message[start..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Pull an `N/M` progress marker out of a round line, e.g. `Starting round: 3/10`.
pub fn round_progress(message: &str) -> Option<&str> {
    let bytes = message.as_bytes();
    let slash = (0..bytes.len()).find(|&i| {
        bytes[i] == b'/'
            && i > 0
            && bytes[i - 1].is_ascii_digit()
            && bytes.get(i + 1).is_some_and(|b| b.is_ascii_digit())
    })?;
    let start = message[..slash]
        .rfind(|c: char| !c.is_ascii_digit())
        .map_or(0, |i| i + 1);
    let tail = &message[slash + 1..];
    let end = slash + 1 + tail.find(|c: char| !c.is_ascii_digit()).unwrap_or(tail.len());
    Some(&message[start..end])
}
