use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Whitelist {
    hashes: BTreeSet<String>,
}

fn is_full_hash(entry: &str) -> bool {
    matches!(entry.len(), 40 | 64) && entry.bytes().all(|b| b.is_ascii_hexdigit())
}

fn normalize(entry: &str) -> Option<String> {
    is_full_hash(entry).then(|| entry.to_ascii_lowercase())
}

impl Whitelist {
    /// Loads one hash per line. A missing or unreadable file is an empty
    /// whitelist, not an error.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        match fs::read_to_string(path) {
            Ok(text) => {
                let whitelist = Self::parse(&text);
                debug!(path = %path.display(), entries = whitelist.len(), "loaded whitelist");
                whitelist
            }
            Err(err) => {
                warn!(path = %path.display(), %err, "whitelist unreadable, treating as empty");
                Self::default()
            }
        }
    }

    pub fn parse(text: &str) -> Self {
        let mut hashes = BTreeSet::new();
        for (index, line) in text.lines().enumerate() {
            let entry = line.trim();
            if entry.is_empty() || entry.starts_with('#') {
                continue;
            }
            match normalize(entry) {
                Some(hash) => {
                    hashes.insert(hash);
                }
                None => {
                    warn!(line = index + 1, entry, "ignoring whitelist entry that is not a full commit hash");
                }
            }
        }
        Self { hashes }
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.hashes.contains(hash)
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for Whitelist {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut hashes = BTreeSet::new();
        for entry in iter {
            let entry = entry.into();
            match normalize(&entry) {
                Some(hash) => {
                    hashes.insert(hash);
                }
                None => warn!(%entry, "ignoring whitelist entry that is not a full commit hash"),
            }
        }
        Self { hashes }
    }
}
