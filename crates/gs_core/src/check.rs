use gs_git::{commit_id, CommitObject};
use tracing::debug;

use crate::document::TrustDocument;
use crate::error::SealError;
use crate::source::{KeyStore, VerifyOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckedEntry {
    Whitelisted { hash: String },
    Verified { hash: String, key_id: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckReport {
    pub entries: Vec<CheckedEntry>,
}

impl CheckReport {
    pub fn verified(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, CheckedEntry::Verified { .. }))
            .count()
    }

    pub fn whitelisted(&self) -> usize {
        self.entries.len() - self.verified()
    }
}

/// Re-verifies every entry of `document`: each object must hash to its
/// recorded id, and signature-trusted entries must carry a good signature
/// by one of the document's keys.
pub fn check_document(
    document: &TrustDocument,
    keystore: &dyn KeyStore,
) -> Result<CheckReport, SealError> {
    let mut report = CheckReport::default();
    for entry in &document.commits {
        let hash = entry.hash.clone();
        match commit_id(entry.object.as_bytes(), hash.len()) {
            Some(id) if id == hash => {}
            Some(id) => {
                return Err(SealError::MalformedObject {
                    hash,
                    reason: format!("object does not hash to the recorded id, it hashes to {id}"),
                })
            }
            None => {
                return Err(SealError::MalformedObject {
                    hash,
                    reason: "unsupported object id format".to_string(),
                })
            }
        }
        if entry.trusted {
            report.entries.push(CheckedEntry::Whitelisted { hash });
            continue;
        }

        let commit = CommitObject::parse(entry.object.as_bytes()).map_err(|e| {
            SealError::MalformedObject {
                hash: hash.clone(),
                reason: e.to_string(),
            }
        })?;
        let Some((payload, signature)) = commit.split_signature() else {
            return Err(SealError::MissingSignature { hash });
        };
        let outcome = keystore
            .verify(&payload, &signature)
            .map_err(|e| SealError::InvalidSignature {
                hash: hash.clone(),
                reason: format!("{e:#}"),
            })?;
        let key_id = match outcome {
            VerifyOutcome::Verified { key_id } => key_id,
            VerifyOutcome::Failed { reason } => {
                return Err(SealError::InvalidSignature { hash, reason })
            }
        };
        if !document.keys.contains_key(&key_id) {
            return Err(SealError::UnknownKeyId { hash, key_id });
        }
        debug!(%hash, %key_id, "signature re-verified");
        report.entries.push(CheckedEntry::Verified { hash, key_id });
    }
    Ok(report)
}
