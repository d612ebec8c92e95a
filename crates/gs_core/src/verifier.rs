use gs_git::CommitObject;
use tracing::debug;

use crate::error::SealError;
use crate::source::{KeyStore, VerifyOutcome};
use crate::whitelist::Whitelist;

/// How a commit earned trust. A commit that earns none never becomes a
/// record; it ends the run with a `SealError`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trust {
    Whitelisted,
    Verified { key_id: String },
}

#[derive(Debug, Clone)]
pub struct CommitRecord {
    pub hash: String,
    pub raw_object: Vec<u8>,
    pub trust: Trust,
}

impl CommitRecord {
    pub fn is_whitelisted(&self) -> bool {
        self.trust == Trust::Whitelisted
    }

    pub fn signer_key_id(&self) -> Option<&str> {
        match &self.trust {
            Trust::Verified { key_id } => Some(key_id),
            Trust::Whitelisted => None,
        }
    }
}

pub struct SignatureVerifier<'a> {
    keystore: &'a dyn KeyStore,
    whitelist: &'a Whitelist,
}

impl<'a> SignatureVerifier<'a> {
    pub fn new(keystore: &'a dyn KeyStore, whitelist: &'a Whitelist) -> Self {
        Self {
            keystore,
            whitelist,
        }
    }

    pub fn verify(&self, hash: String, raw_object: Vec<u8>) -> Result<CommitRecord, SealError> {
        if self.whitelist.contains(&hash) {
            debug!(%hash, "whitelisted");
            return Ok(CommitRecord {
                hash,
                raw_object,
                trust: Trust::Whitelisted,
            });
        }

        let commit = match CommitObject::parse(&raw_object) {
            Ok(commit) => commit,
            Err(e) => {
                return Err(SealError::MalformedObject {
                    hash,
                    reason: e.to_string(),
                })
            }
        };
        let Some((payload, signature)) = commit.split_signature() else {
            return Err(SealError::MissingSignature { hash });
        };

        let outcome = match self.keystore.verify(&payload, &signature) {
            Ok(outcome) => outcome,
            Err(e) => {
                return Err(SealError::InvalidSignature {
                    hash,
                    reason: format!("{e:#}"),
                })
            }
        };
        match outcome {
            VerifyOutcome::Verified { key_id } => {
                debug!(%hash, %key_id, "signature verified");
                Ok(CommitRecord {
                    hash,
                    raw_object,
                    trust: Trust::Verified { key_id },
                })
            }
            VerifyOutcome::Failed { reason } => Err(SealError::InvalidSignature { hash, reason }),
        }
    }
}
