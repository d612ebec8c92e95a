use anyhow::Result;

use gs_git::Repository;
use gs_gpg::{Gpg, Verification};

pub trait RepoSource {
    fn list_history(&self) -> Result<Vec<String>>;
    fn get_object(&self, hash: &str) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified { key_id: String },
    Failed { reason: String },
}

/// Read-only access to a keyring. Implementations are shared across
/// verification threads.
pub trait KeyStore: Sync {
    fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<VerifyOutcome>;
    /// Armored public key for `key_id`, `None` if the keyring does not hold it.
    fn export(&self, key_id: &str) -> Result<Option<String>>;
}

pub struct GitSource {
    repo: Repository,
    rev: Option<String>,
}

impl GitSource {
    pub fn new(repo: Repository) -> Self {
        Self { repo, rev: None }
    }

    pub fn from_rev(repo: Repository, rev: impl Into<String>) -> Self {
        Self {
            repo,
            rev: Some(rev.into()),
        }
    }
}

impl RepoSource for GitSource {
    fn list_history(&self) -> Result<Vec<String>> {
        match &self.rev {
            Some(rev) => self.repo.history_from(rev),
            None => self.repo.history(),
        }
    }

    fn get_object(&self, hash: &str) -> Result<Vec<u8>> {
        self.repo.raw_commit(hash)
    }
}

impl KeyStore for Gpg {
    fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<VerifyOutcome> {
        let outcome = match self.verify_detached(payload, signature)? {
            Verification::Good {
                primary_fingerprint,
                ..
            } => VerifyOutcome::Verified {
                key_id: primary_fingerprint,
            },
            Verification::Bad { reason } => VerifyOutcome::Failed { reason },
        };
        Ok(outcome)
    }

    fn export(&self, key_id: &str) -> Result<Option<String>> {
        Ok(self.export_armored(key_id)?)
    }
}
