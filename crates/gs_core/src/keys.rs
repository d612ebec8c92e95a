use std::collections::BTreeMap;

use tracing::debug;

use crate::error::SealError;
use crate::source::KeyStore;
use crate::verifier::CommitRecord;

/// Resolves signer key ids to armored public keys, exporting each id once
/// per run. Keys are deduplicated by id only.
pub struct KeyExtractor<'a> {
    keystore: &'a dyn KeyStore,
    keys: BTreeMap<String, String>,
}

impl<'a> KeyExtractor<'a> {
    pub fn new(keystore: &'a dyn KeyStore) -> Self {
        Self {
            keystore,
            keys: BTreeMap::new(),
        }
    }

    pub fn resolve(&mut self, record: &CommitRecord) -> Result<Option<&str>, SealError> {
        match record.signer_key_id() {
            Some(key_id) => self.resolve_key(&record.hash, key_id).map(Some),
            None => Ok(None),
        }
    }

    pub fn resolve_key(&mut self, hash: &str, key_id: &str) -> Result<&str, SealError> {
        if !self.keys.contains_key(key_id) {
            let armored = self
                .keystore
                .export(key_id)
                .map_err(|e| SealError::KeyExportFailure {
                    key_id: key_id.to_string(),
                    reason: format!("{e:#}"),
                })?
                .ok_or_else(|| SealError::UnknownKeyId {
                    hash: hash.to_string(),
                    key_id: key_id.to_string(),
                })?;
            debug!(%key_id, "exported signer key");
            self.keys.insert(key_id.to_string(), armored);
        }
        Ok(self.keys[key_id].as_str())
    }

    pub fn into_keys(self) -> BTreeMap<String, String> {
        self.keys
    }
}
