use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::SealError;
use crate::verifier::CommitRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustDocument {
    pub keys: BTreeMap<String, String>,
    pub commits: Vec<CommitEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitEntry {
    pub hash: String,
    pub object: String,
    /// `true` for whitelisted commits, `false` for signature-verified ones.
    /// Serialized as the strings `"true"` and `"false"`.
    #[serde(with = "trusted_flag")]
    pub trusted: bool,
}

mod trusted_flag {
    use serde::de::{self, Unexpected};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if *value { "true" } else { "false" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        let value = String::deserialize(deserializer)?;
        match value.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(de::Error::invalid_value(
                Unexpected::Str(other),
                &"\"true\" or \"false\"",
            )),
        }
    }
}

impl TrustDocument {
    pub fn to_json(&self) -> serde_json::Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[derive(Debug, Default)]
pub struct DocumentBuilder {
    commits: Vec<CommitEntry>,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        record: CommitRecord,
        keys: &BTreeMap<String, String>,
    ) -> Result<(), SealError> {
        if let Some(key_id) = record.signer_key_id() {
            if !keys.contains_key(key_id) {
                return Err(SealError::UnknownKeyId {
                    hash: record.hash.clone(),
                    key_id: key_id.to_string(),
                });
            }
        }
        let trusted = record.is_whitelisted();
        // A JSON string cannot carry the raw bytes, and any substitute would
        // no longer hash or verify.
        let object = String::from_utf8(record.raw_object).map_err(|e| {
            SealError::MalformedObject {
                hash: record.hash.clone(),
                reason: format!(
                    "object is not UTF-8 (invalid byte at offset {}), cannot embed it losslessly",
                    e.utf8_error().valid_up_to()
                ),
            }
        })?;
        self.commits.push(CommitEntry {
            hash: record.hash,
            object,
            trusted,
        });
        Ok(())
    }

    pub fn build(
        mut self,
        records: Vec<CommitRecord>,
        keys: BTreeMap<String, String>,
    ) -> Result<TrustDocument, SealError> {
        for record in records {
            self.push(record, &keys)?;
        }
        Ok(TrustDocument {
            keys,
            commits: self.commits,
        })
    }
}
