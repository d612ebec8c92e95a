#[derive(Debug, thiserror::Error)]
pub enum SealError {
    #[error("cannot read repository{}: {reason}", .hash.as_ref().map(|h| format!(" at commit {h}")).unwrap_or_default())]
    RepoAccessFailure {
        hash: Option<String>,
        reason: String,
    },

    #[error("commit {hash} is not whitelisted and carries no signature")]
    MissingSignature { hash: String },

    #[error("commit {hash} signature does not verify: {reason}")]
    InvalidSignature { hash: String, reason: String },

    #[error("commit {hash} was signed by {key_id}, which the keyring cannot export")]
    UnknownKeyId { hash: String, key_id: String },

    #[error("exporting key {key_id} failed: {reason}")]
    KeyExportFailure { key_id: String, reason: String },

    #[error("commit {hash} object is unusable: {reason}")]
    MalformedObject { hash: String, reason: String },

    #[error("run cancelled")]
    Cancelled,
}

impl SealError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RepoAccessFailure { .. } | Self::MalformedObject { .. } => "RepoAccessFailure",
            Self::MissingSignature { .. } => "MissingSignature",
            Self::InvalidSignature { .. } => "InvalidSignature",
            Self::UnknownKeyId { .. } => "UnknownKeyId",
            Self::KeyExportFailure { .. } => "KeyExportFailure",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn commit(&self) -> Option<&str> {
        match self {
            Self::RepoAccessFailure { hash, .. } => hash.as_deref(),
            Self::MissingSignature { hash }
            | Self::InvalidSignature { hash, .. }
            | Self::UnknownKeyId { hash, .. }
            | Self::MalformedObject { hash, .. } => Some(hash),
            Self::KeyExportFailure { .. } | Self::Cancelled => None,
        }
    }

    pub fn key_id(&self) -> Option<&str> {
        match self {
            Self::UnknownKeyId { key_id, .. } | Self::KeyExportFailure { key_id, .. } => {
                Some(key_id)
            }
            _ => None,
        }
    }

    pub fn diagnostic(&self) -> String {
        let mut line = format!("error: {}", self.kind());
        if let Some(hash) = self.commit() {
            line.push_str(&format!(": commit {hash}"));
        }
        if let Some(key_id) = self.key_id() {
            line.push_str(&format!(" key {key_id}"));
        }
        line.push_str(&format!(": {self}"));
        line
    }
}
