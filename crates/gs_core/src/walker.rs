use tracing::debug;

use crate::error::SealError;
use crate::source::RepoSource;

pub struct CommitWalker<'a> {
    source: &'a dyn RepoSource,
}

impl<'a> CommitWalker<'a> {
    pub fn new(source: &'a dyn RepoSource) -> Self {
        Self { source }
    }

    pub fn list_history(&self) -> Result<Vec<String>, SealError> {
        let hashes = self
            .source
            .list_history()
            .map_err(|e| SealError::RepoAccessFailure {
                hash: None,
                reason: format!("{e:#}"),
            })?;
        if let Some(bad) = hashes
            .iter()
            .find(|h| !matches!(h.len(), 40 | 64) || !h.bytes().all(|b| b.is_ascii_hexdigit()))
        {
            return Err(SealError::RepoAccessFailure {
                hash: Some(bad.clone()),
                reason: "history yielded something that is not a full commit hash".to_string(),
            });
        }
        debug!(commits = hashes.len(), "listed history");
        Ok(hashes)
    }
}
