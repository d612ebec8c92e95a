use std::path::Path;

use anyhow::{Context, Result};

use crate::object::CommitObject;

pub struct Repository {
    inner: gix::Repository,
}

impl Repository {
    pub fn open(path: &Path) -> Result<Self> {
        let inner = gix::open(path)
            .with_context(|| format!("failed to open git repository at {}", path.display()))?;
        Ok(Self { inner })
    }

    pub fn history(&self) -> Result<Vec<String>> {
        let head_id = self
            .inner
            .head_id()
            .context("repository HEAD does not point at a commit")?;
        self.walk(head_id.detach())
    }

    pub fn history_from(&self, rev: &str) -> Result<Vec<String>> {
        let commit = self
            .inner
            .rev_parse_single(rev)
            .with_context(|| format!("failed to resolve revision {rev}"))?
            .object()?
            .peel_to_commit()
            .with_context(|| format!("revision {rev} does not name a commit"))?;
        self.walk(commit.id)
    }

    fn walk(&self, tip: gix::ObjectId) -> Result<Vec<String>> {
        let walk = self
            .inner
            .rev_walk([tip])
            .sorting(gix::revision::walk::Sorting::ByCommitTime(
                Default::default(),
            ))
            .all()?;

        let mut hashes = Vec::new();
        for info in walk {
            let info = info?;
            hashes.push(info.id.to_hex().to_string());
        }
        Ok(hashes)
    }

    /// The exact bytes of a commit object as stored in the object database.
    pub fn raw_commit(&self, hash: &str) -> Result<Vec<u8>> {
        let id = gix::ObjectId::from_hex(hash.as_bytes())
            .with_context(|| format!("invalid commit hash: {hash}"))?;
        let object = self
            .inner
            .find_object(id)
            .with_context(|| format!("failed to read object {hash}"))?
            .detach();
        anyhow::ensure!(
            object.kind == gix::object::Kind::Commit,
            "object {hash} is a {}, not a commit",
            object.kind
        );
        Ok(object.data)
    }

    pub fn commit(&self, hash: &str) -> Result<CommitObject> {
        let raw = self.raw_commit(hash)?;
        CommitObject::parse(&raw).with_context(|| format!("failed to parse commit {hash}"))
    }
}
