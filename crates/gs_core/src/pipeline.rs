use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

use crate::document::{DocumentBuilder, TrustDocument};
use crate::error::SealError;
use crate::keys::KeyExtractor;
use crate::source::{KeyStore, RepoSource};
use crate::verifier::{CommitRecord, SignatureVerifier};
use crate::walker::CommitWalker;
use crate::whitelist::Whitelist;

pub struct Pipeline<'a> {
    source: &'a dyn RepoSource,
    keystore: &'a dyn KeyStore,
    whitelist: &'a Whitelist,
    jobs: usize,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        source: &'a dyn RepoSource,
        keystore: &'a dyn KeyStore,
        whitelist: &'a Whitelist,
    ) -> Self {
        Self {
            source,
            keystore,
            whitelist,
            jobs: 1,
            cancel: None,
        }
    }

    /// Verifies up to `jobs` commits at a time. Results are still judged in
    /// history order, so the reported failure is the first failing commit.
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Aborts with `SealError::Cancelled` once `flag` is set. A failure seen
    /// after the flag went up is reported as `Cancelled` too.
    pub fn cancel_on(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    fn check_cancelled(&self) -> Result<(), SealError> {
        if self.is_cancelled() {
            return Err(SealError::Cancelled);
        }
        Ok(())
    }

    fn fetch(&self, hash: String) -> Result<(String, Vec<u8>), SealError> {
        match self.source.get_object(&hash) {
            Ok(raw) => Ok((hash, raw)),
            Err(e) => Err(SealError::RepoAccessFailure {
                reason: format!("{e:#}"),
                hash: Some(hash),
            }),
        }
    }

    pub fn run(&self) -> Result<TrustDocument, SealError> {
        match self.seal() {
            Err(_) if self.is_cancelled() => Err(SealError::Cancelled),
            result => result,
        }
    }

    fn seal(&self) -> Result<TrustDocument, SealError> {
        let hashes = CommitWalker::new(self.source).list_history()?;
        info!(commits = hashes.len(), whitelisted = self.whitelist.len(), "sealing history");

        let verifier = SignatureVerifier::new(self.keystore, self.whitelist);
        let records = if self.jobs == 1 {
            self.verify_sequential(&verifier, hashes)?
        } else {
            self.verify_batched(&verifier, hashes)?
        };
        self.check_cancelled()?;

        let mut extractor = KeyExtractor::new(self.keystore);
        for record in &records {
            extractor.resolve(record)?;
        }
        let keys = extractor.into_keys();

        let whitelisted = records.iter().filter(|r| r.is_whitelisted()).count();
        info!(
            whitelisted,
            verified = records.len() - whitelisted,
            keys = keys.len(),
            "history sealed"
        );
        DocumentBuilder::new().build(records, keys)
    }

    fn verify_sequential(
        &self,
        verifier: &SignatureVerifier<'_>,
        hashes: Vec<String>,
    ) -> Result<Vec<CommitRecord>, SealError> {
        let mut records = Vec::with_capacity(hashes.len());
        for hash in hashes {
            self.check_cancelled()?;
            let (hash, raw) = self.fetch(hash)?;
            records.push(verifier.verify(hash, raw)?);
        }
        Ok(records)
    }

    fn verify_batched(
        &self,
        verifier: &SignatureVerifier<'_>,
        hashes: Vec<String>,
    ) -> Result<Vec<CommitRecord>, SealError> {
        let mut records = Vec::with_capacity(hashes.len());
        let mut pending = hashes.into_iter().peekable();
        while pending.peek().is_some() {
            self.check_cancelled()?;
            // Objects are read on this thread; only verification fans out.
            let batch: Vec<_> = pending
                .by_ref()
                .take(self.jobs)
                .map(|hash| self.fetch(hash))
                .collect();

            let outcomes: Vec<Result<CommitRecord, SealError>> = std::thread::scope(|scope| {
                let handles: Vec<_> = batch
                    .into_iter()
                    .map(|fetched| {
                        scope.spawn(move || {
                            fetched.and_then(|(hash, raw)| verifier.verify(hash, raw))
                        })
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|handle| {
                        handle
                            .join()
                            .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
                    })
                    .collect()
            });

            for outcome in outcomes {
                records.push(outcome?);
            }
        }
        Ok(records)
    }
}
