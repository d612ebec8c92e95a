use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};

use crate::document::TrustDocument;
use crate::source::{KeyStore, RepoSource, VerifyOutcome};

pub fn hash(n: u32) -> String {
    format!("{n:040x}")
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf29ce484222325, |acc, &b| {
        (acc ^ u64::from(b)).wrapping_mul(0x100000001b3)
    })
}

fn payload(message: &str) -> String {
    format!(
        "tree 4b825dc642cb6eb9a060e54bf8d69288fbee4904\n\
         author Test User <test@example.com> 1700000000 +0000\n\
         committer Test User <test@example.com> 1700000000 +0000\n\
         \n\
         {message}\n"
    )
}

pub fn unsigned_object(message: &str) -> Vec<u8> {
    payload(message).into_bytes()
}

/// A commit object whose embedded signature the fake keyring accepts as
/// made by `key_id`.
pub fn signed_object(message: &str, key_id: &str) -> Vec<u8> {
    let payload = payload(message);
    let header = format!(
        "gpgsig -----BEGIN PGP SIGNATURE-----\n \n {key_id}:{:016x}\n -----END PGP SIGNATURE-----\n",
        fnv1a(payload.as_bytes())
    );
    let split = payload.find("\n\n").unwrap() + 1;
    format!("{}{header}{}", &payload[..split], &payload[split..]).into_bytes()
}

pub fn rehash(document: &mut TrustDocument) {
    for entry in &mut document.commits {
        entry.hash = gs_git::commit_id(entry.object.as_bytes(), 40).unwrap();
    }
}

#[derive(Default)]
pub struct FakeRepo {
    history: Vec<String>,
    objects: HashMap<String, Vec<u8>>,
    broken: bool,
}

impl FakeRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }

    pub fn commit(mut self, hash: String, object: Vec<u8>) -> Self {
        self.history.push(hash.clone());
        self.objects.insert(hash, object);
        self
    }

    pub fn unsigned(self, hash: String, message: &str) -> Self {
        self.commit(hash, unsigned_object(message))
    }

    pub fn signed(self, hash: String, message: &str, key_id: &str) -> Self {
        self.commit(hash, signed_object(message, key_id))
    }

    pub fn dangling(mut self, hash: String) -> Self {
        self.history.push(hash);
        self
    }
}

impl RepoSource for FakeRepo {
    fn list_history(&self) -> Result<Vec<String>> {
        if self.broken {
            bail!("history unreadable");
        }
        Ok(self.history.clone())
    }

    fn get_object(&self, hash: &str) -> Result<Vec<u8>> {
        match self.objects.get(hash) {
            Some(object) => Ok(object.clone()),
            None => bail!("object {hash} not found"),
        }
    }
}

#[derive(Default)]
pub struct FakeKeyStore {
    keys: BTreeMap<String, String>,
    unexportable: BTreeSet<String>,
    failing_export: bool,
    failing_verify: bool,
    cancel: Option<Arc<AtomicBool>>,
    verify_calls: AtomicUsize,
    export_calls: AtomicUsize,
}

impl FakeKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, key_id: &str) -> Self {
        self.keys.insert(key_id.to_string(), armored(key_id));
        self
    }

    pub fn with_unexportable_key(mut self, key_id: &str) -> Self {
        self.unexportable.insert(key_id.to_string());
        self.with_key(key_id)
    }

    pub fn failing_export(mut self) -> Self {
        self.failing_export = true;
        self
    }

    pub fn failing_verify(mut self) -> Self {
        self.failing_verify = true;
        self
    }

    pub fn cancelling(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    pub fn export_calls(&self) -> usize {
        self.export_calls.load(Ordering::SeqCst)
    }
}

pub fn armored(key_id: &str) -> String {
    format!("-----BEGIN PGP PUBLIC KEY BLOCK-----\n\n{key_id}\n-----END PGP PUBLIC KEY BLOCK-----\n")
}

impl KeyStore for FakeKeyStore {
    fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<VerifyOutcome> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(flag) = &self.cancel {
            flag.store(true, Ordering::SeqCst);
        }
        if self.failing_verify {
            bail!("keyring unavailable");
        }
        let signature = String::from_utf8_lossy(signature);
        let Some((key_id, digest)) = signature.lines().find_map(|l| l.split_once(':')) else {
            return Ok(VerifyOutcome::Failed {
                reason: "unreadable signature".to_string(),
            });
        };
        if !self.keys.contains_key(key_id) {
            return Ok(VerifyOutcome::Failed {
                reason: format!("NO_PUBKEY {key_id}"),
            });
        }
        if digest != format!("{:016x}", fnv1a(payload)) {
            return Ok(VerifyOutcome::Failed {
                reason: format!("BADSIG {key_id}"),
            });
        }
        Ok(VerifyOutcome::Verified {
            key_id: key_id.to_string(),
        })
    }

    fn export(&self, key_id: &str) -> Result<Option<String>> {
        self.export_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_export {
            bail!("keyring export crashed");
        }
        if self.unexportable.contains(key_id) {
            return Ok(None);
        }
        Ok(self.keys.get(key_id).cloned())
    }
}
