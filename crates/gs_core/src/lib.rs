pub mod check;
pub mod document;
pub mod error;
pub mod keys;
pub mod pipeline;
pub mod source;
pub mod verifier;
pub mod walker;
pub mod whitelist;

#[cfg(test)]
mod fakes;

pub use check::{check_document, CheckReport, CheckedEntry};
pub use document::{CommitEntry, DocumentBuilder, TrustDocument};
pub use error::SealError;
pub use keys::KeyExtractor;
pub use pipeline::Pipeline;
pub use source::{GitSource, KeyStore, RepoSource, VerifyOutcome};
pub use verifier::{CommitRecord, SignatureVerifier, Trust};
pub use walker::CommitWalker;
pub use whitelist::Whitelist;
