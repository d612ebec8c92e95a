use std::ops::Range;

use gix::bstr::{BStr, BString, ByteSlice};

pub const SIGNATURE_HEADER: &str = "gpgsig";
pub const SIGNATURE_HEADER_SHA256: &str = "gpgsig-sha256";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ObjectError {
    #[error("commit object does not start with a tree header")]
    MissingTree,
    #[error("malformed header on line {line}")]
    MalformedHeader { line: usize },
    #[error("commit object carries more than one `{name}` header")]
    DuplicateSignature { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    pub name: BString,
    pub value: BString,
    span: Range<usize>,
}

impl HeaderField {
    fn is_signature(&self) -> bool {
        self.name == SIGNATURE_HEADER || self.name == SIGNATURE_HEADER_SHA256
    }
}

#[derive(Debug, Clone)]
pub struct CommitObject {
    raw: Vec<u8>,
    headers: Vec<HeaderField>,
    message_start: usize,
}

impl CommitObject {
    pub fn parse(raw: &[u8]) -> Result<Self, ObjectError> {
        let mut headers: Vec<HeaderField> = Vec::new();
        let mut pos = 0;
        let mut line_no = 0;
        let mut message_start = raw.len();

        while pos < raw.len() {
            line_no += 1;
            let end = raw[pos..]
                .find_byte(b'\n')
                .map_or(raw.len(), |i| pos + i + 1);
            let line = &raw[pos..end];
            let content = line.strip_suffix(b"\n").unwrap_or(line);

            if content.is_empty() {
                message_start = end;
                break;
            }

            if let Some(continuation) = content.strip_prefix(b" ") {
                let field = headers
                    .last_mut()
                    .ok_or(ObjectError::MalformedHeader { line: line_no })?;
                field.value.push(b'\n');
                field.value.extend_from_slice(continuation);
                field.span.end = end;
            } else {
                let split = content
                    .find_byte(b' ')
                    .filter(|&i| i > 0)
                    .ok_or(ObjectError::MalformedHeader { line: line_no })?;
                headers.push(HeaderField {
                    name: content[..split].into(),
                    value: content[split + 1..].into(),
                    span: pos..end,
                });
            }
            pos = end;
        }

        if headers.first().map(|h| h.name != "tree").unwrap_or(true) {
            return Err(ObjectError::MissingTree);
        }
        for name in [SIGNATURE_HEADER, SIGNATURE_HEADER_SHA256] {
            if headers.iter().filter(|h| h.name == name).count() > 1 {
                return Err(ObjectError::DuplicateSignature {
                    name: name.to_string(),
                });
            }
        }

        Ok(Self {
            raw: raw.to_vec(),
            headers,
            message_start,
        })
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn headers(&self) -> &[HeaderField] {
        &self.headers
    }

    fn header(&self, name: &str) -> Option<&BStr> {
        self.headers
            .iter()
            .find(|h| h.name == name)
            .map(|h| h.value.as_bstr())
    }

    pub fn tree(&self) -> &BStr {
        // parse() guarantees the first header is the tree
        self.headers[0].value.as_bstr()
    }

    pub fn parents(&self) -> Vec<&BStr> {
        self.headers
            .iter()
            .filter(|h| h.name == "parent")
            .map(|h| h.value.as_bstr())
            .collect()
    }

    pub fn author(&self) -> Option<&BStr> {
        self.header("author")
    }

    pub fn committer(&self) -> Option<&BStr> {
        self.header("committer")
    }

    pub fn encoding(&self) -> Option<&BStr> {
        self.header("encoding")
    }

    pub fn message(&self) -> &BStr {
        self.raw[self.message_start..].as_bstr()
    }

    pub fn is_signed(&self) -> bool {
        self.headers.iter().any(HeaderField::is_signature)
    }

    /// The armored detached signature, as git hands it to the verifier.
    pub fn signature(&self) -> Option<BString> {
        let field = self
            .headers
            .iter()
            .find(|h| h.name == SIGNATURE_HEADER)
            .or_else(|| self.headers.iter().find(|h| h.name == SIGNATURE_HEADER_SHA256))?;
        let mut signature = field.value.clone();
        if self.raw[..field.span.end].ends_with(b"\n") {
            signature.push(b'\n');
        }
        Some(signature)
    }

    /// The object with every signature header removed. Equal to `raw()`
    /// for an unsigned commit.
    pub fn signed_payload(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(self.raw.len());
        let mut pos = 0;
        for field in self.headers.iter().filter(|h| h.is_signature()) {
            payload.extend_from_slice(&self.raw[pos..field.span.start]);
            pos = field.span.end;
        }
        payload.extend_from_slice(&self.raw[pos..]);
        payload
    }

    pub fn split_signature(&self) -> Option<(Vec<u8>, BString)> {
        let signature = self.signature()?;
        Some((self.signed_payload(), signature))
    }
}

/// The id git assigns to `raw` as a commit object, in the hash format whose
/// hex ids are `hex_len` long. `None` if that format is not supported.
pub fn commit_id(raw: &[u8], hex_len: usize) -> Option<String> {
    let kind = gix::hash::Kind::from_hex_len(hex_len)?;
    Some(gix::objs::compute_hash(kind, gix::objs::Kind::Commit, raw).to_string())
}
