//! Content identifiers and retrieved evidence blobs.

use crate::errors::{MultaError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const BASE58_ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Validated content identifier: CIDv0 (`Qm` + 44 base58 characters) or
/// CIDv1 (`b` + 58 base32 characters).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EvidenceCid(String);

impl EvidenceCid {
    /// Validate a raw identifier. No network access.
    pub fn parse(value: &str) -> Result<Self> {
        if value.is_empty() {
            return Err(MultaError::validation("Evidence CID cannot be empty"));
        }
        if is_cid_v0(value) || is_cid_v1(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(MultaError::validation(format!(
                "Invalid CID format: {value}. Expected CIDv0 (Qm...) or CIDv1 (b...)"
            )))
        }
    }

    /// Borrow the identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is a version 0 identifier.
    pub fn is_v0(&self) -> bool {
        self.0.starts_with("Qm")
    }
}

fn is_cid_v0(value: &str) -> bool {
    value.len() == 46
        && value.starts_with("Qm")
        && value.as_bytes()[2..].iter().all(|b| BASE58_ALPHABET.contains(b))
}

fn is_cid_v1(value: &str) -> bool {
    value.len() == 59
        && value.starts_with('b')
        && value.as_bytes()[1..]
            .iter()
            .all(|b| b.is_ascii_alphabetic() || (b'2'..=b'7').contains(b))
}

impl FromStr for EvidenceCid {
    type Err = MultaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for EvidenceCid {
    type Error = MultaError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<EvidenceCid> for String {
    fn from(cid: EvidenceCid) -> Self {
        cid.0
    }
}

impl fmt::Display for EvidenceCid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Evidence file as retrieved: chunks in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceBlob {
    /// Identifier the blob was fetched by
    pub cid: EvidenceCid,
    /// Chunks in arrival order
    pub chunks: Vec<Vec<u8>>,
    /// Sum of chunk lengths
    pub total_size: u64,
}

impl EvidenceBlob {
    /// Build a blob, computing its total size.
    pub fn new(cid: EvidenceCid, chunks: Vec<Vec<u8>>) -> Self {
        let total_size = chunks.iter().map(|c| c.len() as u64).sum();
        Self {
            cid,
            chunks,
            total_size,
        }
    }

    /// Concatenate the chunks.
    pub fn into_bytes(self) -> Vec<u8> {
        self.chunks.concat()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_both_versions() {
        let v0 = EvidenceCid::parse("QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG").unwrap();
        assert!(v0.is_v0());
        let v1 = EvidenceCid::parse("bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi")
            .unwrap();
        assert!(!v1.is_v0());
    }

    #[test]
    fn rejects_malformed() {
        assert!(EvidenceCid::parse("not-a-cid").is_err());
        assert!(EvidenceCid::parse("").is_err());
        // '0' and 'l' are outside the base58 alphabet
        assert!(EvidenceCid::parse("Qm0wAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG").is_err());
        assert!(EvidenceCid::parse("QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbd").is_err());
        assert!(EvidenceCid::parse("bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzd1")
            .is_err());
    }

    #[test]
    fn blob_reassembles_in_order() {
        let cid = EvidenceCid::parse("QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG").unwrap();
        let blob = EvidenceBlob::new(cid, vec![b"ab".to_vec(), b"cde".to_vec()]);
        assert_eq!(blob.total_size, 5);
        assert_eq!(blob.into_bytes(), b"abcde");
    }
}
