use std::fmt::{self, Display, Write as _};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// 128-bit content digest of a sequence.
///
/// The hex encoding is the key in the relational store; the same bytes,
/// rendered as a UUID, are the point id in the vector index. Derived from the
/// sequence exactly as the reader produced it, with no further normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Fingerprint([u8; 16]);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{value:?} is not a 128-bit hex fingerprint")]
pub struct FingerprintParseError {
    pub value: String,
}

impl Fingerprint {
    pub fn of_sequence(sequence: &str) -> Self {
        Self(md5::compute(sequence.as_bytes()).0)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// The id this sequence is stored under in the vector index.
    pub fn point_id(&self) -> Uuid {
        Uuid::from_bytes(self.0)
    }

    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(32);
        for byte in self.0 {
            write!(out, "{byte:02x}").expect("writing to a String cannot fail");
        }
        out
    }

    /// Parses a hex fingerprint, tolerating UUID-style hyphenation so index
    /// point ids round-trip.
    pub fn from_hex(value: &str) -> Result<Self, FingerprintParseError> {
        let compact: String = value.chars().filter(|c| *c != '-').collect();
        if compact.len() != 32 {
            return Err(FingerprintParseError {
                value: value.to_owned(),
            });
        }
        let mut bytes = [0u8; 16];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&compact[2 * i..2 * i + 2], 16).map_err(|_| {
                FingerprintParseError {
                    value: value.to_owned(),
                }
            })?;
        }
        Ok(Self(bytes))
    }
}

impl From<Uuid> for Fingerprint {
    fn from(id: Uuid) -> Self {
        Self(*id.as_bytes())
    }
}

impl From<Fingerprint> for String {
    fn from(fingerprint: Fingerprint) -> Self {
        fingerprint.to_hex()
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = FingerprintParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl FromStr for Fingerprint {
    type Err = FingerprintParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
