use serde::{Deserialize, Serialize};

use crate::fingerprint::Fingerprint;

/// A stored sequence, addressed by its content fingerprint. Created on first
/// sighting and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceRecord {
    pub fingerprint: Fingerprint,
    pub sequence: String,
}

impl SequenceRecord {
    pub fn new(sequence: impl Into<String>) -> Self {
        let sequence = sequence.into();
        Self {
            fingerprint: Fingerprint::of_sequence(&sequence),
            sequence,
        }
    }
}

/// Links a stored sequence to an external identifier under a named source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLink {
    pub fingerprint: Fingerprint,
    pub source: String,
    pub identifier: String,
}

/// One annotation payload attached to a sequence under a named kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationValue {
    pub fingerprint: Fingerprint,
    pub kind: String,
    pub value: serde_json::Value,
}

/// Outcome of an idempotent insert: a duplicate is reported, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyPresent,
}

pub const SEQUENCE_NOT_FOUND: &str = "not found";

/// What gets written out for one search neighbor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomologBundle {
    pub identifier: Option<String>,
    pub sequence: String,
    pub annotations: Vec<serde_json::Value>,
}

impl HomologBundle {
    /// Placeholder for a neighbor the relational store does not know; keeps
    /// one unknown id from failing the whole batch.
    pub fn not_found(fingerprint: &Fingerprint) -> Self {
        Self {
            identifier: Some(fingerprint.to_hex()),
            sequence: SEQUENCE_NOT_FOUND.to_owned(),
            annotations: Vec::new(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.sequence == SEQUENCE_NOT_FOUND
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_fingerprint_matches_sequence() {
        let record = SequenceRecord::new("MKVLATRE");
        assert_eq!(record.fingerprint, Fingerprint::of_sequence("MKVLATRE"));
    }

    #[test]
    fn test_not_found_bundle_carries_the_fingerprint() {
        let fingerprint = Fingerprint::of_sequence("MKV");
        let bundle = HomologBundle::not_found(&fingerprint);
        assert_eq!(bundle.identifier.as_deref(), Some(fingerprint.to_hex().as_str()));
        assert_eq!(bundle.sequence, SEQUENCE_NOT_FOUND);
        assert!(bundle.annotations.is_empty());
        assert!(bundle.is_placeholder());
    }
}
