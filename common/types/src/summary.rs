use std::fmt::{self, Display};

use crate::fingerprint::Fingerprint;

/// How one batch item ended up. Skips carry the reason so the item can be
/// retried by hand later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    Processed,
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    pub identifier: String,
    pub fingerprint: Option<Fingerprint>,
    pub status: ItemStatus,
}

impl ItemOutcome {
    pub fn processed(identifier: impl Into<String>, fingerprint: Fingerprint) -> Self {
        Self {
            identifier: identifier.into(),
            fingerprint: Some(fingerprint),
            status: ItemStatus::Processed,
        }
    }

    pub fn skipped(
        identifier: impl Into<String>,
        fingerprint: Option<Fingerprint>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            fingerprint,
            status: ItemStatus::Skipped {
                reason: reason.into(),
            },
        }
    }

    pub fn is_processed(&self) -> bool {
        matches!(self.status, ItemStatus::Processed)
    }
}

/// Collected per-item results of one batch run. Failures are values here,
/// not suppressed exceptions; the run prints this at the end.
#[derive(Debug, Default)]
pub struct BatchSummary {
    outcomes: Vec<ItemOutcome>,
}

impl BatchSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, outcome: ItemOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn outcomes(&self) -> &[ItemOutcome] {
        &self.outcomes
    }

    pub fn processed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_processed()).count()
    }

    pub fn skipped(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes.iter().filter(|o| !o.is_processed())
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

impl Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let skipped: Vec<_> = self.skipped().collect();
        write!(
            f,
            "{} processed, {} skipped",
            self.processed(),
            skipped.len()
        )?;
        for outcome in skipped {
            let ItemStatus::Skipped { reason } = &outcome.status else {
                continue;
            };
            match &outcome.fingerprint {
                Some(fingerprint) => {
                    write!(f, "\n  {} ({}): {}", outcome.identifier, fingerprint, reason)?
                }
                None => write!(f, "\n  {}: {}", outcome.identifier, reason)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts_and_rendering() {
        let mut summary = BatchSummary::new();
        summary.push(ItemOutcome::processed("A", Fingerprint::of_sequence("MKV")));
        summary.push(ItemOutcome::skipped(
            "B",
            Some(Fingerprint::of_sequence("MKT")),
            "index unreachable",
        ));
        summary.push(ItemOutcome::skipped("C", None, "malformed header"));

        assert_eq!(summary.processed(), 1);
        assert_eq!(summary.skipped().count(), 2);

        let rendered = summary.to_string();
        assert!(rendered.starts_with("1 processed, 2 skipped"));
        assert!(rendered.contains("index unreachable"));
        assert!(rendered.contains("C: malformed header"));
    }
}
