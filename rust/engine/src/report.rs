// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ordered batch results with per-pair failures and truncation.

use crate::element::ElementId;
use crate::error::{EngineError, Result};
use serde::Serialize;

/// One pair in a batch scan
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScanEntry<T> {
    Found(T),
    /// Either element could not be resolved or measured
    Failed {
        element_a: ElementId,
        element_b: ElementId,
        error: EngineError,
    },
}

/// Counters describing one scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    /// Elements taking part after filtering
    pub elements: usize,
    /// Pairs surviving the broad phase
    pub candidate_pairs: usize,
    /// Pairs whose outcome made it into the report
    pub evaluated_pairs: usize,
    pub failures: usize,
}

/// Result of a batch scan, ascending by `(element_a, element_b)`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanReport<T> {
    pub entries: Vec<ScanEntry<T>>,
    /// Deadline expired; `entries` is the ordered prefix computed before it
    pub truncated: bool,
    pub stats: ScanStats,
}

impl<T> ScanReport<T> {
    pub fn found(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().filter_map(|e| match e {
            ScanEntry::Found(t) => Some(t),
            ScanEntry::Failed { .. } => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = (&ElementId, &ElementId, &EngineError)> {
        self.entries.iter().filter_map(|e| match e {
            ScanEntry::Failed {
                element_a,
                element_b,
                error,
            } => Some((element_a, element_b, error)),
            ScanEntry::Found(_) => None,
        })
    }
}

/// Outcome of one candidate pair; `Ok(None)` means below tolerance
pub(crate) type PairOutcome<T> = (ElementId, ElementId, Result<Option<T>>);

/// Order outcomes and cut at the first timeout
pub(crate) fn assemble<T>(
    mut outcomes: Vec<PairOutcome<T>>,
    elements: usize,
) -> ScanReport<T> {
    outcomes.sort_by(|x, y| (&x.0, &x.1).cmp(&(&y.0, &y.1)));

    let mut stats = ScanStats {
        elements,
        candidate_pairs: outcomes.len(),
        ..ScanStats::default()
    };
    let mut entries = Vec::new();
    let mut truncated = false;

    for (element_a, element_b, outcome) in outcomes {
        match outcome {
            Err(EngineError::Timeout) => {
                truncated = true;
                break;
            }
            Err(error) => {
                tracing::warn!(
                    element_a = %element_a,
                    element_b = %element_b,
                    error = %error,
                    "pair failed"
                );
                stats.failures += 1;
                entries.push(ScanEntry::Failed {
                    element_a,
                    element_b,
                    error,
                });
            }
            Ok(Some(found)) => entries.push(ScanEntry::Found(found)),
            Ok(None) => {}
        }
        stats.evaluated_pairs += 1;
    }

    ScanReport {
        entries,
        truncated,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ElementId {
        ElementId::from(s)
    }

    #[test]
    fn test_outcomes_sorted_and_empty_dropped() {
        let outcomes = vec![
            (id("b"), id("c"), Ok(Some(2))),
            (id("a"), id("c"), Ok(None)),
            (id("a"), id("b"), Ok(Some(1))),
        ];
        let report = assemble(outcomes, 3);
        assert_eq!(report.found().copied().collect::<Vec<_>>(), [1, 2]);
        assert!(!report.truncated);
        assert_eq!(report.stats.evaluated_pairs, 3);
    }

    #[test]
    fn test_timeout_keeps_ordered_prefix() {
        let outcomes = vec![
            (id("a"), id("b"), Ok(Some(1))),
            (id("a"), id("c"), Err(EngineError::Timeout)),
            (id("b"), id("c"), Ok(Some(3))),
        ];
        let report = assemble(outcomes, 3);
        assert!(report.truncated);
        assert_eq!(report.found().copied().collect::<Vec<_>>(), [1]);
        assert_eq!(report.stats.candidate_pairs, 3);
        assert_eq!(report.stats.evaluated_pairs, 1);
    }

    #[test]
    fn test_failures_do_not_abort() {
        let outcomes: Vec<PairOutcome<i32>> = vec![
            (id("a"), id("b"), Err(EngineError::NotFound("a".into()))),
            (id("b"), id("c"), Ok(Some(3))),
        ];
        let report = assemble(outcomes, 3);
        assert_eq!(report.failures().count(), 1);
        assert_eq!(report.found().count(), 1);
        assert_eq!(report.stats.failures, 1);
    }
}
