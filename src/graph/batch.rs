//! Per-item batch bookkeeping shared by all mutation operations.
//!
//! Every batch operation processes its input list item-by-item: one item's
//! failure is recorded and must not abort its siblings. `BatchReport`
//! centralizes that try/continue policy so each operation only states its
//! per-item algorithm.

use crate::error::Result;

/// What happened to one batch item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The item was applied to the store; carries the externally visible
    /// result for this item.
    Applied(T),
    /// Benign no-op: already present, already gone, or nothing to do.
    Skipped,
    /// The item could not be applied; the reason is logged and kept.
    Failed(String),
}

/// One input item paired with its outcome.
#[derive(Debug, Clone)]
pub struct BatchItem<I, T> {
    pub input: I,
    pub outcome: Outcome<T>,
}

/// Ordered outcomes for a whole batch call.
#[derive(Debug, Clone)]
pub struct BatchReport<I, T> {
    pub items: Vec<BatchItem<I, T>>,
}

impl<I, T> BatchReport<I, T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Record the result of one item's sub-operation. An `Err` is folded
    /// into `Outcome::Failed` and logged; the batch continues.
    pub fn record(&mut self, operation: &str, input: I, result: Result<Outcome<T>>) {
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                log::warn!("{operation}: item failed: {e}");
                Outcome::Failed(e.to_string())
            }
        };
        self.items.push(BatchItem { input, outcome });
    }

    /// The applied results, in input order. Skipped and failed items are
    /// omitted — callers infer partial failure by comparing counts.
    pub fn applied(self) -> Vec<T> {
        self.items
            .into_iter()
            .filter_map(|item| match item.outcome {
                Outcome::Applied(value) => Some(value),
                _ => None,
            })
            .collect()
    }

    /// (applied, skipped, failed) counts for summary logging.
    pub fn counts(&self) -> (usize, usize, usize) {
        let mut applied = 0;
        let mut skipped = 0;
        let mut failed = 0;
        for item in &self.items {
            match item.outcome {
                Outcome::Applied(_) => applied += 1,
                Outcome::Skipped => skipped += 1,
                Outcome::Failed(_) => failed += 1,
            }
        }
        (applied, skipped, failed)
    }
}

impl<I, T> Default for BatchReport<I, T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphmemError;

    #[test]
    fn test_record_and_applied_order() {
        let mut report: BatchReport<&str, i32> = BatchReport::new();
        report.record("op", "a", Ok(Outcome::Applied(1)));
        report.record("op", "b", Ok(Outcome::Skipped));
        report.record("op", "c", Ok(Outcome::Applied(3)));
        assert_eq!(report.counts(), (2, 1, 0));
        assert_eq!(report.applied(), vec![1, 3]);
    }

    #[test]
    fn test_error_becomes_failed_and_batch_continues() {
        let mut report: BatchReport<&str, ()> = BatchReport::new();
        report.record(
            "op",
            "a",
            Err(GraphmemError::EntityNotFound("ghost".to_string())),
        );
        report.record("op", "b", Ok(Outcome::Applied(())));
        assert_eq!(report.counts(), (1, 0, 1));
        match &report.items[0].outcome {
            Outcome::Failed(reason) => assert!(reason.contains("ghost")),
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
