//! Bulk Deletion Module
//!
//! Bookkeeping for deletes that keep going after a failed step and report
//! the aggregate once every step has run.

use crate::error::{CacheError, Result};

// == Delete Tally ==
/// Running totals of one bulk delete.
///
/// A step is one key or one batch. Successful steps add what they actually
/// removed; failed steps are counted and the last error is kept as the
/// source of the final `PartialDelete`.
#[derive(Debug, Default)]
pub struct DeleteTally {
    deleted: usize,
    attempted: usize,
    failed: usize,
    last_error: Option<CacheError>,
}

impl DeleteTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a step that tried to remove `attempted` keys.
    ///
    /// `outcome` carries how many keys the step actually removed.
    pub fn record(&mut self, attempted: usize, outcome: Result<usize>) {
        self.attempted += attempted;
        match outcome {
            Ok(removed) => self.deleted += removed,
            Err(err) => {
                self.failed += attempted;
                self.last_error = Some(err);
            }
        }
    }

    pub fn deleted(&self) -> usize {
        self.deleted
    }

    /// Number of removed keys, or `PartialDelete` if any step failed.
    pub fn finish(self) -> Result<usize> {
        match self.last_error {
            Some(source) => Err(CacheError::PartialDelete {
                failed: self.failed,
                attempted: self.attempted,
                source: Box::new(source),
            }),
            None => Ok(self.deleted),
        }
    }
}

/// Runs `delete` for every item, one key per item, whatever earlier items
/// returned.
///
/// `delete` yields how many keys it removed (0 when the key was already
/// gone).
pub fn delete_each<I, F>(items: I, mut delete: F) -> Result<usize>
where
    I: IntoIterator,
    F: FnMut(&I::Item) -> Result<usize>,
{
    let mut tally = DeleteTally::new();
    for item in items {
        let outcome = delete(&item);
        tally.record(1, outcome);
    }
    tally.finish()
}
