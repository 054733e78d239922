//! Drives scanned dependencies through the remover, one file at a time.
//!
//! Strictly sequential: removal overwrites source files in place, so there is
//! no parallel processing and no reordering. Dependencies are handled and
//! reported in list order, with cancellation honored only between files.

use serde::Serialize;
use std::fs;

use crate::error::Error;
use crate::remover;
use crate::rules::removal_rule;
use crate::scanner::{CancelToken, Dependency};
use crate::state::RunLog;

/// Per-file result of a removal attempt. Consumed immediately for counters;
/// never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RemovalOutcome {
    /// A fragment was excised and the file rewritten.
    Removed,
    /// The rule matched nothing; the file was left untouched on disk.
    NotModified,
    /// No removal rule is registered for this document type.
    Unsupported,
    /// Parse or IO failure; the batch continues.
    Failed(String),
}

/// Aggregate counters for one batch, surfaced even on partial cancellation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub processed: usize,
    pub removed: usize,
    pub not_modified: usize,
    pub unsupported: usize,
    pub failed: usize,
    pub cancelled: bool,
}

impl BatchReport {
    fn tally(&mut self, outcome: &RemovalOutcome) {
        self.processed += 1;
        match outcome {
            RemovalOutcome::Removed => self.removed += 1,
            RemovalOutcome::NotModified => self.not_modified += 1,
            RemovalOutcome::Unsupported => self.unsupported += 1,
            RemovalOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Progress capability injected per batch; replaces any notion of global
/// output state. Implementations must not assume they outlive the batch.
pub trait ProgressSink {
    fn batch_started(&mut self, _total: usize) {}
    fn file_processed(&mut self, _dep: &Dependency, _outcome: &RemovalOutcome) {}
}

/// Sink that reports nothing; useful for tests and library callers.
#[derive(Debug, Default)]
pub struct SilentSink;

impl ProgressSink for SilentSink {}

/// What a removal would do to one file, without touching the disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedChange {
    Unsupported,
    NotModified,
    Rewrite { old: String, new: String },
    Failed(String),
}

/// Evaluate the removal for one dependency without writing anything.
pub fn plan_one(dep: &Dependency, field: &str) -> PlannedChange {
    let Some(rule) = removal_rule(dep.doc_type) else {
        return PlannedChange::Unsupported;
    };

    let old = match fs::read_to_string(&dep.path) {
        Ok(text) => text,
        Err(e) => return PlannedChange::Failed(Error::io("read", &dep.path, e).to_string()),
    };

    match remover::rewrite(&old, &rule, field) {
        Ok(Some(new)) => PlannedChange::Rewrite { old, new },
        Ok(None) => PlannedChange::NotModified,
        Err(e) => PlannedChange::Failed(e.to_string()),
    }
}

/// Remove the field's fragment from one file, writing back only when the tree
/// actually changed. A `RunLog` records the pre-image before the overwrite.
pub fn remove_one(dep: &Dependency, field: &str, run: Option<&mut RunLog>) -> RemovalOutcome {
    match plan_one(dep, field) {
        PlannedChange::Unsupported => RemovalOutcome::Unsupported,
        PlannedChange::NotModified => RemovalOutcome::NotModified,
        PlannedChange::Failed(reason) => RemovalOutcome::Failed(reason),
        PlannedChange::Rewrite { old, new } => {
            if let Some(run) = run {
                // Backup first: never overwrite a file whose pre-image could
                // not be persisted.
                if let Err(e) = run.record(&dep.path, &old, &new) {
                    return RemovalOutcome::Failed(format!("backup: {e}"));
                }
            }
            match fs::write(&dep.path, &new) {
                Ok(()) => RemovalOutcome::Removed,
                Err(e) => RemovalOutcome::Failed(Error::io("write", &dep.path, e).to_string()),
            }
        }
    }
}

/// Process dependencies in list order, stopping early on cancellation.
///
/// The report always reflects exactly the files processed so far; files after
/// a cancellation point are untouched on disk.
pub fn remove_all(
    dependencies: &[Dependency],
    field: &str,
    token: &CancelToken,
    sink: &mut dyn ProgressSink,
    mut run: Option<&mut RunLog>,
) -> BatchReport {
    let mut report = BatchReport::default();
    sink.batch_started(dependencies.len());

    for dep in dependencies {
        if token.is_cancelled() {
            report.cancelled = true;
            break;
        }
        let outcome = remove_one(dep, field, run.as_deref_mut());
        report.tally(&outcome);
        sink.file_processed(dep, &outcome);
    }

    report
}
