//! Batch driver: runs the matcher over a list of records, persisting each
//! batch as soon as it completes.
//!
//! Items are processed one at a time in input order. A batch is written
//! through its [`BatchSink`] before the next batch starts, so a crash or a
//! persistence failure later in the run never loses completed batches.
//! Per-item problems (missing fields, oracle failures) are absorbed; only
//! persistence failures abort the run.

pub mod error;
pub mod iterative;
pub mod record;
pub mod sink;
pub mod summary;

pub use error::{BatchError, BatchResult};
pub use iterative::IterativeRefiner;
pub use record::{MATCH_FIELD, PackageRecord, load_records};
pub use sink::{BatchSink, JsonDirSink};
pub use summary::RunSummary;

use crate::matcher::OntologyMatcher;
use crate::oracle::MatchOracle;

/// Drives an [`OntologyMatcher`] over batches of records.
pub struct BatchRunner<'m, 'a, O, S> {
    matcher: &'m OntologyMatcher<'a, O>,
    sink: S,
    resume: bool,
    simple_mode: Option<bool>,
    skipped: usize,
}

impl<'m, 'a, O: MatchOracle, S: BatchSink> BatchRunner<'m, 'a, O, S> {
    /// Resume behaviour follows the matcher's configuration.
    pub fn new(matcher: &'m OntologyMatcher<'a, O>, sink: S) -> Self {
        Self {
            matcher,
            sink,
            resume: matcher.config().resume,
            simple_mode: None,
            skipped: 0,
        }
    }

    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    /// Force label-only or full candidate entries for this run.
    pub fn with_simple_mode(mut self, simple_mode: bool) -> Self {
        self.simple_mode = Some(simple_mode);
        self
    }

    /// Items skipped for missing fields in the last run.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Annotate `items` in consecutive batches of at most `batch_size`,
    /// persisting each batch, then the consolidated results and the run
    /// summary. Skipped items are left out of the output; the rest keep
    /// input order.
    pub fn run(
        &mut self,
        items: &[PackageRecord],
        batch_size: usize,
    ) -> BatchResult<Vec<PackageRecord>> {
        let batch_size = batch_size.max(1);
        let batches = items.len().div_ceil(batch_size);
        let mut results = Vec::with_capacity(items.len());
        self.skipped = 0;

        tracing::info!(items = items.len(), batches, batch_size, "starting run");

        for (b, batch) in items.chunks(batch_size).enumerate() {
            let n = b + 1;
            let offset = b * batch_size;

            if self.resume {
                if let Some(done) = self.sink.load_batch(n)? {
                    // Missing-field items never reach a batch file.
                    let expected: Vec<&str> = batch
                        .iter()
                        .enumerate()
                        .filter_map(|(i, r)| r.require_fields(offset + i).ok().map(|(name, _)| name))
                        .collect();
                    if done.iter().map(PackageRecord::name).eq(expected.iter().map(|&e| Some(e))) {
                        tracing::info!(batch = n, records = done.len(), "batch already done, resuming");
                        self.skipped += batch.len() - expected.len();
                        results.extend(done);
                        continue;
                    }
                    tracing::warn!(
                        batch = n,
                        stored = done.len(),
                        expected = expected.len(),
                        "persisted batch does not match current items, recomputing"
                    );
                }
            }

            tracing::info!(batch = n, of = batches, items = batch.len(), "processing batch");
            let mut annotated = Vec::with_capacity(batch.len());
            for (i, record) in batch.iter().enumerate() {
                match self.process(offset + i, record)? {
                    Some(r) => annotated.push(r),
                    None => self.skipped += 1,
                }
            }

            self.sink.write_batch(n, &annotated)?;
            tracing::info!(batch = n, records = annotated.len(), "batch saved");
            results.extend(annotated);
        }

        self.sink.write_consolidated(&results)?;
        let summary = RunSummary::from_records(
            &results,
            self.skipped,
            self.matcher.config().confidence_threshold,
        );
        self.sink.write_summary(&summary)?;
        tracing::info!(
            matched = summary.matched,
            skipped = summary.skipped,
            validated = summary.validated,
            low_confidence = summary.low_confidence,
            "run complete"
        );
        Ok(results)
    }

    /// Match one record; `Ok(None)` means it was skipped.
    fn process(&self, index: usize, record: &PackageRecord) -> BatchResult<Option<PackageRecord>> {
        let (name, description) = match record.require_fields(index) {
            Ok(fields) => fields,
            Err(e) => {
                tracing::warn!(index, error = %e, "skipping item");
                return Ok(None);
            }
        };
        let simple_mode = self
            .simple_mode
            .unwrap_or(self.matcher.config().simple_mode);
        let result = self.matcher.match_package_with(name, description, simple_mode);
        record.annotated(&result).map(Some)
    }
}
