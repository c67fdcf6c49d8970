//! Durability tests: completed batches survive later failures and can be
//! resumed from.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicUsize, Ordering};

use edam_match::batch::{
    BatchError, BatchResult, BatchRunner, BatchSink, JsonDirSink, PackageRecord, RunSummary,
    load_records,
};
use edam_match::config::MatcherConfig;
use edam_match::matcher::OntologyMatcher;
use edam_match::oracle::{MatchOracle, OracleRequest, OracleResult, RawMatchResult};
use edam_match::vocab::{VocabularyOptions, VocabularyStore, VocabularyTerm};

const GEX: &str = "http://edamontology.org/topic_0203";

/// Always answers "Gene expression"; panics for packages named "crash".
struct Steady {
    calls: AtomicUsize,
}

impl Steady {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

impl MatchOracle for Steady {
    fn query(&self, request: &OracleRequest) -> OracleResult<RawMatchResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if request.item_name == "crash" {
            panic!("oracle process died");
        }
        Ok(RawMatchResult {
            id: GEX.into(),
            label: "Gene expression".into(),
            confidence: 0.8,
            reasoning: String::new(),
        })
    }
}

/// Delegates to a [`JsonDirSink`] but refuses to write one batch.
struct FailOnBatch {
    inner: JsonDirSink,
    fail_on: usize,
}

impl BatchSink for FailOnBatch {
    fn write_batch(&mut self, batch: usize, records: &[PackageRecord]) -> BatchResult<()> {
        if batch == self.fail_on {
            return Err(BatchError::Persist {
                path: self.inner.batch_path(batch).display().to_string(),
                source: std::io::Error::other("no space left on device"),
            });
        }
        self.inner.write_batch(batch, records)
    }

    fn load_batch(&mut self, batch: usize) -> BatchResult<Option<Vec<PackageRecord>>> {
        self.inner.load_batch(batch)
    }

    fn write_consolidated(&mut self, records: &[PackageRecord]) -> BatchResult<()> {
        self.inner.write_consolidated(records)
    }

    fn write_summary(&mut self, summary: &RunSummary) -> BatchResult<()> {
        self.inner.write_summary(summary)
    }
}

fn store() -> VocabularyStore {
    VocabularyStore::from_terms(
        vec![VocabularyTerm::new(GEX, "Gene expression")],
        &VocabularyOptions::default(),
    )
    .unwrap()
}

fn items(names: &[&str]) -> Vec<PackageRecord> {
    names
        .iter()
        .map(|n| PackageRecord::new(n, "gene expression profiling"))
        .collect()
}

#[test]
fn failed_batch_leaves_earlier_batch_intact() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = store();
    let oracle = Steady::new();
    let matcher = OntologyMatcher::new(&store, &oracle, &MatcherConfig::default());
    let base = JsonDirSink::create(dir.path()).unwrap();
    let sink = FailOnBatch {
        inner: base.clone(),
        fail_on: 2,
    };

    let err = BatchRunner::new(&matcher, sink)
        .run(&items(&["a", "b", "c", "d"]), 2)
        .unwrap_err();
    assert!(matches!(err, BatchError::Persist { .. }));

    let batch1 = load_records(&base.batch_path(1)).unwrap();
    let names: Vec<_> = batch1.iter().map(|r| r.name().unwrap()).collect();
    assert_eq!(names, ["a", "b"]);
    assert!(batch1.iter().all(|r| r.edam_match().unwrap().validated));
    assert!(!base.batch_path(2).exists());
    assert!(!base.consolidated_path().exists());
}

#[test]
fn crash_mid_run_keeps_completed_batches() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = store();
    let oracle = Steady::new();
    let matcher = OntologyMatcher::new(&store, &oracle, &MatcherConfig::default());
    let sink = JsonDirSink::create(dir.path()).unwrap();
    let input = items(&["a", "b", "crash", "d"]);

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        BatchRunner::new(&matcher, sink.clone()).run(&input, 2)
    }));
    assert!(outcome.is_err());

    assert_eq!(load_records(&sink.batch_path(1)).unwrap().len(), 2);
    assert!(!sink.batch_path(2).exists());
}

#[test]
fn resume_skips_completed_batches() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = store();
    let sink = JsonDirSink::create(dir.path()).unwrap();
    let input = items(&["a", "b", "c", "d", "e"]);

    {
        let oracle = Steady::new();
        let matcher = OntologyMatcher::new(&store, &oracle, &MatcherConfig::default());
        let failing = FailOnBatch {
            inner: sink.clone(),
            fail_on: 3,
        };
        assert!(BatchRunner::new(&matcher, failing).run(&input, 2).is_err());
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 5);
    }

    let oracle = Steady::new();
    let config = MatcherConfig {
        resume: true,
        ..Default::default()
    };
    let matcher = OntologyMatcher::new(&store, &oracle, &config);
    let results = BatchRunner::new(&matcher, sink.clone())
        .run(&input, 2)
        .unwrap();

    // only batch 3 ("e") is recomputed
    assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
    let names: Vec<_> = results.iter().map(|r| r.name().unwrap()).collect();
    assert_eq!(names, ["a", "b", "c", "d", "e"]);
    assert_eq!(load_records(&sink.consolidated_path()).unwrap().len(), 5);
}

#[test]
fn resume_with_new_batch_size_recomputes_mismatched_batches() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = store();
    let sink = JsonDirSink::create(dir.path()).unwrap();
    {
        let oracle = Steady::new();
        let matcher = OntologyMatcher::new(&store, &oracle, &MatcherConfig::default());
        BatchRunner::new(&matcher, sink.clone())
            .run(&items(&["a", "b"]), 2)
            .unwrap();
    }

    let oracle = Steady::new();
    let config = MatcherConfig {
        resume: true,
        ..Default::default()
    };
    let matcher = OntologyMatcher::new(&store, &oracle, &config);
    let results = BatchRunner::new(&matcher, sink.clone())
        .run(&items(&["a", "b", "c", "d"]), 3)
        .unwrap();

    assert_eq!(oracle.calls.load(Ordering::SeqCst), 4);
    let names: Vec<_> = results.iter().map(|r| r.name().unwrap()).collect();
    assert_eq!(names, ["a", "b", "c", "d"]);
    let batch1 = load_records(&sink.batch_path(1)).unwrap();
    assert_eq!(batch1.len(), 3);
    assert_eq!(load_records(&sink.consolidated_path()).unwrap().len(), 4);
}

#[test]
fn no_temp_files_left_behind() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = store();
    let oracle = Steady::new();
    let matcher = OntologyMatcher::new(&store, &oracle, &MatcherConfig::default());
    let sink = JsonDirSink::create(dir.path()).unwrap();
    BatchRunner::new(&matcher, sink)
        .run(&items(&["a", "b", "c"]), 2)
        .unwrap();

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}
