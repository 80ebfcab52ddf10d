//! Tests for tracing instrumentation.
//!
//! These tests verify that the counting and coverage phases open their spans
//! and emit summary events on the calling thread.

use kmercov::{
    builder::KmerCounter,
    coverage::OutputMode,
    ingest::Ingestor,
    kmer::KmerLength,
    table::TableConfig,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Counts events at INFO level or above and records span names.
#[derive(Default)]
struct Recorder {
    events: Arc<AtomicUsize>,
    spans: Arc<Mutex<Vec<&'static str>>>,
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for Recorder {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        if event.metadata().level() <= &Level::INFO {
            self.events.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        _id: &tracing::span::Id,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        self.spans.lock().unwrap().push(attrs.metadata().name());
    }
}

#[test]
fn ingestion_emits_events_and_span() {
    let recorder = Recorder::default();
    let events = Arc::clone(&recorder.events);
    let spans = Arc::clone(&recorder.spans);
    let subscriber = tracing_subscriber::registry().with(recorder);

    tracing::subscriber::with_default(subscriber, || {
        let k = KmerLength::new(4).unwrap();
        Ingestor::new(k, TableConfig::new(16))
            .count_files(&[fixture_path("reads.fa")])
            .expect("should count k-mers");
    });

    assert!(
        events.load(Ordering::SeqCst) >= 2,
        "should log opened files and the ingestion summary"
    );
    assert!(spans.lock().unwrap().contains(&"ingest"));
}

#[test]
fn coverage_runs_inside_its_span() {
    let recorder = Recorder::default();
    let spans = Arc::clone(&recorder.spans);
    let subscriber = tracing_subscriber::registry().with(recorder);

    tracing::subscriber::with_default(subscriber, || {
        KmerCounter::new()
            .k(4)
            .unwrap()
            .table_size(16)
            .coverage_to_writer(
                &[fixture_path("reads.fa")],
                fixture_path("genes.fa"),
                OutputMode::default(),
                std::io::sink(),
            )
            .expect("should compute coverage");
    });

    let spans = spans.lock().unwrap();
    assert!(spans.contains(&"ingest"));
    assert!(spans.contains(&"coverage"), "spans: {spans:?}");
}

#[test]
fn clean_run_logs_no_warnings() {
    let recorder = Recorder::default();
    let events = Arc::clone(&recorder.events);
    let subscriber = tracing_subscriber::registry()
        .with(tracing_subscriber::filter::LevelFilter::WARN)
        .with(recorder);

    tracing::subscriber::with_default(subscriber, || {
        let k = KmerLength::new(4).unwrap();
        Ingestor::new(k, TableConfig::new(16))
            .count_files(&[fixture_path("reads.fa")])
            .expect("should count k-mers");
    });

    assert_eq!(events.load(Ordering::SeqCst), 0, "a clean run logs nothing at warn");
}
