//! End-to-end runs against stub collectors and mock embeddings.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use gatherweave::bucket::{Mode, ResearchItem, ResultBucket, SourceReport};
use gatherweave::collector::{BranchKind, CollectRequest, Collector, CollectorContext};
use gatherweave::coordinator::{PipelineBuilder, RunRequest};
use gatherweave::error::PipelineError;
use gatherweave::events::Event;
use gatherweave::indexing::{EmbeddingProvider, MockEmbeddingProvider, SqliteIndexStore};
use gatherweave::state;
use gatherweave::PipelineConfig;

struct StubCollector {
    branch: BranchKind,
    texts: Vec<&'static str>,
}

#[async_trait]
impl Collector for StubCollector {
    fn branch(&self) -> BranchKind {
        self.branch
    }

    async fn collect(
        &self,
        request: &CollectRequest,
        ctx: CollectorContext,
    ) -> Result<ResultBucket, PipelineError> {
        let _ = ctx.emit(format!("collecting {}", request.topic));
        let items: Vec<ResearchItem> = self
            .texts
            .iter()
            .take(request.item_cap)
            .map(|t| ResearchItem::from_text(*t))
            .collect();
        Ok(ResultBucket::new()
            .with_source(SourceReport::new("stub", items))
            .with_detail("topic", json!(request.topic)))
    }
}

struct FailingCollector(BranchKind);

#[async_trait]
impl Collector for FailingCollector {
    fn branch(&self) -> BranchKind {
        self.0
    }

    async fn collect(
        &self,
        _request: &CollectRequest,
        _ctx: CollectorContext,
    ) -> Result<ResultBucket, PipelineError> {
        Err(PipelineError::Collector("provider returned 503".into()))
    }
}

struct PanickingCollector(BranchKind);

#[async_trait]
impl Collector for PanickingCollector {
    fn branch(&self) -> BranchKind {
        self.0
    }

    async fn collect(
        &self,
        _request: &CollectRequest,
        _ctx: CollectorContext,
    ) -> Result<ResultBucket, PipelineError> {
        panic!("stub went sideways");
    }
}

struct SlowCollector(BranchKind, Duration);

#[async_trait]
impl Collector for SlowCollector {
    fn branch(&self) -> BranchKind {
        self.0
    }

    async fn collect(
        &self,
        _request: &CollectRequest,
        _ctx: CollectorContext,
    ) -> Result<ResultBucket, PipelineError> {
        tokio::time::sleep(self.1).await;
        Ok(ResultBucket::new())
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("gatherweave=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

fn test_config(archive_dir: &std::path::Path) -> PipelineConfig {
    init_tracing();
    PipelineConfig {
        archive_dir: archive_dir.to_path_buf(),
        ..PipelineConfig::default()
    }
}

async fn indexed_builder(archive_dir: &std::path::Path) -> PipelineBuilder {
    let store = Arc::new(SqliteIndexStore::open_in_memory().await.unwrap());
    PipelineBuilder::new()
        .with_config(test_config(archive_dir))
        .with_store(store)
        .with_embedder(Arc::new(MockEmbeddingProvider::default()))
}

#[tokio::test]
async fn full_run_produces_report_and_all_stage_buckets() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = indexed_builder(dir.path())
        .await
        .add_collector(Arc::new(StubCollector {
            branch: BranchKind::Web,
            texts: vec!["qubits encode superposed state", "error correction matured"],
        }))
        .add_collector(Arc::new(StubCollector {
            branch: BranchKind::News,
            texts: vec!["quantum startup raised a series B"],
        }))
        .compile()
        .unwrap();

    let report = pipeline
        .run(RunRequest::new("quantum computing", Mode::Simple))
        .await
        .unwrap();

    assert!(report.state.contains("web_results"));
    assert!(report.state.contains("news_results"));
    for key in [
        state::CLEANUP_KEY,
        state::ARCHIVE_KEY,
        state::INDEX_KEY,
        state::RETRIEVAL_KEY,
        state::FINAL_REPORT_KEY,
    ] {
        assert!(report.state.contains(key), "missing stage bucket {key}");
    }

    let index_bucket = report.state.get(state::INDEX_KEY).unwrap();
    assert!(!index_bucket.has_error());
    assert_eq!(index_bucket.details["chunk_count"], json!(3));

    let text = report.report.expect("final report text");
    assert!(text.contains("quantum computing"));

    // Archive landed on disk with the slugged name.
    let archived: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(archived.len(), 1);
    let name = archived[0].as_ref().unwrap().file_name();
    assert!(name.to_string_lossy().ends_with("_quantum_computing.json"));
}

#[tokio::test]
async fn failed_branch_becomes_error_bucket_without_poisoning_others() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = indexed_builder(dir.path())
        .await
        .add_collector(Arc::new(StubCollector {
            branch: BranchKind::Web,
            texts: vec!["a healthy finding"],
        }))
        .add_collector(Arc::new(FailingCollector(BranchKind::Social)))
        .compile()
        .unwrap();

    let report = pipeline
        .run(RunRequest::new("resilience", Mode::Simple))
        .await
        .unwrap();

    let social = report.state.get("social_results").unwrap();
    assert!(social.has_error());
    assert!(social.error_message().unwrap().contains("503"));

    let web = report.state.get("web_results").unwrap();
    assert!(!web.has_error());
    assert_eq!(web.item_count(), 1);

    // The run still indexed the healthy branch and synthesized a report.
    assert!(!report.state.get(state::INDEX_KEY).unwrap().has_error());
    assert!(report.report.is_some());

    // Every retrieved chunk traces back to the healthy branch.
    let retrieval = report.state.get(state::RETRIEVAL_KEY).unwrap();
    let hits = retrieval.details["hits"].as_array().unwrap();
    assert!(!hits.is_empty());
    assert!(hits.len() <= 12);
    for hit in hits {
        assert_eq!(hit["metadata"]["collector"], json!("web"));
        assert_eq!(hit["metadata"]["source"], json!("stub"));
    }
}

#[tokio::test]
async fn panicking_branch_is_absorbed() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = indexed_builder(dir.path())
        .await
        .add_collector(Arc::new(PanickingCollector(BranchKind::Financial)))
        .add_collector(Arc::new(StubCollector {
            branch: BranchKind::Web,
            texts: vec!["still here"],
        }))
        .compile()
        .unwrap();

    let report = pipeline
        .run(RunRequest::new("panic isolation", Mode::Simple))
        .await
        .unwrap();

    let financial = report.state.get("financial_results").unwrap();
    assert!(financial.has_error());
    assert!(financial.error_message().unwrap().contains("panicked"));
    assert!(!report.state.get("web_results").unwrap().has_error());
}

#[tokio::test]
async fn slow_branch_times_out_into_error_bucket() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.branch_timeout = Some(Duration::from_millis(50));

    let store = Arc::new(SqliteIndexStore::open_in_memory().await.unwrap());
    let pipeline = PipelineBuilder::new()
        .with_config(config)
        .with_store(store)
        .with_embedder(Arc::new(MockEmbeddingProvider::default()))
        .add_collector(Arc::new(SlowCollector(
            BranchKind::Video,
            Duration::from_secs(5),
        )))
        .compile()
        .unwrap();

    let report = pipeline
        .run(RunRequest::new("slowness", Mode::Simple))
        .await
        .unwrap();

    let video = report.state.get("video_results").unwrap();
    assert!(video.has_error());
    assert!(video.error_message().unwrap().contains("timed out"));
}

#[tokio::test]
async fn unmatched_branch_request_falls_back_to_all_registered() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = indexed_builder(dir.path())
        .await
        .add_collector(Arc::new(StubCollector {
            branch: BranchKind::Web,
            texts: vec!["web finding"],
        }))
        .add_collector(Arc::new(StubCollector {
            branch: BranchKind::News,
            texts: vec!["news finding"],
        }))
        .compile()
        .unwrap();

    let report = pipeline
        .run(
            RunRequest::new("fallback", Mode::Simple)
                .with_branches(vec![BranchKind::Academic]),
        )
        .await
        .unwrap();

    assert!(report.state.contains("web_results"));
    assert!(report.state.contains("news_results"));
}

#[tokio::test]
async fn branch_selection_limits_fan_out() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = indexed_builder(dir.path())
        .await
        .add_collector(Arc::new(StubCollector {
            branch: BranchKind::Web,
            texts: vec!["web finding"],
        }))
        .add_collector(Arc::new(StubCollector {
            branch: BranchKind::News,
            texts: vec!["news finding"],
        }))
        .compile()
        .unwrap();

    let report = pipeline
        .run(RunRequest::new("selection", Mode::Simple).with_branches(vec![BranchKind::News]))
        .await
        .unwrap();

    assert!(report.state.contains("news_results"));
    assert!(!report.state.contains("web_results"));
}

#[tokio::test]
async fn missing_index_backend_degrades_to_error_buckets() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = PipelineBuilder::new()
        .with_config(test_config(dir.path()))
        .add_collector(Arc::new(StubCollector {
            branch: BranchKind::Web,
            texts: vec!["a finding"],
        }))
        .compile()
        .unwrap();

    let report = pipeline
        .run(RunRequest::new("no backend", Mode::Simple))
        .await
        .unwrap();

    assert!(report.state.get(state::INDEX_KEY).unwrap().has_error());
    assert!(report.state.get(state::RETRIEVAL_KEY).unwrap().has_error());

    // Synthesis still runs, stating the lack of context.
    let text = report.report.expect("report despite missing backend");
    assert!(text.contains("No supporting context"));
}

#[tokio::test]
async fn mode_cap_bounds_items_per_source() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = indexed_builder(dir.path())
        .await
        .add_collector(Arc::new(StubCollector {
            branch: BranchKind::Web,
            texts: vec!["one", "two", "three", "four"],
        }))
        .compile()
        .unwrap();

    let report = pipeline
        .run(RunRequest::new("caps", Mode::Simple))
        .await
        .unwrap();
    assert_eq!(report.state.get("web_results").unwrap().item_count(), 2);

    let dir2 = tempfile::tempdir().unwrap();
    let pipeline = indexed_builder(dir2.path())
        .await
        .add_collector(Arc::new(StubCollector {
            branch: BranchKind::Web,
            texts: vec!["one", "two", "three", "four"],
        }))
        .compile()
        .unwrap();
    let report = pipeline
        .run(RunRequest::new("caps", Mode::Extended))
        .await
        .unwrap();
    assert_eq!(report.state.get("web_results").unwrap().item_count(), 4);
}

#[tokio::test]
async fn event_channel_sees_branch_and_stage_progress() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = indexed_builder(dir.path())
        .await
        .add_collector(Arc::new(StubCollector {
            branch: BranchKind::Web,
            texts: vec!["a finding"],
        }))
        .compile()
        .unwrap();

    let events = pipeline.event_channel();
    let _report = pipeline
        .run(RunRequest::new("events", Mode::Simple))
        .await
        .unwrap();

    let received: Vec<Event> = events.drain().collect();
    let branch_events = received
        .iter()
        .filter(|e| matches!(e, Event::Branch { .. }))
        .count();
    let stage_events = received
        .iter()
        .filter(|e| matches!(e, Event::Stage { .. }))
        .count();
    assert!(branch_events >= 1, "expected branch events, got {received:?}");
    assert!(stage_events >= 5, "expected stage events, got {received:?}");
}

#[tokio::test]
async fn rerun_replaces_index_contents() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteIndexStore::open_in_memory().await.unwrap());

    let build = |texts: Vec<&'static str>| {
        PipelineBuilder::new()
            .with_config(test_config(dir.path()))
            .with_store(store.clone())
            .with_embedder(Arc::new(MockEmbeddingProvider::default()))
            .add_collector(Arc::new(StubCollector {
                branch: BranchKind::Web,
                texts,
            }))
            .compile()
            .unwrap()
    };

    build(vec!["first run text", "more first run text"])
        .run(RunRequest::new("run one", Mode::Simple))
        .await
        .unwrap();
    let after_first = store.count().await.unwrap();

    build(vec!["second run text"])
        .run(RunRequest::new("run two", Mode::Simple))
        .await
        .unwrap();
    let after_second = store.count().await.unwrap();

    assert_eq!(after_first, 2);
    assert_eq!(after_second, 1);

    let query = MockEmbeddingProvider::default()
        .embed_batch(&["second run text".to_string()])
        .await
        .unwrap();
    let hits = store.search(&query[0], 50).await.unwrap();
    assert!(hits.iter().all(|h| !h.text.contains("first run")));
}
