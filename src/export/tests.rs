//! Scenario tests for the export driver against scripted clusters and sinks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::cluster::{CursorClient, CursorToken, Page, Record};
use crate::error::{ClusterError, EsdumpError, Result};
use crate::query::QueryDescriptor;

use super::cursors::CursorSet;
use super::driver::{ExportDriver, ExportSummary};
use super::sink::{RecordWriter, Sink, open_file_sink};

#[derive(Debug, Default)]
struct Calls {
    initial: usize,
    continuations: Vec<String>,
    releases: Vec<Vec<String>>,
}

/// Cluster that serves `total` records `{"n": i}` in pages of `page_size`.
struct SyntheticCluster {
    total: u64,
    page_size: u64,
    /// Records actually returned, may differ from the reported total
    available: u64,
    later_total: Option<u64>,
    rotate_tokens: bool,
    drop_token_after: Option<usize>,
    fail_continuation_at: Option<usize>,
    missing_source_every: Option<u64>,
    fail_release: bool,
    served: Mutex<u64>,
    calls: Arc<Mutex<Calls>>,
}

impl SyntheticCluster {
    fn new(total: u64, page_size: u64) -> Self {
        Self {
            total,
            page_size,
            available: total,
            later_total: None,
            rotate_tokens: false,
            drop_token_after: None,
            fail_continuation_at: None,
            missing_source_every: None,
            fail_release: false,
            served: Mutex::new(0),
            calls: Arc::new(Mutex::new(Calls::default())),
        }
    }

    fn calls(&self) -> Arc<Mutex<Calls>> {
        self.calls.clone()
    }

    fn next_page(&self, page_no: usize, total: Option<u64>) -> Page {
        let mut served = self.served.lock().unwrap();
        let start = *served;
        let end = (start + self.page_size).min(self.available);
        *served = end;

        let records = (start..end)
            .map(|n| match self.missing_source_every {
                Some(every) if n % every == every - 1 => Record {
                    index: Some("logs".into()),
                    id: Some(n.to_string()),
                    source: None,
                },
                _ => Record::new(json!({ "n": n })),
            })
            .collect();

        let token_no = if self.rotate_tokens { page_no } else { 0 };
        let token = match self.drop_token_after {
            Some(limit) if page_no >= limit => None,
            _ => Some(CursorToken::new(format!("scroll-{token_no}"))),
        };
        Page::new(records, total, token)
    }
}

#[async_trait]
impl CursorClient for SyntheticCluster {
    async fn initial_fetch(&self, _query: &QueryDescriptor) -> Result<Page> {
        self.calls.lock().unwrap().initial += 1;
        Ok(self.next_page(0, Some(self.total)))
    }

    async fn continuation_fetch(&self, token: &CursorToken, keepalive: Duration) -> Result<Page> {
        assert_eq!(keepalive, Duration::from_secs(1800));
        let page_no = {
            let mut calls = self.calls.lock().unwrap();
            calls.continuations.push(token.as_str().to_string());
            calls.continuations.len()
        };
        if self.fail_continuation_at == Some(page_no) {
            return Err(ClusterError {
                status: Some(404),
                error_type: "search_context_missing_exception".into(),
                reason: "No search context found".into(),
                root_cause: None,
            }
            .into());
        }
        Ok(self.next_page(page_no, self.later_total))
    }

    async fn release(&self, tokens: &[CursorToken]) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .releases
            .push(tokens.iter().map(|t| t.as_str().to_string()).collect());
        if self.fail_release {
            return Err(EsdumpError::Generic("connection reset".into()));
        }
        Ok(())
    }
}

/// Cluster whose initial search fails.
struct FailingCluster;

#[async_trait]
impl CursorClient for FailingCluster {
    async fn initial_fetch(&self, _query: &QueryDescriptor) -> Result<Page> {
        Err(ClusterError::from_body(
            Some(400),
            r#"{"error":{"type":"parsing_exception","reason":"unknown query [mtch]"},"status":400}"#,
        )
        .into())
    }

    async fn continuation_fetch(&self, _token: &CursorToken, _keepalive: Duration) -> Result<Page> {
        unreachable!("no continuation after a failed search")
    }

    async fn release(&self, _tokens: &[CursorToken]) -> Result<()> {
        Ok(())
    }
}

/// Sink that records every write call separately.
#[derive(Clone, Default)]
struct RecordingSink {
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
    finished: Arc<AtomicBool>,
}

impl RecordingSink {
    fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    fn lines_per_write(&self) -> Vec<usize> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .map(|w| w.iter().filter(|b| **b == b'\n').count())
            .collect()
    }

    fn records(&self) -> Vec<Value> {
        let bytes = self.writes.lock().unwrap().concat();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

#[async_trait]
impl Sink for RecordingSink {
    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.writes.lock().unwrap().push(bytes.to_vec());
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        self.finished.store(true, Ordering::SeqCst);
        Ok(())
    }
}

fn query(limit: u64) -> QueryDescriptor {
    QueryDescriptor::builder()
        .indices("logs")
        .result_limit(limit)
        .build()
        .unwrap()
}

async fn run(cluster: SyntheticCluster, limit: u64) -> (Result<ExportSummary>, RecordingSink) {
    let sink = RecordingSink::default();
    let writer = RecordWriter::new(Box::new(sink.clone()));
    let mut driver = ExportDriver::new(Box::new(cluster), writer);
    (driver.run(&query(limit)).await, sink)
}

fn assert_sequential(records: &[Value], count: u64) {
    assert_eq!(records.len() as u64, count);
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record["n"], json!(i), "record {i} out of order");
    }
}

#[tokio::test]
async fn test_unbounded_export_walks_every_page() {
    let cluster = SyntheticCluster::new(2500, 1000);
    let calls = cluster.calls();

    let (result, sink) = run(cluster, 0).await;
    let summary = result.unwrap();

    assert_eq!(summary.total_matched, 2500);
    assert_eq!(summary.emitted, 2500);
    assert!(!summary.cap_hit);
    assert_eq!(summary.pages_fetched, 4);

    let calls = calls.lock().unwrap();
    assert_eq!(calls.initial, 1);
    assert_eq!(calls.continuations.len(), 3);

    assert_eq!(sink.lines_per_write(), vec![1000, 1000, 500]);
    assert_sequential(&sink.records(), 2500);
    assert!(sink.finished.load(Ordering::SeqCst));
    assert_eq!(summary.bytes_written, sink.writes.lock().unwrap().concat().len() as u64);
}

#[tokio::test]
async fn test_result_limit_stops_mid_page() {
    let cluster = SyntheticCluster::new(2500, 1000);
    let calls = cluster.calls();

    let (result, sink) = run(cluster, 1500).await;
    let summary = result.unwrap();

    assert_eq!(summary.emitted, 1500);
    assert!(summary.cap_hit);
    assert_eq!(summary.pages_fetched, 2);
    assert_eq!(calls.lock().unwrap().continuations.len(), 1);
    assert_eq!(sink.lines_per_write(), vec![1000, 500]);
    assert_sequential(&sink.records(), 1500);
}

#[tokio::test]
async fn test_flush_threshold_boundaries() {
    for (total, expected) in [(1000, vec![1000]), (1001, vec![1000, 1]), (999, vec![999])] {
        let (result, sink) = run(SyntheticCluster::new(total, 1000), 0).await;
        assert_eq!(result.unwrap().emitted, total);
        assert_eq!(sink.lines_per_write(), expected, "total {total}");
    }
}

#[tokio::test]
async fn test_zero_matches_is_a_single_fetch() {
    let cluster = SyntheticCluster::new(0, 1000);
    let calls = cluster.calls();

    let (result, sink) = run(cluster, 0).await;
    let summary = result.unwrap();

    assert_eq!(summary.emitted, 0);
    assert_eq!(summary.pages_fetched, 1);
    assert_eq!(sink.write_count(), 0);

    let calls = calls.lock().unwrap();
    assert_eq!(calls.initial, 1);
    assert!(calls.continuations.is_empty());
    // The scroll opened by the search is still released.
    assert_eq!(calls.releases, vec![vec!["scroll-0".to_string()]]);
}

#[tokio::test]
async fn test_empty_page_ends_run_short_of_total() {
    let mut cluster = SyntheticCluster::new(3000, 1000);
    cluster.available = 1200;
    let calls = cluster.calls();

    let (result, sink) = run(cluster, 0).await;
    let summary = result.unwrap();

    assert_eq!(summary.total_matched, 3000);
    assert_eq!(summary.emitted, 1200);
    assert_eq!(calls.lock().unwrap().continuations.len(), 2);
    assert_sequential(&sink.records(), 1200);
}

#[tokio::test]
async fn test_empty_first_page_emits_nothing() {
    let mut cluster = SyntheticCluster::new(10, 1000);
    cluster.available = 0;
    let calls = cluster.calls();

    let summary = run(cluster, 0).await.0.unwrap();
    assert_eq!(summary.emitted, 0);
    assert!(calls.lock().unwrap().continuations.is_empty());
}

#[tokio::test]
async fn test_limit_above_total_targets_total() {
    let cluster = SyntheticCluster::new(1500, 1000);
    let (result, sink) = run(cluster, 5000).await;
    let summary = result.unwrap();

    assert_eq!(summary.emitted, 1500);
    assert!(!summary.cap_hit);
    assert_sequential(&sink.records(), 1500);
}

#[tokio::test]
async fn test_cap_truncates_oversized_cluster_page() {
    // terminate_after is per shard, so the cluster can return more than asked.
    let cluster = SyntheticCluster::new(40, 20);
    let calls = cluster.calls();

    let (result, sink) = run(cluster, 5).await;
    let summary = result.unwrap();

    assert_eq!(summary.emitted, 5);
    assert!(summary.cap_hit);
    assert!(calls.lock().unwrap().continuations.is_empty());
    assert_sequential(&sink.records(), 5);
}

#[tokio::test]
async fn test_short_pages_are_transparent() {
    let cluster = SyntheticCluster::new(1000, 300);
    let calls = cluster.calls();

    let (result, sink) = run(cluster, 0).await;
    assert_eq!(result.unwrap().emitted, 1000);
    // 300 + 300 + 300 + 100, then an empty page
    assert_eq!(calls.lock().unwrap().continuations.len(), 4);
    assert_eq!(sink.lines_per_write(), vec![1000]);
}

#[tokio::test]
async fn test_later_totals_do_not_overwrite_first() {
    let mut cluster = SyntheticCluster::new(2000, 1000);
    cluster.later_total = Some(7);

    let summary = run(cluster, 0).await.0.unwrap();
    assert_eq!(summary.total_matched, 2000);
    assert_eq!(summary.emitted, 2000);
}

#[tokio::test]
async fn test_rotating_tokens_are_each_used_once_and_released() {
    let mut cluster = SyntheticCluster::new(2500, 1000);
    cluster.rotate_tokens = true;
    let calls = cluster.calls();

    run(cluster, 0).await.0.unwrap();

    let calls = calls.lock().unwrap();
    assert_eq!(calls.continuations, vec!["scroll-0", "scroll-1", "scroll-2"]);
    assert_eq!(
        calls.releases,
        vec![vec!["scroll-0", "scroll-1", "scroll-2", "scroll-3"]]
    );
}

#[tokio::test]
async fn test_repeated_token_released_once() {
    let cluster = SyntheticCluster::new(2500, 1000);
    let calls = cluster.calls();

    run(cluster, 0).await.0.unwrap();
    assert_eq!(calls.lock().unwrap().releases, vec![vec!["scroll-0"]]);
}

#[tokio::test]
async fn test_release_failure_is_not_fatal() {
    let mut cluster = SyntheticCluster::new(10, 1000);
    cluster.fail_release = true;
    let calls = cluster.calls();

    let summary = run(cluster, 0).await.0.unwrap();
    assert_eq!(summary.emitted, 10);
    assert_eq!(calls.lock().unwrap().releases.len(), 1);
}

#[tokio::test]
async fn test_release_of_empty_or_released_set() {
    let cluster = SyntheticCluster::new(0, 1000);
    let calls = cluster.calls();

    let mut set = CursorSet::new();
    assert!(set.release(&cluster).await);
    assert!(calls.lock().unwrap().releases.is_empty());

    set.observe(Some(&CursorToken::new("scroll-0")));
    assert!(set.release(&cluster).await);
    assert!(set.release(&cluster).await);
    assert_eq!(calls.lock().unwrap().releases.len(), 1);
}

#[tokio::test]
async fn test_initial_cluster_error_aborts() {
    let sink = RecordingSink::default();
    let mut driver = ExportDriver::new(
        Box::new(FailingCluster),
        RecordWriter::new(Box::new(sink.clone())),
    );

    match driver.run(&query(0)).await {
        Err(EsdumpError::Cluster(err)) => {
            assert_eq!(err.error_type, "parsing_exception");
            assert_eq!(err.reason, "unknown query [mtch]");
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(sink.write_count(), 0);
}

#[tokio::test]
async fn test_continuation_error_aborts_and_releases() {
    let mut cluster = SyntheticCluster::new(3000, 1000);
    cluster.fail_continuation_at = Some(2);
    let calls = cluster.calls();

    let (result, sink) = run(cluster, 0).await;
    assert!(matches!(result, Err(EsdumpError::Cluster(_))));
    assert_eq!(sink.lines_per_write(), vec![1000, 1000]);
    assert_eq!(calls.lock().unwrap().releases, vec![vec!["scroll-0"]]);
}

#[tokio::test]
async fn test_missing_scroll_id_is_protocol_error() {
    let mut cluster = SyntheticCluster::new(3000, 1000);
    cluster.drop_token_after = Some(1);

    let (result, _) = run(cluster, 0).await;
    assert!(matches!(result, Err(EsdumpError::Protocol(_))));
}

#[tokio::test]
async fn test_cancellation_checked_before_next_fetch() {
    let cluster = SyntheticCluster::new(2500, 500);
    let calls = cluster.calls();
    let sink = RecordingSink::default();
    let token = CancellationToken::new();
    token.cancel();

    let mut driver = ExportDriver::new(
        Box::new(cluster),
        RecordWriter::new(Box::new(sink.clone())),
    )
    .with_cancellation(token);
    let summary = driver.run(&query(0)).await.unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.emitted, 500);
    assert!(calls.lock().unwrap().continuations.is_empty());
    assert_eq!(calls.lock().unwrap().releases.len(), 1);
    // Residual records are flushed before returning.
    assert_eq!(sink.lines_per_write(), vec![500]);
}

#[tokio::test]
async fn test_unserializable_records_are_counted() {
    let mut cluster = SyntheticCluster::new(1000, 1000);
    cluster.missing_source_every = Some(100);

    let (result, sink) = run(cluster, 0).await;
    let summary = result.unwrap();

    assert_eq!(summary.emitted, 1000);
    assert_eq!(summary.dropped, 10);
    assert_eq!(summary.written, 990);
    assert_eq!(sink.records().len() as u64, summary.written);
}

#[tokio::test]
async fn test_strict_mode_fails_on_unserializable_record() {
    let mut cluster = SyntheticCluster::new(1000, 1000);
    cluster.missing_source_every = Some(500);
    let calls = cluster.calls();

    let sink = RecordingSink::default();
    let writer = RecordWriter::new(Box::new(sink.clone())).with_strict(true);
    let mut driver = ExportDriver::new(Box::new(cluster), writer);

    let result = driver.run(&query(0)).await;
    assert!(matches!(result, Err(EsdumpError::Serialization(_))));
    assert_eq!(sink.write_count(), 0);
    assert_eq!(calls.lock().unwrap().releases.len(), 1);
}

/// Sink whose every write fails.
struct BrokenSink;

#[async_trait]
impl Sink for BrokenSink {
    async fn write(&mut self, _bytes: &[u8]) -> Result<()> {
        Err(std::io::Error::other("No space left on device").into())
    }

    async fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_residual_flush_failure_still_releases() {
    let cluster = SyntheticCluster::new(10, 1000);
    let calls = cluster.calls();

    let mut driver = ExportDriver::new(Box::new(cluster), RecordWriter::new(Box::new(BrokenSink)));
    let result = driver.run(&query(0)).await;

    assert!(matches!(result, Err(EsdumpError::Io(_))));
    assert_eq!(calls.lock().unwrap().releases, vec![vec!["scroll-0"]]);
}

#[tokio::test]
async fn test_fatal_error_keeps_flushed_lines_on_disk() {
    let path = std::env::temp_dir().join("esdump_driver_partial_export.jsonl");
    tokio::fs::remove_file(&path).await.ok();

    let mut cluster = SyntheticCluster::new(3000, 1000);
    cluster.fail_continuation_at = Some(2);

    let sink = open_file_sink(&path, false).await.unwrap();
    let mut driver = ExportDriver::new(Box::new(cluster), RecordWriter::new(Box::new(sink)));
    assert!(driver.run(&query(0)).await.is_err());

    let content = tokio::fs::read_to_string(&path).await.unwrap();
    let records: Vec<Value> = content
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_sequential(&records, 2000);

    tokio::fs::remove_file(&path).await.ok();
}
