//! Scroll-pagination driver
//!
//! Drives one export run end to end: opens the scroll, walks every page in
//! order, flushes records through the [`RecordWriter`] in bounded batches,
//! enforces the result cap, and releases the scroll at the end.

use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cluster::{CursorClient, Page};
use crate::error::{EsdumpError, Result};
use crate::query::QueryDescriptor;

use super::buffer::{FLUSH_THRESHOLD, PageBuffer};
use super::cursors::CursorSet;
use super::progress::ProgressTracker;
use super::sink::RecordWriter;

/// Result of an export run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    /// Hit count reported by the first page
    pub total_matched: u64,
    /// Records received in order and counted against the result limit
    pub emitted: u64,
    /// Lines written to the sink, `emitted - dropped`
    pub written: u64,
    /// Records skipped because they could not be serialized
    pub dropped: u64,
    /// Whether emission stopped at the configured result limit
    pub cap_hit: bool,
    /// Whether the run stopped early on a cancellation signal
    pub cancelled: bool,
    /// Search and scroll requests issued
    pub pages_fetched: u64,
    /// Bytes written to the sink
    pub bytes_written: u64,
    /// Wall time of the run
    pub elapsed_ms: u64,
}

/// Running counters for one run
struct ExportState {
    total_matched: u64,
    result_limit: u64,
    emitted: u64,
    dropped: u64,
    pages_fetched: u64,
    cap_hit: bool,
    cancelled: bool,
    pending: PageBuffer,
    cursors: CursorSet,
}

impl ExportState {
    fn new(result_limit: u64) -> Self {
        Self {
            total_matched: 0,
            result_limit,
            emitted: 0,
            dropped: 0,
            pages_fetched: 0,
            cap_hit: false,
            cancelled: false,
            pending: PageBuffer::new(FLUSH_THRESHOLD),
            cursors: CursorSet::new(),
        }
    }

    /// Number of records the run aims to emit; never above the cluster's total.
    fn target(&self) -> u64 {
        if self.result_limit > 0 {
            self.result_limit.min(self.total_matched)
        } else {
            self.total_matched
        }
    }

    fn limit_reached(&self) -> bool {
        self.result_limit > 0 && self.emitted == self.result_limit
    }

    fn received(&mut self, page: &Page) {
        self.pages_fetched += 1;
        self.cursors.observe(page.token.as_ref());
    }
}

/// Driver for scroll export runs
pub struct ExportDriver {
    /// Scroll client
    client: Box<dyn CursorClient>,
    /// JSON Lines writer over the output sink
    writer: RecordWriter,
    /// Whether to draw a progress bar
    show_progress: bool,
    /// Cancellation token checked before every continuation fetch
    cancel_token: Option<CancellationToken>,
}

impl ExportDriver {
    pub fn new(client: Box<dyn CursorClient>, writer: RecordWriter) -> Self {
        Self {
            client,
            writer,
            show_progress: false,
            cancel_token: None,
        }
    }

    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }

    /// Set cancellation token for this run
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// Export every record matching `query`
    ///
    /// Fatal errors abort the run. Scroll ids seen so far are still released
    /// on a best-effort basis, and lines already flushed are pushed to the
    /// sink, before the error is returned.
    pub async fn run(&mut self, query: &QueryDescriptor) -> Result<ExportSummary> {
        let start_time = Instant::now();
        info!("Starting export from {}", query.index_expression());

        let mut state = ExportState::new(query.result_limit);

        let first = self.client.initial_fetch(query).await?;
        state.received(&first);
        state.total_matched = first.total.unwrap_or(0);

        let target = state.target();
        info!(
            "Query matched {} documents, exporting {}",
            state.total_matched, target
        );

        let tracker = ProgressTracker::new(target, self.show_progress);
        let outcome = self.paginate(&mut state, first, target, query, &tracker).await;
        tracker.finish();

        let outcome = match outcome {
            Ok(()) => self.flush(&mut state).await,
            Err(e) => Err(e),
        };

        state.cursors.release(self.client.as_ref()).await;
        if let Err(e) = outcome {
            if let Err(finish_err) = self.writer.finish().await {
                warn!("Failed to finish output after error: {}", finish_err);
            }
            return Err(e);
        }
        self.writer.finish().await?;

        let summary = ExportSummary {
            total_matched: state.total_matched,
            emitted: state.emitted,
            written: state.emitted - state.dropped,
            dropped: state.dropped,
            cap_hit: state.cap_hit,
            cancelled: state.cancelled,
            pages_fetched: state.pages_fetched,
            bytes_written: self.writer.bytes_written(),
            elapsed_ms: start_time.elapsed().as_millis() as u64,
        };

        info!(
            "Export completed: {} of {} documents written ({} skipped), {} bytes, {} ms",
            summary.written,
            summary.total_matched,
            summary.dropped,
            summary.bytes_written,
            summary.elapsed_ms
        );
        Ok(summary)
    }

    async fn paginate(
        &self,
        state: &mut ExportState,
        mut page: Page,
        target: u64,
        query: &QueryDescriptor,
        tracker: &ProgressTracker,
    ) -> Result<()> {
        while state.emitted < target && !page.is_empty() {
            debug!(
                "Processing page #{} ({} records)",
                state.pages_fetched,
                page.records.len()
            );

            for record in std::mem::take(&mut page.records) {
                state.emitted += 1;
                if state.pending.push(record) {
                    self.flush(state).await?;
                }
                if state.limit_reached() {
                    self.flush(state).await?;
                    state.cap_hit = true;
                    info!("Hit max result limit: {} records", state.result_limit);
                    break;
                }
            }
            tracker.page_done(state.emitted, state.pages_fetched);

            if state.cap_hit {
                break;
            }

            if let Some(ref token) = self.cancel_token {
                if token.is_cancelled() {
                    info!("Export cancelled after {} records", state.emitted);
                    state.cancelled = true;
                    break;
                }
            }

            let cursor = page.token.take().ok_or_else(|| {
                EsdumpError::Protocol("page has no _scroll_id to continue from".to_string())
            })?;
            page = self.client.continuation_fetch(&cursor, query.scroll).await?;
            state.received(&page);
        }
        Ok(())
    }

    async fn flush(&self, state: &mut ExportState) -> Result<()> {
        let records = state.pending.take();
        if records.is_empty() {
            return Ok(());
        }
        let outcome = self.writer.flush(&records).await?;
        state.dropped += outcome.dropped;
        Ok(())
    }
}
