//! Export module for scroll-based bulk extraction
//!
//! This module provides the export pipeline:
//! - Ordered pagination over a server-side scroll
//! - Bounded buffering between fetches and writes
//! - JSON Lines output to a file or stdout
//! - Result caps, cancellation and scroll release
//!
//! # Architecture
//!
//! 1. **CursorClient** (`crate::cluster`): opens, advances and releases the scroll
//! 2. **PageBuffer**: holds at most [`FLUSH_THRESHOLD`] records between flushes
//! 3. **RecordWriter**: serializes a batch and hands it to a [`Sink`] in one write
//!
//! These components are orchestrated by the **ExportDriver**.
//!
//! # Example
//!
//! ```no_run
//! use esdump::cluster::EsClient;
//! use esdump::config::Config;
//! use esdump::export::{ExportDriver, RecordWriter, stdout_sink};
//! use esdump::query::QueryDescriptor;
//!
//! # async fn example() -> esdump::Result<()> {
//! let config = Config::default();
//! let client = EsClient::new(&config.cluster)?;
//! let query = QueryDescriptor::builder().indices("logs-*").build()?;
//!
//! let writer = RecordWriter::new(Box::new(stdout_sink()));
//! let mut driver = ExportDriver::new(Box::new(client), writer);
//! let summary = driver.run(&query).await?;
//! eprintln!("exported {} of {}", summary.emitted, summary.total_matched);
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod cursors;
pub mod driver;
pub mod progress;
pub mod sink;

pub use buffer::{FLUSH_THRESHOLD, PageBuffer};
pub use cursors::CursorSet;
pub use driver::{ExportDriver, ExportSummary};
pub use progress::ProgressTracker;
pub use sink::{FlushOutcome, RecordWriter, Sink, StreamSink, open_file_sink, stdout_sink};

#[cfg(test)]
mod tests;
