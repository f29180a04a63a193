//! Output sinks and the JSON Lines record writer
//!
//! A [`Sink`] is an append-only byte stream. [`RecordWriter`] turns batches
//! of records into JSON Lines and hands each batch to the sink in a single
//! write call.

use std::path::Path;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter, Stdout};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::cluster::Record;
use crate::error::{ConfigError, Result};

/// Append-only destination for exported bytes
#[async_trait]
pub trait Sink: Send {
    /// Append `bytes` to the output
    async fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Push any buffered bytes down to the underlying stream
    async fn finish(&mut self) -> Result<()>;
}

/// Sink over any tokio writer
pub struct StreamSink<W> {
    writer: W,
    label: String,
}

impl<W> StreamSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W, label: impl Into<String>) -> Self {
        Self {
            writer,
            label: label.into(),
        }
    }
}

#[async_trait]
impl<W> Sink for StreamSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes).await?;
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        self.writer.flush().await?;
        debug!("Finished writing to {}", self.label);
        Ok(())
    }
}

/// Open the export file, appending or truncating.
pub async fn open_file_sink(path: &Path, append: bool) -> Result<StreamSink<BufWriter<File>>> {
    validate_path(path)?;

    let mut options = OpenOptions::new();
    options.create(true);
    if append {
        options.append(true);
    } else {
        options.write(true).truncate(true);
    }
    let file = options.open(path).await.map_err(|e| {
        ConfigError::Generic(format!("Failed to open {}: {}", path.display(), e))
    })?;

    debug!("Opened output file {} (append: {})", path.display(), append);
    Ok(StreamSink::new(
        BufWriter::with_capacity(8 * 1024 * 1024, file),
        path.display().to_string(),
    ))
}

/// Sink over the process's standard output.
pub fn stdout_sink() -> StreamSink<Stdout> {
    StreamSink::new(tokio::io::stdout(), "stdout")
}

/// Check that the parent directory of `path` exists
pub(crate) fn validate_path(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(ConfigError::Generic(format!(
                "Directory does not exist: {}",
                parent.display()
            ))
            .into());
        }
    }
    Ok(())
}

/// Small pool of scratch buffers reused across flushes
#[derive(Debug, Default)]
struct BufferPool {
    buffers: StdMutex<Vec<Vec<u8>>>,
}

impl BufferPool {
    const MAX_POOLED: usize = 4;
    const MAX_RETAINED_CAPACITY: usize = 16 * 1024 * 1024;

    fn get(&self) -> Vec<u8> {
        let mut buffers = self.buffers.lock().unwrap_or_else(|e| e.into_inner());
        buffers.pop().unwrap_or_else(|| Vec::with_capacity(256))
    }

    fn put(&self, mut buf: Vec<u8>) {
        if buf.capacity() > Self::MAX_RETAINED_CAPACITY {
            return;
        }
        buf.clear();
        let mut buffers = self.buffers.lock().unwrap_or_else(|e| e.into_inner());
        if buffers.len() < Self::MAX_POOLED {
            buffers.push(buf);
        }
    }
}

/// Result of one flush
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushOutcome {
    /// Records written to the sink
    pub written: u64,
    /// Records skipped because they could not be serialized
    pub dropped: u64,
    /// Bytes handed to the sink
    pub bytes: u64,
}

/// Serializes record batches as JSON Lines into a shared sink
pub struct RecordWriter {
    sink: Mutex<Box<dyn Sink>>,
    pool: BufferPool,
    strict: bool,
    bytes_written: AtomicU64,
}

impl RecordWriter {
    pub fn new(sink: Box<dyn Sink>) -> Self {
        Self {
            sink: Mutex::new(sink),
            pool: BufferPool::default(),
            strict: false,
            bytes_written: AtomicU64::new(0),
        }
    }

    /// Fail on unserializable records instead of skipping them
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Write `records` as one compact JSON value per line, in a single sink write.
    pub async fn flush(&self, records: &[Record]) -> Result<FlushOutcome> {
        if records.is_empty() {
            return Ok(FlushOutcome::default());
        }

        let mut buf = self.pool.get();
        let mut outcome = FlushOutcome::default();

        for record in records {
            match record.write_line(&mut buf) {
                Ok(()) => outcome.written += 1,
                Err(e) if self.strict => {
                    self.pool.put(buf);
                    return Err(e.into());
                }
                Err(e) => {
                    warn!("Skipping {}", e);
                    outcome.dropped += 1;
                }
            }
        }

        if !buf.is_empty() {
            let mut sink = self.sink.lock().await;
            if let Err(e) = sink.write(&buf).await {
                self.pool.put(buf);
                return Err(e);
            }
            outcome.bytes = buf.len() as u64;
            self.bytes_written.fetch_add(outcome.bytes, Ordering::Relaxed);
        }
        self.pool.put(buf);

        debug!(
            "Flushed {} records ({} bytes, {} dropped)",
            outcome.written, outcome.bytes, outcome.dropped
        );
        Ok(outcome)
    }

    /// Flush the sink's own buffering
    pub async fn finish(&self) -> Result<()> {
        self.sink.lock().await.finish().await
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }
}
