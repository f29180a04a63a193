//! Page and record types decoded from search and scroll responses.

use std::fmt;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::{EsdumpError, Result, SerializationError};

/// Opaque scroll identifier returned by the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CursorToken(String);

impl CursorToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CursorToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Scroll ids are long base64 blobs; keep log lines readable.
        match self.0.get(..16) {
            Some(prefix) if self.0.len() > 16 => write!(f, "{prefix}…"),
            _ => f.write_str(&self.0),
        }
    }
}

/// One exported hit.
///
/// Only `_source` is written to the output; `_index` and `_id` are kept for
/// diagnostics when a record has to be dropped.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Record {
    #[serde(rename = "_index", default)]
    pub index: Option<String>,
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(rename = "_source", default)]
    pub source: Option<Value>,
}

impl Record {
    pub fn new(source: Value) -> Self {
        Self {
            index: None,
            id: None,
            source: Some(source),
        }
    }

    /// Append the record body as one compact JSON line.
    ///
    /// On failure `buf` is left exactly as it was.
    pub fn write_line(&self, buf: &mut Vec<u8>) -> std::result::Result<(), SerializationError> {
        let source = self.source.as_ref().ok_or_else(|| self.failure("missing _source"))?;

        let mark = buf.len();
        if let Err(e) = serde_json::to_writer(&mut *buf, source) {
            buf.truncate(mark);
            return Err(self.failure(&e.to_string()));
        }
        buf.push(b'\n');
        Ok(())
    }

    fn failure(&self, reason: &str) -> SerializationError {
        SerializationError {
            index: self.index.clone(),
            id: self.id.clone(),
            reason: reason.to_string(),
        }
    }
}

/// One fetch result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub records: Vec<Record>,
    /// Total hit count; only meaningful on the first page of a scroll
    pub total: Option<u64>,
    pub token: Option<CursorToken>,
}

impl Page {
    pub fn new(records: Vec<Record>, total: Option<u64>, token: Option<CursorToken>) -> Self {
        Self {
            records,
            total,
            token,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Decode a successful search or scroll response body.
    pub fn decode(body: &[u8]) -> Result<Self> {
        let response: SearchResponse =
            serde_json::from_slice(body).map_err(|e| EsdumpError::Protocol(e.to_string()))?;

        let hits = response
            .hits
            .ok_or_else(|| EsdumpError::Protocol("response has no hits section".to_string()))?;

        if response.timed_out {
            warn!("Cluster reported a timed out page; results may be partial");
        }
        if let Some(shards) = response.shards {
            if shards.failed > 0 {
                warn!(
                    "{} of {} shards failed for this page; results may be partial",
                    shards.failed, shards.total
                );
            }
        }

        Ok(Self {
            records: hits.hits,
            total: hits.total.map(HitsTotal::value),
            token: response.scroll_id.map(CursorToken),
        })
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "_scroll_id")]
    scroll_id: Option<String>,
    #[serde(default)]
    timed_out: bool,
    #[serde(rename = "_shards")]
    shards: Option<ShardStats>,
    hits: Option<Hits>,
}

#[derive(Debug, Deserialize)]
struct ShardStats {
    #[serde(default)]
    total: u64,
    #[serde(default)]
    failed: u64,
}

#[derive(Debug, Deserialize)]
struct Hits {
    total: Option<HitsTotal>,
    #[serde(default)]
    hits: Vec<Record>,
}

/// `hits.total` is a number before 7.0 and an object afterwards.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HitsTotal {
    Count(u64),
    Object { value: u64 },
}

impl HitsTotal {
    fn value(self) -> u64 {
        match self {
            HitsTotal::Count(n) => n,
            HitsTotal::Object { value } => value,
        }
    }
}
