//! Query descriptor construction
//!
//! This module turns user-facing query options into an immutable
//! [`QueryDescriptor`] consumed by the export driver:
//! - Lucene query strings vs. structured Query DSL bodies
//! - Index list and field projection normalization
//! - Scroll keep-alive parsing and formatting

use std::time::Duration;

use serde_json::Value;

use crate::error::{QueryError, Result};

/// Index expression used when no index is requested.
pub const ALL_INDICES: &str = "_all";

/// Default number of hits per page.
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// Default scroll keep-alive between page fetches.
pub const DEFAULT_SCROLL: Duration = Duration::from_secs(30 * 60);

/// Query payload sent with the initial search
#[derive(Debug, Clone, PartialEq)]
pub enum QueryKind {
    /// No query, every document matches
    MatchAll,
    /// Lucene query string, sent as the `q` parameter
    Lucene(String),
    /// Query DSL body, sent as the request body
    Dsl(Value),
}

/// Everything the cluster needs to open a scroll over one result set.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescriptor {
    pub query: QueryKind,
    pub indices: Vec<String>,
    pub doc_type: Option<String>,
    pub fields: Vec<String>,
    pub sort: Vec<String>,
    pub page_size: u32,
    /// Maximum number of records to emit, 0 means unbounded
    pub result_limit: u64,
    pub scroll: Duration,
}

impl QueryDescriptor {
    pub fn builder() -> QueryDescriptorBuilder {
        QueryDescriptorBuilder::default()
    }

    /// Comma-joined index expression for the request path.
    pub fn index_expression(&self) -> String {
        self.indices.join(",")
    }

    /// Cluster-side early termination hint, only set when a cap is configured.
    pub fn terminate_after(&self) -> Option<u64> {
        (self.result_limit > 0).then_some(self.result_limit)
    }
}

/// Builder for [`QueryDescriptor`]
#[derive(Debug, Default)]
pub struct QueryDescriptorBuilder {
    query: Option<String>,
    raw: bool,
    indices: Option<String>,
    doc_type: Option<String>,
    fields: Option<String>,
    sort: Vec<String>,
    page_size: Option<u32>,
    result_limit: u64,
    scroll: Option<Duration>,
}

impl QueryDescriptorBuilder {
    /// Query text; interpreted as Query DSL when `raw` is set.
    pub fn query(mut self, query: impl Into<String>, raw: bool) -> Self {
        self.query = Some(query.into());
        self.raw = raw;
        self
    }

    /// Comma-separated index names or prefixes.
    pub fn indices(mut self, indices: impl Into<String>) -> Self {
        self.indices = Some(indices.into());
        self
    }

    pub fn doc_type(mut self, doc_type: impl Into<String>) -> Self {
        let doc_type = doc_type.into();
        self.doc_type = (!doc_type.trim().is_empty()).then_some(doc_type);
        self
    }

    /// Comma-separated `_source` fields.
    pub fn fields(mut self, fields: impl Into<String>) -> Self {
        self.fields = Some(fields.into());
        self
    }

    /// Sort clauses in `field:direction` form.
    pub fn sort<I, S>(mut self, sort: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sort = sort
            .into_iter()
            .map(Into::into)
            .filter(|s| !s.trim().is_empty())
            .collect();
        self
    }

    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    pub fn result_limit(mut self, limit: u64) -> Self {
        self.result_limit = limit;
        self
    }

    pub fn scroll(mut self, scroll: Duration) -> Self {
        self.scroll = Some(scroll);
        self
    }

    pub fn build(self) -> Result<QueryDescriptor> {
        let query = match self.query.as_deref().map(str::trim) {
            None | Some("") => QueryKind::MatchAll,
            Some(text) if self.raw => QueryKind::Dsl(parse_dsl(text)?),
            Some(text) => QueryKind::Lucene(text.to_string()),
        };

        Ok(QueryDescriptor {
            query,
            indices: normalize_indices(self.indices.as_deref().unwrap_or("")),
            doc_type: self.doc_type,
            fields: split_fields(self.fields.as_deref().unwrap_or("")),
            sort: self.sort,
            page_size: self.page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1),
            result_limit: self.result_limit,
            scroll: self.scroll.unwrap_or(DEFAULT_SCROLL),
        })
    }
}

/// Parse a raw Query DSL body; it must be a JSON object.
fn parse_dsl(text: &str) -> Result<Value> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| QueryError::InvalidDsl(e.to_string()))?;
    if !value.is_object() {
        return Err(QueryError::NotAnObject.into());
    }
    Ok(value)
}

/// Split an index list, skipping empty entries. `_all` overrides everything else.
pub fn normalize_indices(raw: &str) -> Vec<String> {
    let mut indices = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if name == ALL_INDICES {
            return vec![ALL_INDICES.to_string()];
        }
        indices.push(name.to_string());
    }
    if indices.is_empty() {
        indices.push(ALL_INDICES.to_string());
    }
    indices
}

/// Split a field list, skipping empty entries. Defaults to every field.
pub fn split_fields(raw: &str) -> Vec<String> {
    let fields: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if fields.is_empty() {
        vec!["*".to_string()]
    } else {
        fields
    }
}

/// Parse a keep-alive such as `30m`, `90s`, `500ms`, `2h` or `1d`.
///
/// A bare number is taken as seconds.
pub fn parse_keepalive(raw: &str) -> Result<Duration> {
    let value = raw.trim();
    let invalid = || QueryError::InvalidDuration(raw.to_string());

    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);
    let amount: u64 = digits.parse().map_err(|_| invalid())?;

    let duration = match unit {
        "ms" => Duration::from_millis(amount),
        "" | "s" => Duration::from_secs(amount),
        "m" => Duration::from_secs(amount * 60),
        "h" => Duration::from_secs(amount * 3600),
        "d" => Duration::from_secs(amount * 86_400),
        _ => return Err(invalid().into()),
    };

    if duration.is_zero() {
        return Err(invalid().into());
    }
    Ok(duration)
}

/// Format a keep-alive in the cluster's time-unit syntax, using the largest exact unit.
pub fn format_keepalive(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis % 1000 != 0 {
        return format!("{millis}ms");
    }
    let secs = duration.as_secs();
    if secs % 86_400 == 0 {
        format!("{}d", secs / 86_400)
    } else if secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{secs}s")
    }
}
