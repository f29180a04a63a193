//! Cursor client abstraction over the search cluster
//!
//! The export driver talks to the cluster only through [`CursorClient`]:
//! one initial search that opens a scroll, continuation fetches that advance
//! it, and a final release of every scroll id seen during the run.
//! [`EsClient`] is the HTTP implementation used by the binary.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::query::QueryDescriptor;

pub mod http;
pub mod page;

pub use http::EsClient;
pub use page::{CursorToken, Page, Record};

/// Scroll-protocol operations required by the export driver.
#[async_trait]
pub trait CursorClient: Send + Sync {
    /// Run the initial search and open a scroll with `query.scroll` keep-alive.
    async fn initial_fetch(&self, query: &QueryDescriptor) -> Result<Page>;

    /// Fetch the page that follows `token`, extending the keep-alive.
    async fn continuation_fetch(&self, token: &CursorToken, keepalive: Duration) -> Result<Page>;

    /// Release server-side scroll state for every token.
    ///
    /// Tokens that are already gone must not be reported as failures.
    async fn release(&self, tokens: &[CursorToken]) -> Result<()>;
}
