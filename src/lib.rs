//! esdump library
//!
//! Bulk export of Elasticsearch documents through the scroll API into
//! JSON Lines. The binary is a thin wrapper; everything it does can be
//! driven from this library.
//!
//! # Modules
//!
//! - `cli`: Command-line interface and argument parsing
//! - `cluster`: Elasticsearch HTTP client and scroll page types
//! - `config`: Configuration management
//! - `error`: Error types and handling
//! - `export`: Pagination driver, buffering and output sinks
//! - `query`: Query descriptor and parameter normalization
//!
//! # Example
//!
//! ```no_run
//! use esdump::cluster::EsClient;
//! use esdump::export::{ExportDriver, RecordWriter, open_file_sink};
//! use esdump::query::QueryDescriptor;
//! use esdump::Config;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let client = EsClient::new(&config.cluster)?;
//!     let query = QueryDescriptor::builder()
//!         .query("level:error", false)
//!         .indices("logs-2024")
//!         .result_limit(10_000)
//!         .build()?;
//!
//!     let sink = open_file_sink(&config.export.output_file, true).await?;
//!     let mut driver = ExportDriver::new(Box::new(client), RecordWriter::new(Box::new(sink)));
//!     let summary = driver.run(&query).await?;
//!     println!("{} documents exported", summary.emitted);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod cluster;
pub mod config;
pub mod error;
pub mod export;
pub mod query;

// Re-export commonly used types
pub use cluster::{CursorClient, EsClient};
pub use config::Config;
pub use error::{EsdumpError, Result};
pub use export::{ExportDriver, ExportSummary};
pub use query::QueryDescriptor;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
///
/// # Returns
/// * `&str` - Version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
