//! Error handling module for export operations.
//!
//! This module provides error handling for the export pipeline with:
//! - Structured error information decoded from cluster error bodies
//! - Consistent JSON formatting of cluster errors for logging
//! - Application-specific error types
//!
//! # Example
//!
//! ```rust,no_run
//! use esdump::error::{ClusterError, Result};
//!
//! fn handle_body(status: u16, body: &str) -> Result<()> {
//!     let err = ClusterError::from_body(Some(status), body);
//!     eprintln!("{}", err.to_json_compact().unwrap_or_default());
//!     Err(err.into())
//! }
//! ```

pub mod cluster;
pub mod kinds;

pub use cluster::ClusterError;
pub use kinds::{
    ConfigError, EsdumpError, QueryError, Result, SerializationError,
};
