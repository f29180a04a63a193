//! Bookkeeping for scroll ids observed during a run.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::cluster::{CursorClient, CursorToken};

/// Distinct cursor tokens in the order they were first seen.
#[derive(Debug, Default)]
pub struct CursorSet {
    order: Vec<CursorToken>,
    seen: HashSet<CursorToken>,
}

impl CursorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a token; returns true if it had not been seen before.
    pub fn observe(&mut self, token: Option<&CursorToken>) -> bool {
        let Some(token) = token else {
            return false;
        };
        if !self.seen.insert(token.clone()) {
            return false;
        }
        debug!("Tracking scroll id {}", token);
        self.order.push(token.clone());
        true
    }

    /// Release every tracked token in one call. Best effort: failures are
    /// logged and reported as `false`, never raised.
    pub async fn release(&mut self, client: &dyn CursorClient) -> bool {
        if self.order.is_empty() {
            return true;
        }

        let released = match client.release(&self.order).await {
            Ok(()) => {
                debug!("Released {} scroll id(s)", self.order.len());
                true
            }
            Err(e) => {
                warn!("Failed to release scroll context(s): {}", e);
                false
            }
        };

        // Cleared on failure too.
        self.order.clear();
        self.seen.clear();
        released
    }
}
