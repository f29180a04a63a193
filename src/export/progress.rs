//! Progress reporting for export runs
//!
//! Drawn on stderr so it never mixes with records printed to stdout.

use std::time::Instant;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

const BAR_TEMPLATE: &str = "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}";

/// Emitted-vs-target bar updated once per processed page
pub struct ProgressTracker {
    bar: Option<ProgressBar>,
    started: Instant,
}

impl ProgressTracker {
    /// `target` is the number of records the run expects to emit.
    pub fn new(target: u64, enabled: bool) -> Self {
        let bar = enabled.then(|| {
            let bar = ProgressBar::with_draw_target(Some(target), ProgressDrawTarget::stderr());
            if let Ok(style) = ProgressStyle::default_bar().template(BAR_TEMPLATE) {
                bar.set_style(style.progress_chars("#>-"));
            }
            bar
        });
        Self {
            bar,
            started: Instant::now(),
        }
    }

    /// Report the running totals after a page has been processed
    pub fn page_done(&self, emitted: u64, pages: u64) {
        let Some(bar) = &self.bar else {
            return;
        };
        bar.set_position(emitted);
        bar.set_message(page_message(emitted, pages, self.started.elapsed().as_secs_f64()));
    }

    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

fn page_message(emitted: u64, pages: u64, elapsed_secs: f64) -> String {
    if elapsed_secs > 0.0 {
        format!("page {pages}, {:.0} docs/sec", emitted as f64 / elapsed_secs)
    } else {
        format!("page {pages}")
    }
}
