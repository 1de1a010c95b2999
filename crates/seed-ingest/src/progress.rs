//! Progress reporting for batched stages
//!
//! The orchestrator reports `(batches_done, total_batches)` after every
//! batch. How that is rendered is up to the observer: a console bar, a log
//! line, or nothing.

use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

/// Receives monotonically increasing `(current, total)` counters
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, current: u64, total: u64);

    /// Called once after the last batch
    fn on_finish(&self) {}
}

/// Discards every update
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl ProgressObserver for SilentProgress {
    fn on_progress(&self, _current: u64, _total: u64) {}
}

/// Emits one `info` event per update
#[derive(Debug, Clone)]
pub struct LogProgress {
    label: String,
}

impl LogProgress {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }
}

impl ProgressObserver for LogProgress {
    fn on_progress(&self, current: u64, total: u64) {
        let percent = if total == 0 {
            100.0
        } else {
            current as f64 * 100.0 / total as f64
        };
        info!(
            stage = %self.label,
            current,
            total,
            percent = %format!("{:.1}", percent),
            "Progress"
        );
    }
}

/// Terminal progress bar, created lazily on the first update
pub struct ConsoleProgress {
    label: String,
    bar: Mutex<Option<ProgressBar>>,
}

const BAR_TEMPLATE: &str = concat!(
    "{msg}\n{spinner:.green} [{elapsed_precise}] ",
    "[{wide_bar:.cyan/blue}] {pos}/{len} batches ({eta})"
);

impl ConsoleProgress {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            bar: Mutex::new(None),
        }
    }

    fn create_bar(&self, total: u64) -> ProgressBar {
        let bar = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        bar.set_style(style);
        bar.set_message(self.label.clone());
        bar
    }
}

impl ProgressObserver for ConsoleProgress {
    fn on_progress(&self, current: u64, total: u64) {
        let Ok(mut slot) = self.bar.lock() else {
            return;
        };
        let bar = slot.get_or_insert_with(|| self.create_bar(total));
        bar.set_length(total);
        bar.set_position(current);
    }

    fn on_finish(&self) {
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(bar) = slot.take() {
                bar.finish_with_message(format!("{} done", self.label));
            }
        }
    }
}
