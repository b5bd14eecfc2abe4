use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::pipeline::{Stage, StageObserver};

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

fn label(input: &Path) -> String {
    input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.display().to_string())
}

/// One spinner per input file, driven by pipeline stage changes
pub struct ProgressTracker {
    multi: MultiProgress,
    bars: Mutex<HashMap<PathBuf, ProgressBar>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
        }
    }

    /// Create an indeterminate spinner for unknown-duration operations
    pub fn create_spinner(&self, message: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} [{elapsed}] {msg}")
                .map(|style| style.tick_strings(TICKS))
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    /// Show `stage` on the input's spinner, creating it on first use
    pub fn update(&self, input: &Path, stage: Stage) {
        let Ok(mut bars) = self.bars.lock() else {
            return;
        };
        let message = format!("{}: {}", label(input), stage);

        if stage == Stage::Done {
            if let Some(pb) = bars.remove(input) {
                pb.finish_with_message(format!("✓ {}", label(input)));
            }
            return;
        }

        match bars.get(input) {
            Some(pb) => pb.set_message(message),
            None => {
                let pb = self.create_spinner(&message);
                bars.insert(input.to_path_buf(), pb);
            }
        }
    }

    /// Finish every spinner that never reached `Done`
    pub fn abandon_all(&self) {
        if let Ok(mut bars) = self.bars.lock() {
            for (input, pb) in bars.drain() {
                pb.abandon_with_message(format!("✗ {}", label(&input)));
            }
        }
    }

    pub fn active(&self) -> usize {
        self.bars.lock().map(|bars| bars.len()).unwrap_or(0)
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrapper that turns progress display on or off
pub struct ProgressOperation {
    pub tracker: Arc<ProgressTracker>,
    pub enabled: bool,
}

impl ProgressOperation {
    pub fn new(enabled: bool) -> Self {
        Self {
            tracker: Arc::new(ProgressTracker::new()),
            enabled,
        }
    }

    /// Stage observer feeding the tracker, if progress is enabled
    pub fn observer(&self) -> Option<StageObserver> {
        if !self.enabled {
            return None;
        }
        let tracker = Arc::clone(&self.tracker);
        let observer: StageObserver = Arc::new(move |input: &Path, stage: Stage| tracker.update(input, stage));
        Some(observer)
    }

    /// Execute an async operation with a spinner if enabled
    pub async fn with_spinner<F, T>(&self, message: &str, operation: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        if self.enabled {
            let pb = self.tracker.create_spinner(message);
            let result = operation.await;
            pb.finish_with_message(format!("✓ {}", message));
            result
        } else {
            operation.await
        }
    }

    pub fn finish(&self) {
        if self.enabled {
            self.tracker.abandon_all();
        }
    }
}
