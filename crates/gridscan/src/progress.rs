use indicatif::{ProgressBar, ProgressStyle};

use crate::report::RunProgress;

const PB_STYLE: &str = "{spinner:.blue} [{elapsed_precise}] {wide_bar:.cyan/blue} {pos}/{len} cells {msg}";

const TICK: &str = "⠁⠂⠄⡀⢀⠠⠐⠈ ";

const PB_CHARS: &str = "█▓▒░  ";

/// Terminal progress bar over the cells of a run.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    pb: ProgressBar,
}

impl ProgressTracker {
    pub fn new() -> Self {
        let pb = ProgressBar::no_length();
        if let Ok(style) = ProgressStyle::with_template(PB_STYLE) {
            pb.set_style(style.tick_chars(TICK).progress_chars(PB_CHARS));
        }
        Self { pb }
    }

    /// Not drawn at all, for non-interactive runs.
    pub fn hidden() -> Self {
        Self {
            pb: ProgressBar::hidden(),
        }
    }

    pub fn update(&self, progress: &RunProgress) {
        self.pb.set_length(progress.total as u64);
        self.pb.set_position(progress.finished() as u64);
        let message = if progress.skipped > 0 {
            format!("{} records, {} skipped", progress.records, progress.skipped)
        } else {
            format!("{} records", progress.records)
        };
        self.pb.set_message(message);
    }

    pub fn position(&self) -> u64 {
        self.pb.position()
    }

    pub fn finish(&self, msg: Option<String>) {
        match msg {
            Some(msg) => self.pb.finish_with_message(msg),
            None => self.pb.finish(),
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}
