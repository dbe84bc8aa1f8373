//! Observational progress reporting.
//!
//! Every long-running step reports through a [`ProgressObserver`]. Observers never influence
//! control flow; [`NoopProgress`] is a valid choice everywhere.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::util::format_progress_message;

#[derive(Clone, Debug, PartialEq)]
pub struct ProgressUpdate {
    pub stage: &'static str,
    pub message: String,
    #[allow(dead_code)]
    pub current_file: Option<String>,
    pub current: Option<u64>,
    pub total: Option<u64>,
    pub speed: Option<String>,
}

impl ProgressUpdate {
    pub fn message(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            current_file: None,
            current: None,
            total: None,
            speed: None,
        }
    }

    pub fn counted(
        stage: &'static str,
        message: impl Into<String>,
        current: u64,
        total: Option<u64>,
    ) -> Self {
        Self {
            current: Some(current),
            total,
            ..Self::message(stage, message)
        }
    }

    #[must_use]
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.current_file = Some(file.into());
        self
    }

    #[must_use]
    pub fn with_speed(mut self, speed: impl Into<String>) -> Self {
        self.speed = Some(speed.into());
        self
    }

    pub fn is_complete(&self) -> bool {
        matches!((self.current, self.total), (Some(current), Some(total)) if current == total)
    }

    /// `[pct%] message`, with the transfer speed appended when known.
    pub fn formatted(&self) -> String {
        let line = format_progress_message(&self.message, self.current, self.total);
        match &self.speed {
            Some(speed) => format!("{line} ({speed})"),
            None => line,
        }
    }
}

pub trait ProgressObserver: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopProgress;

impl ProgressObserver for NoopProgress {
    fn report(&self, _update: ProgressUpdate) {}
}

/// Single rewriting console line driven by `indicatif`.
///
/// Downloads with a known size render as a byte bar; everything else is a spinner line.
pub struct ConsoleProgress {
    bar: ProgressBar,
    spinner: ProgressStyle,
    bytes: ProgressStyle,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        let console = Self::with_bar(ProgressBar::new_spinner());
        console.bar.enable_steady_tick(Duration::from_millis(120));
        console
    }

    fn with_bar(bar: ProgressBar) -> Self {
        let spinner = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        let bytes = ProgressStyle::with_template(
            "{spinner:.cyan} {msg} [{bar:30.cyan/blue}] {bytes}/{total_bytes}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
        bar.set_style(spinner.clone());
        Self {
            bar,
            spinner,
            bytes,
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for ConsoleProgress {
    fn report(&self, update: ProgressUpdate) {
        match (update.stage, update.total) {
            ("download", Some(total)) => {
                if self.bar.length() != Some(total) {
                    self.bar.set_style(self.bytes.clone());
                    self.bar.set_length(total);
                }
                self.bar.set_position(update.current.unwrap_or(0));
                let message = match &update.speed {
                    Some(speed) => format!("{} ({speed})", update.message),
                    None => update.message,
                };
                self.bar.set_message(message);
            }
            _ => {
                if self.bar.length().is_some() {
                    self.bar.set_style(self.spinner.clone());
                    self.bar.unset_length();
                }
                self.bar.set_message(update.formatted());
            }
        }
    }
}
