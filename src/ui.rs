//! Terminal output: a spinner for the running pipeline and coloured result lines.
//!
//! [`RunProgress`] is an [`EventSink`], so it follows a run by listening to
//! the runner's lifecycle events.

use std::cell::Cell;
use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::engine::{EventSink, JobReport, JobStatus, LifecycleEvent};

/// Spinner plus one ✓/✗ line per finished pipeline.
pub struct RunProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
    completed: Cell<usize>,
    failed: Cell<usize>,
}

impl Default for RunProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl RunProgress {
    pub fn new() -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        Self::with_bar(pb)
    }

    /// No spinner, result lines only. Used when stderr is not a terminal.
    pub fn hidden() -> Self {
        Self::with_bar(ProgressBar::hidden())
    }

    fn with_bar(pb: ProgressBar) -> Self {
        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            completed: Cell::new(0),
            failed: Cell::new(0),
        }
    }

    pub fn completed(&self) -> usize {
        self.completed.get()
    }

    pub fn failed(&self) -> usize {
        self.failed.get()
    }

    // Printed around the spinner so it also shows when the bar is hidden.
    fn line(&self, text: String) {
        self.pb.suspend(|| println!("{text}"));
    }

    /// Clears the spinner and prints the totals.
    pub fn finish(&self) {
        self.pb.finish_and_clear();
        let summary = format!(
            "{} completed, {} failed",
            self.completed.get(),
            self.failed.get()
        );
        if self.failed.get() == 0 {
            println!("{}", self.green.apply_to(summary));
        } else {
            println!("{}", self.red.apply_to(summary));
        }
    }
}

impl EventSink for RunProgress {
    fn emit(&self, event: &LifecycleEvent) {
        match event {
            LifecycleEvent::Enqueued { .. } => {}
            LifecycleEvent::Rejected { label, reason } => {
                self.line(format!(
                    "  {} {label} not queued: {reason}",
                    self.yellow.apply_to("!")
                ));
            }
            LifecycleEvent::Started { label, .. } => {
                self.pb.set_message(format!("RUNNING: {label}"));
            }
            LifecycleEvent::Completed(report) => {
                self.completed.set(self.completed.get() + 1);
                let took = report
                    .duration_ms
                    .map(|ms| format!(" ({ms} ms)"))
                    .unwrap_or_default();
                self.line(format!(
                    "  {} {}{took}",
                    self.green.apply_to("✓"),
                    report.label
                ));
            }
            LifecycleEvent::Failed(report) => {
                self.failed.set(self.failed.get() + 1);
                self.line(format!(
                    "  {} {}: {}",
                    self.red.apply_to("✗"),
                    report.label,
                    report.message.as_deref().unwrap_or("failed")
                ));
            }
        }
    }
}

/// Pretty-prints job reports as JSON, headed by a coloured rule.
pub fn print_reports(reports: &[JobReport]) {
    let green = Style::new().green().bold();
    let red = Style::new().red().bold();
    for report in reports {
        let style = if report.status == JobStatus::Failed {
            &red
        } else {
            &green
        };
        println!();
        println!("{}", style.apply_to(format!("─── {} ───", report.label)));
        println!("{}", serde_json::to_string_pretty(report).unwrap_or_default());
    }
}
