use std::collections::HashMap;
use std::time::Instant;

use tracing::{info, warn};

/// Receives progress brackets from the engine.
///
/// Labels arrive in matching `start`/`finish` pairs; channel labels nest
/// inside the guild label.
pub trait StatusReporter: Send {
    fn start(&mut self, label: &str);
    fn finish(&mut self, label: &str);
}

/// Logs each bracket through `tracing`, with the elapsed time on finish.
#[derive(Debug, Default)]
pub struct LoggingReporter {
    active: HashMap<String, Instant>,
}

impl LoggingReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatusReporter for LoggingReporter {
    fn start(&mut self, label: &str) {
        if self.active.insert(label.to_string(), Instant::now()).is_some() {
            warn!("Task {} started twice", label);
        }
        info!("  GO   {}", label);
    }

    fn finish(&mut self, label: &str) {
        match self.active.remove(label) {
            Some(started) => {
                info!("  DONE {} ({}ms)", label, started.elapsed().as_millis());
            }
            None => warn!("Task {} finished without being started", label),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReporterEvent {
    Start(String),
    Finish(String),
}

/// Keeps every bracket in order; useful in tests and for summaries.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Vec<ReporterEvent>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[ReporterEvent] {
        &self.events
    }

    /// True if every `start` has a later matching `finish` and brackets nest.
    pub fn is_balanced(&self) -> bool {
        let mut open: Vec<&str> = Vec::new();
        for event in &self.events {
            match event {
                ReporterEvent::Start(label) => open.push(label),
                ReporterEvent::Finish(label) => {
                    if open.pop() != Some(label.as_str()) {
                        return false;
                    }
                }
            }
        }
        open.is_empty()
    }
}

impl StatusReporter for RecordingReporter {
    fn start(&mut self, label: &str) {
        self.events.push(ReporterEvent::Start(label.to_string()));
    }

    fn finish(&mut self, label: &str) {
        self.events.push(ReporterEvent::Finish(label.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_detects_unbalanced_brackets() {
        let mut reporter = RecordingReporter::new();
        reporter.start("a");
        reporter.start("a/b");
        reporter.finish("a/b");
        assert!(!reporter.is_balanced());
        reporter.finish("a");
        assert!(reporter.is_balanced());

        let mut crossed = RecordingReporter::new();
        crossed.start("a");
        crossed.start("b");
        crossed.finish("a");
        crossed.finish("b");
        assert!(!crossed.is_balanced());
    }

    #[test]
    fn logging_reporter_tracks_active_tasks() {
        let mut reporter = LoggingReporter::new();
        reporter.start("discord/guild");
        assert!(reporter.active.contains_key("discord/guild"));
        reporter.finish("discord/guild");
        assert!(reporter.active.is_empty());
        // Unmatched finish only warns.
        reporter.finish("discord/guild");
    }
}
