//! Pipeline progress reporting.
//!
//! Progress is emitted on **stderr** so stdout stays parseable for scripts.
//! The human reporter is meant for interactive runs; the default picks it
//! only when stderr is a TTY.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// A single progress event.
#[derive(Clone, Debug)]
pub struct ProgressEvent {
    pub stage: &'static str,
    pub n: u64,
    pub total: u64,
}

/// Reports pipeline progress. Implementations write to stderr.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress on stderr: "fingerprint  12 / 40".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = format!("{}  {} / {}\n", event.stage, event.n, event.total);
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Progress mode: off, or human lines on stderr.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
        }
    }
}

/// Shared counter for concurrent stages: workers bump it, the owner reports.
#[derive(Default)]
pub struct SharedCounter(AtomicU64);

impl SharedCounter {
    pub fn add(&self, n: u64) -> u64 {
        self.0.fetch_add(n, Ordering::Relaxed) + n
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_counter_accumulates() {
        let counter = SharedCounter::default();
        assert_eq!(counter.add(3), 3);
        assert_eq!(counter.add(7), 10);
        assert_eq!(counter.get(), 10);
    }
}
