use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    pub name: String,
    pub size_bytes: u64,
}

/// Progress and prompt notifications emitted by the scheduler. The core
/// never renders these itself.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    TargetStarted {
        target: PathBuf,
    },
    SourceStarted {
        source: PathBuf,
        total: u64,
    },
    Progress {
        checked: u64,
        total: u64,
        rate: f64,
        eta_secs: f64,
    },
    DecisionPrompt {
        current: usize,
        sources: Vec<SourceRow>,
        eta_secs: f64,
        window: Duration,
    },
    DecisionReminder {
        remaining: Duration,
    },
    InvalidDecisionInput {
        input: String,
        max_index: usize,
    },
    DecisionTimedOut,
    SourceSkipped {
        source: PathBuf,
    },
    SourceUnreadable {
        source: PathBuf,
        reason: String,
    },
    TargetSkipped {
        target: PathBuf,
    },
    Found {
        target: PathBuf,
        candidate: Vec<u8>,
        elapsed: Duration,
    },
    NoMatch {
        target: PathBuf,
    },
    Aborted,
}

pub trait Reporter {
    fn report(&self, event: &RunEvent);
}

#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<RunEvent>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RunEvent> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, event: &RunEvent) {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(event.clone());
    }
}
