use std::time::{Duration, Instant};

use crate::candidates::CandidateSource;
use crate::config::ScheduleConfig;
use crate::events::{Reporter, RunEvent, SourceRow};
use crate::input::{LinePoll, PromptInput};
use crate::signal_bus::{Signal, SignalBus};

const INPUT_POLL: Duration = Duration::from_secs(1);
const REMINDER_STEP_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Continue,
    Skip,
    JumpTo(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Answer {
    Decided(Decision),
    Invalid,
}

fn parse_answer(line: &str, source_count: usize) -> Answer {
    let answer = line.trim().to_ascii_lowercase();
    if answer.is_empty() {
        return Answer::Decided(Decision::Continue);
    }
    if answer == "s" {
        return Answer::Decided(Decision::Skip);
    }
    match answer.parse::<usize>() {
        Ok(number) if (1..=source_count).contains(&number) => {
            Answer::Decided(Decision::JumpTo(number - 1))
        }
        _ => Answer::Invalid,
    }
}

/// Offers the operator a bounded window to skip or reorder slow sources.
pub struct FlowController {
    threshold_secs: f64,
    window_min: Duration,
    window_max: Duration,
}

impl FlowController {
    pub fn new(config: &ScheduleConfig) -> Self {
        Self {
            threshold_secs: config.eta_threshold_secs as f64,
            window_min: Duration::from_secs(config.window_min_secs),
            window_max: Duration::from_secs(config.window_max_secs),
        }
    }

    pub fn with_window(threshold_secs: f64, window_min: Duration, window_max: Duration) -> Self {
        Self {
            threshold_secs,
            window_min,
            window_max,
        }
    }

    /// `min(max, max(min, eta))`.
    pub fn window_for(&self, eta_secs: f64) -> Duration {
        let eta = if eta_secs.is_finite() {
            Duration::from_secs_f64(eta_secs.max(0.0))
        } else {
            self.window_max
        };
        eta.max(self.window_min).min(self.window_max)
    }

    /// Returns immediately with `Continue` when the ETA is within the
    /// threshold, or when an abort or skip-target signal is raised while
    /// the window is open.
    pub fn decide(
        &self,
        current: usize,
        sources: &[CandidateSource],
        eta_secs: f64,
        input: &dyn PromptInput,
        bus: &SignalBus,
        reporter: &dyn Reporter,
    ) -> Decision {
        if eta_secs <= self.threshold_secs {
            return Decision::Continue;
        }

        let window = self.window_for(eta_secs);
        reporter.report(&RunEvent::DecisionPrompt {
            current,
            sources: sources
                .iter()
                .map(|source| SourceRow {
                    name: source.display_name(),
                    size_bytes: source.size_bytes,
                })
                .collect(),
            eta_secs,
            window,
        });

        let started = Instant::now();
        let mut lines = input.window();
        let mut last_reminder = window.as_secs().div_ceil(REMINDER_STEP_SECS);

        loop {
            if bus.is_set(Signal::Abort) || bus.is_set(Signal::SkipTarget) {
                return Decision::Continue;
            }

            let remaining = window.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                reporter.report(&RunEvent::DecisionTimedOut);
                return Decision::Continue;
            }

            match lines.poll_line(remaining.min(INPUT_POLL)) {
                LinePoll::Line(line) => match parse_answer(&line, sources.len()) {
                    Answer::Decided(decision) => {
                        tracing::debug!(?decision, "operator decision");
                        return decision;
                    }
                    Answer::Invalid => reporter.report(&RunEvent::InvalidDecisionInput {
                        input: line.trim().to_string(),
                        max_index: sources.len(),
                    }),
                },
                LinePoll::Timeout | LinePoll::Closed => {}
            }

            // Cosmetic only: the deadline above is the authoritative clock.
            let remaining = window.saturating_sub(started.elapsed());
            let bucket = remaining.as_secs().div_ceil(REMINDER_STEP_SECS);
            if bucket > 0 && bucket < last_reminder {
                last_reminder = bucket;
                reporter.report(&RunEvent::DecisionReminder {
                    remaining: Duration::from_secs(bucket * REMINDER_STEP_SECS),
                });
            }
        }
    }
}
