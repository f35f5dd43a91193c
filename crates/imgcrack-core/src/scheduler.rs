use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::candidates::{CandidateSource, SourceError};
use crate::config::SourcesConfig;
use crate::estimator::{RateEstimator, count_lines, estimate_lines};
use crate::events::{Reporter, RunEvent};
use crate::executor::{AttemptExecutor, AttemptOutcome};
use crate::flow::{Decision, FlowController};
use crate::input::PromptInput;
use crate::signal_bus::{Signal, SignalBus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOutcome {
    Found {
        candidate: Vec<u8>,
        elapsed: Duration,
        source: PathBuf,
    },
    NoMatch,
    SkippedTarget,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetReport {
    pub target: PathBuf,
    pub outcome: TargetOutcome,
}

pub struct SchedulerDeps<'a> {
    pub executor: &'a AttemptExecutor<'a>,
    pub controller: &'a FlowController,
    pub prompt: &'a dyn PromptInput,
    pub bus: &'a SignalBus,
    pub reporter: &'a dyn Reporter,
    pub counting: SourcesConfig,
    pub default_rate: f64,
}

enum SourceEnd {
    Finished,
    Unreadable(SourceError),
    Found(Vec<u8>),
    Stopped(TargetOutcome),
}

/// Drives targets in order and, within a target, candidate sources by
/// index. At most one attempt is in flight at any time.
pub struct Scheduler<'a> {
    deps: SchedulerDeps<'a>,
}

impl<'a> Scheduler<'a> {
    pub fn new(deps: SchedulerDeps<'a>) -> Self {
        Self { deps }
    }

    /// Runs every target until one is aborted. Targets after an abort are
    /// not started and do not appear in the result.
    pub fn run(&self, targets: &[PathBuf], sources: &[CandidateSource]) -> Vec<TargetReport> {
        let mut reports = Vec::with_capacity(targets.len());

        for target in targets {
            if self.deps.bus.is_set(Signal::Abort) {
                break;
            }

            let outcome = self.run_target(target, sources);
            let aborted = outcome == TargetOutcome::Aborted;
            reports.push(TargetReport {
                target: target.clone(),
                outcome,
            });
            if aborted {
                break;
            }
        }

        reports
    }

    pub fn run_target(&self, target: &Path, sources: &[CandidateSource]) -> TargetOutcome {
        let deps = &self.deps;
        deps.reporter.report(&RunEvent::TargetStarted {
            target: target.to_path_buf(),
        });

        // Residue from an earlier run or another process.
        deps.executor.detach_target(target);
        deps.executor.sweep();

        let started = Instant::now();
        let mut target_rate = RateEstimator::new(deps.default_rate, started);
        let mut processed = vec![false; sources.len()];
        let mut index = 0;

        while let Some(current) = next_unprocessed(&processed, index) {
            index = current;
            if let Some(outcome) = self.target_signal(target) {
                return outcome;
            }

            let source = &sources[index];
            let estimated = estimate_lines(&source.path, &deps.counting).unwrap_or(0);
            let eta_secs = target_rate.eta(estimated);

            match deps.controller.decide(
                index,
                sources,
                eta_secs,
                deps.prompt,
                deps.bus,
                deps.reporter,
            ) {
                Decision::Skip => {
                    deps.reporter.report(&RunEvent::SourceSkipped {
                        source: source.path.clone(),
                    });
                    processed[index] = true;
                    continue;
                }
                Decision::JumpTo(next) => {
                    index = next;
                    continue;
                }
                Decision::Continue => {}
            }

            if let Some(outcome) = self.target_signal(target) {
                return outcome;
            }

            match self.run_source(target, source, &mut target_rate) {
                SourceEnd::Finished => {}
                SourceEnd::Unreadable(error) => {
                    tracing::warn!(%error, "skipping unreadable source");
                    deps.reporter.report(&RunEvent::SourceUnreadable {
                        source: source.path.clone(),
                        reason: error.to_string(),
                    });
                }
                SourceEnd::Found(candidate) => {
                    let elapsed = started.elapsed();
                    deps.executor.detach_target(target);
                    deps.executor.sweep();
                    tracing::info!(target = %target.display(), ?elapsed, "candidate accepted");
                    deps.reporter.report(&RunEvent::Found {
                        target: target.to_path_buf(),
                        candidate: candidate.clone(),
                        elapsed,
                    });
                    return TargetOutcome::Found {
                        candidate,
                        elapsed,
                        source: source.path.clone(),
                    };
                }
                SourceEnd::Stopped(outcome) => return self.stopped(target, outcome),
            }

            processed[index] = true;
            index += 1;
        }

        deps.reporter.report(&RunEvent::NoMatch {
            target: target.to_path_buf(),
        });
        TargetOutcome::NoMatch
    }

    fn run_source(
        &self,
        target: &Path,
        source: &CandidateSource,
        target_rate: &mut RateEstimator,
    ) -> SourceEnd {
        let deps = &self.deps;
        deps.bus.clear(Signal::SkipSource);

        let total = match count_lines(&source.path, &deps.counting) {
            Ok(0) => {
                return SourceEnd::Unreadable(SourceError::Empty {
                    path: source.path.clone(),
                });
            }
            Ok(total) => total,
            Err(source_error) => {
                return SourceEnd::Unreadable(SourceError::Open {
                    path: source.path.clone(),
                    source: source_error,
                });
            }
        };
        let mut cursor = match source.open() {
            Ok(cursor) => cursor,
            Err(error) => return SourceEnd::Unreadable(error),
        };
        // Blank lines count toward the total but never yield a candidate.
        let mut first = cursor.next();
        if first.is_none() {
            return SourceEnd::Unreadable(SourceError::Empty {
                path: source.path.clone(),
            });
        }

        tracing::info!(source = %source.path.display(), total, "starting source");
        deps.reporter.report(&RunEvent::SourceStarted {
            source: source.path.clone(),
            total,
        });

        let mut source_rate = RateEstimator::new(0.0, Instant::now());

        while let Some(candidate) = first.take().or_else(|| cursor.next()) {
            let candidate = match candidate {
                Ok(candidate) => candidate,
                Err(error) => {
                    tracing::warn!(
                        source = %source.path.display(),
                        candidates_read = cursor.position(),
                        %error,
                        "source read failed"
                    );
                    break;
                }
            };

            let outcome = match deps.bus.pending() {
                Some(Signal::Abort) => AttemptOutcome::CancelledByAbort,
                Some(Signal::SkipTarget) => AttemptOutcome::CancelledByTargetSkip,
                Some(Signal::SkipSource) => AttemptOutcome::CancelledBySourceSkip,
                None => deps.executor.attempt(target, &candidate),
            };

            match outcome {
                AttemptOutcome::Success => return SourceEnd::Found(candidate),
                AttemptOutcome::Failure => {}
                AttemptOutcome::CancelledBySourceSkip => {
                    deps.bus.clear(Signal::SkipSource);
                    deps.reporter.report(&RunEvent::SourceSkipped {
                        source: source.path.clone(),
                    });
                    break;
                }
                AttemptOutcome::CancelledByTargetSkip => {
                    return SourceEnd::Stopped(TargetOutcome::SkippedTarget);
                }
                AttemptOutcome::CancelledByAbort => {
                    return SourceEnd::Stopped(TargetOutcome::Aborted);
                }
            }

            source_rate.record(1);
            target_rate.record(1);

            let now = Instant::now();
            let checked = source_rate.checked();
            deps.reporter.report(&RunEvent::Progress {
                checked,
                total,
                rate: source_rate.rate_at(now),
                eta_secs: source_rate.eta_at(total.saturating_sub(checked), now),
            });
        }

        SourceEnd::Finished
    }

    fn target_signal(&self, target: &Path) -> Option<TargetOutcome> {
        if self.deps.bus.is_set(Signal::Abort) {
            return Some(self.stopped(target, TargetOutcome::Aborted));
        }
        if self.deps.bus.is_set(Signal::SkipTarget) {
            return Some(self.stopped(target, TargetOutcome::SkippedTarget));
        }
        None
    }

    fn stopped(&self, target: &Path, outcome: TargetOutcome) -> TargetOutcome {
        match outcome {
            TargetOutcome::SkippedTarget => {
                self.deps.bus.clear(Signal::SkipTarget);
                tracing::info!(target = %target.display(), "target skipped");
                self.deps.reporter.report(&RunEvent::TargetSkipped {
                    target: target.to_path_buf(),
                });
            }
            TargetOutcome::Aborted => {
                tracing::info!(target = %target.display(), "run aborted");
                self.deps.reporter.report(&RunEvent::Aborted);
            }
            _ => {}
        }
        outcome
    }
}

/// First unprocessed index at or after `from`, wrapping to the start so
/// sources passed over by a forward jump are still visited.
fn next_unprocessed(processed: &[bool], from: usize) -> Option<usize> {
    let from = from.min(processed.len());
    (from..processed.len()).find(|index| !processed[*index])
}
