use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::AttemptConfig;
use crate::mount::{AttachProcess, MountBackend};
use crate::signal_bus::{Signal, SignalBus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Failure,
    CancelledBySourceSkip,
    CancelledByTargetSkip,
    CancelledByAbort,
}

impl AttemptOutcome {
    fn cancelled_by(signal: Signal) -> Self {
        match signal {
            Signal::SkipSource => Self::CancelledBySourceSkip,
            Signal::SkipTarget => Self::CancelledByTargetSkip,
            Signal::Abort => Self::CancelledByAbort,
        }
    }
}

/// Runs one attach attempt per candidate. Worst-case cancellation latency
/// is one poll interval plus the kill grace period plus the cleanup sweep.
pub struct AttemptExecutor<'a> {
    backend: &'a dyn MountBackend,
    bus: &'a SignalBus,
    poll_interval: Duration,
    kill_grace: Duration,
}

impl<'a> AttemptExecutor<'a> {
    pub fn new(
        backend: &'a dyn MountBackend,
        bus: &'a SignalBus,
        config: &AttemptConfig,
    ) -> Self {
        Self {
            backend,
            bus,
            poll_interval: config.poll_interval(),
            kill_grace: config.kill_grace(),
        }
    }

    pub fn attempt(&self, target: &Path, candidate: &[u8]) -> AttemptOutcome {
        let mut process = match self.backend.spawn_attach(target, candidate) {
            Ok(process) => process,
            Err(error) => {
                tracing::warn!(
                    target = %target.display(),
                    %error,
                    "attach attempt could not start"
                );
                self.detach_target(target);
                return AttemptOutcome::Failure;
            }
        };

        loop {
            if let Some(signal) = self.bus.pending() {
                tracing::debug!(?signal, target = %target.display(), "cancelling attach attempt");
                self.shut_down(process.as_mut());
                self.sweep();
                return AttemptOutcome::cancelled_by(signal);
            }

            match process.try_wait() {
                Ok(Some(code)) => {
                    let outcome = if code == 0 {
                        AttemptOutcome::Success
                    } else {
                        AttemptOutcome::Failure
                    };
                    tracing::trace!(code, ?outcome, "attach attempt finished");
                    self.detach_target(target);
                    return outcome;
                }
                Ok(None) => thread::sleep(self.poll_interval),
                Err(error) => {
                    tracing::warn!(%error, "failed to poll attach attempt");
                    self.shut_down(process.as_mut());
                    self.detach_target(target);
                    return AttemptOutcome::Failure;
                }
            }
        }
    }

    /// Best-effort detach of `target`'s expected mount point.
    pub fn detach_target(&self, target: &Path) {
        if let Err(error) = self.backend.detach_target(target) {
            tracing::warn!(target = %target.display(), %error, "targeted detach failed");
        }
    }

    /// Best-effort detach of every attached disk image.
    pub fn sweep(&self) {
        if let Err(error) = self.backend.detach_all() {
            tracing::warn!(%error, "detach sweep failed");
        }
    }

    /// SIGTERM, wait out the grace period, then SIGKILL and reap.
    fn shut_down(&self, process: &mut dyn AttachProcess) {
        if matches!(process.try_wait(), Ok(Some(_))) {
            return;
        }

        if let Err(error) = process.terminate() {
            tracing::debug!(%error, "terminate failed");
        }
        if self.wait_for_exit(process, self.kill_grace) {
            return;
        }

        tracing::debug!("attach attempt ignored terminate, killing");
        if let Err(error) = process.kill() {
            tracing::debug!(%error, "kill failed");
        }
        if !self.wait_for_exit(process, self.kill_grace) {
            tracing::warn!("attach attempt could not be reaped after kill");
        }
    }

    fn wait_for_exit(&self, process: &mut dyn AttachProcess, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let step = self.poll_interval.min(Duration::from_millis(10));

        loop {
            match process.try_wait() {
                Ok(Some(_)) => return true,
                Ok(None) => {}
                Err(_) => return false,
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(step);
        }
    }
}
