use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    SkipSource,
    SkipTarget,
    Abort,
}

/// Level-triggered operator signals shared between the input listener and
/// the scheduler thread. A set flag stays set until a consumer clears it.
#[derive(Debug, Default)]
pub struct SignalBus {
    skip_source: AtomicBool,
    skip_target: AtomicBool,
    abort: AtomicBool,
}

impl SignalBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, signal: Signal) {
        self.flag(signal).store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self, signal: Signal) -> bool {
        self.flag(signal).load(Ordering::SeqCst)
    }

    pub fn clear(&self, signal: Signal) {
        self.flag(signal).store(false, Ordering::SeqCst);
    }

    /// Returns the highest-priority raised signal: abort, then skip-target,
    /// then skip-source.
    pub fn pending(&self) -> Option<Signal> {
        [Signal::Abort, Signal::SkipTarget, Signal::SkipSource]
            .into_iter()
            .find(|signal| self.is_set(*signal))
    }

    fn flag(&self, signal: Signal) -> &AtomicBool {
        match signal {
            Signal::SkipSource => &self.skip_source,
            Signal::SkipTarget => &self.skip_target,
            Signal::Abort => &self.abort,
        }
    }
}
