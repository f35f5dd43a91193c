use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::input::{LinePoll, LineSource, PromptMailbox};
use crate::signal_bus::{Signal, SignalBus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Signal(Signal),
    Ignore,
}

pub fn parse_command(line: &str) -> Command {
    match line.trim().to_ascii_lowercase().as_str() {
        "s" => Command::Signal(Signal::SkipSource),
        "b" => Command::Signal(Signal::SkipTarget),
        "q" => Command::Signal(Signal::Abort),
        _ => Command::Ignore,
    }
}

/// Background operator input listener. Stops within one poll interval of
/// [`ListenerHandle::stop`], after `q`, or once its line source closes.
pub struct ListenerHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    pub fn spawn(
        mut lines: Box<dyn LineSource + Send>,
        bus: Arc<SignalBus>,
        mailbox: Arc<PromptMailbox>,
        poll_interval: Duration,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let thread = thread::spawn(move || {
            while !stop_flag.load(Ordering::SeqCst) {
                let line = match lines.poll_line(poll_interval) {
                    LinePoll::Line(line) => line,
                    LinePoll::Timeout => continue,
                    LinePoll::Closed => {
                        tracing::debug!("operator input closed, listener exiting");
                        break;
                    }
                };

                if !dispatch_line(line, &bus, &mailbox) {
                    break;
                }
            }
        });

        Self {
            stop,
            thread: Some(thread),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.thread
            .as_ref()
            .is_none_or(|thread| thread.is_finished())
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::warn!("operator input listener panicked");
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Returns `false` once the listener should stop.
fn dispatch_line(line: String, bus: &SignalBus, mailbox: &PromptMailbox) -> bool {
    let command = parse_command(&line);

    match command {
        Command::Signal(Signal::Abort) => {
            tracing::info!("abort requested by operator");
            bus.set(Signal::Abort);
            false
        }
        Command::Signal(Signal::SkipTarget) => {
            tracing::info!("skip target requested by operator");
            bus.set(Signal::SkipTarget);
            true
        }
        _ => {
            let line = match mailbox.offer(line) {
                Ok(()) => return true,
                Err(line) => line,
            };
            if command == Command::Signal(Signal::SkipSource) {
                tracing::info!("skip source requested by operator");
                bus.set(Signal::SkipSource);
            } else if !line.trim().is_empty() {
                tracing::debug!(input = line.trim(), "ignoring operator input");
            }
            true
        }
    }
}
