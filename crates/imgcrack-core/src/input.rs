use std::io::{self, BufRead};
use std::sync::Mutex;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinePoll {
    Line(String),
    Timeout,
    Closed,
}

pub trait LineSource {
    fn poll_line(&mut self, timeout: Duration) -> LinePoll;
}

#[derive(Debug)]
pub struct ChannelLines {
    receiver: Receiver<String>,
}

impl ChannelLines {
    pub fn new(receiver: Receiver<String>) -> Self {
        Self { receiver }
    }

    /// Spawns a detached reader thread that forwards stdin lines. The thread
    /// exits on EOF, on a read error, or once the receiving side is gone.
    pub fn stdin() -> Self {
        let (sender, receiver) = mpsc::channel();

        thread::spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                if sender.send(line).is_err() {
                    break;
                }
            }
        });

        Self { receiver }
    }
}

impl LineSource for ChannelLines {
    fn poll_line(&mut self, timeout: Duration) -> LinePoll {
        match self.receiver.recv_timeout(timeout) {
            Ok(line) => LinePoll::Line(line),
            Err(RecvTimeoutError::Timeout) => LinePoll::Timeout,
            Err(RecvTimeoutError::Disconnected) => LinePoll::Closed,
        }
    }
}

/// Opens a bounded line window for a decision prompt.
pub trait PromptInput {
    fn window(&self) -> Box<dyn LineSource + '_>;
}

/// Hands operator lines to an open decision window instead of the signal
/// mapping. At most one window is open at a time.
#[derive(Debug, Default)]
pub struct PromptMailbox {
    window: Mutex<Option<Sender<String>>>,
}

impl PromptMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `line` to the open window. Returns the line back when no
    /// window is listening.
    pub fn offer(&self, line: String) -> Result<(), String> {
        let mut window = self
            .window
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match window.as_ref() {
            Some(sender) => match sender.send(line) {
                Ok(()) => Ok(()),
                Err(error) => {
                    *window = None;
                    Err(error.0)
                }
            },
            None => Err(line),
        }
    }

    pub fn is_open(&self) -> bool {
        self.window
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .is_some()
    }

    fn open(&self) -> Receiver<String> {
        let (sender, receiver) = mpsc::channel();
        *self
            .window
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(sender);
        receiver
    }

    fn close(&self) {
        *self
            .window
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = None;
    }
}

impl PromptInput for PromptMailbox {
    fn window(&self) -> Box<dyn LineSource + '_> {
        Box::new(MailboxWindow {
            lines: ChannelLines::new(self.open()),
            mailbox: self,
        })
    }
}

struct MailboxWindow<'a> {
    lines: ChannelLines,
    mailbox: &'a PromptMailbox,
}

impl LineSource for MailboxWindow<'_> {
    fn poll_line(&mut self, timeout: Duration) -> LinePoll {
        match self.lines.poll_line(timeout) {
            // The window owns the sender's counterpart; a disconnect only
            // means the mailbox was reset, which reads as silence.
            LinePoll::Closed => {
                thread::sleep(timeout);
                LinePoll::Timeout
            }
            other => other,
        }
    }
}

impl Drop for MailboxWindow<'_> {
    fn drop(&mut self) {
        self.mailbox.close();
    }
}
