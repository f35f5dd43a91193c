#![allow(dead_code)]

use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use imgcrack_core::command_runner::{CommandOutput, CommandRunner};
use imgcrack_core::config::ImgcrackConfig;
use imgcrack_core::mount::{AttachProcess, MountBackend, MountError};

#[derive(Debug, Clone)]
pub struct Call {
    pub program: String,
    pub args: Vec<String>,
}

#[derive(Default)]
pub struct QueueRunner {
    outputs: Mutex<VecDeque<anyhow::Result<CommandOutput>>>,
    calls: Mutex<Vec<Call>>,
}

impl QueueRunner {
    pub fn new(outputs: Vec<anyhow::Result<CommandOutput>>) -> Self {
        Self {
            outputs: Mutex::new(outputs.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl CommandRunner for QueueRunner {
    fn run(&self, program: &str, args: &[&str]) -> anyhow::Result<CommandOutput> {
        self.calls.lock().expect("calls lock").push(Call {
            program: program.to_string(),
            args: args.iter().map(|value| (*value).to_string()).collect(),
        });

        self.outputs
            .lock()
            .expect("outputs lock")
            .pop_front()
            .unwrap_or_else(|| Err(anyhow!("missing scripted output")))
    }
}

pub fn output(stdout: &str, stderr: &str, status: i32) -> anyhow::Result<CommandOutput> {
    Ok(CommandOutput {
        status_code: status,
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Attach { target: PathBuf, secret: String },
    Detach(PathBuf),
    Sweep,
}

/// Accepts only the listed (image, password) pairs. Rejected attempts exit
/// non-zero at once unless `hang_on_reject` is set, in which case they run
/// until terminated.
#[derive(Default)]
pub struct FakeBackend {
    accept: Vec<(PathBuf, String)>,
    hang_on_reject: bool,
    events: Arc<Mutex<Vec<Event>>>,
    live: Arc<Mutex<usize>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accepting(mut self, target: &Path, secret: &str) -> Self {
        self.accept.push((target.to_path_buf(), secret.to_string()));
        self
    }

    pub fn hanging_on_reject(mut self) -> Self {
        self.hang_on_reject = true;
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().expect("events lock").clone()
    }

    pub fn attempts(&self, target: &Path) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Attach {
                    target: attached,
                    secret,
                } if attached == target => Some(secret),
                _ => None,
            })
            .collect()
    }

    pub fn live_processes(&self) -> usize {
        *self.live.lock().expect("live lock")
    }
}

impl MountBackend for FakeBackend {
    fn spawn_attach(
        &self,
        target: &Path,
        secret: &[u8],
    ) -> Result<Box<dyn AttachProcess>, MountError> {
        let secret = String::from_utf8_lossy(secret).to_string();
        let accepted = self
            .accept
            .iter()
            .any(|(path, value)| path == target && *value == secret);
        self.events.lock().expect("events lock").push(Event::Attach {
            target: target.to_path_buf(),
            secret,
        });

        *self.live.lock().expect("live lock") += 1;
        let exit = match (accepted, self.hang_on_reject) {
            (true, _) => Some(0),
            (false, false) => Some(1),
            (false, true) => None,
        };
        Ok(Box::new(FakeProcess {
            exit,
            reaped: false,
            live: Arc::clone(&self.live),
        }))
    }

    fn detach_target(&self, target: &Path) -> Result<(), MountError> {
        self.events
            .lock()
            .expect("events lock")
            .push(Event::Detach(target.to_path_buf()));
        Ok(())
    }

    fn detach_all(&self) -> Result<(), MountError> {
        self.events.lock().expect("events lock").push(Event::Sweep);
        Ok(())
    }
}

struct FakeProcess {
    exit: Option<i32>,
    reaped: bool,
    live: Arc<Mutex<usize>>,
}

impl FakeProcess {
    fn finish(&mut self, code: i32) -> Option<i32> {
        let code = *self.exit.get_or_insert(code);
        if !self.reaped {
            self.reaped = true;
            *self.live.lock().expect("live lock") -= 1;
        }
        Some(code)
    }
}

impl AttachProcess for FakeProcess {
    fn try_wait(&mut self) -> io::Result<Option<i32>> {
        Ok(match self.exit {
            Some(code) => self.finish(code),
            None => None,
        })
    }

    fn terminate(&mut self) -> io::Result<()> {
        self.finish(-15);
        Ok(())
    }

    fn kill(&mut self) -> io::Result<()> {
        self.finish(-9);
        Ok(())
    }
}

/// Defaults tightened so runs finish in milliseconds.
pub fn fast_config() -> ImgcrackConfig {
    let mut config = ImgcrackConfig::default();
    config.attempt.poll_interval_ms = 1;
    config.attempt.kill_grace_ms = 20;
    config.input.listener_poll_ms = 5;
    config
}

pub fn write_source(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
    let path = dir.join(name);
    let mut contents = lines.join("\n");
    contents.push('\n');
    fs::write(&path, contents).expect("write source");
    path
}
