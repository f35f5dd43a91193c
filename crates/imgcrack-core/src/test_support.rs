use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;

use crate::command_runner::{CommandOutput, CommandRunner};
use crate::mount::{AttachProcess, MountBackend, MountError};
use crate::signal_bus::{Signal, SignalBus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub program: String,
    pub args: Vec<String>,
}

#[derive(Default)]
pub struct RecordingRunner {
    outputs: Mutex<VecDeque<anyhow::Result<CommandOutput>>>,
    calls: Mutex<Vec<Call>>,
}

impl RecordingRunner {
    pub fn from_outputs(outputs: Vec<anyhow::Result<CommandOutput>>) -> Self {
        Self {
            outputs: Mutex::new(outputs.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, program: &str, args: &[&str]) -> anyhow::Result<CommandOutput> {
        self.calls.lock().expect("calls lock").push(Call {
            program: program.to_string(),
            args: args.iter().map(|value| (*value).to_string()).collect(),
        });

        self.outputs
            .lock()
            .expect("outputs lock")
            .pop_front()
            .unwrap_or_else(|| Err(anyhow!("missing output")))
    }
}

pub fn output(stdout: &str, stderr: &str, status_code: i32) -> anyhow::Result<CommandOutput> {
    Ok(CommandOutput {
        status_code,
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
    })
}

/// How a scripted attach process behaves once spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    /// Exits with the given code after `polls` calls to `try_wait`.
    ExitAfter { polls: usize, code: i32 },
    /// Never exits on its own; ignores terminate when `stubborn`.
    Hang { stubborn: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    Spawn { target: PathBuf, secret: Vec<u8> },
    Terminate,
    Kill,
    DetachTarget(PathBuf),
    DetachAll,
}

/// Mount backend double. Attempts succeed only for `(target, secret)` pairs
/// listed in `accept`, unless a per-secret script overrides the behavior.
#[derive(Default)]
pub struct ScriptedBackend {
    accept: Vec<(PathBuf, Vec<u8>)>,
    scripts: Vec<(Vec<u8>, Script)>,
    fail_spawn: bool,
    fail_detach: bool,
    raise: Option<(usize, Signal, Arc<SignalBus>)>,
    detaches: Mutex<usize>,
    events: Arc<Mutex<Vec<BackendEvent>>>,
    live: Arc<Mutex<usize>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accepting(mut self, target: &str, secret: &str) -> Self {
        self.accept
            .push((PathBuf::from(target), secret.as_bytes().to_vec()));
        self
    }

    pub fn scripted(mut self, secret: &str, script: Script) -> Self {
        self.scripts.push((secret.as_bytes().to_vec(), script));
        self
    }

    pub fn failing_spawn(mut self) -> Self {
        self.fail_spawn = true;
        self
    }

    pub fn failing_detach(mut self) -> Self {
        self.fail_detach = true;
        self
    }

    /// Raises `signal` on `bus` once the `count`-th targeted detach happens.
    /// The scheduler detaches once on target entry and once per completed
    /// attempt.
    pub fn signal_after_detaches(
        mut self,
        count: usize,
        signal: Signal,
        bus: Arc<SignalBus>,
    ) -> Self {
        self.raise = Some((count, signal, bus));
        self
    }

    pub fn events(&self) -> Vec<BackendEvent> {
        self.events.lock().expect("events lock").clone()
    }

    pub fn attempted_secrets(&self, target: &str) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                BackendEvent::Spawn {
                    target: spawned,
                    secret,
                } if spawned == Path::new(target) => {
                    Some(String::from_utf8_lossy(&secret).to_string())
                }
                _ => None,
            })
            .collect()
    }

    pub fn live_processes(&self) -> usize {
        *self.live.lock().expect("live lock")
    }

    fn record(&self, event: BackendEvent) {
        self.events.lock().expect("events lock").push(event);
    }
}

impl MountBackend for ScriptedBackend {
    fn spawn_attach(
        &self,
        target: &Path,
        secret: &[u8],
    ) -> Result<Box<dyn AttachProcess>, MountError> {
        if self.fail_spawn {
            return Err(MountError::Spawn {
                program: "hdiutil".to_string(),
                target: target.to_path_buf(),
                source: io::Error::new(io::ErrorKind::NotFound, "no such program"),
            });
        }

        self.record(BackendEvent::Spawn {
            target: target.to_path_buf(),
            secret: secret.to_vec(),
        });

        let accepted = self
            .accept
            .iter()
            .any(|(path, value)| path == target && value == secret);
        let script = self
            .scripts
            .iter()
            .find(|(value, _)| value == secret)
            .map(|(_, script)| *script)
            .unwrap_or(Script::ExitAfter {
                polls: 0,
                code: if accepted { 0 } else { 1 },
            });

        *self.live.lock().expect("live lock") += 1;
        Ok(Box::new(ScriptedProcess {
            script,
            polls: 0,
            exited: None,
            events: Arc::clone(&self.events),
            live: Arc::clone(&self.live),
        }))
    }

    fn detach_target(&self, target: &Path) -> Result<(), MountError> {
        self.record(BackendEvent::DetachTarget(target.to_path_buf()));
        let mut detaches = self.detaches.lock().expect("detaches lock");
        *detaches += 1;
        if let Some((count, signal, bus)) = &self.raise
            && *detaches == *count
        {
            bus.set(*signal);
        }
        drop(detaches);

        if self.fail_detach {
            return Err(MountError::Execute {
                program: "hdiutil".to_string(),
                message: "detach unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn detach_all(&self) -> Result<(), MountError> {
        self.record(BackendEvent::DetachAll);
        if self.fail_detach {
            return Err(MountError::Execute {
                program: "hdiutil".to_string(),
                message: "info unavailable".to_string(),
            });
        }
        Ok(())
    }
}

struct ScriptedProcess {
    script: Script,
    polls: usize,
    exited: Option<i32>,
    events: Arc<Mutex<Vec<BackendEvent>>>,
    live: Arc<Mutex<usize>>,
}

impl ScriptedProcess {
    fn exit(&mut self, code: i32) {
        if self.exited.is_none() {
            self.exited = Some(code);
            *self.live.lock().expect("live lock") -= 1;
        }
    }
}

impl AttachProcess for ScriptedProcess {
    fn try_wait(&mut self) -> io::Result<Option<i32>> {
        if let Some(code) = self.exited {
            return Ok(Some(code));
        }
        if let Script::ExitAfter { polls, code } = self.script {
            if self.polls >= polls {
                self.exit(code);
                return Ok(Some(code));
            }
            self.polls += 1;
        }
        Ok(None)
    }

    fn terminate(&mut self) -> io::Result<()> {
        self.events
            .lock()
            .expect("events lock")
            .push(BackendEvent::Terminate);
        if self.script != (Script::Hang { stubborn: true }) {
            self.exit(-15);
        }
        Ok(())
    }

    fn kill(&mut self) -> io::Result<()> {
        self.events.lock().expect("events lock").push(BackendEvent::Kill);
        self.exit(-9);
        Ok(())
    }
}
