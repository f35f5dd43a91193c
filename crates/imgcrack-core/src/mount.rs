use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use thiserror::Error;

use crate::command_runner::{CommandOutput, CommandRunner};
use crate::config::MountConfig;

#[derive(Debug, Error)]
pub enum MountError {
    #[error("failed to start {program} attach for {}: {source}", target.display())]
    Spawn {
        program: String,
        target: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to execute {program}: {message}")]
    Execute { program: String, message: String },
    #[error("{program} {command} failed (exit {status}) {stderr}")]
    DetachFailed {
        program: String,
        command: String,
        status: i32,
        stderr: String,
    },
}

/// A running attach attempt. Exit codes are `-1` when the process was ended
/// by a signal.
pub trait AttachProcess {
    fn try_wait(&mut self) -> io::Result<Option<i32>>;
    fn terminate(&mut self) -> io::Result<()>;
    fn kill(&mut self) -> io::Result<()>;
}

/// The mount namespace seam. Detach operations are idempotent: detaching
/// something that is not attached succeeds without doing anything.
pub trait MountBackend {
    fn spawn_attach(
        &self,
        target: &Path,
        secret: &[u8],
    ) -> Result<Box<dyn AttachProcess>, MountError>;
    fn detach_target(&self, target: &Path) -> Result<(), MountError>;
    fn detach_all(&self) -> Result<(), MountError>;
}

pub struct HdiutilBackend<'a> {
    runner: &'a dyn CommandRunner,
    config: MountConfig,
}

impl<'a> HdiutilBackend<'a> {
    pub fn new(runner: &'a dyn CommandRunner, config: MountConfig) -> Self {
        Self { runner, config }
    }

    pub fn mount_point(&self, target: &Path) -> PathBuf {
        self.config
            .volumes_dir
            .join(volume_name(target, &self.config.image_extensions))
    }

    fn run_checked(&self, program: &str, args: &[&str]) -> Result<CommandOutput, MountError> {
        let output = self
            .runner
            .run(program, args)
            .map_err(|error| MountError::Execute {
                program: program.to_string(),
                message: error.to_string(),
            })?;

        if output.succeeded() {
            return Ok(output);
        }

        Err(MountError::DetachFailed {
            program: program.to_string(),
            command: args.join(" "),
            status: output.status_code,
            stderr: output.stderr.trim().to_string(),
        })
    }
}

impl MountBackend for HdiutilBackend<'_> {
    fn spawn_attach(
        &self,
        target: &Path,
        secret: &[u8],
    ) -> Result<Box<dyn AttachProcess>, MountError> {
        let mut child = Command::new(&self.config.program)
            .arg("attach")
            .arg(target)
            .args(["-stdinpass", "-nobrowse", "-quiet", "-readonly", "-noverify"])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| MountError::Spawn {
                program: self.config.program.clone(),
                target: target.to_path_buf(),
                source,
            })?;

        // hdiutil reads the passphrase until EOF, so stdin is closed right
        // after the write. A write failure just means the attempt fails.
        if let Some(mut stdin) = child.stdin.take()
            && let Err(error) = stdin.write_all(secret)
        {
            tracing::debug!(%error, "failed to write secret to attach stdin");
        }

        Ok(Box::new(HdiutilProcess {
            child,
            reaped: false,
        }))
    }

    fn detach_target(&self, target: &Path) -> Result<(), MountError> {
        let mount_point = self.mount_point(target);
        if !mount_point.exists() {
            tracing::trace!(mount_point = %mount_point.display(), "nothing attached");
            return Ok(());
        }

        let mount_arg = mount_point.to_string_lossy();
        self.run_checked(&self.config.program, &["detach", mount_arg.as_ref()])?;
        tracing::debug!(mount_point = %mount_point.display(), "detached volume");
        Ok(())
    }

    fn detach_all(&self) -> Result<(), MountError> {
        let info = self.run_checked(&self.config.program, &["info"])?;
        let disks = parse_attached_disks(&info.stdout);
        let mut first_error = None;

        for disk in &disks {
            let result = if self.config.sweep_with_sudo {
                self.run_checked(
                    "sudo",
                    &["-n", &self.config.program, "detach", "-force", disk],
                )
            } else {
                self.run_checked(&self.config.program, &["detach", "-force", disk])
            };

            match result {
                Ok(_) => tracing::debug!(disk = disk.as_str(), "force detached disk"),
                Err(error) => {
                    tracing::debug!(disk = disk.as_str(), %error, "force detach failed");
                    first_error.get_or_insert(error);
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

struct HdiutilProcess {
    child: Child,
    reaped: bool,
}

impl AttachProcess for HdiutilProcess {
    fn try_wait(&mut self) -> io::Result<Option<i32>> {
        let status = self.child.try_wait()?;
        if status.is_some() {
            self.reaped = true;
        }
        Ok(status.map(|value| value.code().unwrap_or(-1)))
    }

    fn terminate(&mut self) -> io::Result<()> {
        if self.reaped {
            return Ok(());
        }

        #[cfg(unix)]
        {
            use nix::sys::signal::{Signal, kill};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(self.child.id() as i32);
            kill(pid, Signal::SIGTERM).map_err(io::Error::from)
        }

        #[cfg(not(unix))]
        {
            self.child.kill()
        }
    }

    fn kill(&mut self) -> io::Result<()> {
        if self.reaped {
            return Ok(());
        }
        self.child.kill()
    }
}

impl Drop for HdiutilProcess {
    fn drop(&mut self) {
        if !self.reaped {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Volume name hdiutil uses for an image: the basename without a known
/// image extension, falling back to the last extension.
pub fn volume_name(target: &Path, extensions: &[String]) -> String {
    let base = target
        .file_name()
        .map(|value| value.to_string_lossy().to_string())
        .unwrap_or_default();
    let lowered = base.to_ascii_lowercase();

    for extension in extensions {
        let suffix = format!(".{}", extension.to_ascii_lowercase());
        if lowered.len() > suffix.len() && lowered.ends_with(&suffix) {
            return base[..base.len() - suffix.len()].to_string();
        }
    }

    Path::new(&base)
        .file_stem()
        .map(|value| value.to_string_lossy().to_string())
        .unwrap_or(base)
}

/// Whole-disk device nodes listed by `hdiutil info`, deduplicated in order.
/// Partition nodes such as `/dev/disk4s1` collapse into `/dev/disk4`.
pub fn parse_attached_disks(info: &str) -> Vec<String> {
    let mut disks = Vec::new();

    for line in info.lines() {
        let Some(field) = line.split_whitespace().next() else {
            continue;
        };
        let Some(rest) = field.strip_prefix("/dev/disk") else {
            continue;
        };
        let number: String = rest.chars().take_while(char::is_ascii_digit).collect();
        if number.is_empty() {
            continue;
        }

        let disk = format!("/dev/disk{number}");
        if !disks.contains(&disk) {
            disks.push(disk);
        }
    }

    disks
}
