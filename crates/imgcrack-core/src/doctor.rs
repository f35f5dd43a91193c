use std::env;
use std::fmt;
use std::path::Path;

use crate::command_runner::CommandRunner;
use crate::config::{ImgcrackConfig, load_config};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    Pass,
    Fail,
}

impl fmt::Display for CheckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Fail => write!(f, "FAIL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoctorCheck {
    pub name: String,
    pub state: CheckState,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoctorReport {
    pub checks: Vec<DoctorCheck>,
}

impl DoctorReport {
    pub fn has_failures(&self) -> bool {
        self.checks
            .iter()
            .any(|check| check.state == CheckState::Fail)
    }

    pub fn summary(&self) -> String {
        let passed = self
            .checks
            .iter()
            .filter(|check| check.state == CheckState::Pass)
            .count();
        let failed = self.checks.len().saturating_sub(passed);
        format!("{passed} passed, {failed} failed")
    }
}

/// Environment checks. Returns the effective config alongside the report so
/// callers can run discovery checks with the same settings.
pub fn run_doctor_with_runner(
    runner: &dyn CommandRunner,
    config_path: &Path,
) -> (DoctorReport, ImgcrackConfig) {
    let mut checks = Vec::new();

    checks.push(match env::consts::OS {
        "macos" => pass_check("os is supported", "detected macOS"),
        detected => fail_check(
            "os is supported",
            format!("detected {detected}, hdiutil attach requires macOS"),
        ),
    });

    let config = if config_path.exists() {
        match load_config(config_path) {
            Ok(config) => {
                checks.push(pass_check(
                    "config parses and validates",
                    format!("loaded {}", config_path.display()),
                ));
                config
            }
            Err(error) => {
                checks.push(fail_check("config parses and validates", error.to_string()));
                ImgcrackConfig::default()
            }
        }
    } else {
        checks.push(pass_check(
            "config parses and validates",
            format!("no file at {}, using defaults", config_path.display()),
        ));
        ImgcrackConfig::default()
    };

    let program = config.mount.program.as_str();
    checks.push(if is_executable_in_path(program) {
        pass_check(
            "mount program is installed",
            format!("{program} executable found"),
        )
    } else {
        fail_check(
            "mount program is installed",
            format!("{program} executable not found in PATH"),
        )
    });

    if config.mount.sweep_with_sudo {
        checks.push(check_sudo_non_interactive(runner));
    } else {
        checks.push(pass_check(
            "sudo available for detach sweep",
            "sweep runs without sudo",
        ));
    }

    (DoctorReport { checks }, config)
}

fn check_sudo_non_interactive(runner: &dyn CommandRunner) -> DoctorCheck {
    match runner.run("sudo", &["-n", "true"]) {
        Ok(output) if output.succeeded() => pass_check(
            "sudo available for detach sweep",
            "sudo runs without a password prompt",
        ),
        Ok(output) => fail_check(
            "sudo available for detach sweep",
            format!(
                "sudo -n exited {}: {}; run `sudo -v` first or set mount.sweep_with_sudo = false",
                output.status_code,
                output.stderr.trim()
            ),
        ),
        Err(error) => fail_check(
            "sudo available for detach sweep",
            format!("failed to execute sudo: {error}"),
        ),
    }
}

pub fn pass_check(name: &str, details: impl Into<String>) -> DoctorCheck {
    DoctorCheck {
        name: name.to_string(),
        state: CheckState::Pass,
        details: details.into(),
    }
}

pub fn fail_check(name: &str, details: impl Into<String>) -> DoctorCheck {
    DoctorCheck {
        name: name.to_string(),
        state: CheckState::Fail,
        details: details.into(),
    }
}

pub fn is_executable_in_path(program: &str) -> bool {
    let program_path = Path::new(program);

    if program_path.is_absolute() || program.contains('/') {
        return is_executable_file(program_path);
    }

    let Some(path_value) = env::var_os("PATH") else {
        return false;
    };

    env::split_paths(&path_value)
        .map(|directory| directory.join(program))
        .any(|candidate| is_executable_file(&candidate))
}

fn is_executable_file(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match path.metadata() {
            Ok(metadata) => metadata.permissions().mode() & 0o111 != 0,
            Err(_) => false,
        }
    }

    #[cfg(not(unix))]
    {
        true
    }
}
