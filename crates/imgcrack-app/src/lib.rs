mod crack;
mod discovery;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use imgcrack_core::command_runner::CommandRunner;
use imgcrack_core::config::{
    ImgcrackConfig, load_config, load_config_or_default, resolve_config_path,
};
use imgcrack_core::doctor::{DoctorReport, fail_check, pass_check, run_doctor_with_runner};

pub use crack::{CrackPlan, RunSession, crack_with_backend};
pub use discovery::{Discovery, DiscoveryError, discover_sources, discover_targets};

pub struct App<'a> {
    pub runner: &'a dyn CommandRunner,
}

impl<'a> App<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    /// Resolves the effective config path. An explicit path must exist; the
    /// default location falls back to built-in defaults when absent.
    pub fn load_config(&self, explicit: Option<&Path>) -> Result<(PathBuf, ImgcrackConfig)> {
        if let Some(path) = explicit {
            if !path.exists() {
                bail!("config file {} does not exist", path.display());
            }
            let config = load_config(path)
                .map_err(|error| anyhow!("invalid config at {}: {error}", path.display()))?;
            return Ok((path.to_path_buf(), config));
        }

        let path = resolve_config_path().context("failed to resolve config path")?;
        let config = load_config_or_default(&path).map_err(|error| {
            anyhow!(
                "invalid config at {}: {error}\nFix the config or pass --config PATH.",
                path.display()
            )
        })?;
        Ok((path, config))
    }

    pub fn doctor(
        &self,
        explicit_config: Option<&Path>,
        targets_dir: &Path,
        sources_dir: &Path,
    ) -> Result<DoctorReport> {
        let config_path = match explicit_config {
            Some(path) => path.to_path_buf(),
            None => resolve_config_path().context("failed to resolve config path")?,
        };
        let (mut report, config) = run_doctor_with_runner(self.runner, &config_path);

        report.checks.push(match discover_targets(targets_dir, &config.mount.image_extensions) {
            Ok(targets) if !targets.is_empty() => pass_check(
                "disk images found",
                format!("{} in {}", targets.len(), targets_dir.display()),
            ),
            Ok(_) => fail_check(
                "disk images found",
                format!("no disk images in {}", targets_dir.display()),
            ),
            Err(error) => fail_check("disk images found", format!("{error:#}")),
        });

        report.checks.push(match discover_sources(sources_dir, &config.sources.extension) {
            Ok(sources) if !sources.is_empty() => pass_check(
                "candidate sources found",
                format!("{} in {}", sources.len(), sources_dir.display()),
            ),
            Ok(_) => fail_check(
                "candidate sources found",
                format!(
                    "no *.{} files in {}",
                    config.sources.extension,
                    sources_dir.display()
                ),
            ),
            Err(error) => fail_check("candidate sources found", format!("{error:#}")),
        });

        Ok(report)
    }
}
