use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use imgcrack_core::candidates::CandidateSource;
use imgcrack_core::config::ImgcrackConfig;
use thiserror::Error;

use crate::App;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("no disk images found in {} (looked for .{})", dir.display(), extensions.join(", ."))]
    NoTargets {
        dir: PathBuf,
        extensions: Vec<String>,
    },
    #[error("no candidate sources found in {} (looked for *.{extension})", dir.display())]
    NoSources { dir: PathBuf, extension: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    pub targets: Vec<PathBuf>,
    pub sources: Vec<CandidateSource>,
}

impl<'a> App<'a> {
    /// Fails when either list comes up empty.
    pub fn discover(
        &self,
        config: &ImgcrackConfig,
        targets_dir: &Path,
        sources_dir: &Path,
    ) -> Result<Discovery> {
        let targets = discover_targets(targets_dir, &config.mount.image_extensions)?;
        if targets.is_empty() {
            return Err(DiscoveryError::NoTargets {
                dir: targets_dir.to_path_buf(),
                extensions: config.mount.image_extensions.clone(),
            }
            .into());
        }

        let sources = discover_sources(sources_dir, &config.sources.extension)?;
        if sources.is_empty() {
            return Err(DiscoveryError::NoSources {
                dir: sources_dir.to_path_buf(),
                extension: config.sources.extension.clone(),
            }
            .into());
        }

        tracing::info!(
            targets = targets.len(),
            sources = sources.len(),
            "discovery complete"
        );
        Ok(Discovery { targets, sources })
    }
}

/// Image files and bundles directly inside `dir`, sorted by path. Sparse
/// bundles are directories, so entry kind is not checked.
pub fn discover_targets(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let mut targets = list_dir(dir)?
        .into_iter()
        .filter(|path| has_extension(path, extensions))
        .collect::<Vec<_>>();
    targets.sort();
    Ok(targets)
}

/// Regular files with `extension` directly inside `dir`, smallest first.
pub fn discover_sources(dir: &Path, extension: &str) -> Result<Vec<CandidateSource>> {
    let extensions = [extension.to_string()];
    let mut sources = list_dir(dir)?
        .into_iter()
        .filter(|path| path.is_file() && has_extension(path, &extensions))
        .map(CandidateSource::from_path)
        .collect::<Vec<_>>();
    sources.sort_by(|left, right| {
        left.size_bytes
            .cmp(&right.size_bytes)
            .then_with(|| left.path.cmp(&right.path))
    });
    Ok(sources)
}

fn list_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("failed to read directory {}", dir.display()))?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read entry in {}", dir.display()))?;
        paths.push(entry.path());
    }
    Ok(paths)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    let Some(extension) = path.extension().and_then(|value| value.to_str()) else {
        return false;
    };
    extensions
        .iter()
        .any(|expected| expected.eq_ignore_ascii_case(extension))
}
