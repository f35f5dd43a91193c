use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::time::{Duration, Instant};

use crate::config::SourcesConfig;

const EPSILON: f64 = 1e-4;

/// Attempts-per-second tracker for the active target or source.
#[derive(Debug, Clone)]
pub struct RateEstimator {
    checked: u64,
    start: Instant,
    min_rate: f64,
}

impl RateEstimator {
    /// `min_rate` floors the observed rate so that early estimates, taken
    /// before many attempts have completed, stay bounded.
    pub fn new(min_rate: f64, start: Instant) -> Self {
        Self {
            checked: 0,
            start,
            min_rate: min_rate.max(0.0),
        }
    }

    pub fn checked(&self) -> u64 {
        self.checked
    }

    pub fn record(&mut self, attempts: u64) {
        self.checked += attempts;
    }

    pub fn elapsed_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.start)
    }

    pub fn rate_at(&self, now: Instant) -> f64 {
        let elapsed = self.elapsed_at(now).as_secs_f64().max(EPSILON);
        (self.checked as f64 / elapsed).max(self.min_rate)
    }

    pub fn rate(&self) -> f64 {
        self.rate_at(Instant::now())
    }

    /// Seconds needed to get through `remaining` candidates at the current rate.
    pub fn eta_at(&self, remaining: u64, now: Instant) -> f64 {
        remaining as f64 / self.rate_at(now).max(EPSILON)
    }

    pub fn eta(&self, remaining: u64) -> f64 {
        self.eta_at(remaining, Instant::now())
    }
}

/// Line count for progress totals: exact for sources up to the configured
/// threshold, extrapolated from a prefix sample above it.
pub fn count_lines(path: &Path, settings: &SourcesConfig) -> io::Result<u64> {
    let size = path.metadata()?.len();
    if size <= settings.exact_count_threshold_bytes {
        return count_lines_exact(path);
    }
    estimate_lines(path, settings)
}

/// Counts lines the way a line reader would: a trailing fragment without a
/// separator still counts as a line.
pub fn count_lines_exact(path: &Path) -> io::Result<u64> {
    let mut file = File::open(path)?;
    let mut buffer = vec![0_u8; 64 * 1024];
    let mut lines = 0_u64;
    let mut last = None;

    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        lines += buffer[..read].iter().filter(|byte| **byte == b'\n').count() as u64;
        last = Some(buffer[read - 1]);
    }

    match last {
        Some(byte) if byte != b'\n' => Ok(lines + 1),
        _ => Ok(lines),
    }
}

/// Extrapolates a line count from the bytes-per-line ratio of a prefix.
pub fn estimate_lines(path: &Path, settings: &SourcesConfig) -> io::Result<u64> {
    let size = path.metadata()?.len();
    if size == 0 {
        return Ok(0);
    }

    let mut sample = Vec::new();
    File::open(path)?
        .take(settings.sample_bytes.min(size))
        .read_to_end(&mut sample)?;
    if sample.is_empty() {
        return Ok(0);
    }

    let separators = sample.iter().filter(|byte| **byte == b'\n').count();
    let bytes_per_line = if separators == 0 {
        settings.fallback_line_length as f64
    } else {
        sample.len() as f64 / separators as f64
    };

    Ok(((size as f64 / bytes_per_line.max(1.0)) as u64).max(1))
}
