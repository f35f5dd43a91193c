use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to open candidate source {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("candidate source {} is empty", path.display())]
    Empty { path: PathBuf },
}

/// An on-disk list of candidate secrets, one per line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSource {
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl CandidateSource {
    pub fn new(path: impl Into<PathBuf>, size_bytes: u64) -> Self {
        Self {
            path: path.into(),
            size_bytes,
        }
    }

    /// Reads the size from disk; a missing file reports zero bytes.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let size_bytes = fs::metadata(&path).map(|meta| meta.len()).unwrap_or(0);
        Self { path, size_bytes }
    }

    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|value| value.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Starts a fresh forward-only pass over the candidates.
    pub fn open(&self) -> Result<CandidateCursor, SourceError> {
        CandidateCursor::open(&self.path)
    }
}

/// Lazily yields non-empty lines with trailing `\r\n` / `\n` removed.
pub struct CandidateCursor {
    reader: BufReader<File>,
    buffer: Vec<u8>,
    position: u64,
}

impl CandidateCursor {
    fn open(path: &Path) -> Result<Self, SourceError> {
        let file = File::open(path).map_err(|source| SourceError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self {
            reader: BufReader::new(file),
            buffer: Vec::new(),
            position: 0,
        })
    }

    /// Number of candidates yielded so far.
    pub fn position(&self) -> u64 {
        self.position
    }
}

impl Iterator for CandidateCursor {
    type Item = io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buffer.clear();
            match self.reader.read_until(b'\n', &mut self.buffer) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(error) => return Some(Err(error)),
            }

            let mut end = self.buffer.len();
            while end > 0 && matches!(self.buffer[end - 1], b'\n' | b'\r') {
                end -= 1;
            }
            if end == 0 {
                continue;
            }

            self.position += 1;
            return Some(Ok(self.buffer[..end].to_vec()));
        }
    }
}
