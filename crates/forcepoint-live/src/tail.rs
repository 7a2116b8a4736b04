//! Streaming log tail
//!
//! Follows an append-only text log by byte offset. Each poll reads only the
//! bytes appended since the previous one and yields the most recent complete
//! line. An unterminated trailing line is held back until its newline
//! arrives. Starting at the end of a file that stops mid-line drops the rest
//! of that line once it is completed.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::mem;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Read size per syscall [bytes]
const CHUNK_SIZE: usize = 8 * 1024;

#[derive(Debug, Error)]
pub enum TailError {
    #[error("cannot open sensor log {}: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("cannot read sensor log {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
}

impl TailError {
    /// The log does not exist (yet)
    pub fn is_not_found(&self) -> bool {
        match self {
            TailError::Open { source, .. } | TailError::Read { source, .. } => {
                source.kind() == io::ErrorKind::NotFound
            }
        }
    }
}

/// Where the first poll starts reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TailStart {
    /// Read existing content, so the latest record is used right away
    #[default]
    Beginning,
    /// Skip existing content, only lines written after the first poll
    End,
}

/// Offset-tracking reader over a growing file
#[derive(Debug)]
pub struct LogTail {
    path: PathBuf,
    start: TailStart,
    /// Bytes consumed so far
    offset: u64,
    /// Unterminated trailing line
    partial: Vec<u8>,
    /// Bytes up to the next newline belong to a line started before us
    skip_fragment: bool,
    positioned: bool,
    lines: u64,
}

impl LogTail {
    pub fn new(path: impl Into<PathBuf>, start: TailStart) -> Self {
        Self {
            path: path.into(),
            start,
            offset: 0,
            partial: Vec::new(),
            skip_fragment: false,
            positioned: false,
            lines: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Complete non-blank lines seen since creation
    pub fn lines_read(&self) -> u64 {
        self.lines
    }

    /// Forget the offset and any held-back fragment
    pub fn reset(&mut self) {
        self.offset = 0;
        self.partial.clear();
        self.skip_fragment = false;
    }

    /// Read newly appended bytes and return the last complete line, if any
    ///
    /// Trailing `\r` and surrounding whitespace are stripped and blank lines
    /// skipped. If the file is now shorter than the stored offset it was
    /// truncated or replaced and reading restarts at byte 0.
    pub fn poll(&mut self) -> Result<Option<String>, TailError> {
        let mut file = File::open(&self.path).map_err(|source| TailError::Open {
            path: self.path.clone(),
            source,
        })?;
        let len = file.metadata().map_err(|e| self.read_error(e))?.len();

        if !self.positioned {
            if self.start == TailStart::End && len > 0 {
                self.offset = len;
                self.skip_fragment = !self.ends_with_newline(&mut file, len)?;
            }
            self.positioned = true;
        }

        if len < self.offset {
            log::warn!(
                "{} shrank from {} to {} bytes, reading from the start",
                self.path.display(),
                self.offset,
                len
            );
            self.reset();
        }
        if len == self.offset {
            return Ok(None);
        }

        file.seek(SeekFrom::Start(self.offset))
            .map_err(|e| self.read_error(e))?;
        let mut reader = file.take(len - self.offset);
        let mut chunk = [0u8; CHUNK_SIZE];
        let mut latest = None;

        loop {
            let n = match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.read_error(e)),
            };
            self.offset += n as u64;

            for piece in chunk[..n].split_inclusive(|&b| b == b'\n') {
                if self.skip_fragment {
                    self.skip_fragment = piece.last() != Some(&b'\n');
                    continue;
                }
                match piece.split_last() {
                    Some((b'\n', body)) => {
                        self.partial.extend_from_slice(body);
                        if let Some(line) = self.finish_line() {
                            latest = Some(line);
                        }
                    }
                    _ => self.partial.extend_from_slice(piece),
                }
            }
        }

        Ok(latest)
    }

    fn ends_with_newline(&self, file: &mut File, len: u64) -> Result<bool, TailError> {
        let mut last = [0u8; 1];
        file.seek(SeekFrom::Start(len - 1))
            .and_then(|_| file.read_exact(&mut last))
            .map_err(|e| self.read_error(e))?;
        Ok(last[0] == b'\n')
    }

    fn finish_line(&mut self) -> Option<String> {
        let mut bytes = mem::take(&mut self.partial);
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        let line = String::from_utf8_lossy(&bytes);
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        self.lines += 1;
        Some(line.to_string())
    }

    fn read_error(&self, source: io::Error) -> TailError {
        TailError::Read {
            path: self.path.clone(),
            source,
        }
    }
}
