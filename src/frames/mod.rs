//! Input frame discovery
//!
//! A frame is one FITS file in the input directory. Each frame carries an
//! origin id derived from its file name; the origin id names the frame's output
//! subdirectory and is stamped on every object detected in it.

use globset::{Glob, GlobMatcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod partition;

pub use partition::{partition, partition_bounds};

/// Setup errors while enumerating frames. These abort the run.
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Input directory does not exist or is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Failed to read input directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid frame pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("Frames '{first}' and '{second}' share origin id '{origin}'")]
    DuplicateOrigin {
        origin: String,
        first: String,
        second: String,
    },
}

/// One input frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub name: String,
    pub path: PathBuf,
    pub origin: String,
}

impl InputFile {
    pub fn new(path: PathBuf, delimiter: &str) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let origin = origin_id(&name, delimiter).to_string();
        Self { name, path, origin }
    }
}

/// Truncate a file name at the first occurrence of `delimiter`.
///
/// A name without the delimiter is its own origin id.
pub fn origin_id<'a>(file_name: &'a str, delimiter: &str) -> &'a str {
    if delimiter.is_empty() {
        return file_name;
    }
    match file_name.find(delimiter) {
        Some(idx) => &file_name[..idx],
        None => file_name,
    }
}

/// Finds frames in a directory by file-name glob
pub struct FrameScanner {
    matcher: GlobMatcher,
    delimiter: String,
}

impl FrameScanner {
    pub fn new(pattern: &str, delimiter: &str) -> Result<Self, FrameError> {
        let matcher = Glob::new(pattern)
            .map_err(|source| FrameError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?
            .compile_matcher();

        Ok(Self {
            matcher,
            delimiter: delimiter.to_string(),
        })
    }

    /// List matching frames sorted by file name, rejecting origin collisions.
    ///
    /// Only files directly inside `dir` are considered.
    pub fn scan(&self, dir: &Path) -> Result<Vec<InputFile>, FrameError> {
        if !dir.is_dir() {
            return Err(FrameError::NotADirectory(dir.to_path_buf()));
        }

        let read_err = |source: std::io::Error| FrameError::ReadDir {
            path: dir.to_path_buf(),
            source,
        };

        let mut frames = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(read_err)? {
            let path = entry.map_err(read_err)?.path();
            // follows symlinks, so linked frames count as frames
            if !path.is_file() {
                continue;
            }
            let matched = path
                .file_name()
                .is_some_and(|name| self.matcher.is_match(Path::new(name)));
            if matched {
                frames.push(InputFile::new(path, &self.delimiter));
            }
        }

        frames.sort_by(|a, b| a.name.cmp(&b.name));
        ensure_unique_origins(&frames)?;

        tracing::debug!(count = frames.len(), dir = %dir.display(), "Enumerated frames");
        Ok(frames)
    }
}

/// Two frames with the same origin would write into the same subdirectory
fn ensure_unique_origins(frames: &[InputFile]) -> Result<(), FrameError> {
    let mut seen: HashMap<&str, &str> = HashMap::with_capacity(frames.len());
    for frame in frames {
        if let Some(first) = seen.insert(&frame.origin, &frame.name) {
            return Err(FrameError::DuplicateOrigin {
                origin: frame.origin.clone(),
                first: first.to_string(),
                second: frame.name.clone(),
            });
        }
    }
    Ok(())
}
