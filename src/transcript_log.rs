//! Append-only log of STT transcripts
//!
//! One line per transcript: `{RFC 3339 UTC timestamp}\t{text}`.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};

use crate::Result;

/// Transcript log file
#[derive(Debug, Clone)]
pub struct TranscriptLog {
    path: PathBuf,
}

impl TranscriptLog {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one transcript, creating the file and its directory if needed
    ///
    /// Line breaks inside the transcript are folded to spaces so every
    /// entry stays on one line.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written
    pub fn append(&self, text: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let line = text.replace(['\r', '\n'], " ");
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        writeln!(
            file,
            "{}\t{line}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
        )?;
        Ok(())
    }
}
