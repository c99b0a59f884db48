//! Append-only plaintext log of crash guard transitions.

use crate::error::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub(crate) struct Journal {
    path: PathBuf,
}

impl Journal {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// One line: `2024-05-01T12:00:00.000Z | message`.
    pub(crate) fn append(&self, at: DateTime<Utc>, message: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(
            file,
            "{} | {}",
            at.to_rfc3339_opts(SecondsFormat::Millis, true),
            message
        )?;
        Ok(())
    }
}
