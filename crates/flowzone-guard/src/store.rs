//! Sentinel file: its existence flags an unclean exit, its contents carry
//! the crash history across restarts.

use crate::error::Result;
use crate::event::CrashEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct PersistedState {
    #[serde(default)]
    pub(crate) crashes: Vec<CrashEvent>,
    #[serde(default)]
    pub(crate) component_failures: BTreeMap<String, Vec<DateTime<Utc>>>,
}

impl PersistedState {
    pub(crate) fn clear(&mut self) {
        self.crashes.clear();
        self.component_failures.clear();
    }
}

/// `Ok(None)` if there is no sentinel; `Err` if it exists but cannot be read
/// or parsed.
pub(crate) fn load(path: &Path) -> Result<Option<PersistedState>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if contents.trim().is_empty() {
        return Ok(Some(PersistedState::default()));
    }
    Ok(Some(serde_json::from_str(&contents)?))
}

/// Write through a temp file and rename so a crash mid-write never leaves
/// a truncated sentinel.
pub(crate) fn save(path: &Path, state: &PersistedState) -> Result<()> {
    let json = serde_json::to_string_pretty(state)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

pub(crate) fn remove(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
