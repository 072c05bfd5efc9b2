//! Completion log for cleanup steps: a JSON object of step name → timestamp.

use crate::geo::Result;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

fn read(path: &Path) -> Result<BTreeMap<String, String>> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(serde_json::from_str(&raw)?),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(e) => Err(e.into()),
    }
}

/// Whether `step` has completed before.
pub fn has_done(path: &Path, step: &str) -> Result<bool> {
    Ok(read(path)?.contains_key(step))
}

/// Record that `step` completed now.
pub fn log_done(path: &Path, step: &str) -> Result<()> {
    let mut log = read(path)?;
    log.insert(step.to_string(), chrono::Local::now().to_rfc3339());
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, serde_json::to_string_pretty(&log)?)?;
    Ok(())
}
