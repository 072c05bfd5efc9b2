//! File-based resolution cache.
//!
//! Keys are the exact address strings handed to the resolver. Entries never
//! expire. The whole map is read once and written back whole; there is no
//! incremental mode and no multi-writer coordination.

use super::types::{GeocodeResult, Result};
use log::debug;
use std::collections::HashMap;
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// The resolution cache.
#[derive(Debug, Clone)]
pub struct ResolutionCache {
    path: PathBuf,
    entries: HashMap<String, GeocodeResult>,
}

impl ResolutionCache {
    /// Load the cache stored at `path`. A missing file is an empty cache.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = Self::read_file(&path)?.unwrap_or_default();
        debug!("Loaded {} cached geocodes from {}", entries.len(), path.display());
        Ok(Self { path, entries })
    }

    /// An empty cache that will be written to `path` on save.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: HashMap::new(),
        }
    }

    fn read_file(path: &Path) -> Result<Option<HashMap<String, GeocodeResult>>> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&data)?))
    }

    /// Write the full mapping back, replacing whatever was stored before.
    ///
    /// The data goes to a temporary file in the same directory which is then
    /// renamed over the cache, so an interrupted save leaves the old cache
    /// intact.
    pub fn save(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer(&mut writer, &self.entries)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        debug!("Saved {} geocodes to {}", self.entries.len(), self.path.display());
        Ok(())
    }

    pub fn get(&self, address: &str) -> Option<&GeocodeResult> {
        self.entries.get(address)
    }

    pub fn contains(&self, address: &str) -> bool {
        self.entries.contains_key(address)
    }

    pub fn insert(&mut self, address: impl Into<String>, result: GeocodeResult) {
        self.entries.insert(address.into(), result);
    }

    pub fn entries(&self) -> &HashMap<String, GeocodeResult> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
