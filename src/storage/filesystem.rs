use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

use super::traits::KeyValueStore;

/// Key-value store backed by a single JSON file.
///
/// Writes go through a temp file plus rename so a crash mid-write never
/// leaves a truncated store behind. A corrupt file is discarded and treated
/// as empty rather than failing startup.
pub struct FilesystemStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FilesystemStore {
    /// Open a store file, creating an empty store if it does not exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!("discarding corrupt store file {:?}: {}", path, e);
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read store file {:?}", path))
            }
        };
        Ok(FilesystemStore { path, entries })
    }

    fn write_out(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create store directory {:?}", parent))?;
        }

        let temp_path = self.path.with_extension("tmp");
        let json = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&temp_path, json)?;

        // Atomic rename (atomic on POSIX systems)
        fs::rename(&temp_path, &self.path)
            .with_context(|| format!("failed to replace store file {:?}", self.path))?;

        Ok(())
    }
}

impl KeyValueStore for FilesystemStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        self.write_out()
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        if self.entries.remove(key).is_some() {
            self.write_out()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.write_out()
    }
}
