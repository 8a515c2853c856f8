use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::error::{StoreError, StoreResult};

/// A key-value durable store holding named slots of serialized text.
pub trait StorageBackend {
    /// Read a slot. `Ok(None)` means the slot has never been written.
    fn read(&self, slot: &str) -> StoreResult<Option<String>>;

    /// Replace a slot's contents as one unit.
    fn write(&mut self, slot: &str, contents: &str) -> StoreResult<()>;
}

/// Stores each slot as `<dir>/<slot>.json`.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn slot_path(&self, slot: &str) -> PathBuf {
        self.dir.join(format!("{}.json", slot))
    }
}

impl StorageBackend for FileBackend {
    fn read(&self, slot: &str) -> StoreResult<Option<String>> {
        match std::fs::read_to_string(self.slot_path(slot)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, slot: &str, contents: &str) -> StoreResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.slot_path(slot);
        let tmp_path = self.dir.join(format!(".{}.json.tmp", slot));

        // Write beside the target then rename, so readers never see half a slot.
        let mut file = std::fs::File::create(&tmp_path)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        drop(file);
        std::fs::rename(&tmp_path, &path)?;
        Ok(())
    }
}

/// Keeps slots in memory. Used in tests and for throwaway stores.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    slots: HashMap<String, String>,
    fail_writes: bool,
    writes: usize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a slot with raw text, bypassing the store.
    pub fn with_slot(mut self, slot: &str, contents: impl Into<String>) -> Self {
        self.slots.insert(slot.to_string(), contents.into());
        self
    }

    pub fn slot(&self, slot: &str) -> Option<String> {
        self.slots.get(slot).cloned()
    }

    /// Make subsequent writes fail, simulating a full or unavailable store.
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes
    }
}

impl StorageBackend for MemoryBackend {
    fn read(&self, slot: &str) -> StoreResult<Option<String>> {
        Ok(self.slot(slot))
    }

    fn write(&mut self, slot: &str, contents: &str) -> StoreResult<()> {
        if self.fail_writes {
            return Err(StoreError::Unavailable("quota exceeded".to_string()));
        }
        self.slots.insert(slot.to_string(), contents.to_string());
        self.writes += 1;
        Ok(())
    }
}
