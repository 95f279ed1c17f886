//! Durable key/value store that survives a device reset.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use crate::error::StoreError;

/// Integer-keyed blob store.
pub trait DurableStore {
    fn set(&mut self, key: u16, data: &[u8]) -> Result<(), StoreError>;

    /// Copy the blob under `key` into `buf` and return its actual length.
    fn get(&self, key: u16, buf: &mut [u8]) -> Result<usize, StoreError>;
}

fn copy_out(key: u16, stored: &[u8], buf: &mut [u8]) -> Result<usize, StoreError> {
    if stored.len() > buf.len() {
        return Err(StoreError::BufferTooSmall {
            key,
            actual: stored.len(),
            capacity: buf.len(),
        });
    }
    buf[..stored.len()].copy_from_slice(stored);
    Ok(stored.len())
}

// ---------------------------------------------------------------------------
// FileStore
// ---------------------------------------------------------------------------

/// All entries in one JSON file. Every `set` rewrites the file through a
/// temporary sibling, so a reset mid-write leaves the previous contents.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> Result<BTreeMap<u16, Vec<u8>>, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl DurableStore for FileStore {
    fn set(&mut self, key: u16, data: &[u8]) -> Result<(), StoreError> {
        let mut entries = self.load()?;
        entries.insert(key, data.to_vec());

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        serde_json::to_writer(&mut tmp, &entries)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;
        log::debug!("store: key {key} <- {} bytes ({})", data.len(), self.path.display());
        Ok(())
    }

    fn get(&self, key: u16, buf: &mut [u8]) -> Result<usize, StoreError> {
        let entries = self.load()?;
        let stored = entries.get(&key).ok_or(StoreError::NotFound(key))?;
        copy_out(key, stored, buf)
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Map-backed store. Survives a simulated reset as long as the value itself
/// is kept outside the simulated device lifetime.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<u16, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DurableStore for MemoryStore {
    fn set(&mut self, key: u16, data: &[u8]) -> Result<(), StoreError> {
        self.entries.insert(key, data.to_vec());
        Ok(())
    }

    fn get(&self, key: u16, buf: &mut [u8]) -> Result<usize, StoreError> {
        let stored = self.entries.get(&key).ok_or(StoreError::NotFound(key))?;
        copy_out(key, stored, buf)
    }
}

impl<S: DurableStore + ?Sized> DurableStore for &mut S {
    fn set(&mut self, key: u16, data: &[u8]) -> Result<(), StoreError> {
        (**self).set(key, data)
    }

    fn get(&self, key: u16, buf: &mut [u8]) -> Result<usize, StoreError> {
        (**self).get(key, buf)
    }
}
