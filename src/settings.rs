//! Persisted key → value settings.
//!
//! Only the output folder is read by the audiobook pipeline; the store itself
//! is generic.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use crate::error::{AudiobookError, Result};

/// Settings key holding the directory finished audiobooks are written to.
pub const OUTPUT_FOLDER_KEY: &str = "output_folder";

pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn all(&self) -> Result<BTreeMap<String, String>>;
}

// ─────────────────────────────────────────────────────────────────────────────
// JsonSettingsStore
// ─────────────────────────────────────────────────────────────────────────────

/// Settings kept in a flat JSON object on disk.
///
/// Every `set` rewrites the whole file through a sibling temp file and a
/// rename, so a crash mid-write leaves the previous contents intact.
#[derive(Debug)]
pub struct JsonSettingsStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> AudiobookError {
        AudiobookError::Settings { path: self.path.clone(), source }
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(self.io_err(e)),
        };
        serde_json::from_slice(&bytes).map_err(|source| AudiobookError::SettingsFormat {
            path: self.path.clone(),
            source,
        })
    }

    fn store(&self, map: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }
        let json = serde_json::to_vec_pretty(map).map_err(|source| {
            AudiobookError::SettingsFormat { path: self.path.clone(), source }
        })?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| self.io_err(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))
    }
}

impl SettingsStore for JsonSettingsStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut map = self.load()?;
        map.insert(key.to_string(), value.to_string());
        self.store(&map)
    }

    fn all(&self) -> Result<BTreeMap<String, String>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.load()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MemorySettingsStore
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn all(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.values.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Output folder
// ─────────────────────────────────────────────────────────────────────────────

/// `~/TtsAudiobook/outputs`, or `./outputs` when there is no home directory.
pub fn default_output_folder() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join("TtsAudiobook").join("outputs"))
        .unwrap_or_else(|| PathBuf::from("outputs"))
}

fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|source| AudiobookError::OutputFolder {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolve the output folder from `store`, falling back to
/// [`default_output_folder`].  The folder is created if missing.
pub fn output_folder(store: &dyn SettingsStore) -> Result<PathBuf> {
    let folder = store
        .get(OUTPUT_FOLDER_KEY)?
        .filter(|f| !f.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(default_output_folder);
    ensure_dir(&folder)?;
    Ok(folder)
}

/// Create `path` and remember it as the output folder.
pub fn set_output_folder(store: &dyn SettingsStore, path: &Path) -> Result<()> {
    ensure_dir(path)?;
    store.set(OUTPUT_FOLDER_KEY, &path.to_string_lossy())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSettingsStore::new(dir.path().join("nested").join("settings.json"));
        assert_eq!(store.get("a").unwrap(), None);

        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();
        store.set("a", "3").unwrap();

        let reopened = JsonSettingsStore::new(store.path());
        assert_eq!(reopened.get("a").unwrap().as_deref(), Some("3"));
        assert_eq!(reopened.all().unwrap().len(), 2);
    }

    #[test]
    fn test_json_store_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "[not an object").unwrap();
        let store = JsonSettingsStore::new(&path);
        assert!(matches!(store.get("a"), Err(AudiobookError::SettingsFormat { .. })));
    }

    #[test]
    fn test_memory_store() {
        let store = MemorySettingsStore::new();
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
        assert_eq!(store.get("missing").unwrap(), None);
    }

    #[test]
    fn test_output_folder_from_settings() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("books").join("out");
        let store = MemorySettingsStore::new();
        set_output_folder(&store, &target).unwrap();
        assert!(target.is_dir());

        std::fs::remove_dir_all(&target).unwrap();
        let resolved = output_folder(&store).unwrap();
        assert_eq!(resolved, target);
        assert!(target.is_dir(), "resolving recreates the folder");
    }

    #[test]
    fn test_default_output_folder_shape() {
        let folder = default_output_folder();
        assert!(folder.ends_with("outputs"));
    }
}
