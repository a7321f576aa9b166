//! File-backed state store: a flat TOML table of string values, rewritten
//! atomically on flush (temp file + rename).

use crate::error::HostError;
use adaflow_traits::{DynError, StateStore};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub struct FileStore {
    path: PathBuf,
    cache: BTreeMap<String, String>,
    dirty: bool,
}

impl FileStore {
    /// Open the store, reading any existing file. A missing file is an empty
    /// store; a malformed file is an error so learned state is never silently
    /// clobbered.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, HostError> {
        let path = path.as_ref().to_path_buf();
        let cache = match fs::read_to_string(&path) {
            Ok(content) => toml::from_str::<BTreeMap<String, String>>(&content)
                .map_err(|e| HostError::Api(format!("state store parse: {e}")))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(HostError::Io(e)),
        };
        Ok(Self {
            path,
            cache,
            dirty: false,
        })
    }

    fn write_out(&self) -> Result<(), HostError> {
        let body = toml::to_string(&self.cache)
            .map_err(|e| HostError::Api(format!("state store encode: {e}")))?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl StateStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, DynError> {
        Ok(self.cache.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &str) -> Result<(), DynError> {
        self.cache.insert(key.to_string(), value.to_string());
        self.dirty = true;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), DynError> {
        if self.cache.remove(key).is_some() {
            self.dirty = true;
        }
        Ok(())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>, DynError> {
        Ok(self
            .cache
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn flush(&mut self) -> Result<(), DynError> {
        if !self.dirty {
            return Ok(());
        }
        self.write_out()?;
        self.dirty = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adaflow_traits::StateStore;

    #[test]
    fn round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.toml");
        {
            let mut store = FileStore::open(&path).unwrap();
            store.put("pa.pla", "0.042").unwrap();
            store.put("gain.pla", "0.1").unwrap();
            store.put("stress.12", "7.5").unwrap();
            store.flush().unwrap();
        }
        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.get("pa.pla").unwrap().as_deref(), Some("0.042"));
        let mut stress = store.keys("stress.").unwrap();
        stress.sort();
        assert_eq!(stress, vec!["stress.12".to_string()]);
    }

    #[test]
    fn missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("none.toml")).unwrap();
        assert_eq!(store.get("pa.pla").unwrap(), None);
    }

    #[test]
    fn remove_drops_key_on_next_flush() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.toml");
        let mut store = FileStore::open(&path).unwrap();
        store.put("fault.runaway_total", "2").unwrap();
        store.flush().unwrap();
        store.remove("fault.runaway_total").unwrap();
        store.flush().unwrap();
        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get("fault.runaway_total").unwrap(), None);
    }
}
