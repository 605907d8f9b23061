use std::{
    collections::BTreeMap,
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::Result;
use fs2::FileExt;

use crate::infra::{contracts::KeyValueStore, error::AppError, storage_layout::StorageLayout};

/// String key/value pairs persisted as one JSON object.
///
/// Every mutation rewrites the whole file through a sibling temp file and a
/// rename while holding an exclusive lock on `session.lock`.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(path: PathBuf, lock_path: PathBuf) -> Self {
        Self { path, lock_path }
    }

    pub fn from_layout(layout: &StorageLayout) -> Self {
        Self::new(layout.session_file(), layout.session_lock_file())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<File, AppError> {
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)
            .map_err(|source| self.io_error(source))?;
        lock.lock_exclusive()
            .map_err(|source| self.io_error(source))?;
        Ok(lock)
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>, AppError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(BTreeMap::new())
            }
            Err(source) => return Err(self.io_error(source)),
        };

        match serde_json::from_str(&raw) {
            Ok(map) => Ok(map),
            Err(error) => {
                tracing::warn!(
                    code = "KV_STORE_MALFORMED",
                    path = %self.path.display(),
                    error = %error,
                    "ignoring malformed key/value file"
                );
                Ok(BTreeMap::new())
            }
        }
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<(), AppError> {
        let encoded =
            serde_json::to_vec_pretty(map).map_err(|source| AppError::SessionStoreEncode {
                path: self.path.clone(),
                source,
            })?;

        let tmp_path = self.path.with_extension("json.tmp");
        let mut tmp = File::create(&tmp_path).map_err(|source| self.io_error(source))?;
        tmp.write_all(&encoded)
            .and_then(|_| tmp.sync_all())
            .map_err(|source| self.io_error(source))?;
        fs::rename(&tmp_path, &self.path).map_err(|source| self.io_error(source))?;

        Ok(())
    }

    fn mutate(&self, apply: impl FnOnce(&mut BTreeMap<String, String>) -> bool) -> Result<()> {
        let lock = self.lock()?;
        let mut map = self.read_map()?;
        if apply(&mut map) {
            self.write_map(&map)?;
        }
        FileExt::unlock(&lock).map_err(|source| self.io_error(source))?;
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> AppError {
        AppError::SessionStoreIo {
            path: self.path.clone(),
            source,
        }
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let lock = self.lock()?;
        let value = self.read_map()?.remove(key);
        FileExt::unlock(&lock).map_err(|source| self.io_error(source))?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.mutate(|map| {
            map.insert(key.to_owned(), value.to_owned());
            true
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.mutate(|map| map.remove(key).is_some())
    }
}
