//! Directory-backed storage: one `<key>.json` file per key.
//!
//! Writes go to a temporary file first and are renamed into place while an
//! exclusive lock on `.lock` is held, so concurrent processes sharing the
//! directory never observe a half-written record.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use super::{KeyValueStore, StorageError};

const LOCK_FILE: &str = ".lock";

#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Default directory: `<data_local_dir>/teamhub/storage`.
    pub fn default_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("teamhub")
            .join("storage")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }

    fn lock(&self, exclusive: bool) -> Result<File, StorageError> {
        let path = self.dir.join(LOCK_FILE);
        let io_err = |source| StorageError::Io {
            path: path.clone(),
            source,
        };
        fs::create_dir_all(&self.dir).map_err(|source| StorageError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(io_err)?;
        if exclusive {
            file.lock_exclusive().map_err(io_err)?;
        } else {
            file.lock_shared().map_err(io_err)?;
        }
        Ok(file)
    }
}

impl KeyValueStore for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.record_path(key)?;
        if !path.exists() {
            return Ok(None);
        }
        let lock = self.lock(false)?;
        let result = match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io { path, source }),
        };
        let _ = FileExt::unlock(&lock);
        result
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.record_path(key)?;
        let tmp = path.with_extension("json.tmp");
        let lock = self.lock(true)?;
        let result = (|| {
            let mut file = File::create(&tmp)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp, &path)
        })()
        .map_err(|source| StorageError::Io {
            path: path.clone(),
            source,
        });
        let _ = FileExt::unlock(&lock);
        result
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.record_path(key)?;
        if !path.exists() {
            return Ok(());
        }
        let lock = self.lock(true)?;
        let result = match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io { path, source }),
        };
        let _ = FileExt::unlock(&lock);
        result
    }
}
