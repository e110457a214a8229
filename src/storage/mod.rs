use std::io::ErrorKind;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

mod schedule;
mod team;

pub use schedule::ScheduleStore;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("invalid storage key {0:?}")]
    InvalidKey(String),
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid storage: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// JSON files in one folder, one file per stored entity.
pub struct Storage {
    folder: PathBuf,
}

/* Keys become part of file names. */
fn check_key(key: &str) -> Result<&str, StorageError> {
    if key.is_empty()
        || !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(key)
}

impl Storage {
    pub fn new(folder: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let folder = folder.into();
        std::fs::create_dir_all(&folder)?;

        Ok(Storage { folder })
    }

    fn path(&self, kind: &str, key: &str) -> Result<PathBuf, StorageError> {
        Ok(self.folder.join(format!("{}-{}.json", kind, check_key(key)?)))
    }

    fn read<T: DeserializeOwned>(&self, kind: &str, key: &str) -> Result<T, StorageError> {
        let path = self.path(kind, key)?;

        let storage = match std::fs::read_to_string(&path) {
            Ok(storage) => storage,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(format!("{} {}", kind, key)))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&storage)?)
    }

    fn write<T: Serialize>(&self, kind: &str, key: &str, value: &T) -> Result<(), StorageError> {
        let path = self.path(kind, key)?;

        /* Write beside the target and rename, so readers never see half a file. */
        let temporary = path.with_extension("json.tmp");
        std::fs::write(&temporary, serde_json::to_string(value)?)?;
        std::fs::rename(&temporary, &path)?;

        Ok(())
    }

    /// Keys of every stored entity of one kind.
    fn keys(&self, kind: &str) -> Result<Vec<String>, StorageError> {
        let prefix = format!("{}-", kind);
        let mut keys = Vec::new();

        for entry in std::fs::read_dir(&self.folder)? {
            let file_name = entry?.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };

            if let Some(key) = file_name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(".json"))
            {
                keys.push(key.to_string());
            }
        }

        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_path_like_keys() {
        let folder = tempfile::tempdir().unwrap();
        let storage = Storage::new(folder.path()).unwrap();

        assert!(matches!(
            storage.path("schedule", "../etc"),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            storage.path("schedule", ""),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(storage.path("schedule", "1FFMJ3L9Zyn-XJ_pK3").is_ok());
    }

    #[test]
    fn missing_entities_are_not_found() {
        let folder = tempfile::tempdir().unwrap();
        let storage = Storage::new(folder.path()).unwrap();

        let result: Result<u64, StorageError> = storage.read("team", "4");
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[test]
    fn keys_are_listed_per_kind() {
        let folder = tempfile::tempdir().unwrap();
        let storage = Storage::new(folder.path()).unwrap();

        storage.write("team", "2", &2).unwrap();
        storage.write("team", "10", &10).unwrap();
        storage.write("schedule", "abc", &"abc").unwrap();

        assert_eq!(storage.keys("team").unwrap(), vec!["10", "2"]);
        assert_eq!(storage.keys("schedule").unwrap(), vec!["abc"]);
    }
}
