use super::{KeyValueStore, StoreError};
use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Longest encoded key used verbatim as a file name. Common file systems
/// cap names at 255 bytes; the rest is room for the extension.
const MAX_ENCODED_KEY_LEN: usize = 200;

/// Store keeping one file per key under a directory
///
/// File names are the percent-encoded key with a `.json` extension, so any
/// author slug maps to a single flat file. Keys whose encoding is too long
/// for a file name are stored under `_<uuid v5 of the key>.json`; encoded
/// names never start with `_`, so the two forms cannot collide. Writes go through a temporary file
/// and a rename, readers never observe a half-written entry.
#[derive(Debug, Clone)]
pub struct FileStore {
    directory: PathBuf,
}

impl FileStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// File holding the value of `key`
    pub fn path_for(&self, key: &str) -> PathBuf {
        let encoded = utf8_percent_encode(key, NON_ALPHANUMERIC).to_string();
        let name = if encoded.len() > MAX_ENCODED_KEY_LEN {
            format!("_{}", Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes()))
        } else {
            encoded
        };
        self.directory.join(format!("{name}.json"))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, value: String) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.directory).await?;

        let target = self.path_for(key);
        let temp = self.directory.join(format!(".{}.tmp", Uuid::new_v4()));

        tokio::fs::write(&temp, value).await?;
        if let Err(e) = tokio::fs::rename(&temp, &target).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }

        Ok(())
    }
}
