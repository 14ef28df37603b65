use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};

pub const LOCAL_SCHEME: &str = "local://";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFileInfo {
    pub file_name: String,
    pub locator: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// Object storage for generated audio.
#[async_trait]
pub trait AudioStorage: Send + Sync {
    /// Stores `bytes` under `key` and returns its locator.
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<String>;

    async fn stat(&self, locator: &str) -> Result<Option<AudioFileInfo>>;

    /// All audio stored for a user, newest first.
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<AudioFileInfo>>;

    async fn delete(&self, locator: &str) -> Result<bool>;
}

/// Object key for the `index`-th artifact of a speech run.
pub fn audio_object_key(user_id: i64, identifier: &str, index: usize, extension: &str) -> String {
    format!("audio/{}/tts-{}_{}.{}", user_id, identifier, index, extension)
}

/// Filesystem-backed [`AudioStorage`]; keys map to paths below `root`.
pub struct LocalAudioStorage {
    root: PathBuf,
}

impl LocalAudioStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for_key(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if key.is_empty() || !safe {
            return Err(AppError::Storage(format!("invalid object key: {:?}", key)));
        }
        Ok(self.root.join(relative))
    }

    fn key_for_locator<'a>(&self, locator: &'a str) -> Result<&'a str> {
        locator
            .strip_prefix(LOCAL_SCHEME)
            .ok_or_else(|| AppError::Storage(format!("not a local locator: {}", locator)))
    }

    async fn info(&self, key: &str, path: &Path) -> Result<Option<AudioFileInfo>> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if !metadata.is_file() {
            return Ok(None);
        }

        let last_modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        Ok(Some(AudioFileInfo {
            file_name: key.to_string(),
            locator: format!("{}{}", LOCAL_SCHEME, key),
            size: metadata.len(),
            last_modified,
        }))
    }
}

#[async_trait]
impl AudioStorage for LocalAudioStorage {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<String> {
        let path = self.path_for_key(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;

        tracing::debug!("Stored audio object {}", key);
        Ok(format!("{}{}", LOCAL_SCHEME, key))
    }

    async fn stat(&self, locator: &str) -> Result<Option<AudioFileInfo>> {
        let key = self.key_for_locator(locator)?;
        let path = self.path_for_key(key)?;
        self.info(key, &path).await
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<AudioFileInfo>> {
        let prefix = format!("audio/{}", user_id);
        let dir = self.path_for_key(&prefix)?;

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            let key = format!("{}/{}", prefix, name);
            if let Some(info) = self.info(&key, &entry.path()).await? {
                files.push(info);
            }
        }

        files.sort_by(|a, b| {
            b.last_modified
                .cmp(&a.last_modified)
                .then_with(|| a.file_name.cmp(&b.file_name))
        });
        Ok(files)
    }

    async fn delete(&self, locator: &str) -> Result<bool> {
        let key = self.key_for_locator(locator)?;
        let path = self.path_for_key(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!("Deleted audio object {}", key);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("Audio object to delete does not exist: {}", locator);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_keys_follow_user_prefix() {
        assert_eq!(
            audio_object_key(4, "20261018_abc", 0, "wav"),
            "audio/4/tts-20261018_abc_0.wav"
        );
    }

    #[tokio::test]
    async fn put_stat_list_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalAudioStorage::new(dir.path());

        let locator = storage
            .put(&audio_object_key(1, "run", 0, "wav"), vec![1, 2, 3])
            .await
            .unwrap();
        assert_eq!(locator, "local://audio/1/tts-run_0.wav");

        let info = storage.stat(&locator).await.unwrap().unwrap();
        assert_eq!(info.size, 3);
        assert_eq!(info.file_name, "audio/1/tts-run_0.wav");

        let listed = storage.list_for_user(1).await.unwrap();
        assert_eq!(listed, vec![info]);
        assert!(storage.list_for_user(2).await.unwrap().is_empty());

        assert!(storage.delete(&locator).await.unwrap());
        assert!(!storage.delete(&locator).await.unwrap());
        assert!(storage.stat(&locator).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rejects_escaping_keys_and_foreign_locators() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalAudioStorage::new(dir.path());

        assert!(storage.put("../outside.wav", vec![0]).await.is_err());
        assert!(storage.put("/etc/passwd", vec![0]).await.is_err());
        assert!(storage.stat("gs://bucket/audio/1/x.wav").await.is_err());
    }
}
