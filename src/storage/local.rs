use super::{StorageBackend, StorageObject};
use crate::{config::LocalOptions, error::BackendError, utils};
use async_trait::async_trait;
use std::{
    io::ErrorKind,
    path::{Component, Path, PathBuf},
};

const TEMP_SUFFIX: &str = ".imager-tmp";

#[derive(Debug, Clone)]
pub struct LocalStorage {
    path: PathBuf,
    public_url: Option<String>,
}

impl LocalStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        LocalStorage {
            path: path.into(),
            public_url: None,
        }
    }

    pub fn from_options(options: &LocalOptions) -> Self {
        LocalStorage {
            path: options.path.clone(),
            public_url: options.public_url.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.path
    }

    fn file_path(&self, key: &str) -> Result<PathBuf, BackendError> {
        let relative = Path::new(key);
        let inside = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if key.is_empty() || !inside {
            return Err(BackendError::storage(format!(
                "Key {} escapes {}",
                key,
                self.path.display()
            )));
        }
        Ok(self.path.join(relative))
    }

    fn uri(&self, key: &str, file_path: &Path) -> String {
        match &self.public_url {
            Some(base) => utils::join_url(base, key),
            None => file_path.to_string_lossy().into_owned(),
        }
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    #[tracing::instrument(skip(self, object), fields(key = %object.key, size = object.data.len()))]
    async fn store(&self, object: &StorageObject) -> Result<String, BackendError> {
        let file_path = self.file_path(&object.key)?;

        if let Some(parent) = file_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                BackendError::storage(format!(
                    "Could not create directory {} with error: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        // Write next to the target and rename so readers never see a partial file.
        // Each store gets its own temp file; concurrent stores of one key must not share it.
        let mut temp_name = file_path.file_name().unwrap_or_default().to_os_string();
        temp_name.push(format!(".{}{}", utils::random_name(None), TEMP_SUFFIX));
        let temp_path = file_path.with_file_name(temp_name);
        if let Err(e) = tokio::fs::write(&temp_path, &object.data).await {
            return Err(BackendError::storage(format!(
                "Could not upload file {} to {} with error: {}",
                object.key,
                self.path.display(),
                e
            )));
        }
        if let Err(e) = tokio::fs::rename(&temp_path, &file_path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(BackendError::storage(format!(
                "Could not upload file {} to {} with error: {}",
                object.key,
                self.path.display(),
                e
            )));
        }

        tracing::debug!(path = %file_path.display(), "Stored file");
        Ok(self.uri(&object.key, &file_path))
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        let file_path = self.file_path(key)?;
        match tokio::fs::remove_file(&file_path).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %file_path.display(), "File already absent");
                Ok(())
            }
            Err(e) => Err(BackendError::storage(format!(
                "Could not delete file {} with error: {}",
                key, e
            ))),
        }
    }
}

#[cfg(test)]
mod test {
    use super::LocalStorage;
    use crate::{
        config::LocalOptions,
        storage::{StorageBackend, StorageObject},
    };
    use bytes::Bytes;
    use futures_util::future::join_all;

    fn object(key: &str) -> StorageObject {
        StorageObject {
            key: key.to_owned(),
            data: Bytes::from_static(b"pixels"),
            content_type: "image/jpeg",
        }
    }

    #[tokio::test]
    async fn should_store_in_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("uploads"));

        let uri = storage.store(&object("images/thumb_a.jpg")).await.unwrap();
        let expected = dir.path().join("uploads/images/thumb_a.jpg");
        assert_eq!(uri, expected.to_string_lossy());
        assert_eq!(std::fs::read(&expected).unwrap(), b"pixels");
        let leftovers = std::fs::read_dir(dir.path().join("uploads/images"))
            .unwrap()
            .count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test]
    async fn should_store_one_key_from_concurrent_writers() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        let objects: Vec<StorageObject> = (0..16)
            .map(|i| StorageObject {
                key: "images/same.jpg".to_owned(),
                data: Bytes::from(format!("writer {}", i)),
                content_type: "image/jpeg",
            })
            .collect();

        for _ in 0..10 {
            let results = join_all(objects.iter().map(|object| storage.store(object))).await;
            assert!(results.iter().all(Result::is_ok), "{:?}", results);

            let written = std::fs::read_to_string(dir.path().join("images/same.jpg")).unwrap();
            assert!(written.starts_with("writer "));
            let entries = std::fs::read_dir(dir.path().join("images")).unwrap().count();
            assert_eq!(entries, 1);
        }
    }

    #[tokio::test]
    async fn should_use_public_url_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::from_options(&LocalOptions {
            path: dir.path().to_path_buf(),
            public_url: Some("https://cdn.example.com/".to_owned()),
        });

        let uri = storage.store(&object("a.jpg")).await.unwrap();
        assert_eq!(uri, "https://cdn.example.com/a.jpg");
    }

    #[tokio::test]
    async fn should_treat_missing_files_as_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        storage.store(&object("a.jpg")).await.unwrap();
        storage.delete("a.jpg").await.unwrap();
        assert!(!dir.path().join("a.jpg").exists());
        storage.delete("a.jpg").await.unwrap();
        storage.delete("never-existed.jpg").await.unwrap();
    }

    #[tokio::test]
    async fn should_refuse_keys_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("root"));

        assert!(storage.store(&object("../outside.jpg")).await.is_err());
        assert!(storage.delete("/etc/hosts").await.is_err());
        assert!(!dir.path().join("outside.jpg").exists());
    }
}
