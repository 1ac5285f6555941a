//! Credential persistence.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use connect_core::error::StorageError;
use connect_core::Credential;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Storage for the single reusable credential.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Persist a credential, replacing any previous one.
    async fn save(&self, credential: &Credential) -> Result<(), StorageError>;

    /// Load the stored credential; `StorageError::NotFound` if there is none.
    async fn load(&self) -> Result<Credential, StorageError>;
}

/// On-disk form of a credential.
#[derive(Serialize, Deserialize)]
struct StoredCredential {
    username: String,
    /// Base64 of the opaque payload.
    payload: String,
}

/// JSON file store.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn save(&self, credential: &Credential) -> Result<(), StorageError> {
        let stored = StoredCredential {
            username: credential.username().to_string(),
            payload: BASE64.encode(credential.payload()),
        };
        let contents = serde_json::to_vec_pretty(&stored)
            .map_err(|e| StorageError::Format(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, contents).await?;

        debug!("Saved credential for {} to {:?}", credential.username(), self.path);
        Ok(())
    }

    async fn load(&self) -> Result<Credential, StorageError> {
        let contents = match tokio::fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(self.path.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        let stored: StoredCredential =
            serde_json::from_slice(&contents).map_err(|e| StorageError::Format(e.to_string()))?;
        let payload = BASE64
            .decode(stored.payload.as_bytes())
            .map_err(|e| StorageError::Format(format!("Invalid payload encoding: {}", e)))?;

        Ok(Credential::new(stored.username, payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    mod file_store {
        use super::*;

        #[tokio::test]
        async fn save_then_load_returns_same_credential() {
            let dir = tempdir().unwrap();
            let store = FileCredentialStore::new(dir.path().join("credentials.json"));
            let credential = Credential::new("alice", vec![0u8, 1, 2, 254, 255]);

            store.save(&credential).await.unwrap();
            let loaded = store.load().await.unwrap();
            assert_eq!(loaded, credential);
        }

        #[tokio::test]
        async fn save_creates_parent_directories() {
            let dir = tempdir().unwrap();
            let path = dir.path().join("nested").join("deeper").join("credentials.json");
            let store = FileCredentialStore::new(&path);

            store.save(&Credential::new("alice", b"token".to_vec())).await.unwrap();
            assert!(path.exists());
        }

        #[tokio::test]
        async fn save_overwrites_previous_credential() {
            let dir = tempdir().unwrap();
            let store = FileCredentialStore::new(dir.path().join("credentials.json"));

            store.save(&Credential::new("alice", b"one".to_vec())).await.unwrap();
            store.save(&Credential::new("bob", b"two".to_vec())).await.unwrap();
            assert_eq!(store.load().await.unwrap().username(), "bob");
        }

        #[tokio::test]
        async fn load_missing_file_is_not_found() {
            let dir = tempdir().unwrap();
            let store = FileCredentialStore::new(dir.path().join("absent.json"));
            assert!(matches!(store.load().await, Err(StorageError::NotFound(_))));
        }

        #[tokio::test]
        async fn load_garbage_is_format_error() {
            let dir = tempdir().unwrap();
            let path = dir.path().join("credentials.json");
            std::fs::write(&path, b"not json").unwrap();

            let store = FileCredentialStore::new(&path);
            assert!(matches!(store.load().await, Err(StorageError::Format(_))));
        }

        #[tokio::test]
        async fn file_does_not_contain_raw_payload() {
            let dir = tempdir().unwrap();
            let path = dir.path().join("credentials.json");
            let store = FileCredentialStore::new(&path);
            store.save(&Credential::new("alice", b"token".to_vec())).await.unwrap();

            let contents = std::fs::read_to_string(&path).unwrap();
            assert!(contents.contains("\"username\": \"alice\""));
            assert!(contents.contains(&BASE64.encode(b"token")));
        }
    }

    mod mock_store {
        use super::*;

        #[tokio::test]
        async fn mock_load_returns_configured_credential() {
            let mut mock = MockCredentialStore::new();
            mock.expect_load()
                .returning(|| Ok(Credential::new("alice", b"token".to_vec())));

            let credential = mock.load().await.unwrap();
            assert_eq!(credential.username(), "alice");
        }

        #[tokio::test]
        async fn mock_save_can_fail() {
            let mut mock = MockCredentialStore::new();
            mock.expect_save().returning(|_| {
                Err(StorageError::Io(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "read-only",
                )))
            });

            let result = mock.save(&Credential::new("alice", Vec::new())).await;
            assert!(matches!(result, Err(StorageError::Io(_))));
        }
    }
}
