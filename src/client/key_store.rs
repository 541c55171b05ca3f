//! Local persistent storage for the client's API key.
//!
//! A small string key/value file at `{dir}/storage.json`. Only the API key is
//! kept there; task state and history never leave memory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::sync::RwLock;

/// Storage key the API key is saved under.
pub const API_KEY_STORAGE_KEY: &str = "freepik_api_key";

#[derive(Debug)]
pub struct ApiKeyStore {
    entries: RwLock<HashMap<String, String>>,
    storage_path: PathBuf,
}

impl ApiKeyStore {
    /// Open the store in `dir`, loading existing entries if the file is readable.
    pub async fn open(dir: &Path) -> Self {
        let storage_path = dir.join("storage.json");

        let entries = if storage_path.exists() {
            match Self::load_from_path(&storage_path) {
                Ok(entries) => {
                    tracing::debug!("Loaded client storage from {}", storage_path.display());
                    entries
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to load client storage from {}: {}, starting empty",
                        storage_path.display(),
                        e
                    );
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };

        Self {
            entries: RwLock::new(entries),
            storage_path,
        }
    }

    fn load_from_path(path: &Path) -> Result<HashMap<String, String>, std::io::Error> {
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    async fn save_to_disk(&self) -> Result<(), std::io::Error> {
        let entries = self.entries.read().await;

        if let Some(parent) = self.storage_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let contents = serde_json::to_string_pretty(&*entries)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        tokio::fs::write(&self.storage_path, contents).await?;
        tracing::debug!("Saved client storage to {}", self.storage_path.display());
        Ok(())
    }

    /// The saved API key, if any.
    pub async fn api_key(&self) -> Option<String> {
        self.entries
            .read()
            .await
            .get(API_KEY_STORAGE_KEY)
            .filter(|k| !k.is_empty())
            .cloned()
    }

    /// Save the API key and persist it.
    pub async fn set_api_key(&self, key: &str) -> Result<(), std::io::Error> {
        let mut entries = self.entries.write().await;
        entries.insert(API_KEY_STORAGE_KEY.to_string(), key.to_string());
        drop(entries); // Release lock before saving
        self.save_to_disk().await
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }
}
