//! # Filesystem Webhook Store Adapter
//!
//! Local filesystem implementation of [`WebhookStore`] and [`SurveyDirectory`]
//! for development and the command-line tool.
//!
//! Layout under the data directory:
//!
//! ```text
//! <data_dir>/webhooks/<webhook_id>.json
//! <data_dir>/surveys.json
//! ```

use crate::{
    store::{StoreError, Survey, SurveyDirectory, WebhookStore},
    webhook::{Webhook, WebhookConfig},
    EnvironmentId, WebhookId,
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use ulid::Ulid;

const WEBHOOKS_DIR: &str = "webhooks";
const SURVEYS_FILE: &str = "surveys.json";
const TEMP_EXTENSION: &str = "tmp";

/// Filesystem-based webhook store
///
/// Each webhook is one pretty-printed JSON document. Every write goes to its
/// own uniquely named temporary file that is then renamed over the target, so
/// readers never observe a partially written configuration and concurrent
/// writers of one document resolve as last write wins.
///
/// # Examples
///
/// ```no_run
/// use survey_hooks_core::adapters::FilesystemWebhookStore;
/// use std::path::PathBuf;
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = FilesystemWebhookStore::new(PathBuf::from("./data")).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FilesystemWebhookStore {
    data_dir: PathBuf,
}

impl FilesystemWebhookStore {
    /// Create new filesystem store
    ///
    /// # Errors
    ///
    /// Returns error if the data directory cannot be created.
    pub async fn new(data_dir: PathBuf) -> Result<Self, StoreError> {
        fs::create_dir_all(data_dir.join(WEBHOOKS_DIR))
            .await
            .map_err(|e| StoreError::Unavailable {
                message: format!("Failed to create data directory: {}", e),
            })?;

        Ok(Self { data_dir })
    }

    /// Root of the on-disk layout
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Insert or replace a webhook as the provisioning path would
    pub async fn insert(&self, webhook: &Webhook) -> Result<(), StoreError> {
        let path = self
            .webhook_path(&webhook.id)
            .ok_or_else(|| StoreError::Internal {
                message: format!("Webhook ID '{}' cannot be used as a file name", webhook.id),
            })?;

        write_json_atomic(&path, webhook).await
    }

    /// Replace the survey directory listing
    pub async fn write_surveys(&self, surveys: &[Survey]) -> Result<(), StoreError> {
        write_json_atomic(&self.data_dir.join(SURVEYS_FILE), &surveys).await
    }

    /// Path of a webhook document, or `None` when the ID would escape the
    /// webhooks directory
    fn webhook_path(&self, id: &WebhookId) -> Option<PathBuf> {
        let stem = id.as_str();
        if stem.starts_with('.') || stem.contains(['/', '\\']) {
            return None;
        }

        Some(
            self.data_dir
                .join(WEBHOOKS_DIR)
                .join(format!("{}.json", stem)),
        )
    }

    async fn read_webhook(&self, id: &WebhookId) -> Result<Webhook, StoreError> {
        let not_found = || StoreError::NotFound {
            webhook_id: id.clone(),
        };

        let path = self.webhook_path(id).ok_or_else(not_found)?;
        let json = match fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => {
                return Err(StoreError::Unavailable {
                    message: format!("Failed to read webhook: {}", e),
                })
            }
        };

        serde_json::from_str(&json).map_err(|e| StoreError::Serialization {
            message: format!("Failed to deserialize webhook {}: {}", id, e),
        })
    }
}

#[async_trait]
impl WebhookStore for FilesystemWebhookStore {
    async fn get_webhook(&self, id: &WebhookId) -> Result<Webhook, StoreError> {
        self.read_webhook(id).await
    }

    async fn update_webhook(
        &self,
        id: &WebhookId,
        config: WebhookConfig,
    ) -> Result<Webhook, StoreError> {
        let mut webhook = self.read_webhook(id).await?;
        webhook.apply(config);

        self.insert(&webhook).await?;
        debug!(webhook_id = %id, "Webhook document rewritten");

        Ok(webhook)
    }

    async fn delete_webhook(&self, id: &WebhookId) -> Result<(), StoreError> {
        let path = self.webhook_path(id).ok_or_else(|| StoreError::NotFound {
            webhook_id: id.clone(),
        })?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound {
                webhook_id: id.clone(),
            }),
            Err(e) => Err(StoreError::Unavailable {
                message: format!("Failed to delete webhook: {}", e),
            }),
        }
    }

    async fn list_webhooks(
        &self,
        environment_id: &EnvironmentId,
    ) -> Result<Vec<Webhook>, StoreError> {
        let dir = self.data_dir.join(WEBHOOKS_DIR);
        let mut results = Vec::new();

        let mut read_dir = match fs::read_dir(&dir).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(results),
            Err(e) => {
                return Err(StoreError::Unavailable {
                    message: format!("Failed to read directory: {}", e),
                })
            }
        };

        while let Some(entry) =
            read_dir
                .next_entry()
                .await
                .map_err(|e| StoreError::Unavailable {
                    message: format!("Failed to read directory entry: {}", e),
                })?
        {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }

            let json = fs::read_to_string(&path)
                .await
                .map_err(|e| StoreError::Unavailable {
                    message: format!("Failed to read {}: {}", path.display(), e),
                })?;

            let webhook: Webhook =
                serde_json::from_str(&json).map_err(|e| StoreError::Serialization {
                    message: format!("Failed to deserialize {}: {}", path.display(), e),
                })?;

            if &webhook.environment_id == environment_id {
                results.push(webhook);
            }
        }

        results.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(results)
    }
}

#[async_trait]
impl SurveyDirectory for FilesystemWebhookStore {
    async fn list_surveys(
        &self,
        environment_id: &EnvironmentId,
    ) -> Result<Vec<Survey>, StoreError> {
        let path = self.data_dir.join(SURVEYS_FILE);
        let json = match fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StoreError::Unavailable {
                    message: format!("Failed to read survey directory: {}", e),
                })
            }
        };

        let surveys: Vec<Survey> =
            serde_json::from_str(&json).map_err(|e| StoreError::Serialization {
                message: format!("Failed to deserialize survey directory: {}", e),
            })?;

        Ok(surveys
            .into_iter()
            .filter(|s| &s.environment_id == environment_id)
            .collect())
    }
}

/// Serialize to a uniquely named temporary sibling file, then rename it over
/// the target
async fn write_json_atomic<T: serde::Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| StoreError::Serialization {
        message: format!("Failed to serialize: {}", e),
    })?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::Unavailable {
                message: format!("Failed to create directory structure: {}", e),
            })?;
    }

    let temp_path = temp_path_for(path);
    let result = write_then_rename(&temp_path, path, json.as_bytes()).await;

    if result.is_err() {
        if let Err(e) = fs::remove_file(&temp_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %temp_path.display(), error = %e, "Failed to remove temp file");
            }
        }
    }

    result
}

/// `<stem>.<ulid>.tmp` next to the target; never matches the `.json` filter
fn temp_path_for(path: &Path) -> PathBuf {
    path.with_extension(format!("{}.{}", Ulid::new(), TEMP_EXTENSION))
}

async fn write_then_rename(
    temp_path: &Path,
    path: &Path,
    bytes: &[u8],
) -> Result<(), StoreError> {
    let mut file = fs::File::create(temp_path)
        .await
        .map_err(|e| StoreError::Unavailable {
            message: format!("Failed to create temp file: {}", e),
        })?;

    file.write_all(bytes)
        .await
        .map_err(|e| StoreError::Unavailable {
            message: format!("Failed to write file: {}", e),
        })?;

    file.flush().await.map_err(|e| StoreError::Unavailable {
        message: format!("Failed to flush file: {}", e),
    })?;
    drop(file);

    fs::rename(temp_path, path)
        .await
        .map_err(|e| StoreError::Unavailable {
            message: format!("Failed to rename temp file: {}", e),
        })
}

#[cfg(test)]
#[path = "filesystem_store_tests.rs"]
mod tests;
