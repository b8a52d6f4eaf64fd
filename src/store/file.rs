//! File-based webhook repository.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::model::{Health, Webhook, WebhookId};

use super::{StoreError, WebhookRepository, swap_health};

/// Current store file format version.
///
/// Increment this when making breaking changes to the format.
const STORE_FILE_VERSION: u32 = 1;

/// On-disk store file format.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    /// Format version for future compatibility.
    version: u32,

    /// When the file was last written. For debugging only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    saved_at: Option<String>,

    /// Registered webhooks.
    #[serde(default)]
    webhooks: Vec<Webhook>,
}

/// JSON-file implementation of [`WebhookRepository`].
///
/// Every mutation is a read-modify-write of the whole file under an
/// in-process lock, written atomically:
/// 1. Write to `{path}.tmp`
/// 2. Rename `{path}.tmp` to `{path}`
///
/// The lock serializes writers within one process only; run a single
/// process per store file.
#[derive(Debug)]
pub struct FileRepository {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileRepository {
    /// Creates a repository backed by the file at `path`.
    ///
    /// The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Returns the path to the store file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns every registered webhook.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn list(&self) -> Result<Vec<Webhook>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.webhooks)
    }

    /// Registers a new webhook.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Duplicate`] if the id is taken, or a storage
    /// error if the file cannot be read or written.
    pub async fn insert(&self, webhook: Webhook) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut file = self.load().await?;

        if file.webhooks.iter().any(|w| w.id == webhook.id) {
            return Err(StoreError::Duplicate(webhook.id));
        }
        file.webhooks.push(webhook);

        self.save(file).await
    }

    async fn load(&self) -> Result<StoreFile, StoreError> {
        let path = self.path.clone();
        run_blocking(move || load_blocking(&path)).await
    }

    async fn save(&self, mut file: StoreFile) -> Result<(), StoreError> {
        file.version = STORE_FILE_VERSION;
        file.saved_at = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));

        let path = self.path.clone();
        run_blocking(move || save_blocking(&path, &file)).await
    }
}

impl WebhookRepository for FileRepository {
    async fn find_webhook(&self, id: WebhookId) -> Result<Option<Webhook>, StoreError> {
        let _guard = self.lock.lock().await;
        let file = self.load().await?;
        Ok(file.webhooks.into_iter().find(|w| w.id == id))
    }

    async fn update_health(
        &self,
        id: WebhookId,
        expected: &Health,
        new: &Health,
    ) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut file = self.load().await?;

        let webhook = file
            .webhooks
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or(StoreError::NotFound(id))?;
        swap_health(webhook, expected, new)?;

        self.save(file).await
    }
}

/// Runs blocking file I/O off the async runtime.
async fn run_blocking<T, F>(f: F) -> Result<T, StoreError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Write(std::io::Error::other(e)))?
}

fn load_blocking(path: &Path) -> Result<StoreFile, StoreError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Ok(StoreFile {
                version: STORE_FILE_VERSION,
                ..StoreFile::default()
            });
        }
        Err(e) => return Err(StoreError::Read(e)),
    };

    let file: StoreFile = serde_json::from_str(&content).map_err(|e| StoreError::Corrupted {
        reason: format!("Invalid JSON: {e}"),
    })?;

    if file.version != STORE_FILE_VERSION {
        return Err(StoreError::Corrupted {
            reason: format!(
                "Incompatible version: expected {STORE_FILE_VERSION}, got {}",
                file.version
            ),
        });
    }

    Ok(file)
}

fn save_blocking(path: &Path, file: &StoreFile) -> Result<(), StoreError> {
    let content = serde_json::to_string_pretty(file).map_err(StoreError::Serialize)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(StoreError::Write)?;
        }
    }

    // Append .tmp rather than replacing the extension (store.json -> store.json.tmp)
    let temp_path = PathBuf::from(format!("{}.tmp", path.display()));

    std::fs::write(&temp_path, content).map_err(StoreError::Write)?;
    std::fs::rename(&temp_path, path).map_err(StoreError::Write)?;

    Ok(())
}
