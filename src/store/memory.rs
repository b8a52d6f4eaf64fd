//! In-memory repository.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::model::{Health, Webhook, WebhookId};

use super::{StoreError, WebhookRepository, swap_health};

/// Thread-safe in-memory implementation of [`WebhookRepository`].
///
/// Locks are held only for the duration of a map access, never across
/// an `.await`.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    webhooks: RwLock<HashMap<WebhookId, Webhook>>,
    health_writes: AtomicUsize,
}

impl MemoryRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a webhook record.
    pub fn insert(&self, webhook: Webhook) {
        self.write().insert(webhook.id, webhook);
    }

    /// Returns a copy of a webhook record.
    #[must_use]
    pub fn get(&self, id: WebhookId) -> Option<Webhook> {
        self.read().get(&id).cloned()
    }

    /// Points an existing webhook at a new URL.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the webhook does not exist.
    pub fn rotate_url(&self, id: WebhookId, url: url::Url) -> Result<(), StoreError> {
        let mut webhooks = self.write();
        let webhook = webhooks.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        webhook.url = url;
        Ok(())
    }

    /// Number of successful health writes so far.
    #[must_use]
    pub fn health_writes(&self) -> usize {
        self.health_writes.load(Ordering::SeqCst)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<WebhookId, Webhook>> {
        self.webhooks
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<WebhookId, Webhook>> {
        self.webhooks
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl WebhookRepository for MemoryRepository {
    async fn find_webhook(&self, id: WebhookId) -> Result<Option<Webhook>, StoreError> {
        Ok(self.get(id))
    }

    async fn update_health(
        &self,
        id: WebhookId,
        expected: &Health,
        new: &Health,
    ) -> Result<(), StoreError> {
        let mut webhooks = self.write();
        let webhook = webhooks.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        swap_health(webhook, expected, new)?;
        self.health_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
