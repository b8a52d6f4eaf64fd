//! Webhook record storage.
//!
//! The delivery engine only needs two operations from the subscription
//! registry: look a webhook up, and write back its health. Both are
//! expressed by [`WebhookRepository`].
//!
//! Concurrent attempts against the same webhook are serialized here, not
//! in the engine: [`WebhookRepository::update_health`] is a
//! compare-and-swap on the previous [`Health`] value, the moral
//! equivalent of `UPDATE ... WHERE <health columns> = <expected>`.

mod file;
mod memory;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

pub use file::FileRepository;
pub use memory::MemoryRepository;

use std::io;

use thiserror::Error;

use crate::model::{Health, Webhook, WebhookId};

/// Errors that can occur in a webhook repository.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The webhook does not exist.
    #[error("Webhook {0} not found")]
    NotFound(WebhookId),

    /// The stored health no longer matches the expected value.
    ///
    /// Carries the current value so the caller can recompute and retry.
    #[error("Health of webhook {id} was modified concurrently")]
    Conflict {
        /// The webhook that was being updated
        id: WebhookId,
        /// The health currently stored
        current: Health,
    },

    /// A webhook with this id already exists.
    #[error("Webhook {0} already exists")]
    Duplicate(WebhookId),

    /// Failed to read the store file.
    #[error("Failed to read store: {0}")]
    Read(#[source] io::Error),

    /// The store file exists but could not be parsed.
    #[error("Store is corrupted: {reason}")]
    Corrupted {
        /// Reason for corruption (for logging/debugging).
        reason: String,
    },

    /// Failed to write the store file.
    #[error("Failed to write store: {0}")]
    Write(#[source] io::Error),

    /// Failed to serialize the store.
    #[error("Failed to serialize store: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Access to webhook records for the delivery engine.
///
/// # Testing
///
/// [`MemoryRepository`] is a complete in-process implementation suitable
/// for tests and embedding.
pub trait WebhookRepository: Send + Sync {
    /// Looks up a webhook by id.
    ///
    /// Returns `Ok(None)` if no such webhook is registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage cannot be read.
    fn find_webhook(
        &self,
        id: WebhookId,
    ) -> impl std::future::Future<Output = Result<Option<Webhook>, StoreError>> + Send;

    /// Replaces the webhook's health with `new` if it still equals `expected`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Conflict`] if the stored health differs from `expected`
    /// - [`StoreError::NotFound`] if the webhook was removed
    /// - Storage errors if the write fails
    fn update_health(
        &self,
        id: WebhookId,
        expected: &Health,
        new: &Health,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
}

impl<T: WebhookRepository> WebhookRepository for std::sync::Arc<T> {
    async fn find_webhook(&self, id: WebhookId) -> Result<Option<Webhook>, StoreError> {
        (**self).find_webhook(id).await
    }

    async fn update_health(
        &self,
        id: WebhookId,
        expected: &Health,
        new: &Health,
    ) -> Result<(), StoreError> {
        (**self).update_health(id, expected, new).await
    }
}

/// Applies a compare-and-swap health update to an in-memory record.
fn swap_health(
    webhook: &mut Webhook,
    expected: &Health,
    new: &Health,
) -> Result<(), StoreError> {
    if webhook.health != *expected {
        return Err(StoreError::Conflict {
            id: webhook.id,
            current: webhook.health.clone(),
        });
    }
    webhook.health = new.clone();
    Ok(())
}
