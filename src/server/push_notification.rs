//! Push-notification config storage and outbound delivery.
//!
//! Mirrors Python SDK's `PushNotificationConfigStore(ABC)` /
//! `InMemoryPushNotificationConfigStore` from
//! `a2a.server.tasks.push_notification_config_store`, plus the delivery side
//! (`BasePushNotificationSender` / `InMemoryPushNotificationSender`) from
//! `a2a.server.tasks.push_notification_sender`.
//!
//! [`PushNotificationConfigStore`] persists the webhook configs a client
//! registers for a task (`tasks/pushNotificationConfig/set` and friends).
//! [`PushNotificationSender`] reads those configs and POSTs the task snapshot
//! to each one whenever the task changes; delivery is best-effort and never
//! blocks event-bus processing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::A2AResult;
use crate::types::{PushNotificationConfig, Task, TaskPushNotificationConfig};

/// Per-delivery timeout for outbound push notification requests.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Header carrying the caller-supplied validation token, if any.
const NOTIFICATION_TOKEN_HEADER: &str = "X-A2A-Notification-Token";

/// Trait for persisting and retrieving per-task push notification configs.
///
/// A task may have more than one registered config (identified by
/// `config_id`); implementations key storage on `(task_id, config_id)`.
///
/// Mirrors Python SDK's `PushNotificationConfigStore(ABC)`.
#[async_trait]
pub trait PushNotificationConfigStore: Send + Sync {
    /// Save a config for a task, assigning a `config_id` if one wasn't given.
    ///
    /// Returns the stored config, including the assigned `id`.
    async fn set(
        &self,
        task_id: &str,
        config: PushNotificationConfig,
    ) -> A2AResult<TaskPushNotificationConfig>;

    /// Retrieve a single config by task and config ID.
    async fn get(
        &self,
        task_id: &str,
        config_id: &str,
    ) -> A2AResult<Option<TaskPushNotificationConfig>>;

    /// List all configs registered for a task.
    async fn list(&self, task_id: &str) -> A2AResult<Vec<TaskPushNotificationConfig>>;

    /// Delete a config. Silently succeeds if it doesn't exist.
    async fn delete(&self, task_id: &str, config_id: &str) -> A2AResult<()>;
}

/// In-memory implementation of [`PushNotificationConfigStore`].
///
/// Suitable for development and single-instance deployments, mirroring
/// [`InMemoryTaskStore`](super::task_store::InMemoryTaskStore)'s storage
/// pattern.
#[derive(Debug, Default)]
pub struct InMemoryPushNotificationConfigStore {
    configs: RwLock<HashMap<(String, String), TaskPushNotificationConfig>>,
}

impl InMemoryPushNotificationConfigStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PushNotificationConfigStore for InMemoryPushNotificationConfigStore {
    async fn set(
        &self,
        task_id: &str,
        config: PushNotificationConfig,
    ) -> A2AResult<TaskPushNotificationConfig> {
        let config_id = config
            .id
            .clone()
            .unwrap_or_else(|| task_id.to_string());

        let entry = TaskPushNotificationConfig {
            id: Some(config_id.clone()),
            task_id: task_id.to_string(),
            push_notification_config: PushNotificationConfig {
                id: Some(config_id.clone()),
                ..config
            },
            tenant: None,
        };

        let mut configs = self.configs.write().await;
        configs.insert((task_id.to_string(), config_id.clone()), entry.clone());
        debug!(task_id, config_id, "push notification config saved");
        Ok(entry)
    }

    async fn get(
        &self,
        task_id: &str,
        config_id: &str,
    ) -> A2AResult<Option<TaskPushNotificationConfig>> {
        let configs = self.configs.read().await;
        Ok(configs.get(&(task_id.to_string(), config_id.to_string())).cloned())
    }

    async fn list(&self, task_id: &str) -> A2AResult<Vec<TaskPushNotificationConfig>> {
        let configs = self.configs.read().await;
        Ok(configs
            .iter()
            .filter(|((tid, _), _)| tid == task_id)
            .map(|(_, cfg)| cfg.clone())
            .collect())
    }

    async fn delete(&self, task_id: &str, config_id: &str) -> A2AResult<()> {
        let mut configs = self.configs.write().await;
        if configs
            .remove(&(task_id.to_string(), config_id.to_string()))
            .is_some()
        {
            debug!(task_id, config_id, "push notification config deleted");
        } else {
            warn!(task_id, config_id, "deleting nonexistent push notification config");
        }
        Ok(())
    }
}

/// Delivers task snapshots to registered push-notification webhooks.
///
/// Mirrors Python SDK's `BasePushNotificationSender.send_notification`: on
/// every task mutation observed from the bus, load the configs registered
/// for the task and fire a concurrent, best-effort POST to each. A failing
/// or slow endpoint only logs a warning — it never blocks the caller or
/// affects sibling deliveries.
pub struct PushNotificationSender {
    store: Arc<dyn PushNotificationConfigStore>,
    client: reqwest::Client,
}

impl PushNotificationSender {
    /// Create a sender backed by the given config store.
    pub fn new(store: Arc<dyn PushNotificationConfigStore>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { store, client }
    }

    /// Notify every config registered for `task`'s webhook of its current state.
    ///
    /// Spawns one delivery per config and returns without waiting for any of
    /// them to complete.
    pub async fn send(&self, task: &Task) {
        let configs = match self.store.list(&task.id).await {
            Ok(configs) => configs,
            Err(error) => {
                warn!(task_id = %task.id, %error, "failed to load push notification configs");
                return;
            }
        };

        for config in configs {
            let client = self.client.clone();
            let task = task.clone();
            tokio::spawn(async move {
                Self::deliver(&client, &task, &config.push_notification_config).await;
            });
        }
    }

    async fn deliver(client: &reqwest::Client, task: &Task, config: &PushNotificationConfig) {
        let mut request = client.post(&config.url).json(task);
        if let Some(ref token) = config.token {
            request = request.header(NOTIFICATION_TOKEN_HEADER, token);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                debug!(task_id = %task.id, url = %config.url, "push notification delivered");
            }
            Ok(response) => {
                warn!(
                    task_id = %task.id,
                    url = %config.url,
                    status = %response.status(),
                    "push notification endpoint returned an error status"
                );
            }
            Err(error) => {
                warn!(task_id = %task.id, url = %config.url, %error, "push notification delivery failed");
            }
        }
    }
}
