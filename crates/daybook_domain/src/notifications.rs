use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::{self, KeyValueStore, StorageError};
use crate::task::TaskPriority;

pub const NOTIFICATION_OUTBOX_KEY: &str = "notification_outbox";

/// Opaque handle issued by the notification platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(String);

impl NotificationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Data forwarded untouched to the delivered notification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum NotificationPayload {
    TaskDue {
        #[serde(rename = "taskId")]
        task_id: String,
        route: String,
    },
}

impl NotificationPayload {
    pub fn task_id(&self) -> &str {
        match self {
            NotificationPayload::TaskDue { task_id, .. } => task_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationRequest {
    pub title: String,
    pub body: String,
    pub priority: TaskPriority,
    pub payload: NotificationPayload,
    pub scheduled_for: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    Granted,
    Denied,
    Undetermined,
}

impl PermissionStatus {
    pub fn is_granted(&self) -> bool {
        matches!(self, PermissionStatus::Granted)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("notification permission request failed: {0}")]
    Permission(String),
    #[error("platform rejected notification: {0}")]
    Rejected(String),
    #[error("unknown notification `{0}`")]
    UnknownNotification(NotificationId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Host notification facility. Mobile and desktop adapters implement this.
pub trait NotificationPlatform: Send + Sync {
    fn request_permission(&self) -> Result<PermissionStatus, PlatformError>;

    /// Registers a one-shot notification fired at `request.scheduled_for`.
    fn schedule(&self, request: &NotificationRequest) -> Result<NotificationId, PlatformError>;

    fn cancel(&self, id: &NotificationId) -> Result<(), PlatformError>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingNotification {
    pub id: NotificationId,
    pub request: NotificationRequest,
}

/// Platform for hosts without a native scheduler: pending notifications sit in
/// a key-value store until a caller drains the due ones with [`Self::take_due`].
pub struct OutboxPlatform {
    store: Arc<dyn KeyValueStore>,
    lock: Mutex<()>,
}

impl OutboxPlatform {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    pub fn pending(&self) -> Result<Vec<PendingNotification>, PlatformError> {
        let _guard = self.lock.lock();
        self.load()
    }

    /// Removes and returns every pending notification due at or before `now`,
    /// earliest first.
    pub fn take_due(&self, now: DateTime<Utc>) -> Result<Vec<PendingNotification>, PlatformError> {
        let _guard = self.lock.lock();
        let (mut due, remaining): (Vec<_>, Vec<_>) = self
            .load()?
            .into_iter()
            .partition(|pending| pending.request.scheduled_for <= now);
        if due.is_empty() {
            return Ok(due);
        }
        self.save(&remaining)?;
        due.sort_by_key(|pending| pending.request.scheduled_for);
        Ok(due)
    }

    fn load(&self) -> Result<Vec<PendingNotification>, PlatformError> {
        let pending = storage::load_json::<Vec<PendingNotification>>(
            self.store.as_ref(),
            NOTIFICATION_OUTBOX_KEY,
        )?;
        Ok(pending.unwrap_or_default())
    }

    fn save(&self, pending: &[PendingNotification]) -> Result<(), PlatformError> {
        storage::save_json(self.store.as_ref(), NOTIFICATION_OUTBOX_KEY, &pending)?;
        Ok(())
    }
}

impl NotificationPlatform for OutboxPlatform {
    fn request_permission(&self) -> Result<PermissionStatus, PlatformError> {
        Ok(PermissionStatus::Granted)
    }

    fn schedule(&self, request: &NotificationRequest) -> Result<NotificationId, PlatformError> {
        let _guard = self.lock.lock();
        let mut pending = self.load()?;
        let id = NotificationId::new(Uuid::new_v4().to_string());
        pending.push(PendingNotification {
            id: id.clone(),
            request: request.clone(),
        });
        self.save(&pending)?;
        tracing::debug!(%id, at = %request.scheduled_for, "queued notification");
        Ok(id)
    }

    fn cancel(&self, id: &NotificationId) -> Result<(), PlatformError> {
        let _guard = self.lock.lock();
        let mut pending = self.load()?;
        let before = pending.len();
        pending.retain(|entry| &entry.id != id);
        if pending.len() == before {
            return Err(PlatformError::UnknownNotification(id.clone()));
        }
        self.save(&pending)?;
        Ok(())
    }
}
