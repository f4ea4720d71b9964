use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::{
    clock::{Clock, SystemClock},
    notifications::{
        NotificationId, NotificationPayload, NotificationPlatform, NotificationRequest,
        PlatformError,
    },
    schedule,
    settings::{SettingsError, SettingsProvider, StoredSettings},
    storage::{self, KeyValueStore, StorageError},
    task::{TaskNotificationInput, TaskPriority},
};

pub const TASK_NOTIFICATION_MAP_KEY: &str = "task_notification_map";
pub const DEFAULT_TASK_ROUTE: &str = "/tasks";

/// Persisted association of task ids to their live notification ids.
pub type TaskNotificationMap = BTreeMap<String, NotificationId>;

#[derive(Debug, thiserror::Error)]
enum ReminderError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Keeps one local notification per task in step with the task's due date.
///
/// Public operations never return errors: failures are logged and turned into
/// `false`, `None` or a silent no-op so reminder problems cannot block task
/// edits. Every read-modify-write of the persisted map runs under one lock.
pub struct TaskReminderService {
    store: Arc<dyn KeyValueStore>,
    settings: Arc<dyn SettingsProvider>,
    platform: Arc<dyn NotificationPlatform>,
    clock: Arc<dyn Clock>,
    route: String,
    map_lock: Mutex<()>,
}

pub struct TaskReminderServiceBuilder {
    store: Arc<dyn KeyValueStore>,
    platform: Arc<dyn NotificationPlatform>,
    settings: Option<Arc<dyn SettingsProvider>>,
    clock: Option<Arc<dyn Clock>>,
    route: String,
}

impl TaskReminderServiceBuilder {
    pub fn new(store: Arc<dyn KeyValueStore>, platform: Arc<dyn NotificationPlatform>) -> Self {
        Self {
            store,
            platform,
            settings: None,
            clock: None,
            route: DEFAULT_TASK_ROUTE.to_string(),
        }
    }

    pub fn with_settings(mut self, settings: Arc<dyn SettingsProvider>) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = route.into();
        self
    }

    pub fn build(self) -> TaskReminderService {
        let settings = self
            .settings
            .unwrap_or_else(|| Arc::new(StoredSettings::new(self.store.clone())));
        TaskReminderService {
            store: self.store,
            settings,
            platform: self.platform,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            route: self.route,
            map_lock: Mutex::new(()),
        }
    }
}

impl TaskReminderService {
    pub fn builder(
        store: Arc<dyn KeyValueStore>,
        platform: Arc<dyn NotificationPlatform>,
    ) -> TaskReminderServiceBuilder {
        TaskReminderServiceBuilder::new(store, platform)
    }

    pub fn request_permission(&self) -> bool {
        match self.platform.request_permission() {
            Ok(status) => {
                if !status.is_granted() {
                    info!(?status, "notification permission not granted");
                }
                status.is_granted()
            }
            Err(err) => {
                warn!(%err, "notification permission request failed");
                false
            }
        }
    }

    /// Schedules (or replaces) the due-date reminder for a task and returns the
    /// platform id, or `None` when reminders are off, the task has no usable
    /// due date, the reminder time has already passed, or anything failed.
    pub fn schedule_due_reminder(&self, input: &TaskNotificationInput) -> Option<NotificationId> {
        match self.try_schedule(input) {
            Ok(id) => id,
            Err(err) => {
                warn!(task_id = %input.task_id, %err, "failed to schedule due reminder");
                None
            }
        }
    }

    pub fn cancel_due_reminder(&self, task_id: &str) {
        let _guard = self.map_lock.lock();
        self.cancel_locked(task_id);
    }

    /// Drops the map entry for a notification the platform has delivered.
    /// Entries already replaced by a newer reminder are left untouched.
    pub fn acknowledge_delivery(&self, task_id: &str, notification_id: &NotificationId) -> bool {
        let _guard = self.map_lock.lock();
        let mut map = self.read_map();
        if map.get(task_id) != Some(notification_id) {
            debug!(task_id, %notification_id, "delivered notification no longer tracked");
            return false;
        }
        map.remove(task_id);
        match self.write_map(&map) {
            Ok(()) => {
                debug!(task_id, %notification_id, "acknowledged delivered reminder");
                true
            }
            Err(err) => {
                warn!(task_id, %err, "failed to clear delivered reminder");
                false
            }
        }
    }

    /// Notification id currently tracked for `task_id`, if any.
    pub fn scheduled_reminder(&self, task_id: &str) -> Option<NotificationId> {
        let _guard = self.map_lock.lock();
        self.read_map().remove(task_id)
    }

    /// Snapshot of the whole persisted task-to-notification map.
    pub fn scheduled_reminders(&self) -> TaskNotificationMap {
        let _guard = self.map_lock.lock();
        self.read_map()
    }
}

impl TaskReminderService {
    fn try_schedule(
        &self,
        input: &TaskNotificationInput,
    ) -> Result<Option<NotificationId>, ReminderError> {
        let settings = self.settings.load_app_settings()?;
        if !settings.task_reminders {
            debug!(task_id = %input.task_id, "task reminders disabled");
            return Ok(None);
        }
        let Some(due_date) = input.due_date.as_deref() else {
            return Ok(None);
        };
        let Some(trigger) =
            schedule::reminder_instant(due_date, settings.reminder_time(), self.clock.as_ref())
        else {
            return Ok(None);
        };
        if trigger <= self.clock.now() {
            debug!(task_id = %input.task_id, %trigger, "reminder time already passed");
            return Ok(None);
        }

        let _guard = self.map_lock.lock();
        // A previous notification that cannot be withdrawn stays tracked.
        self.try_cancel(&input.task_id)?;

        let request = self.build_request(input, trigger);
        let id = self.platform.schedule(&request)?;

        let mut map = self.read_map();
        map.insert(input.task_id.clone(), id.clone());
        if let Err(err) = self.write_map(&map) {
            // An untracked notification could never be cancelled later.
            if let Err(cancel_err) = self.platform.cancel(&id) {
                warn!(%id, %cancel_err, "failed to withdraw untracked notification");
            }
            return Err(err.into());
        }

        info!(task_id = %input.task_id, %id, at = %trigger, "scheduled due reminder");
        Ok(Some(id))
    }

    fn cancel_locked(&self, task_id: &str) {
        if let Err(err) = self.try_cancel(task_id) {
            warn!(task_id, %err, "failed to cancel due reminder");
        }
    }

    fn try_cancel(&self, task_id: &str) -> Result<(), ReminderError> {
        let mut map = self.read_map();
        let Some(id) = map.get(task_id).cloned() else {
            return Ok(());
        };
        match self.platform.cancel(&id) {
            Ok(()) => {}
            Err(PlatformError::UnknownNotification(_)) => {
                debug!(task_id, %id, "platform no longer knows notification");
            }
            Err(err) => return Err(err.into()),
        }
        map.remove(task_id);
        self.write_map(&map)?;
        debug!(task_id, %id, "cancelled due reminder");
        Ok(())
    }

    fn build_request(
        &self,
        input: &TaskNotificationInput,
        trigger: DateTime<Utc>,
    ) -> NotificationRequest {
        let title = match input.priority {
            TaskPriority::High => "High-priority task due",
            TaskPriority::Medium | TaskPriority::Low => "Task due",
        };
        NotificationRequest {
            title: title.to_string(),
            body: input.title.clone(),
            priority: input.priority,
            payload: NotificationPayload::TaskDue {
                task_id: input.task_id.clone(),
                route: self.route.clone(),
            },
            scheduled_for: trigger,
        }
    }

    fn read_map(&self) -> TaskNotificationMap {
        match storage::load_json::<TaskNotificationMap>(
            self.store.as_ref(),
            TASK_NOTIFICATION_MAP_KEY,
        ) {
            Ok(map) => map.unwrap_or_default(),
            Err(err) => {
                warn!(%err, "unable to read task notification map, treating as empty");
                TaskNotificationMap::new()
            }
        }
    }

    fn write_map(&self, map: &TaskNotificationMap) -> Result<(), StorageError> {
        storage::save_json(self.store.as_ref(), TASK_NOTIFICATION_MAP_KEY, map)
    }
}
