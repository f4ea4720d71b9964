use std::sync::Arc;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::storage::{self, KeyValueStore, StorageError};

pub const APP_SETTINGS_KEY: &str = "app_settings";

const DEFAULT_REMINDER_HOUR: u32 = 9;
const DEFAULT_REMINDER_MINUTE: u32 = 0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub task_reminders: bool,
    pub task_reminder_time: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            task_reminders: true,
            task_reminder_time: "09:00".to_string(),
        }
    }
}

impl AppSettings {
    pub fn reminder_time(&self) -> ReminderTime {
        ReminderTime::parse(&self.task_reminder_time)
    }
}

/// Wall-clock time of day at which due-date reminders fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderTime {
    pub hour: u32,
    pub minute: u32,
}

impl Default for ReminderTime {
    fn default() -> Self {
        Self {
            hour: DEFAULT_REMINDER_HOUR,
            minute: DEFAULT_REMINDER_MINUTE,
        }
    }
}

impl ReminderTime {
    /// Parses `HH:MM`; anything after a second colon is ignored. Each
    /// component is taken on its own: a component that is missing, not a
    /// number, or outside `0..=23` / `0..=59` falls back to the default of
    /// 09:00.
    pub fn parse(raw: &str) -> Self {
        let mut parts = raw.trim().split(':');
        let hour = parse_component(parts.next(), 23).unwrap_or(DEFAULT_REMINDER_HOUR);
        let minute = parse_component(parts.next(), 59).unwrap_or(DEFAULT_REMINDER_MINUTE);
        Self { hour, minute }
    }

    pub fn as_naive_time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }
}

fn parse_component(part: Option<&str>, max: u32) -> Option<u32> {
    let value: u32 = part?.trim().parse().ok()?;
    (value <= max).then_some(value)
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("settings storage unavailable: {0}")]
    Storage(#[from] StorageError),
    #[error("settings unavailable: {0}")]
    Unavailable(String),
}

/// Supplies the user's reminder preferences.
pub trait SettingsProvider: Send + Sync {
    fn load_app_settings(&self) -> Result<AppSettings, SettingsError>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticSettings(pub AppSettings);

impl SettingsProvider for StaticSettings {
    fn load_app_settings(&self) -> Result<AppSettings, SettingsError> {
        Ok(self.0.clone())
    }
}

/// Settings kept as JSON under [`APP_SETTINGS_KEY`] in a key-value store.
#[derive(Clone)]
pub struct StoredSettings {
    store: Arc<dyn KeyValueStore>,
}

impl StoredSettings {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn save(&self, settings: &AppSettings) -> Result<(), SettingsError> {
        storage::save_json(self.store.as_ref(), APP_SETTINGS_KEY, settings)?;
        tracing::debug!(
            enabled = settings.task_reminders,
            time = %settings.task_reminder_time,
            "saved reminder settings"
        );
        Ok(())
    }
}

impl SettingsProvider for StoredSettings {
    fn load_app_settings(&self) -> Result<AppSettings, SettingsError> {
        let stored = storage::load_json::<AppSettings>(self.store.as_ref(), APP_SETTINGS_KEY)?;
        Ok(stored.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn reminder_time_falls_back_per_component() {
        assert_eq!(ReminderTime::parse("08:30"), ReminderTime { hour: 8, minute: 30 });
        assert_eq!(ReminderTime::parse("25:99"), ReminderTime { hour: 9, minute: 0 });
        assert_eq!(ReminderTime::parse("07:99"), ReminderTime { hour: 7, minute: 0 });
        assert_eq!(ReminderTime::parse("ab:15"), ReminderTime { hour: 9, minute: 15 });
        assert_eq!(ReminderTime::parse("18"), ReminderTime { hour: 18, minute: 0 });
        assert_eq!(ReminderTime::parse("08:30:00"), ReminderTime { hour: 8, minute: 30 });
        assert_eq!(ReminderTime::parse(""), ReminderTime::default());
        assert_eq!(ReminderTime::parse(" 23:59 ").as_naive_time().to_string(), "23:59:00");
    }

    #[test]
    fn stored_settings_default_when_absent() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let settings = StoredSettings::new(store.clone());
        assert_eq!(settings.load_app_settings().unwrap(), AppSettings::default());

        let custom = AppSettings {
            task_reminders: false,
            task_reminder_time: "07:45".into(),
        };
        settings.save(&custom).unwrap();
        assert_eq!(settings.load_app_settings().unwrap(), custom);

        let raw = store.get(APP_SETTINGS_KEY).unwrap().unwrap();
        assert!(raw.contains("\"taskReminderTime\":\"07:45\""));
    }

    #[test]
    fn partial_settings_fill_in_defaults() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(APP_SETTINGS_KEY, r#"{"taskReminders":false}"#.into())
            .unwrap();
        let loaded = StoredSettings::new(store).load_app_settings().unwrap();
        assert!(!loaded.task_reminders);
        assert_eq!(loaded.task_reminder_time, "09:00");
    }
}
