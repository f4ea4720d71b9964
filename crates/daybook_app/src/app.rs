use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use daybook_domain::{
    notifications::OutboxPlatform,
    service::DEFAULT_TASK_ROUTE,
    settings::{SettingsProvider, StoredSettings},
    storage::{JsonFileStore, KeyValueStore},
    task::TaskNotificationInput,
    TaskReminderService,
};
use tracing::{debug, info};

use crate::cli::{Command, ScheduleArgs, SettingsArgs};

const STORE_FILE_NAME: &str = "daybook.json";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub(crate) data_dir: PathBuf,
    pub(crate) task_route: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(dir) = std::env::var("DAYBOOK_DATA_DIR") {
            if !dir.trim().is_empty() {
                config.data_dir = PathBuf::from(dir);
            }
        }
        if let Ok(route) = std::env::var("DAYBOOK_TASK_ROUTE") {
            let route = route.trim();
            if !route.is_empty() {
                config.task_route = route.to_string();
            }
        }
        Ok(config)
    }

    pub fn with_data_dir(mut self, dir: PathBuf) -> Self {
        self.data_dir = dir;
        self
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(STORE_FILE_NAME)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("daybook");
        Self {
            data_dir,
            task_route: DEFAULT_TASK_ROUTE.to_string(),
        }
    }
}

/// Reminder service wired to the on-disk store and the outbox platform.
pub struct Host {
    settings: StoredSettings,
    platform: Arc<OutboxPlatform>,
    reminders: TaskReminderService,
}

impl Host {
    pub fn open(config: &AppConfig) -> Result<Self> {
        let path = config.store_path();
        let store: Arc<dyn KeyValueStore> = Arc::new(
            JsonFileStore::open(&path)
                .with_context(|| format!("failed to open reminder store {}", path.display()))?,
        );
        info!(path = %path.display(), "opened reminder store");
        let settings = StoredSettings::new(store.clone());
        let platform = Arc::new(OutboxPlatform::new(store.clone()));
        let reminders = TaskReminderService::builder(store, platform.clone())
            .with_settings(Arc::new(settings.clone()))
            .with_route(config.task_route.clone())
            .build();
        Ok(Self {
            settings,
            platform,
            reminders,
        })
    }
}

pub fn run(config: AppConfig, command: Command, out: &mut impl Write) -> Result<()> {
    let host = Host::open(&config)?;
    match command {
        Command::Schedule(args) => schedule(&host, args, out),
        Command::Cancel { task_id } => {
            host.reminders.cancel_due_reminder(&task_id);
            writeln!(out, "cancelled reminder for {task_id}")?;
            Ok(())
        }
        Command::List => list(&host, out),
        Command::Deliver => deliver(&host, out),
        Command::Settings(args) => settings(&host, args, out),
        Command::Permission => {
            let granted = host.reminders.request_permission();
            writeln!(out, "permission {}", if granted { "granted" } else { "denied" })?;
            Ok(())
        }
    }
}

fn schedule(host: &Host, args: ScheduleArgs, out: &mut impl Write) -> Result<()> {
    let mut input =
        TaskNotificationInput::new(args.task_id, args.title).with_priority(args.priority);
    input.due_date = args.due;
    match host.reminders.schedule_due_reminder(&input) {
        Some(id) => writeln!(out, "scheduled {} for {}", id, input.task_id)?,
        None => writeln!(out, "no reminder scheduled for {}", input.task_id)?,
    }
    Ok(())
}

fn list(host: &Host, out: &mut impl Write) -> Result<()> {
    let tracked = host.reminders.scheduled_reminders();
    let pending = host
        .platform
        .pending()
        .context("failed to read pending notifications")?;
    if tracked.is_empty() {
        writeln!(out, "no reminders")?;
        return Ok(());
    }
    for (task_id, id) in &tracked {
        let when = pending
            .iter()
            .find(|entry| &entry.id == id)
            .map(|entry| entry.request.scheduled_for.with_timezone(&Local).to_rfc3339())
            .unwrap_or_else(|| "delivered".to_string());
        writeln!(out, "{task_id}\t{id}\t{when}")?;
    }
    Ok(())
}

fn deliver(host: &Host, out: &mut impl Write) -> Result<()> {
    let due = host
        .platform
        .take_due(Utc::now())
        .context("failed to drain due notifications")?;
    debug!(count = due.len(), "delivering due notifications");
    for entry in due {
        let task_id = entry.request.payload.task_id();
        writeln!(out, "{}: {}", entry.request.title, entry.request.body)?;
        host.reminders.acknowledge_delivery(task_id, &entry.id);
    }
    Ok(())
}

fn settings(host: &Host, args: SettingsArgs, out: &mut impl Write) -> Result<()> {
    let mut current = host
        .settings
        .load_app_settings()
        .context("failed to load settings")?;
    if args.enabled.is_some() || args.time.is_some() {
        if let Some(enabled) = args.enabled {
            current.task_reminders = enabled;
        }
        if let Some(time) = args.time {
            current.task_reminder_time = time;
        }
        host.settings
            .save(&current)
            .context("failed to save settings")?;
    }
    let effective = current.reminder_time();
    writeln!(
        out,
        "reminders {} at {:02}:{:02}",
        if current.task_reminders { "on" } else { "off" },
        effective.hour,
        effective.minute
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn run_to_string(config: &AppConfig, command: Command) -> String {
        let mut out = Vec::new();
        run(config.clone(), command, &mut out).expect("command succeeds");
        String::from_utf8(out).expect("utf8 output")
    }

    #[test]
    fn schedule_list_and_cancel_through_store() {
        let temp = tempdir().expect("tempdir");
        let config = AppConfig::default().with_data_dir(temp.path().to_path_buf());

        let output = run_to_string(
            &config,
            Command::Schedule(ScheduleArgs {
                task_id: "t1".into(),
                title: "Pay rent".into(),
                priority: Default::default(),
                due: Some("2999-01-05".into()),
            }),
        );
        assert!(output.starts_with("scheduled "), "{output}");

        let listing = run_to_string(&config, Command::List);
        assert!(listing.starts_with("t1\t"), "{listing}");
        assert!(listing.contains("2999-01-05"), "{listing}");

        run_to_string(&config, Command::Cancel { task_id: "t1".into() });
        assert_eq!(run_to_string(&config, Command::List), "no reminders\n");
    }

    #[test]
    fn settings_persist_and_disable_scheduling() {
        let temp = tempdir().expect("tempdir");
        let config = AppConfig::default().with_data_dir(temp.path().to_path_buf());

        let output = run_to_string(
            &config,
            Command::Settings(SettingsArgs {
                enabled: Some(false),
                time: Some("25:99".into()),
            }),
        );
        assert_eq!(output, "reminders off at 09:00\n");

        let output = run_to_string(
            &config,
            Command::Schedule(ScheduleArgs {
                task_id: "t1".into(),
                title: "Pay rent".into(),
                priority: Default::default(),
                due: Some("2999-01-05".into()),
            }),
        );
        assert_eq!(output, "no reminder scheduled for t1\n");
    }

    #[test]
    fn deliver_with_empty_outbox_prints_nothing() {
        let temp = tempdir().expect("tempdir");
        let config = AppConfig::default().with_data_dir(temp.path().to_path_buf());

        assert_eq!(run_to_string(&config, Command::Deliver), "");
        assert_eq!(run_to_string(&config, Command::Permission), "permission granted\n");
    }
}
