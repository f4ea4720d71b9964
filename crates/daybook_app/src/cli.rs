use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use daybook_domain::task::TaskPriority;

#[derive(Parser, Debug)]
#[command(name = "daybook", about = "Due-date reminders for Daybook tasks", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding the reminder store (overrides DAYBOOK_DATA_DIR)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Schedule or replace the due-date reminder for a task
    Schedule(ScheduleArgs),
    /// Cancel the reminder for a task
    Cancel {
        task_id: String,
    },
    /// Show tracked reminders and pending notifications
    List,
    /// Deliver every notification that is due now
    Deliver,
    /// Show or change reminder settings
    Settings(SettingsArgs),
    /// Ask the platform for notification permission
    Permission,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ScheduleArgs {
    pub task_id: String,
    pub title: String,
    #[arg(long, default_value = "medium")]
    pub priority: TaskPriority,
    /// Due date, e.g. 2024-01-05 or 2024-01-05T17:00:00Z
    #[arg(long)]
    pub due: Option<String>,
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsArgs {
    /// Turn due-date reminders on or off
    #[arg(long)]
    pub enabled: Option<bool>,
    /// Reminder time of day as HH:MM
    #[arg(long)]
    pub time: Option<String>,
}
