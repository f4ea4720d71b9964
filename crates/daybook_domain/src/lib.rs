pub mod clock;
pub mod notifications;
pub mod schedule;
pub mod service;
pub mod settings;
pub mod storage;
pub mod task;

pub use crate::service::{TaskReminderService, TaskReminderServiceBuilder};
