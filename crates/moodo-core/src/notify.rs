use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::datetime::iso_date_serde;
use crate::task::{Task, TaskId};

pub const REMINDER_TITLE: &str = "Task Reminder";

/// Shown once at startup when reminders cannot be delivered.
pub const PERMISSION_DENIED_ALERT: &str = "Failed to get push token for push notification!";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reminder {
    pub task_id: TaskId,
    pub title: String,
    pub body: String,
    #[serde(with = "iso_date_serde")]
    pub trigger: DateTime<Utc>,
}

impl Reminder {
    /// `None` when the task has no due date.
    pub fn for_task(task: &Task) -> Option<Self> {
        let trigger = task.due_date?;
        Some(Self {
            task_id: task.id.clone(),
            title: REMINDER_TITLE.to_string(),
            body: task.text.clone(),
            trigger,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

/// Delivery backend for reminders.
pub trait Notifier: Send {
    fn request_permission(&mut self) -> anyhow::Result<Permission>;
    fn schedule(&mut self, reminder: &Reminder) -> anyhow::Result<()>;
}

/// Asks for permission once and then forwards reminders, skipping them
/// silently when permission was refused.
pub struct ReminderScheduler {
    notifier: Box<dyn Notifier>,
    permission: Permission,
}

impl ReminderScheduler {
    /// Requests permission. The second value is the alert to surface when
    /// permission was not granted.
    #[instrument(skip(notifier))]
    pub fn start(mut notifier: Box<dyn Notifier>) -> (Self, Option<&'static str>) {
        let permission = match notifier.request_permission() {
            Ok(permission) => permission,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "permission request failed");
                Permission::Denied
            }
        };
        info!(?permission, "notification permission resolved");

        let alert = (permission == Permission::Denied).then_some(PERMISSION_DENIED_ALERT);
        (
            Self {
                notifier,
                permission,
            },
            alert,
        )
    }

    pub fn permission(&self) -> Permission {
        self.permission
    }

    #[instrument(skip(self, task), fields(id = %task.id))]
    pub fn schedule_for(&mut self, task: &Task) {
        if self.permission == Permission::Denied {
            debug!("notifications not permitted; skipping reminder");
            return;
        }
        let Some(reminder) = Reminder::for_task(task) else {
            return;
        };
        match self.notifier.schedule(&reminder) {
            Ok(()) => info!(trigger = %reminder.trigger, "scheduled reminder"),
            Err(err) => warn!(error = %format!("{err:#}"), "failed to schedule reminder"),
        }
    }
}

/// Appends reminders as JSON lines to a local outbox file for an external
/// delivery agent to pick up.
#[derive(Debug)]
pub struct OutboxNotifier {
    path: PathBuf,
    enabled: bool,
}

impl OutboxNotifier {
    pub const FILE_NAME: &'static str = "reminders.jsonl";

    pub fn new(data_dir: &Path, enabled: bool) -> Self {
        Self {
            path: data_dir.join(Self::FILE_NAME),
            enabled,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every reminder written so far.
    pub fn load(path: &Path) -> anyhow::Result<Vec<Reminder>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed reading {}", path.display()))?;
        raw.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .enumerate()
            .map(|(idx, line)| {
                serde_json::from_str(line)
                    .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))
            })
            .collect()
    }
}

impl Notifier for OutboxNotifier {
    fn request_permission(&mut self) -> anyhow::Result<Permission> {
        Ok(if self.enabled {
            Permission::Granted
        } else {
            Permission::Denied
        })
    }

    fn schedule(&mut self, reminder: &Reminder) -> anyhow::Result<()> {
        let line = serde_json::to_string(reminder)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    use super::{
        OutboxNotifier, PERMISSION_DENIED_ALERT, Permission, REMINDER_TITLE, Reminder,
        ReminderScheduler,
    };
    use crate::task::{Task, TaskId};

    fn due_task() -> Task {
        let mut task = Task::new(TaskId::from_millis(3), "renew passport".to_string());
        task.due_date = Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).single();
        task
    }

    #[test]
    fn reminder_uses_fixed_title_and_task_text() {
        let reminder = Reminder::for_task(&due_task()).expect("has due date");
        assert_eq!(reminder.title, REMINDER_TITLE);
        assert_eq!(reminder.body, "renew passport");

        let undated = Task::new(TaskId::from_millis(4), "someday".to_string());
        assert!(Reminder::for_task(&undated).is_none());
    }

    #[test]
    fn granted_scheduler_writes_outbox() {
        let temp = tempdir().expect("tempdir");
        let notifier = OutboxNotifier::new(temp.path(), true);
        let path = notifier.path().to_path_buf();

        let (mut scheduler, alert) = ReminderScheduler::start(Box::new(notifier));
        assert!(alert.is_none());
        assert_eq!(scheduler.permission(), Permission::Granted);

        scheduler.schedule_for(&due_task());
        let written = OutboxNotifier::load(&path).expect("load outbox");
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].body, "renew passport");
    }

    #[test]
    fn denied_scheduler_alerts_once_and_skips() {
        let temp = tempdir().expect("tempdir");
        let notifier = OutboxNotifier::new(temp.path(), false);
        let path = notifier.path().to_path_buf();

        let (mut scheduler, alert) = ReminderScheduler::start(Box::new(notifier));
        assert_eq!(alert, Some(PERMISSION_DENIED_ALERT));

        scheduler.schedule_for(&due_task());
        assert!(OutboxNotifier::load(&path).expect("load outbox").is_empty());
    }
}
