use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, error, info};

use crate::storage::KeyValueStorage;
use crate::task::Task;

/// Storage key holding the whole task list.
pub const TASKS_KEY: &str = "todos";

/// Reads and writes the task list as one JSON document under [`TASKS_KEY`].
#[derive(Clone)]
pub struct DataStore {
    storage: Arc<dyn KeyValueStorage>,
}

impl DataStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    /// Loads the stored list. A storage read failure is logged and yields an
    /// empty list; a document that does not parse is an error.
    #[tracing::instrument(skip(self))]
    pub fn load(&self) -> anyhow::Result<Vec<Task>> {
        let raw = match self.storage.get(TASKS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("no stored todos; starting empty");
                return Ok(Vec::new());
            }
            Err(err) => {
                error!(error = %format!("{err:#}"), "failed to load todos; starting empty");
                return Ok(Vec::new());
            }
        };

        let tasks = decode_tasks(&raw).context("stored todos are malformed")?;
        info!(count = tasks.len(), "loaded todos");
        Ok(tasks)
    }

    #[tracing::instrument(skip(self, tasks), fields(count = tasks.len()))]
    pub fn save(&self, tasks: &[Task]) -> anyhow::Result<()> {
        let payload = encode_tasks(tasks)?;
        self.storage
            .set(TASKS_KEY, &payload)
            .context("failed to save todos")
    }
}

pub fn encode_tasks(tasks: &[Task]) -> anyhow::Result<String> {
    serde_json::to_string(tasks).context("failed to serialize todos")
}

pub fn decode_tasks(raw: &str) -> anyhow::Result<Vec<Task>> {
    serde_json::from_str(raw).context("failed to parse todos")
}
