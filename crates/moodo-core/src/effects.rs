use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use anyhow::Context;
use tracing::{debug, error, info, warn};

use crate::datastore::DataStore;
use crate::notify::ReminderScheduler;
use crate::task::{Task, TaskId};

/// Side effects requested by a state transition. The reducer only describes
/// them; an [`EffectHandler`] carries them out.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Write this snapshot of the whole list.
    Persist(Vec<Task>),
    /// Ask the user which mood to log for the pending completion.
    RequestMood(TaskId),
    /// The task's due date changed; schedule a reminder for it.
    ScheduleReminder(Task),
}

pub trait EffectHandler {
    fn handle(&mut self, effect: &Effect);

    /// Blocks until effects handed over so far have been carried out.
    fn flush(&mut self) {}
}

/// Handler that drops everything. Useful when the store is driven without
/// any I/O attached.
#[derive(Debug, Default)]
pub struct DiscardEffects;

impl EffectHandler for DiscardEffects {
    fn handle(&mut self, effect: &Effect) {
        debug!(?effect, "discarding effect");
    }
}

enum WriteCommand {
    Save(Vec<Task>),
    Flush(Sender<()>),
}

/// Single background writer. Snapshots are written strictly in the order they
/// were submitted, so the newest snapshot is always the last one on disk.
pub struct PersistWriter {
    tx: Option<Sender<WriteCommand>>,
    worker: Option<JoinHandle<()>>,
}

impl PersistWriter {
    pub fn spawn(store: DataStore) -> anyhow::Result<Self> {
        let (tx, rx) = mpsc::channel();
        let worker = thread::Builder::new()
            .name("moodo-persist".to_string())
            .spawn(move || write_loop(store, rx))
            .context("failed to spawn persistence writer")?;
        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
        })
    }

    pub fn submit(&self, tasks: Vec<Task>) {
        let Some(tx) = self.tx.as_ref() else {
            return;
        };
        if tx.send(WriteCommand::Save(tasks)).is_err() {
            error!("persistence writer is gone; dropping snapshot");
        }
    }

    pub fn flush(&self) {
        let Some(tx) = self.tx.as_ref() else {
            return;
        };
        let (ack_tx, ack_rx) = mpsc::channel();
        if tx.send(WriteCommand::Flush(ack_tx)).is_err() || ack_rx.recv().is_err() {
            warn!("persistence writer exited before flush completed");
        }
    }
}

impl Drop for PersistWriter {
    fn drop(&mut self) {
        drop(self.tx.take());
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            error!("persistence writer panicked");
        }
    }
}

fn write_loop(store: DataStore, rx: Receiver<WriteCommand>) {
    debug!("persistence writer started");
    for command in rx {
        match command {
            WriteCommand::Save(tasks) => match store.save(&tasks) {
                Ok(()) => debug!(count = tasks.len(), "persisted todos"),
                Err(err) => error!(error = %format!("{err:#}"), "failed to save todos"),
            },
            WriteCommand::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    debug!("persistence writer stopped");
}

/// Effect handler wired to real collaborators: the persistence queue and the
/// reminder scheduler.
pub struct AppEffects {
    writer: PersistWriter,
    reminders: ReminderScheduler,
}

impl AppEffects {
    pub fn new(writer: PersistWriter, reminders: ReminderScheduler) -> Self {
        Self { writer, reminders }
    }
}

impl EffectHandler for AppEffects {
    fn handle(&mut self, effect: &Effect) {
        match effect {
            Effect::Persist(tasks) => self.writer.submit(tasks.clone()),
            Effect::ScheduleReminder(task) => self.reminders.schedule_for(task),
            Effect::RequestMood(id) => info!(%id, "mood requested for pending completion"),
        }
    }

    fn flush(&mut self) {
        self.writer.flush();
    }
}
