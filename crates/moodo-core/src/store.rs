use chrono::{DateTime, SubsecRound, TimeZone, Utc};
use tracing::{debug, instrument, trace, warn};

use crate::effects::{Effect, EffectHandler};
use crate::summary::{self, Summary};
use crate::task::{Priority, Task, TaskId};
use crate::view;

/// User intents that can change the task list.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Add { text: String },
    ToggleComplete { id: TaskId },
    SubmitMood { id: TaskId, mood: String },
    CancelMood,
    Edit { id: TaskId, text: String },
    SetPriority { id: TaskId, priority: Priority },
    SetDueDate { id: TaskId, due: DateTime<Utc> },
    Delete { id: TaskId },
}

/// A completion toggle waiting for its mood. Lives beside the list, never in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCompletion {
    pub task_id: TaskId,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskListState {
    tasks: Vec<Task>,
    pending: Option<PendingCompletion>,
    last_id: u64,
}

impl TaskListState {
    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        let last_id = tasks
            .iter()
            .filter_map(|task| task.id.millis())
            .max()
            .unwrap_or(0);
        Self {
            tasks,
            pending: None,
            last_id,
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn pending(&self) -> Option<&PendingCompletion> {
        self.pending.as_ref()
    }

    pub fn find(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| &task.id == id)
    }

    /// Number of tasks not yet completed.
    pub fn remaining(&self) -> usize {
        self.tasks.iter().filter(|task| !task.completed).count()
    }

    fn find_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|task| &task.id == id)
    }

    fn mint_id(&mut self, now: DateTime<Utc>) -> Option<TaskId> {
        let clock = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        match self.last_id.checked_add(1) {
            Some(after_last) => {
                let next = clock.max(after_last);
                self.last_id = next;
                Some(TaskId::from_millis(next))
            }
            // stored ids ran the counter to the top; take the first free
            // id from the clock onward
            None => (clock..=u64::MAX)
                .map(TaskId::from_millis)
                .find(|id| self.find(id).is_none()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: TaskListState,
    /// Whether the task list itself changed.
    pub changed: bool,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn unchanged(state: &TaskListState) -> Self {
        Self {
            state: state.clone(),
            changed: false,
            effects: Vec::new(),
        }
    }
}

/// Applies one action. Pure: the clock is an argument and all I/O is returned
/// as effects.
pub fn reduce(state: &TaskListState, action: Action, now: DateTime<Utc>) -> Transition {
    let mut next = state.clone();
    let mut effects = Vec::new();

    let changed = match action {
        Action::Add { text } => {
            if text.trim().is_empty() {
                false
            } else if let Some(id) = next.mint_id(now) {
                next.tasks.push(Task::new(id, text));
                true
            } else {
                warn!("no free task id left; task not added");
                false
            }
        }
        Action::ToggleComplete { id } => match next.find(&id).map(|task| task.completed) {
            None => false,
            Some(true) => {
                if let Some(task) = next.find_mut(&id) {
                    task.reopen();
                }
                true
            }
            Some(false) => {
                next.pending = Some(PendingCompletion {
                    task_id: id.clone(),
                });
                effects.push(Effect::RequestMood(id));
                false
            }
        },
        Action::SubmitMood { id, mood } => {
            let is_pending = next
                .pending
                .as_ref()
                .is_some_and(|pending| pending.task_id == id);
            if !is_pending {
                return Transition::unchanged(state);
            }
            next.pending = None;
            match next.find_mut(&id) {
                Some(task) => {
                    task.complete(mood, now);
                    true
                }
                None => false,
            }
        }
        Action::CancelMood => {
            if next.pending.is_none() {
                return Transition::unchanged(state);
            }
            next.pending = None;
            false
        }
        Action::Edit { id, text } => match next.find_mut(&id) {
            Some(task) => {
                task.text = text;
                true
            }
            None => false,
        },
        Action::SetPriority { id, priority } => match next.find_mut(&id) {
            Some(task) => {
                task.priority = Some(priority);
                true
            }
            None => false,
        },
        Action::SetDueDate { id, due } => match next.find_mut(&id) {
            Some(task) => {
                task.due_date = Some(due);
                effects.push(Effect::ScheduleReminder(task.clone()));
                true
            }
            None => false,
        },
        Action::Delete { id } => {
            let before = next.tasks.len();
            next.tasks.retain(|task| task.id != id);
            if next
                .pending
                .as_ref()
                .is_some_and(|pending| pending.task_id == id)
            {
                next.pending = None;
            }
            next.tasks.len() != before
        }
    };

    if changed {
        effects.insert(0, Effect::Persist(next.tasks.clone()));
    }

    Transition {
        state: next,
        changed,
        effects,
    }
}

type Observer = Box<dyn FnMut(&[Task])>;

/// State container: runs the reducer, notifies observers when the list
/// changes and hands effects to the handler.
pub struct TaskStore {
    state: TaskListState,
    observers: Vec<Observer>,
    effects: Box<dyn EffectHandler>,
}

impl TaskStore {
    pub fn new(tasks: Vec<Task>, effects: Box<dyn EffectHandler>) -> Self {
        Self {
            state: TaskListState::from_tasks(tasks),
            observers: Vec::new(),
            effects,
        }
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&[Task]) + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Dispatches with the current time, truncated to the millisecond
    /// precision used on disk.
    pub fn dispatch(&mut self, action: Action) -> Vec<Effect> {
        self.dispatch_at(action, Utc::now().trunc_subsecs(3))
    }

    #[instrument(skip(self, now))]
    pub fn dispatch_at(&mut self, action: Action, now: DateTime<Utc>) -> Vec<Effect> {
        let transition = reduce(&self.state, action, now);
        self.state = transition.state;

        if transition.changed {
            trace!(observers = self.observers.len(), "notifying observers");
            for observer in &mut self.observers {
                observer(&self.state.tasks);
            }
        } else {
            debug!("action left the task list unchanged");
        }

        for effect in &transition.effects {
            self.effects.handle(effect);
        }
        transition.effects
    }

    pub fn add(&mut self, text: impl Into<String>) -> Vec<Effect> {
        self.dispatch(Action::Add { text: text.into() })
    }

    pub fn toggle_complete(&mut self, id: &TaskId) -> Vec<Effect> {
        self.dispatch(Action::ToggleComplete { id: id.clone() })
    }

    pub fn set_mood(&mut self, id: &TaskId, mood: impl Into<String>) -> Vec<Effect> {
        self.dispatch(Action::SubmitMood {
            id: id.clone(),
            mood: mood.into(),
        })
    }

    pub fn cancel_mood(&mut self) -> Vec<Effect> {
        self.dispatch(Action::CancelMood)
    }

    pub fn edit(&mut self, id: &TaskId, text: impl Into<String>) -> Vec<Effect> {
        self.dispatch(Action::Edit {
            id: id.clone(),
            text: text.into(),
        })
    }

    pub fn set_priority(&mut self, id: &TaskId, priority: Priority) -> Vec<Effect> {
        self.dispatch(Action::SetPriority {
            id: id.clone(),
            priority,
        })
    }

    pub fn set_due_date(&mut self, id: &TaskId, due: DateTime<Utc>) -> Vec<Effect> {
        self.dispatch(Action::SetDueDate {
            id: id.clone(),
            due: due.trunc_subsecs(3),
        })
    }

    pub fn delete(&mut self, id: &TaskId) -> Vec<Effect> {
        self.dispatch(Action::Delete { id: id.clone() })
    }

    pub fn state(&self) -> &TaskListState {
        &self.state
    }

    pub fn tasks(&self) -> &[Task] {
        self.state.tasks()
    }

    pub fn pending(&self) -> Option<&PendingCompletion> {
        self.state.pending()
    }

    pub fn remaining(&self) -> usize {
        self.state.remaining()
    }

    /// Display order, recomputed on every call.
    pub fn sorted(&self) -> Vec<&Task> {
        view::sorted(self.state.tasks())
    }

    pub fn summary<Z: TimeZone>(&self, tz: &Z) -> Summary {
        summary::summarize(self.state.tasks(), tz)
    }

    pub fn flush(&mut self) {
        self.effects.flush();
    }
}
