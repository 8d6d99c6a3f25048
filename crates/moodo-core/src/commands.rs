use std::io::{self, BufRead};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use chrono::Utc;
use chrono_tz::Tz;
use tracing::{debug, info, instrument};

use crate::cli::Command;
use crate::config::Config;
use crate::datastore::DataStore;
use crate::datetime::{parse_when, resolve_timezone};
use crate::effects::{AppEffects, Effect, PersistWriter};
use crate::notify::{OutboxNotifier, ReminderScheduler};
use crate::render::Renderer;
use crate::storage::FileStorage;
use crate::store::TaskStore;
use crate::task::{MOOD_PALETTE, Priority, Task, TaskId};
use crate::ticker::IntervalTicks;
use crate::timer::{FocusTimer, TickOutcome};
use crate::view;

/// An opened task list plus what commands need to interpret user input.
pub struct Session {
    pub store: TaskStore,
    pub tz: Tz,
    /// Alert to show once because reminders cannot be delivered.
    pub alert: Option<&'static str>,
}

impl Session {
    pub fn new(store: TaskStore, tz: Tz) -> Self {
        Self {
            store,
            tz,
            alert: None,
        }
    }

    /// Loads the list from `data_dir` and wires persistence and reminders.
    #[instrument(skip(cfg, data_dir))]
    pub fn open(cfg: &Config, data_dir: &Path) -> anyhow::Result<Self> {
        let storage = FileStorage::open(data_dir)?;
        let datastore = DataStore::new(Arc::new(storage));
        let tasks = datastore
            .load()
            .with_context(|| format!("failed to load todos from {}", data_dir.display()))?;

        let writer = PersistWriter::spawn(datastore)?;
        let notifier = OutboxNotifier::new(data_dir, cfg.notifications_enabled());
        let (reminders, alert) = ReminderScheduler::start(Box::new(notifier));

        let mut store = TaskStore::new(tasks, Box::new(AppEffects::new(writer, reminders)));
        store.subscribe(|tasks: &[Task]| {
            let open = tasks.iter().filter(|task| !task.completed).count();
            debug!(total = tasks.len(), open, "task list changed");
        });

        Ok(Self {
            store,
            tz: resolve_timezone(cfg.timezone().as_deref()),
            alert,
        })
    }

    fn resolve(&self, selector: &str) -> anyhow::Result<TaskId> {
        view::resolve_selector(self.store.tasks(), selector)
            .ok_or_else(|| anyhow!("no task matches {selector:?}; use a number from `moodo list`"))
    }

    fn task(&self, id: &TaskId) -> anyhow::Result<&Task> {
        self.store
            .state()
            .find(id)
            .ok_or_else(|| anyhow!("task {id} disappeared"))
    }
}

#[instrument(skip(cfg, data_dir, renderer))]
pub fn dispatch(
    cfg: &Config,
    data_dir: &Path,
    renderer: &mut Renderer,
    command: Command,
) -> anyhow::Result<()> {
    match command {
        Command::Timer {
            short_break,
            seconds,
        } => {
            let (label, configured) = if short_break {
                ("Break", cfg.break_seconds()?)
            } else {
                ("Focus", cfg.focus_seconds()?)
            };
            run_timer(renderer, label, seconds.unwrap_or(configured))
        }
        Command::Moods => renderer.print_moods(),
        command => {
            let mut session = Session::open(cfg, data_dir)?;
            if let Some(alert) = session.alert {
                renderer.print_alert(alert)?;
            }
            let result = apply(&mut session, renderer, command, &mut io::stdin().lock());
            session.store.flush();
            result
        }
    }
}

/// Runs one task-list command against an open session. `input` answers the
/// mood prompt.
#[instrument(skip(session, renderer, input))]
pub fn apply(
    session: &mut Session,
    renderer: &mut Renderer,
    command: Command,
    input: &mut dyn BufRead,
) -> anyhow::Result<()> {
    match command {
        Command::Add { text } => {
            let text = text.join(" ");
            let effects = session.store.add(text.clone());
            if persisted(&effects) {
                info!("added task");
                renderer.print_line(&format!("Added: {text}"))?;
            } else {
                renderer.print_line("Nothing added: task text is empty.")?;
            }
        }
        Command::List => {
            let rows = view::numbered(session.store.tasks());
            renderer.print_task_table(&rows, session.store.remaining(), &session.tz, Utc::now())?;
        }
        Command::Toggle { task, mood } => {
            let id = session.resolve(&task)?;
            let effects = session.store.toggle_complete(&id);
            if effects.contains(&Effect::RequestMood(id.clone())) {
                let mood = match mood {
                    Some(raw) => parse_mood(&raw),
                    None => prompt_mood(session.task(&id)?, renderer, input)?,
                };
                finish_completion(session, renderer, &id, mood)?;
            } else {
                renderer.print_line(&format!("Reopened: {}", session.task(&id)?.text))?;
            }
        }
        Command::Done { task, mood } => {
            let id = session.resolve(&task)?;
            if session.task(&id)?.completed {
                renderer.print_line("Already completed.")?;
                return Ok(());
            }
            let mood = parse_mood(&mood).ok_or_else(|| anyhow!("mood cannot be empty"))?;
            session.store.toggle_complete(&id);
            finish_completion(session, renderer, &id, Some(mood))?;
        }
        Command::Edit { task, text } => {
            let id = session.resolve(&task)?;
            session.store.edit(&id, text.join(" "));
            renderer.print_line("Updated.")?;
        }
        Command::Priority { task, level } => {
            let id = session.resolve(&task)?;
            let priority: Priority = level.parse()?;
            session.store.set_priority(&id, priority);
            renderer.print_line(&format!("Priority set to {priority}."))?;
        }
        Command::Due { task, when } => {
            let id = session.resolve(&task)?;
            let due = parse_when(&when.join(" "), Utc::now(), &session.tz)?;
            session.store.set_due_date(&id, due);
            renderer.print_line(&format!(
                "Due {}.",
                crate::datetime::format_local_date(due, &session.tz)
            ))?;
        }
        Command::Delete { task } => {
            let id = session.resolve(&task)?;
            session.store.delete(&id);
            renderer.print_line("Deleted.")?;
        }
        Command::Summary => {
            renderer.print_summary(&session.store.summary(&session.tz))?;
        }
        Command::Timer { .. } | Command::Moods => {
            return Err(anyhow!("command does not operate on the task list"));
        }
    }
    Ok(())
}

fn persisted(effects: &[Effect]) -> bool {
    effects
        .iter()
        .any(|effect| matches!(effect, Effect::Persist(_)))
}

fn finish_completion(
    session: &mut Session,
    renderer: &mut Renderer,
    id: &TaskId,
    mood: Option<String>,
) -> anyhow::Result<()> {
    match mood {
        Some(mood) => {
            session.store.set_mood(id, mood.clone());
            renderer.print_line(&format!("Completed {mood}: {}", session.task(id)?.text))?;
        }
        None => {
            session.store.cancel_mood();
            renderer.print_line("No mood picked; task left open.")?;
        }
    }
    Ok(())
}

fn prompt_mood(
    task: &Task,
    renderer: &mut Renderer,
    input: &mut dyn BufRead,
) -> anyhow::Result<Option<String>> {
    renderer.print_mood_prompt(task)?;
    let mut line = String::new();
    input
        .read_line(&mut line)
        .context("failed to read mood")?;
    Ok(parse_mood(&line))
}

/// A palette position (1-based) or a literal mood; blank means cancel.
pub fn parse_mood(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let from_palette = trimmed
        .parse::<usize>()
        .ok()
        .and_then(|idx| idx.checked_sub(1))
        .and_then(|idx| MOOD_PALETTE.get(idx));
    Some(from_palette.map_or_else(|| trimmed.to_string(), |mood| (*mood).to_string()))
}

fn run_timer(renderer: &mut Renderer, label: &str, seconds: u32) -> anyhow::Result<()> {
    let (source, ticks) = IntervalTicks::every_second();
    let mut timer = FocusTimer::new(source, seconds);
    renderer.print_clock(label, &timer.display())?;
    timer.toggle()?;
    info!(seconds, label, "timer running");

    while timer.is_running() {
        let token = ticks.recv().context("tick source stopped")?;
        match timer.tick(token) {
            TickOutcome::Counted { .. } => renderer.print_clock(label, &timer.display())?,
            TickOutcome::Expired => {
                renderer.print_clock(label, &timer.display())?;
                renderer.print_line(&format!("{label} session finished."))?;
            }
            TickOutcome::Ignored => {}
        }
    }
    Ok(())
}
