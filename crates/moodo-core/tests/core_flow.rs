use std::fs;
use std::io::Cursor;
use std::sync::Arc;

use chrono::{Duration, Utc};
use moodo_core::cli::Command;
use moodo_core::commands::{Session, apply};
use moodo_core::config::Config;
use moodo_core::datastore::DataStore;
use moodo_core::effects::{AppEffects, PersistWriter};
use moodo_core::notify::{OutboxNotifier, ReminderScheduler};
use moodo_core::render::Renderer;
use moodo_core::storage::FileStorage;
use moodo_core::store::TaskStore;
use moodo_core::summary::Summary;
use moodo_core::task::Priority;
use tempfile::tempdir;

#[test]
fn store_mutations_reach_disk_and_reload() {
    let temp = tempdir().expect("tempdir");
    let storage = FileStorage::open(temp.path()).expect("open storage");
    let datastore = DataStore::new(Arc::new(storage));

    let notifier = OutboxNotifier::new(temp.path(), true);
    let outbox = notifier.path().to_path_buf();
    let (reminders, alert) = ReminderScheduler::start(Box::new(notifier));
    assert!(alert.is_none());

    let writer = PersistWriter::spawn(datastore.clone()).expect("spawn writer");
    let mut store = TaskStore::new(Vec::new(), Box::new(AppEffects::new(writer, reminders)));

    store.add("write changelog");
    store.add("book flights");
    let first = store.tasks()[0].id.clone();
    let second = store.tasks()[1].id.clone();

    store.set_priority(&second, Priority::High);
    store.set_due_date(&second, Utc::now() + Duration::days(1));
    store.toggle_complete(&first);
    store.set_mood(&first, "😀");
    store.flush();

    let reloaded = datastore.load().expect("reload");
    assert_eq!(reloaded, store.tasks());
    assert!(reloaded[0].completed);
    assert!(reloaded[0].completed_at.is_some());
    assert_eq!(reloaded[1].priority, Some(Priority::High));

    let sent = OutboxNotifier::load(&outbox).expect("outbox");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].body, "book flights");

    let sorted: Vec<&str> = store.sorted().iter().map(|task| task.text.as_str()).collect();
    assert_eq!(sorted, vec!["book flights", "write changelog"]);

    match store.summary(&Utc) {
        Summary::Report(report) => assert_eq!(report.moods, vec![("😀".to_string(), 1)]),
        Summary::NoData => panic!("expected a summary report"),
    }
}

#[test]
fn deleting_the_last_task_is_persisted() {
    let temp = tempdir().expect("tempdir");
    let storage = FileStorage::open(temp.path()).expect("open storage");
    let datastore = DataStore::new(Arc::new(storage));
    let notifier = OutboxNotifier::new(temp.path(), false);
    let (reminders, _) = ReminderScheduler::start(Box::new(notifier));
    let writer = PersistWriter::spawn(datastore.clone()).expect("spawn writer");
    let mut store = TaskStore::new(Vec::new(), Box::new(AppEffects::new(writer, reminders)));

    store.add("temporary");
    let id = store.tasks()[0].id.clone();
    store.delete(&id);
    store.flush();

    assert!(datastore.load().expect("reload").is_empty());
}

#[test]
fn session_commands_drive_the_mood_flow() {
    let temp = tempdir().expect("tempdir");
    let mut cfg = Config::default();
    cfg.apply_overrides([("timezone".to_string(), "UTC".to_string())]);
    let mut renderer = Renderer::new(&cfg).expect("renderer");

    {
        let mut session = Session::open(&cfg, temp.path()).expect("open session");
        let mut no_input = Cursor::new(Vec::new());
        for command in [
            Command::Add {
                text: vec!["low".to_string(), "one".to_string()],
            },
            Command::Add {
                text: vec!["urgent".to_string()],
            },
            Command::Priority {
                task: "1".to_string(),
                level: "low".to_string(),
            },
        ] {
            apply(&mut session, &mut renderer, command, &mut no_input).expect("apply");
        }

        // "urgent" is now first in display order
        let mut answer = Cursor::new(b"2\n".to_vec());
        apply(
            &mut session,
            &mut renderer,
            Command::Toggle {
                task: "1".to_string(),
                mood: None,
            },
            &mut answer,
        )
        .expect("toggle");

        let urgent = session
            .store
            .tasks()
            .iter()
            .find(|task| task.text == "urgent")
            .expect("urgent task");
        assert!(urgent.completed);
        assert_eq!(urgent.mood.as_deref(), Some("😐"));

        let mut cancel = Cursor::new(b"\n".to_vec());
        apply(
            &mut session,
            &mut renderer,
            Command::Toggle {
                task: "1".to_string(),
                mood: None,
            },
            &mut cancel,
        )
        .expect("toggle with cancel");
        assert!(session.store.pending().is_none());
        assert_eq!(session.store.remaining(), 1);
        session.store.flush();
    }

    let reopened = Session::open(&cfg, temp.path()).expect("reopen session");
    assert_eq!(reopened.store.tasks().len(), 2);
    assert_eq!(reopened.store.remaining(), 1);
}

#[test]
fn malformed_todos_abort_startup() {
    let temp = tempdir().expect("tempdir");
    fs::write(temp.path().join("todos.json"), "[{\"id\":1}]").expect("write");
    assert!(Session::open(&Config::default(), temp.path()).is_err());
}

#[test]
fn unknown_selector_is_an_error() {
    let temp = tempdir().expect("tempdir");
    let cfg = Config::default();
    let mut renderer = Renderer::new(&cfg).expect("renderer");
    let mut session = Session::open(&cfg, temp.path()).expect("open session");
    let result = apply(
        &mut session,
        &mut renderer,
        Command::Delete {
            task: "7".to_string(),
        },
        &mut Cursor::new(Vec::new()),
    );
    assert!(result.is_err());
}
