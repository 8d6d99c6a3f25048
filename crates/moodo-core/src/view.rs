use std::cmp::Ordering;

use crate::task::{Task, TaskId, priority_rank};

/// Display comparator: open before done, then priority rank, then due date
/// when both sides have one. Anything else compares equal.
pub fn compare_for_display(a: &Task, b: &Task) -> Ordering {
    a.completed
        .cmp(&b.completed)
        .then_with(|| priority_rank(a.priority).cmp(&priority_rank(b.priority)))
        .then_with(|| match (a.due_date, b.due_date) {
            (Some(a_due), Some(b_due)) => a_due.cmp(&b_due),
            _ => Ordering::Equal,
        })
}

/// Tasks in display order.
///
/// The due-date rule only applies when both tasks carry a date, so the
/// comparator is not a total order. A stable insertion sort keeps the result
/// well defined: an element only moves ahead of a neighbour that compares
/// strictly greater, otherwise it keeps its input position.
pub fn sorted(tasks: &[Task]) -> Vec<&Task> {
    let mut out: Vec<&Task> = Vec::with_capacity(tasks.len());
    for task in tasks {
        let mut idx = out.len();
        while idx > 0 && compare_for_display(out[idx - 1], task) == Ordering::Greater {
            idx -= 1;
        }
        out.insert(idx, task);
    }
    out
}

/// Display order paired with 1-based positions.
pub fn numbered(tasks: &[Task]) -> Vec<(usize, &Task)> {
    sorted(tasks)
        .into_iter()
        .enumerate()
        .map(|(idx, task)| (idx + 1, task))
        .collect()
}

/// Resolves a display position or a literal id to a task id.
pub fn resolve_selector(tasks: &[Task], selector: &str) -> Option<TaskId> {
    let selector = selector.trim();
    if let Some(task) = tasks.iter().find(|task| task.id.as_str() == selector) {
        return Some(task.id.clone());
    }
    let position: usize = selector.parse().ok()?;
    numbered(tasks)
        .into_iter()
        .find(|(pos, _)| *pos == position)
        .map(|(_, task)| task.id.clone())
}
