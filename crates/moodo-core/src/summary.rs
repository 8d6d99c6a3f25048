use std::collections::BTreeMap;

use chrono::{TimeZone, Timelike};

use crate::task::Task;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Summary {
    /// Nothing has been completed yet.
    NoData,
    Report(SummaryReport),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryReport {
    /// Completions per local hour of day; only hours with completions appear.
    pub peak_hours: BTreeMap<u32, usize>,
    /// Mood counts, most frequent first; ties keep first-seen order.
    pub moods: Vec<(String, usize)>,
}

pub fn summarize<Z: TimeZone>(tasks: &[Task], tz: &Z) -> Summary {
    let mut peak_hours = BTreeMap::new();
    let mut moods: Vec<(String, usize)> = Vec::new();
    let mut completed = 0usize;

    for task in tasks.iter().filter(|task| task.completed) {
        let Some(completed_at) = task.completed_at else {
            continue;
        };
        completed += 1;

        let hour = completed_at.with_timezone(tz).hour();
        *peak_hours.entry(hour).or_insert(0) += 1;

        if let Some(mood) = task.mood.as_deref() {
            match moods.iter_mut().find(|(seen, _)| seen == mood) {
                Some((_, count)) => *count += 1,
                None => moods.push((mood.to_string(), 1)),
            }
        }
    }

    if completed == 0 {
        return Summary::NoData;
    }

    moods.sort_by(|a, b| b.1.cmp(&a.1));
    Summary::Report(SummaryReport { peak_hours, moods })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{DateTime, TimeZone, Utc};
    use chrono_tz::Tz;

    use super::{Summary, summarize};
    use crate::task::{Task, TaskId};

    fn done(id: u64, mood: &str, at: DateTime<Utc>) -> Task {
        let mut task = Task::new(TaskId::from_millis(id), format!("task {id}"));
        task.complete(mood.to_string(), at);
        task
    }

    fn utc(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, hour, minute, 0)
            .single()
            .expect("valid time")
    }

    #[test]
    fn no_completed_tasks_is_no_data() {
        let open = Task::new(TaskId::from_millis(1), "pending".to_string());
        assert_eq!(summarize(&[open], &Utc), Summary::NoData);
        assert_eq!(summarize(&[], &Utc), Summary::NoData);
    }

    #[test]
    fn single_completion_at_fourteen() {
        let summary = summarize(&[done(1, "😀", utc(14, 20))], &Utc);
        let Summary::Report(report) = summary else {
            panic!("expected a report");
        };
        assert_eq!(report.peak_hours, BTreeMap::from([(14, 1)]));
        assert_eq!(report.moods, vec![("😀".to_string(), 1)]);
    }

    #[test]
    fn moods_rank_by_count_with_stable_ties() {
        let tasks = vec![
            done(1, "😴", utc(9, 0)),
            done(2, "😀", utc(9, 30)),
            done(3, "😀", utc(10, 0)),
            done(4, "😐", utc(11, 0)),
        ];
        let Summary::Report(report) = summarize(&tasks, &Utc) else {
            panic!("expected a report");
        };
        assert_eq!(
            report.moods,
            vec![
                ("😀".to_string(), 2),
                ("😴".to_string(), 1),
                ("😐".to_string(), 1)
            ]
        );
        assert_eq!(report.peak_hours, BTreeMap::from([(9, 2), (10, 1), (11, 1)]));
    }

    #[test]
    fn hours_bucket_in_the_given_zone() {
        let tz: Tz = "Asia/Tokyo".parse().expect("valid tz");
        let Summary::Report(report) = summarize(&[done(1, "😀", utc(14, 0))], &tz) else {
            panic!("expected a report");
        };
        assert_eq!(report.peak_hours, BTreeMap::from([(23, 1)]));
    }

    #[test]
    fn completed_flag_without_timestamp_is_skipped() {
        let mut odd = Task::new(TaskId::from_millis(1), "legacy".to_string());
        odd.completed = true;
        assert_eq!(summarize(&[odd], &Utc), Summary::NoData);
    }
}
