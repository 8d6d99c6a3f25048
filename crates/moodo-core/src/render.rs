use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::format_local_date;
use crate::summary::Summary;
use crate::task::{MOOD_PALETTE, Priority, Task};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    #[tracing::instrument(skip(self, rows, tz, now))]
    pub fn print_task_table(
        &mut self,
        rows: &[(usize, &Task)],
        remaining: usize,
        tz: &Tz,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "You've got {remaining} tasks today.")?;
        if rows.is_empty() {
            return Ok(());
        }
        writeln!(out)?;

        let headers = ["#", "Done", "Priority", "Due", "Task", "Mood"]
            .map(str::to_string)
            .to_vec();

        let mut table = Vec::with_capacity(rows.len());
        for (position, task) in rows {
            let done = (if task.completed { "[x]" } else { "[ ]" }).to_string();

            let priority = match task.priority {
                Some(priority) => self.paint(priority.label(), priority_color(priority)),
                None => "-".to_string(),
            };

            let due = match task.due_date {
                Some(due) => {
                    let text = format_local_date(due, tz);
                    if due < now && !task.completed {
                        self.paint(&text, "31")
                    } else {
                        text
                    }
                }
                None => String::new(),
            };

            let text = if task.completed {
                self.paint(&task.text, "9")
            } else {
                task.text.clone()
            };

            table.push(vec![
                self.paint(&position.to_string(), "33"),
                done,
                priority,
                due,
                text,
                task.mood.clone().unwrap_or_default(),
            ]);
        }

        write_table(&mut out, headers, table)?;
        Ok(())
    }

    pub fn print_summary(&mut self, summary: &Summary) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "Weekly Summary")?;
        for line in summary_lines(summary) {
            writeln!(out, "{line}")?;
        }
        Ok(())
    }

    pub fn print_mood_prompt(&mut self, task: &Task) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "How are you feeling? ({})", task.text)?;
        for (idx, mood) in MOOD_PALETTE.iter().enumerate() {
            writeln!(out, "  {}) {mood}", idx + 1)?;
        }
        write!(out, "mood (empty to cancel): ")?;
        out.flush()?;
        Ok(())
    }

    pub fn print_moods(&mut self) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        for (idx, mood) in MOOD_PALETTE.iter().enumerate() {
            writeln!(out, "{} {mood}", idx + 1)?;
        }
        Ok(())
    }

    /// Redraws the clock in place when attached to a terminal, one line per
    /// update otherwise.
    pub fn print_clock(&mut self, label: &str, clock: &str) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        if out.is_terminal() {
            write!(out, "\r{label} {clock}")?;
        } else {
            writeln!(out, "{label} {clock}")?;
        }
        out.flush()?;
        Ok(())
    }

    pub fn print_line(&mut self, message: &str) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        if out.is_terminal() {
            // finish a clock line left without a newline
            write!(out, "\r\x1b[K")?;
        }
        writeln!(out, "{message}")?;
        Ok(())
    }

    pub fn print_alert(&mut self, message: &str) -> anyhow::Result<()> {
        let mut err = io::stderr().lock();
        if self.color && err.is_terminal() {
            writeln!(err, "\x1b[33m{message}\x1b[0m")?;
        } else {
            writeln!(err, "{message}")?;
        }
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn priority_color(priority: Priority) -> &'static str {
    match priority {
        Priority::High => "31",
        Priority::Medium => "33",
        Priority::Low => "32",
    }
}

/// Text lines of the summary panel.
pub fn summary_lines(summary: &Summary) -> Vec<String> {
    let report = match summary {
        Summary::NoData => return vec!["Complete some tasks to see your summary!".to_string()],
        Summary::Report(report) => report,
    };

    let mut lines = vec!["Productivity Peaks".to_string()];
    lines.extend(
        report
            .peak_hours
            .iter()
            .map(|(hour, count)| format!("  {hour}:00 - {hour}:59: {count} tasks")),
    );

    lines.push("Mood Tracker".to_string());
    if report.moods.is_empty() {
        lines.push("  No moods logged yet.".to_string());
    } else {
        lines.extend(
            report
                .moods
                .iter()
                .map(|(mood, count)| format!("  {mood}: {count} times")),
        );
    }
    lines
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (header, &width) in headers.iter().zip(&widths) {
        write!(writer, "{header:width$} ")?;
    }
    writeln!(writer)?;

    for &width in &widths {
        write!(writer, "{:-<width$} ", "")?;
    }
    writeln!(writer)?;

    for row in rows {
        for (cell, width) in row.iter().zip(&widths) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = width.saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{strip_ansi, summary_lines, write_table};
    use crate::summary::{Summary, SummaryReport};

    #[test]
    fn summary_without_data_has_single_hint() {
        assert_eq!(
            summary_lines(&Summary::NoData),
            vec!["Complete some tasks to see your summary!"]
        );
    }

    #[test]
    fn summary_lines_follow_panel_wording() {
        let summary = Summary::Report(SummaryReport {
            peak_hours: BTreeMap::from([(9, 1), (14, 2)]),
            moods: vec![("😀".to_string(), 2), ("😐".to_string(), 1)],
        });
        assert_eq!(
            summary_lines(&summary),
            vec![
                "Productivity Peaks",
                "  9:00 - 9:59: 1 tasks",
                "  14:00 - 14:59: 2 tasks",
                "Mood Tracker",
                "  😀: 2 times",
                "  😐: 1 times",
            ]
        );
    }

    #[test]
    fn table_pads_by_display_width() {
        let mut buf = Vec::new();
        write_table(
            &mut buf,
            vec!["Mood".to_string(), "Task".to_string()],
            vec![vec!["😀".to_string(), "\x1b[9mdone\x1b[0m".to_string()]],
        )
        .expect("write table");
        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Mood Task ");
        assert_eq!(strip_ansi(lines[2]), "😀   done ");
    }
}
