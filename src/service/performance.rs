//! Month-over-month performance of one employee.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use super::dashboard::{percentage, PriorityCounts, StatusCounts};
use super::ServiceResult;
use crate::app::App;
use crate::core::{Actor, Priority, Task, TaskStatus};

const RECENT_ACTIVITY: usize = 10;
const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Completion metrics over tasks created in one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyMetrics {
    pub tasks_completed: usize,
    pub tasks_total: usize,
    pub completion_rate: u32,
    /// 100 when no completed task had a deadline
    pub on_time_rate: u32,
    pub late_submissions: usize,
    /// Mean days from creation to completion, one decimal
    pub avg_completion_days: f64,
    pub active_days: usize,
}

/// All-time counts of the employee's tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMix {
    pub by_priority: PriorityCounts,
    pub by_status: StatusCounts,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentActivity {
    pub id: String,
    /// Completion time
    pub date: DateTime<Utc>,
    pub title: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub on_time: bool,
    pub days_to_complete: i64,
    pub quality_score: Option<u8>,
}

/// Signed change from last month to this month, e.g. `"+3"` or `"-5%"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceTrend {
    pub tasks_completed: String,
    pub completion_rate: String,
    pub on_time_rate: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BestTask {
    pub title: String,
    pub score: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityMetrics {
    pub avg_quality_score: u32,
    pub tasks_with_score: usize,
    pub best_task: BestTask,
    /// Change of the monthly mean score by completion date
    pub trend: String,
}

/// The employee performance page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeePerformance {
    pub current_month: MonthlyMetrics,
    pub last_month: MonthlyMetrics,
    pub task_breakdown: TaskMix,
    pub recent_activity: Vec<RecentActivity>,
    pub trend: PerformanceTrend,
    /// `None` until some task has a score
    pub quality_metrics: Option<QualityMetrics>,
}

/// A calendar month in UTC, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Month {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

impl Month {
    fn containing(date: NaiveDate) -> Self {
        let first = date.with_day(1).unwrap_or(date);
        let next = (first + Duration::days(32)).with_day(1).unwrap_or(first);
        Self { start: midnight(first), end: midnight(next) }
    }

    fn previous(self) -> Self {
        Self::containing((self.start - Duration::days(1)).date_naive())
    }

    fn contains(self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }
}

#[allow(clippy::cast_precision_loss)]
fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / MILLIS_PER_DAY
}

/// Round to the nearest integer, halves towards positive infinity.
#[allow(clippy::cast_possible_truncation)]
fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

fn signed(delta: i64, suffix: &str) -> String {
    if delta >= 0 {
        format!("+{delta}{suffix}")
    } else {
        format!("{delta}{suffix}")
    }
}

/// Done with a completion time no later than the due date.
fn met_deadline(task: &Task) -> bool {
    matches!((task.completed_date, task.due_date), (Some(done), Some(due)) if done <= due)
}

fn monthly_metrics(tasks: &[Task], month: Month) -> MonthlyMetrics {
    let created: Vec<&Task> = tasks.iter().filter(|t| month.contains(t.created_at)).collect();
    let completed: Vec<&Task> =
        created.iter().copied().filter(|t| t.status == TaskStatus::Done).collect();
    let with_deadline = completed.iter().filter(|t| t.due_date.is_some()).count();
    let on_time = completed.iter().filter(|t| met_deadline(t)).count();

    let durations: Vec<f64> = completed
        .iter()
        .filter_map(|t| t.completed_date.map(|done| days_between(t.created_at, done)))
        .collect();
    #[allow(clippy::cast_precision_loss)]
    let avg_completion_days = if durations.is_empty() {
        0.0
    } else {
        let mean = durations.iter().sum::<f64>() / durations.len() as f64;
        (mean * 10.0).round() / 10.0
    };

    let mut days: HashSet<NaiveDate> = HashSet::new();
    for task in &created {
        days.insert(task.created_at.date_naive());
        if let Some(done) = task.completed_date {
            days.insert(done.date_naive());
        }
    }

    MonthlyMetrics {
        tasks_completed: completed.len(),
        tasks_total: created.len(),
        completion_rate: percentage(completed.len(), created.len()),
        on_time_rate: if with_deadline == 0 { 100 } else { percentage(on_time, with_deadline) },
        late_submissions: with_deadline - on_time,
        avg_completion_days,
        active_days: days.len(),
    }
}

fn recent_activity(tasks: &[Task]) -> Vec<RecentActivity> {
    let mut finished: Vec<(&Task, DateTime<Utc>)> = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Done)
        .filter_map(|t| t.completed_date.map(|done| (t, done)))
        .collect();
    finished.sort_by(|a, b| b.1.cmp(&a.1));

    finished
        .into_iter()
        .take(RECENT_ACTIVITY)
        .map(|(task, done)| RecentActivity {
            id: task.id.clone(),
            date: done,
            title: task.title.clone(),
            status: task.status,
            priority: task.priority,
            on_time: !task.due_date.is_some_and(|due| done > due),
            days_to_complete: round_half_up(days_between(task.created_at, done)),
            quality_score: task.quality_score,
        })
        .collect()
}

/// Mean score of scored tasks completed within `month`; 0 when none.
#[allow(clippy::cast_precision_loss)]
fn monthly_quality(scored: &[(&Task, u8)], month: Month) -> f64 {
    let scores: Vec<f64> = scored
        .iter()
        .filter(|(t, _)| t.completed_date.is_some_and(|done| month.contains(done)))
        .map(|&(_, score)| f64::from(score))
        .collect();
    if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    }
}

fn quality_metrics(tasks: &[Task], current: Month, last: Month) -> Option<QualityMetrics> {
    let scored: Vec<(&Task, u8)> =
        tasks.iter().filter_map(|t| t.quality_score.map(|score| (t, score))).collect();
    // first of equal scores wins
    let (best, best_score) =
        scored.iter().copied().reduce(|best, next| if next.1 > best.1 { next } else { best })?;

    let total: u32 = scored.iter().map(|&(_, score)| u32::from(score)).sum();
    let count = u32::try_from(scored.len()).unwrap_or(u32::MAX);
    let delta = monthly_quality(&scored, current) - monthly_quality(&scored, last);

    Some(QualityMetrics {
        avg_quality_score: (total + count / 2) / count,
        tasks_with_score: scored.len(),
        best_task: BestTask { title: best.title.clone(), score: best_score },
        trend: signed(round_half_up(delta), ""),
    })
}

/// Performance of one person's assigned tasks, this month against last.
pub(crate) fn employee_performance(tasks: &[Task], now: DateTime<Utc>) -> EmployeePerformance {
    let current = Month::containing(now.date_naive());
    let last = current.previous();
    let current_month = monthly_metrics(tasks, current);
    let last_month = monthly_metrics(tasks, last);

    let mut by_priority = PriorityCounts::default();
    let mut by_status = StatusCounts::default();
    for task in tasks {
        by_priority.add(task.priority);
        by_status.add(task.status);
    }

    let completed_delta = i64::try_from(current_month.tasks_completed).unwrap_or(i64::MAX)
        - i64::try_from(last_month.tasks_completed).unwrap_or(i64::MAX);
    let trend = PerformanceTrend {
        tasks_completed: signed(completed_delta, ""),
        completion_rate: signed(
            i64::from(current_month.completion_rate) - i64::from(last_month.completion_rate),
            "%",
        ),
        on_time_rate: signed(
            i64::from(current_month.on_time_rate) - i64::from(last_month.on_time_rate),
            "%",
        ),
    };

    EmployeePerformance {
        quality_metrics: quality_metrics(tasks, current, last),
        recent_activity: recent_activity(tasks),
        task_breakdown: TaskMix { by_priority, by_status },
        trend,
        current_month,
        last_month,
    }
}

impl App {
    pub fn employee_performance(
        &self,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> ServiceResult<EmployeePerformance> {
        let tasks = self.store.tasks_for_assignee(&actor.id)?;
        Ok(employee_performance(&tasks, now))
    }
}
