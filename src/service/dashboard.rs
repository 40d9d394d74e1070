//! Dashboard statistics for employees, project managers and hr.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use super::{require_role, ServiceResult, MANAGERS};
use crate::app::App;
use crate::core::{Actor, Priority, ProjectStatus, Role, Task, TaskStatus, UserStatus};

/// Days covered by the employee activity chart.
const CHART_DAYS: i64 = 90;
/// Window for "upcoming" deadlines.
const UPCOMING_DAYS: i64 = 7;
/// Active tasks above which a user counts as overloaded.
const OVERLOAD_THRESHOLD: usize = 10;
const TOP_WORKLOAD: usize = 5;
const RECENT_COMPLETED: usize = 5;
const PENDING_LIST: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub todo: usize,
    pub in_progress: usize,
    pub review: usize,
    pub done: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentCompletion {
    pub id: String,
    pub title: String,
    pub completed_date: Option<DateTime<Utc>>,
    pub quality_score: Option<u8>,
}

/// Personal statistics over the actor's assigned tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeStats {
    pub total_tasks: usize,
    pub upcoming_deadlines: usize,
    pub overdue_tasks: usize,
    /// Rounded mean of scored tasks; `None` when nothing is scored
    pub avg_quality_score: Option<u32>,
    pub task_distribution: StatusCounts,
    pub priority_distribution: PriorityCounts,
    pub recent_completed: Vec<RecentCompletion>,
}

/// One day of the employee activity chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartPoint {
    pub date: NaiveDate,
    pub completed: u32,
    pub pending: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PmOverview {
    pub total_projects: usize,
    pub active_tasks: usize,
    pub pending_review: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStatusCounts {
    pub planning: usize,
    pub active: usize,
    pub completed: usize,
    pub on_hold: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkloadEntry {
    pub name: String,
    pub tasks: usize,
}

/// Portfolio statistics for project managers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PmStats {
    pub stats: PmOverview,
    pub project_status: ProjectStatusCounts,
    /// Top assignees by open task count
    pub workload: Vec<WorkloadEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HrOverview {
    pub total_employees: usize,
    pub pending_approvals: usize,
    pub active_projects: usize,
    /// Open assigned tasks per employee, one decimal
    pub avg_workload: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepartmentShare {
    pub name: String,
    pub count: usize,
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadStats {
    pub total_active_tasks: usize,
    pub overloaded_users: usize,
    pub max_workload: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingApproval {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Organisation statistics for hr.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HrStats {
    pub overview: HrOverview,
    pub department_distribution: Vec<DepartmentShare>,
    pub workload_stats: WorkloadStats,
    pub pending_approvals_list: Vec<PendingApproval>,
}

impl StatusCounts {
    pub(super) fn add(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Todo => self.todo += 1,
            TaskStatus::InProgress => self.in_progress += 1,
            TaskStatus::Review => self.review += 1,
            TaskStatus::Done => self.done += 1,
        }
    }
}

impl PriorityCounts {
    pub(super) fn add(&mut self, priority: Priority) {
        match priority {
            Priority::Low => self.low += 1,
            Priority::Medium => self.medium += 1,
            Priority::High => self.high += 1,
            Priority::Critical => self.critical += 1,
        }
    }
}

impl ProjectStatusCounts {
    fn add(&mut self, status: ProjectStatus) {
        match status {
            ProjectStatus::Planning => self.planning += 1,
            ProjectStatus::Active => self.active += 1,
            ProjectStatus::Completed => self.completed += 1,
            ProjectStatus::OnHold => self.on_hold += 1,
        }
    }
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(super) fn percentage(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    (part as f64 / whole as f64 * 100.0).round() as u32
}

/// Summarize one person's tasks as of `now`.
pub(crate) fn employee_stats(tasks: &[Task], now: DateTime<Utc>) -> EmployeeStats {
    let horizon = now + Duration::days(UPCOMING_DAYS);
    let mut task_distribution = StatusCounts::default();
    let mut priority_distribution = PriorityCounts::default();
    for task in tasks {
        task_distribution.add(task.status);
        priority_distribution.add(task.priority);
    }

    let upcoming_deadlines = tasks
        .iter()
        .filter(|t| t.due_date.is_some_and(|due| due >= now && due <= horizon))
        .count();
    let overdue_tasks = tasks
        .iter()
        .filter(|t| t.status.is_active() && t.due_date.is_some_and(|due| due < now))
        .count();

    let scores: Vec<u32> = tasks.iter().filter_map(|t| t.quality_score.map(u32::from)).collect();
    let avg_quality_score = if scores.is_empty() {
        None
    } else {
        let total: u32 = scores.iter().sum();
        let count = u32::try_from(scores.len()).unwrap_or(u32::MAX);
        Some((total + count / 2) / count)
    };

    let mut completed: Vec<&Task> = tasks.iter().filter(|t| !t.status.is_active()).collect();
    completed.sort_by(|a, b| b.completed_date.cmp(&a.completed_date));
    let recent_completed = completed
        .into_iter()
        .take(RECENT_COMPLETED)
        .map(|t| RecentCompletion {
            id: t.id.clone(),
            title: t.title.clone(),
            completed_date: t.completed_date,
            quality_score: t.quality_score,
        })
        .collect();

    EmployeeStats {
        total_tasks: tasks.len(),
        upcoming_deadlines,
        overdue_tasks,
        avg_quality_score,
        task_distribution,
        priority_distribution,
        recent_completed,
    }
}

/// Daily completed/pending counts for the `CHART_DAYS` days ending today.
pub(crate) fn activity_chart(tasks: &[Task], now: DateTime<Utc>) -> Vec<ChartPoint> {
    let today = now.date_naive();
    let mut days: BTreeMap<NaiveDate, (u32, u32)> = (0..CHART_DAYS)
        .map(|offset| (today - Duration::days(CHART_DAYS - 1 - offset), (0, 0)))
        .collect();

    for task in tasks {
        if let Some(done) = task.completed_date {
            if let Some(day) = days.get_mut(&done.date_naive()) {
                day.0 += 1;
            }
        }
        if task.status.is_active() {
            if let Some(day) = days.get_mut(&task.created_at.date_naive()) {
                day.1 += 1;
            }
        }
    }

    days.into_iter()
        .map(|(date, (completed, pending))| ChartPoint { date, completed, pending })
        .collect()
}

impl App {
    pub fn employee_stats(
        &self,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> ServiceResult<EmployeeStats> {
        let tasks = self.store.tasks_for_assignee(&actor.id)?;
        Ok(employee_stats(&tasks, now))
    }

    pub fn employee_chart(
        &self,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> ServiceResult<Vec<ChartPoint>> {
        let tasks = self.store.tasks_for_assignee(&actor.id)?;
        Ok(activity_chart(&tasks, now))
    }

    /// Project and team workload overview (pm/hr).
    pub fn pm_stats(&self, actor: &Actor) -> ServiceResult<PmStats> {
        require_role(actor, MANAGERS)?;
        let projects = self.store.list_projects()?;
        let tasks = self.store.list_tasks()?;
        let users = self.store.list_users()?;

        let mut project_status = ProjectStatusCounts::default();
        for project in &projects {
            project_status.add(project.status);
        }

        let mut open_by_user: HashMap<&str, usize> = HashMap::new();
        for task in tasks.iter().filter(|t| t.status.is_active()) {
            if let Some(id) = task.assignee_id.as_deref() {
                *open_by_user.entry(id).or_default() += 1;
            }
        }
        let mut workload: Vec<WorkloadEntry> = users
            .iter()
            .filter_map(|u| {
                open_by_user
                    .get(u.id.as_str())
                    .map(|&count| WorkloadEntry { name: u.name.clone(), tasks: count })
            })
            .collect();
        workload.sort_by(|a, b| b.tasks.cmp(&a.tasks).then_with(|| a.name.cmp(&b.name)));
        workload.truncate(TOP_WORKLOAD);

        Ok(PmStats {
            stats: PmOverview {
                total_projects: projects.len(),
                active_tasks: tasks.iter().filter(|t| t.status.is_active()).count(),
                pending_review: tasks.iter().filter(|t| t.status == TaskStatus::Review).count(),
            },
            project_status,
            workload,
        })
    }

    /// Headcount, approvals and workload balance (hr).
    pub fn hr_stats(&self, actor: &Actor) -> ServiceResult<HrStats> {
        require_role(actor, &[Role::Hr])?;
        let users = self.store.list_users()?;
        let projects = self.store.list_projects()?;
        let tasks = self.store.list_tasks()?;

        let employees: Vec<_> = users
            .iter()
            .filter(|u| {
                u.status == UserStatus::Active && matches!(u.role, Role::Employee | Role::Pm)
            })
            .collect();
        let pending: Vec<_> = users.iter().filter(|u| u.status == UserStatus::Pending).collect();
        let open_assigned: Vec<&Task> =
            tasks.iter().filter(|t| t.status.is_active() && t.assignee_id.is_some()).collect();

        #[allow(clippy::cast_precision_loss)]
        let avg_workload = if employees.is_empty() {
            0.0
        } else {
            (open_assigned.len() as f64 / employees.len() as f64 * 10.0).round() / 10.0
        };

        let mut departments: HashMap<&str, usize> = HashMap::new();
        for user in &employees {
            let name = user.department.as_deref().unwrap_or("Unassigned");
            *departments.entry(name).or_default() += 1;
        }
        let mut department_distribution: Vec<DepartmentShare> = departments
            .into_iter()
            .map(|(name, count)| DepartmentShare {
                name: name.to_string(),
                count,
                percentage: percentage(count, employees.len()),
            })
            .collect();
        department_distribution
            .sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));

        let loads: Vec<usize> = employees
            .iter()
            .map(|u| {
                let mine = |t: &&&Task| t.assignee_id.as_deref() == Some(u.id.as_str());
                open_assigned.iter().filter(mine).count()
            })
            .collect();

        Ok(HrStats {
            overview: HrOverview {
                total_employees: employees.len(),
                pending_approvals: pending.len(),
                active_projects: projects
                    .iter()
                    .filter(|p| p.status == ProjectStatus::Active)
                    .count(),
                avg_workload,
            },
            department_distribution,
            workload_stats: WorkloadStats {
                total_active_tasks: open_assigned.len(),
                overloaded_users: loads.iter().filter(|&&n| n > OVERLOAD_THRESHOLD).count(),
                max_workload: loads.iter().copied().max().unwrap_or(0),
            },
            pending_approvals_list: pending
                .into_iter()
                .take(PENDING_LIST)
                .map(|u| PendingApproval {
                    id: u.id.clone(),
                    name: u.name.clone(),
                    email: u.email.clone(),
                    role: u.role,
                    created_at: u.created_at,
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::core::{Project, User};
    use crate::service::testing::offline_app;
    use crate::service::ServiceError;
    use crate::store::fixtures::{active_user, at, project, task};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn sample(title: &str, status: TaskStatus) -> Task {
        let mut task = Task::new("project", title, "creator", now() - Duration::days(3));
        task.status = status;
        task
    }

    // ========================================================================
    // Employee
    // ========================================================================

    #[test]
    fn test_employee_stats_counts() {
        let mut soon = sample("Soon", TaskStatus::Todo);
        soon.due_date = Some(now() + Duration::days(2));
        soon.priority = Priority::High;
        let mut late = sample("Late", TaskStatus::InProgress);
        late.due_date = Some(now() - Duration::days(1));
        let mut finished_late = sample("Finished", TaskStatus::Done);
        finished_late.due_date = Some(now() - Duration::days(5));
        finished_late.completed_date = Some(now() - Duration::days(1));
        finished_late.quality_score = Some(80);
        let mut older = sample("Older", TaskStatus::Done);
        older.completed_date = Some(now() - Duration::days(10));
        older.quality_score = Some(91);

        let stats = employee_stats(&[soon, late, finished_late, older], now());

        assert_eq!(stats.total_tasks, 4);
        assert_eq!(stats.upcoming_deadlines, 1);
        assert_eq!(stats.overdue_tasks, 1);
        assert_eq!(stats.avg_quality_score, Some(86));
        assert_eq!(
            stats.task_distribution,
            StatusCounts { todo: 1, in_progress: 1, review: 0, done: 2 }
        );
        assert_eq!(stats.priority_distribution.high, 1);
        assert_eq!(stats.priority_distribution.medium, 3);
        let titles: Vec<&str> = stats.recent_completed.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Finished", "Older"]);
    }

    #[test]
    fn test_employee_stats_without_scores() {
        let stats = employee_stats(&[sample("Fresh", TaskStatus::Todo)], now());
        assert_eq!(stats.avg_quality_score, None);
        let json = serde_json::to_value(&stats).unwrap();
        assert!(json["avgQualityScore"].is_null());
        assert_eq!(json["taskDistribution"]["inProgress"], 0);
    }

    #[test]
    fn test_activity_chart_window() {
        let mut done = sample("Done", TaskStatus::Done);
        done.completed_date = Some(now() - Duration::days(1));
        let open = sample("Open", TaskStatus::Todo);
        let mut ancient = sample("Ancient", TaskStatus::Todo);
        ancient.created_at = now() - Duration::days(400);

        let chart = activity_chart(&[done, open, ancient], now());

        assert_eq!(chart.len(), 90);
        assert_eq!(chart.last().unwrap().date, now().date_naive());
        assert_eq!(chart[0].date, now().date_naive() - Duration::days(89));
        assert!(chart.windows(2).all(|w| w[0].date < w[1].date));

        let yesterday = chart.iter().find(|p| p.date == now().date_naive() - Duration::days(1));
        assert_eq!(yesterday.map(|p| p.completed), Some(1));
        let created = chart.iter().find(|p| p.date == now().date_naive() - Duration::days(3));
        assert_eq!(created.map(|p| p.pending), Some(1));
        let pending_total: u32 = chart.iter().map(|p| p.pending).sum();
        assert_eq!(pending_total, 1);
    }

    // ========================================================================
    // Managers and hr
    // ========================================================================

    fn assign(app: &App, project: &Project, creator: &User, who: &User, title: &str) {
        let mut t = task(&app.store, project, creator, title);
        t.assignee_id = Some(who.id.clone());
        app.store.save_task(&t).unwrap();
    }

    #[test]
    fn test_pm_stats() {
        let (app, _) = offline_app();
        let pm = active_user(&app.store, "Pat", Role::Pm);
        let dev = active_user(&app.store, "Dev", Role::Employee);
        let ops = active_user(&app.store, "Ops", Role::Employee);
        let project = project(&app.store, &pm);
        assign(&app, &project, &pm, &dev, "One");
        assign(&app, &project, &pm, &dev, "Two");
        assign(&app, &project, &pm, &ops, "Three");
        let mut review = task(&app.store, &project, &pm, "Review me");
        review.status = TaskStatus::Review;
        app.store.save_task(&review).unwrap();

        let stats = app.pm_stats(&Actor::from_user(&pm)).unwrap();

        let overview = PmOverview { total_projects: 1, active_tasks: 4, pending_review: 1 };
        assert_eq!(stats.stats, overview);
        assert_eq!(stats.project_status.planning, 1);
        assert_eq!(
            stats.workload,
            vec![
                WorkloadEntry { name: "Dev".into(), tasks: 2 },
                WorkloadEntry { name: "Ops".into(), tasks: 1 },
            ]
        );
        assert!(matches!(app.pm_stats(&Actor::from_user(&dev)), Err(ServiceError::Forbidden)));
    }

    #[test]
    fn test_hr_stats() {
        let (app, _) = offline_app();
        let hr = active_user(&app.store, "Hana", Role::Hr);
        let pm = active_user(&app.store, "Pat", Role::Pm);
        let mut dev = active_user(&app.store, "Dev", Role::Employee);
        dev.department = Some("Engineering".to_string());
        app.store.update_user(&dev).unwrap();
        app.store.insert_user(&User::new("Pen", "pen@example.com", Role::Employee, at(3))).unwrap();

        let project = project(&app.store, &pm);
        for title in ["A", "B", "C"] {
            assign(&app, &project, &pm, &dev, title);
        }

        let stats = app.hr_stats(&Actor::from_user(&hr)).unwrap();

        assert_eq!(stats.overview.total_employees, 2);
        assert_eq!(stats.overview.pending_approvals, 1);
        assert_eq!(stats.overview.active_projects, 0);
        assert!((stats.overview.avg_workload - 1.5).abs() < f64::EPSILON);
        assert_eq!(stats.workload_stats.total_active_tasks, 3);
        assert_eq!(stats.workload_stats.max_workload, 3);
        assert_eq!(stats.workload_stats.overloaded_users, 0);
        assert_eq!(stats.pending_approvals_list.len(), 1);
        assert_eq!(stats.pending_approvals_list[0].email, "pen@example.com");

        let names: Vec<&str> =
            stats.department_distribution.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Engineering", "Unassigned"]);
        assert_eq!(stats.department_distribution[0].percentage, 50);

        assert!(matches!(app.hr_stats(&Actor::from_user(&pm)), Err(ServiceError::Forbidden)));
    }
}
