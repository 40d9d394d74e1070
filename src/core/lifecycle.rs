//! Task lifecycle rules.
//!
//! A task update is planned in two steps: the [`FieldPolicy`] table decides
//! which requested fields the acting role may change, then the status
//! transition rules rewrite the requested status (an employee cannot approve
//! their own work). The result is a [`TaskChanges`] that is applied to the
//! stored task in one write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

use super::model::{client_time, RiskLevel, Role, Task, TaskStatus};
use crate::ai::QualityAssessment;

/// Fields of a task that can be changed through an update request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskField {
    Status,
    RiskLevel,
    ActualHours,
    Title,
    DueDate,
    AssigneeId,
}

const ALL_ROLES: &[Role] = &[Role::Employee, Role::Pm, Role::Hr];
const PRIVILEGED_ROLES: &[Role] = &[Role::Pm, Role::Hr];

/// Which roles may change each field.
///
/// riskLevel and actualHours are open to every authenticated role.
const FIELD_POLICY: &[(TaskField, &[Role])] = &[
    (TaskField::Status, ALL_ROLES),
    (TaskField::RiskLevel, ALL_ROLES),
    (TaskField::ActualHours, ALL_ROLES),
    (TaskField::Title, PRIVILEGED_ROLES),
    (TaskField::DueDate, PRIVILEGED_ROLES),
    (TaskField::AssigneeId, PRIVILEGED_ROLES),
];

/// Field-level authorization for task updates.
#[derive(Debug, Clone, Copy)]
pub struct FieldPolicy {
    role: Role,
}

impl FieldPolicy {
    /// Policy for the given acting role.
    pub fn for_role(role: Role) -> Self {
        Self { role }
    }

    /// Whether the role may change `field`.
    pub fn allows(&self, field: TaskField) -> bool {
        FIELD_POLICY
            .iter()
            .find(|(f, _)| *f == field)
            .is_some_and(|(_, roles)| roles.contains(&self.role))
    }
}

/// Requested change of a task's assignee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssigneeChange {
    /// Remove the current assignee
    Unassign,
    /// Assign to the given user id
    Assign(String),
}

/// Body of a task update request.
///
/// Every field is optional; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub risk_level: Option<RiskLevel>,
    #[serde(default)]
    pub actual_hours: Option<f64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "client_time::optional")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "assignee_change")]
    pub assignee_id: Option<AssigneeChange>,
}

/// `null` and `"unassigned"` clear the assignee.
pub fn assignee_change<'de, D>(deserializer: D) -> Result<Option<AssigneeChange>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(Some(match raw {
        None => AssigneeChange::Unassign,
        Some(id) if id.is_empty() || id == "unassigned" => AssigneeChange::Unassign,
        Some(id) => AssigneeChange::Assign(id),
    }))
}

/// A rejected update request.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LifecycleError {
    #[error("Title cannot be empty")]
    EmptyTitle,

    #[error("Actual hours must be a non-negative number")]
    InvalidHours,
}

/// The changes to write for one update request.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskChanges {
    pub status: Option<TaskStatus>,
    pub completed_date: Option<DateTime<Utc>>,
    pub risk_level: Option<RiskLevel>,
    pub actual_hours: Option<f64>,
    pub title: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    /// `Some(None)` clears the assignee
    pub assignee_id: Option<Option<String>>,
    pub updated_at: DateTime<Utc>,
}

impl TaskChanges {
    /// No changes besides the update timestamp.
    pub fn touch(now: DateTime<Utc>) -> Self {
        Self {
            status: None,
            completed_date: None,
            risk_level: None,
            actual_hours: None,
            title: None,
            due_date: None,
            assignee_id: None,
            updated_at: now,
        }
    }

    /// Write the changes onto a task.
    pub fn apply(self, task: &mut Task) {
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(completed) = self.completed_date {
            task.completed_date = Some(completed);
        }
        if let Some(level) = self.risk_level {
            task.risk_level = Some(level);
        }
        if let Some(hours) = self.actual_hours {
            task.actual_hours = Some(hours);
        }
        if let Some(title) = self.title {
            task.title = title;
        }
        if let Some(due) = self.due_date {
            task.due_date = Some(due);
        }
        if let Some(assignee) = self.assignee_id {
            task.assignee_id = assignee;
        }
        task.updated_at = self.updated_at;
    }
}

/// Resolve a requested status for the acting role.
///
/// Returns the status to store and, for an approval, the completion time.
pub fn resolve_status(
    role: Role,
    requested: TaskStatus,
    now: DateTime<Utc>,
) -> (TaskStatus, Option<DateTime<Utc>>) {
    match requested {
        TaskStatus::Done if role.is_privileged() => (TaskStatus::Done, Some(now)),
        TaskStatus::Done => (TaskStatus::Review, None),
        other => (other, None),
    }
}

/// Plan an update: drop fields the role may not change, apply the status
/// transition rules and validate what remains.
pub fn plan_update(
    role: Role,
    patch: TaskPatch,
    now: DateTime<Utc>,
) -> Result<TaskChanges, LifecycleError> {
    let policy = FieldPolicy::for_role(role);
    let mut changes = TaskChanges::touch(now);

    if let Some(requested) = patch.status.filter(|_| policy.allows(TaskField::Status)) {
        let (status, completed) = resolve_status(role, requested, now);
        changes.status = Some(status);
        changes.completed_date = completed;
    }

    if policy.allows(TaskField::RiskLevel) {
        changes.risk_level = patch.risk_level;
    }

    if let Some(hours) = patch.actual_hours.filter(|_| policy.allows(TaskField::ActualHours)) {
        if !hours.is_finite() || hours < 0.0 {
            return Err(LifecycleError::InvalidHours);
        }
        changes.actual_hours = Some(hours);
    }

    if let Some(title) = patch.title.filter(|_| policy.allows(TaskField::Title)) {
        let title = title.trim();
        if title.is_empty() {
            return Err(LifecycleError::EmptyTitle);
        }
        changes.title = Some(title.to_string());
    }

    if policy.allows(TaskField::DueDate) {
        changes.due_date = patch.due_date;
    }

    if policy.allows(TaskField::AssigneeId) {
        changes.assignee_id = patch.assignee_id.map(|change| match change {
            AssigneeChange::Unassign => None,
            AssigneeChange::Assign(id) => Some(id),
        });
    }

    Ok(changes)
}

/// Record an evidence submission on a task: the task moves to review and
/// carries the new quality assessment, whatever status was requested.
pub fn record_evidence(task: &mut Task, assessment: &QualityAssessment, now: DateTime<Utc>) {
    task.status = TaskStatus::Review;
    task.quality_score = Some(assessment.score);
    task.quality_analysis = Some(assessment.analysis.clone());
    task.updated_at = now;
}

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// How late a piece of work is relative to its due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Lateness {
    pub is_late: bool,
    /// Whole days late, rounded up; 0 when on time
    pub days_late: u32,
}

impl Lateness {
    /// Measure lateness of work finished at `at`. No due date means on time.
    pub fn measure(due: Option<DateTime<Utc>>, at: DateTime<Utc>) -> Self {
        let Some(due) = due else {
            return Self::default();
        };
        // compared at millisecond precision so the flag and the count agree
        let elapsed = (at - due).num_milliseconds();
        if elapsed <= 0 {
            return Self::default();
        }
        let days = (elapsed + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY;
        Self { is_late: true, days_late: u32::try_from(days).unwrap_or(u32::MAX) }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::core::model::Priority;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn sample_task() -> Task {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Task {
            id: "task-1".to_string(),
            project_id: "project-1".to_string(),
            title: "Write report".to_string(),
            description: None,
            status: TaskStatus::InProgress,
            priority: Priority::Medium,
            assignee_id: Some("user-1".to_string()),
            creator_id: "pm-1".to_string(),
            due_date: None,
            completed_date: None,
            estimated_hours: Some(4.0),
            actual_hours: None,
            quality_score: None,
            quality_analysis: None,
            risk_level: None,
            ai_risk_analysis: None,
            ai_breakdown: None,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn test_policy_table() {
        let employee = FieldPolicy::for_role(Role::Employee);
        assert!(employee.allows(TaskField::Status));
        assert!(employee.allows(TaskField::RiskLevel));
        assert!(employee.allows(TaskField::ActualHours));
        assert!(!employee.allows(TaskField::Title));
        assert!(!employee.allows(TaskField::DueDate));
        assert!(!employee.allows(TaskField::AssigneeId));

        for role in [Role::Pm, Role::Hr] {
            let policy = FieldPolicy::for_role(role);
            assert!(policy.allows(TaskField::Title));
            assert!(policy.allows(TaskField::DueDate));
            assert!(policy.allows(TaskField::AssigneeId));
        }
    }

    #[test]
    fn test_employee_done_becomes_review() {
        let patch = TaskPatch { status: Some(TaskStatus::Done), ..Default::default() };
        let changes = plan_update(Role::Employee, patch, now()).unwrap();
        assert_eq!(changes.status, Some(TaskStatus::Review));
        assert_eq!(changes.completed_date, None);

        let mut task = sample_task();
        changes.apply(&mut task);
        assert_eq!(task.status, TaskStatus::Review);
        assert!(task.completed_date.is_none());
    }

    #[test]
    fn test_privileged_done_stamps_completion() {
        for role in [Role::Pm, Role::Hr] {
            let patch = TaskPatch { status: Some(TaskStatus::Done), ..Default::default() };
            let changes = plan_update(role, patch, now()).unwrap();
            assert_eq!(changes.status, Some(TaskStatus::Done));
            assert_eq!(changes.completed_date, Some(now()));
            assert_eq!(changes.updated_at, now());
        }
    }

    #[test]
    fn test_plain_transitions_pass_through() {
        for status in [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Review] {
            let patch = TaskPatch { status: Some(status), ..Default::default() };
            let changes = plan_update(Role::Employee, patch, now()).unwrap();
            assert_eq!(changes.status, Some(status));
            assert!(changes.completed_date.is_none());
        }
    }

    #[test]
    fn test_employee_planning_fields_are_dropped() {
        let patch: TaskPatch = serde_json::from_str(
            r#"{"title":"Hijacked","dueDate":"2030-01-01","assigneeId":"someone","actualHours":3}"#,
        )
        .unwrap();
        let changes = plan_update(Role::Employee, patch, now()).unwrap();
        assert_eq!(changes.title, None);
        assert_eq!(changes.due_date, None);
        assert_eq!(changes.assignee_id, None);
        assert_eq!(changes.actual_hours, Some(3.0));

        let mut task = sample_task();
        changes.apply(&mut task);
        assert_eq!(task.title, "Write report");
        assert_eq!(task.assignee_id.as_deref(), Some("user-1"));
        assert_eq!(task.updated_at, now());
    }

    #[test]
    fn test_pm_can_reassign_and_unassign() {
        let patch: TaskPatch = serde_json::from_str(r#"{"assigneeId":"user-2"}"#).unwrap();
        let changes = plan_update(Role::Pm, patch, now()).unwrap();
        assert_eq!(changes.assignee_id, Some(Some("user-2".to_string())));

        let patch: TaskPatch = serde_json::from_str(r#"{"assigneeId":"unassigned"}"#).unwrap();
        let changes = plan_update(Role::Pm, patch, now()).unwrap();
        assert_eq!(changes.assignee_id, Some(None));

        let patch: TaskPatch = serde_json::from_str(r#"{"assigneeId":null}"#).unwrap();
        assert_eq!(patch.assignee_id, Some(AssigneeChange::Unassign));

        let patch: TaskPatch = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(patch.assignee_id, None);
    }

    #[test]
    fn test_validation_errors() {
        let patch = TaskPatch { title: Some("   ".to_string()), ..Default::default() };
        assert_eq!(plan_update(Role::Pm, patch, now()), Err(LifecycleError::EmptyTitle));

        let patch = TaskPatch { actual_hours: Some(-1.0), ..Default::default() };
        assert_eq!(plan_update(Role::Employee, patch, now()), Err(LifecycleError::InvalidHours));
    }

    #[test]
    fn test_unknown_status_is_rejected_by_deserializer() {
        let result: Result<TaskPatch, _> = serde_json::from_str(r#"{"status":"archived"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_record_evidence_forces_review() {
        let mut task = sample_task();
        task.status = TaskStatus::Todo;
        let assessment = QualityAssessment { score: 88, analysis: "Solid".to_string() };
        record_evidence(&mut task, &assessment, now());
        assert_eq!(task.status, TaskStatus::Review);
        assert_eq!(task.quality_score, Some(88));
        assert_eq!(task.quality_analysis.as_deref(), Some("Solid"));
        assert_eq!(task.updated_at, now());
    }

    #[test]
    fn test_lateness_five_days() {
        let due = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let submitted = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        let lateness = Lateness::measure(Some(due), submitted);
        assert!(lateness.is_late);
        assert_eq!(lateness.days_late, 5);
    }

    #[test]
    fn test_lateness_rounds_partial_days_up() {
        let due = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let submitted = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 1).unwrap();
        assert_eq!(Lateness::measure(Some(due), submitted).days_late, 1);
    }

    #[test]
    fn test_lateness_on_time() {
        let due = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        assert_eq!(Lateness::measure(Some(due), due), Lateness::default());
        assert_eq!(Lateness::measure(None, now()), Lateness::default());
    }

    #[test]
    fn test_lateness_ignores_sub_millisecond_overrun() {
        let due = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let submitted = due + chrono::Duration::microseconds(500);
        assert_eq!(Lateness::measure(Some(due), submitted), Lateness::default());

        let lateness = Lateness::measure(Some(due), due + chrono::Duration::milliseconds(1));
        assert_eq!(lateness, Lateness { is_late: true, days_late: 1 });
    }
}
