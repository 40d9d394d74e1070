//! Domain records: users, projects, tasks and evidence.
//!
//! Enum values serialize in `snake_case`, which is also the form stored in
//! the database.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::new_id;
use crate::ai::TaskBreakdown;

/// Error returned when a string does not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: '{value}'")]
pub struct UnknownVariant {
    /// Name of the enum being parsed
    pub kind: &'static str,
    /// The rejected input
    pub value: String,
}

/// Declares a closed string enum with `as_str`, `Display` and
/// case-insensitive `FromStr`.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// All variants in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The stored/serialized form.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let lower = s.trim().to_ascii_lowercase();
                match lower.as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(UnknownVariant { kind: $kind, value: s.to_string() }),
                }
            }
        }
    };
}

string_enum! {
    /// Workflow state of a task.
    TaskStatus, "task status" {
        /// Not started
        Todo => "todo",
        /// Being worked on
        InProgress => "in_progress",
        /// Evidence submitted, waiting for a pm/hr decision
        Review => "review",
        /// Approved
        Done => "done",
    }
}

string_enum! {
    /// Task priority.
    Priority, "priority" {
        Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
    }
}

string_enum! {
    /// Estimated risk that a task misses its deadline or has quality problems.
    RiskLevel, "risk level" {
        Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
    }
}

string_enum! {
    /// Role of an authenticated user.
    Role, "role" {
        /// Works on assigned tasks
        Employee => "employee",
        /// Project manager
        Pm => "pm",
        /// Human resources
        Hr => "hr",
    }
}

string_enum! {
    /// Account approval state.
    UserStatus, "user status" {
        /// Signed up, waiting for hr approval
        Pending => "pending",
        /// Approved
        Active => "active",
        /// Rejected or revoked
        Rejected => "rejected",
    }
}

string_enum! {
    /// Project lifecycle state.
    ProjectStatus, "project status" {
        Planning => "planning",
        Active => "active",
        Completed => "completed",
        OnHold => "on_hold",
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Todo
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

impl Default for ProjectStatus {
    fn default() -> Self {
        Self::Planning
    }
}

impl TaskStatus {
    /// Statuses that still count as open work.
    pub const ACTIVE: &'static [TaskStatus] =
        &[TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Review];

    /// Whether the task still counts as open work.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Done)
    }
}

impl RiskLevel {
    /// Whether a batch scan should record this level.
    pub fn is_elevated(&self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

impl Role {
    /// pm and hr may approve work and edit planning fields.
    pub fn is_privileged(&self) -> bool {
        matches!(self, Self::Pm | Self::Hr)
    }
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub department: Option<String>,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
}

/// A project and its scheduling metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub manager_id: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A unit of work inside a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: Priority,
    pub assignee_id: Option<String>,
    pub creator_id: String,
    pub due_date: Option<DateTime<Utc>>,
    /// Set only when a pm/hr approves the task
    pub completed_date: Option<DateTime<Utc>>,
    pub estimated_hours: Option<f64>,
    pub actual_hours: Option<f64>,
    /// 0-100, set by quality analysis
    pub quality_score: Option<u8>,
    pub quality_analysis: Option<String>,
    /// Set by a risk scan
    pub risk_level: Option<RiskLevel>,
    pub ai_risk_analysis: Option<String>,
    pub ai_breakdown: Option<TaskBreakdown>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A file submitted as proof of task completion. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    pub id: String,
    pub task_id: String,
    pub user_id: String,
    pub file_url: String,
    pub public_id: Option<String>,
    pub file_type: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// A freshly signed-up user, pending approval.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        role: Role,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            email: email.into(),
            role,
            department: None,
            status: UserStatus::Pending,
            created_at: now,
        }
    }
}

impl Project {
    pub fn new(name: impl Into<String>, manager_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            description: None,
            status: ProjectStatus::default(),
            manager_id: manager_id.into(),
            start_date: None,
            end_date: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Task {
    /// A new `todo` task with no AI annotations.
    pub fn new(
        project_id: impl Into<String>,
        title: impl Into<String>,
        creator_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new_id(),
            project_id: project_id.into(),
            title: title.into(),
            description: None,
            status: TaskStatus::default(),
            priority: Priority::default(),
            assignee_id: None,
            creator_id: creator_id.into(),
            due_date: None,
            completed_date: None,
            estimated_hours: None,
            actual_hours: None,
            quality_score: None,
            quality_analysis: None,
            risk_level: None,
            ai_risk_analysis: None,
            ai_breakdown: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// The user on whose behalf a request runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub role: Role,
    pub status: UserStatus,
}

impl Actor {
    /// Build an actor from a stored user.
    pub fn from_user(user: &User) -> Self {
        Self { id: user.id.clone(), role: user.role, status: user.status }
    }

    /// Whether the actor holds one of `roles`.
    pub fn has_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.role)
    }
}

/// Deserializers for timestamps supplied by clients.
///
/// Accepts RFC 3339 timestamps and bare `YYYY-MM-DD` dates (midnight UTC).
pub mod client_time {
    use chrono::{DateTime, NaiveDate, Utc};
    use serde::{Deserialize, Deserializer};

    /// Parse a client-supplied timestamp.
    pub fn parse(value: &str) -> Option<DateTime<Utc>> {
        let value = value.trim();
        if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
            return Some(ts.with_timezone(&Utc));
        }
        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }

    /// `Option<DateTime<Utc>>` field; empty strings and `null` become `None`.
    pub fn optional<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => parse(text)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid date: '{text}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in TaskStatus::ALL {
            assert_eq!(status.as_str().parse::<TaskStatus>().unwrap(), *status);
        }
        assert_eq!("In_Progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
    }

    #[test]
    fn test_unknown_variant_error() {
        let err = "archived".parse::<TaskStatus>().unwrap_err();
        assert_eq!(err.kind, "task status");
        assert!(err.to_string().contains("archived"));
    }

    #[test]
    fn test_enum_serde_uses_snake_case() {
        let json = serde_json::to_string(&ProjectStatus::OnHold).unwrap();
        assert_eq!(json, "\"on_hold\"");
        let role: Role = serde_json::from_str("\"pm\"").unwrap();
        assert_eq!(role, Role::Pm);
    }

    #[test]
    fn test_role_privileges() {
        assert!(!Role::Employee.is_privileged());
        assert!(Role::Pm.is_privileged());
        assert!(Role::Hr.is_privileged());
    }

    #[test]
    fn test_risk_level_elevated() {
        assert!(RiskLevel::High.is_elevated());
        assert!(RiskLevel::Critical.is_elevated());
        assert!(!RiskLevel::Medium.is_elevated());
    }

    #[test]
    fn test_client_time_accepts_date_and_rfc3339() {
        let date = client_time::parse("2024-01-10").unwrap();
        assert_eq!(date.to_rfc3339(), "2024-01-10T00:00:00+00:00");

        let ts = client_time::parse("2024-01-10T12:30:00+02:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-01-10T10:30:00+00:00");

        assert!(client_time::parse("next tuesday").is_none());
    }
}
