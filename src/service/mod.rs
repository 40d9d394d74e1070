//! Application operations.
//!
//! Each operation is a method on [`App`](crate::app::App) taking the acting
//! user and, where records are stamped, the current time. Handlers translate
//! HTTP requests into these calls; the CLI calls them directly.

mod audit;
mod dashboard;
mod files;
mod performance;
mod projects;
mod tasks;
mod users;

pub use audit::{AuditEntry, AuditAssignee, ScanReport};
pub use dashboard::{
    ChartPoint, DepartmentShare, EmployeeStats, HrOverview, HrStats, PendingApproval, PmOverview,
    PmStats, PriorityCounts, ProjectStatusCounts, RecentCompletion, StatusCounts, WorkloadEntry,
    WorkloadStats,
};
pub use files::UploadRequest;
pub use performance::{
    BestTask, EmployeePerformance, MonthlyMetrics, PerformanceTrend, QualityMetrics,
    RecentActivity, TaskMix,
};
pub use projects::{
    NewProject, NewTask, ProjectDetail, ProjectPatch, ProjectSummary, TaskEdit, TaskRow,
};
pub use tasks::{EvidenceInput, TaskDetail};
pub use users::{activate_user, register_user, NewUser, UserPatch};

use crate::core::{is_valid_id, Actor, LifecycleError, Role};
use crate::store::StoreError;
use crate::upload::UploadError;

/// Errors returned by application operations.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The request is malformed or breaks a rule
    #[error("{0}")]
    Validation(String),

    /// No acting user could be established
    #[error("Unauthorized")]
    Unauthenticated,

    /// The acting user may not perform the operation
    #[error("Forbidden")]
    Forbidden,

    /// The named record does not exist
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Upload(#[from] UploadError),
}

impl From<LifecycleError> for ServiceError {
    fn from(err: LifecycleError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Result type for application operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Roles allowed to manage projects and review work.
pub const MANAGERS: &[Role] = &[Role::Pm, Role::Hr];

/// Fail with [`ServiceError::Forbidden`] unless the actor holds one of `roles`.
pub fn require_role(actor: &Actor, roles: &[Role]) -> ServiceResult<()> {
    if actor.has_role(roles) {
        Ok(())
    } else {
        tracing::debug!(user = %actor.id, role = %actor.role, "Role not permitted");
        Err(ServiceError::Forbidden)
    }
}

/// Reject malformed identifiers before they reach the store.
fn check_id(id: &str, kind: &str) -> ServiceResult<()> {
    if is_valid_id(id) {
        Ok(())
    } else {
        Err(ServiceError::Validation(format!("Invalid {kind} ID")))
    }
}

/// Trimmed text, or `None` when blank.
fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::UserStatus;

    fn actor(role: Role) -> Actor {
        Actor { id: crate::core::new_id(), role, status: UserStatus::Active }
    }

    #[test]
    fn test_require_role() {
        assert!(require_role(&actor(Role::Pm), MANAGERS).is_ok());
        assert!(require_role(&actor(Role::Hr), MANAGERS).is_ok());
        assert!(matches!(
            require_role(&actor(Role::Employee), MANAGERS),
            Err(ServiceError::Forbidden)
        ));
    }

    #[test]
    fn test_check_id_message() {
        let err = check_id("abc", "task").unwrap_err();
        assert_eq!(err.to_string(), "Invalid task ID");
        assert!(check_id(&crate::core::new_id(), "task").is_ok());
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  hi ".to_string())), Some("hi".to_string()));
        assert_eq!(non_blank(Some("   ".to_string())), None);
        assert_eq!(non_blank(None), None);
    }
}
