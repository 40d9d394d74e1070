//! Review queue and batch risk scanning.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{require_role, ServiceResult, MANAGERS};
use crate::ai::RiskCandidate;
use crate::app::App;
use crate::core::{Actor, RiskLevel, Role, TaskStatus, User};

/// Who submitted a task in the review queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditAssignee {
    pub name: String,
    pub role: Role,
}

/// One task waiting for review.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: String,
    pub title: String,
    pub assignee: AuditAssignee,
    pub submitted_at: DateTime<Utc>,
    pub ai_score: u8,
    pub status: TaskStatus,
    pub risk_level: RiskLevel,
    pub ai_analysis: String,
}

/// Outcome of a batch risk scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub message: String,
    pub scanned: usize,
    pub risks_found: usize,
}

impl App {
    /// Tasks in review, most recently updated first (pm/hr).
    pub fn audit_queue(&self, actor: &Actor) -> ServiceResult<Vec<AuditEntry>> {
        require_role(actor, MANAGERS)?;
        let users: HashMap<String, User> =
            self.store.list_users()?.into_iter().map(|u| (u.id.clone(), u)).collect();

        let entries = self
            .store
            .tasks_with_status(&[TaskStatus::Review])?
            .into_iter()
            .map(|task| {
                let assignee = task.assignee_id.as_ref().and_then(|id| users.get(id));
                AuditEntry {
                    assignee: AuditAssignee {
                        name: assignee.map_or_else(|| "Unknown".to_string(), |u| u.name.clone()),
                        role: assignee.map_or(Role::Employee, |u| u.role),
                    },
                    submitted_at: task.updated_at,
                    ai_score: task.quality_score.unwrap_or(0),
                    status: task.status,
                    risk_level: task.risk_level.unwrap_or(RiskLevel::Low),
                    ai_analysis: task
                        .quality_analysis
                        .unwrap_or_else(|| "No analysis generated yet.".to_string()),
                    id: task.id,
                    title: task.title,
                }
            })
            .collect();
        Ok(entries)
    }

    /// Run a risk scan on behalf of a pm/hr user.
    pub async fn audit_scan(
        &self,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> ServiceResult<ScanReport> {
        require_role(actor, MANAGERS)?;
        self.scan_risks(now).await
    }

    /// Scan every open task for deadline risk and record elevated findings.
    ///
    /// Findings are written one at a time; a failed write stops the scan and
    /// leaves earlier writes in place.
    pub async fn scan_risks(&self, now: DateTime<Utc>) -> ServiceResult<ScanReport> {
        let active = self.store.tasks_with_status(TaskStatus::ACTIVE)?;
        if active.is_empty() {
            tracing::info!("No active tasks to scan");
            return Ok(ScanReport {
                message: "No active tasks to scan".to_string(),
                scanned: 0,
                risks_found: 0,
            });
        }

        let candidates: Vec<RiskCandidate> = active
            .into_iter()
            .map(|t| RiskCandidate {
                id: t.id,
                title: t.title,
                due_date: t.due_date.map(|d| d.to_rfc3339()).unwrap_or_default(),
                status: t.status,
            })
            .collect();

        let findings = self
            .analyzer
            .analyze_batch_risk_or_fallback(&candidates, now.date_naive())
            .await
            .into_value();

        for finding in &findings {
            if let Err(e) =
                self.store.set_task_risk(&finding.task_id, finding.risk_level, &finding.reason)
            {
                tracing::error!(task = %finding.task_id, error = %e, "Failed to record risk");
                return Err(e.into());
            }
        }

        tracing::info!(scanned = candidates.len(), risks = findings.len(), "Risk scan completed");
        Ok(ScanReport {
            message: "Risk scan completed".to_string(),
            scanned: candidates.len(),
            risks_found: findings.len(),
        })
    }
}
