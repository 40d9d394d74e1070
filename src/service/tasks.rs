//! Task operations: reading, updating, evidence and AI analyses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{check_id, non_blank, require_role, ServiceError, ServiceResult, MANAGERS};
use crate::ai::{QualityAssessment, QualityInput, TaskBreakdown, WorkloadItem, WorkloadRisk};
use crate::app::App;
use crate::core::{
    new_id, plan_update, record_evidence, Actor, Evidence, Lateness, Project, RiskLevel, Task,
    TaskPatch, User,
};

/// Body of an evidence submission. The file itself is uploaded beforehand.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceInput {
    #[serde(default)]
    pub file_url: String,
    #[serde(default)]
    pub public_id: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A task with its assignee, project and evidence.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetail {
    #[serde(flatten)]
    pub task: Task,
    pub assignee: Option<User>,
    pub project: Option<Project>,
    pub evidences: Vec<Evidence>,
}

impl App {
    /// Tasks assigned to the actor, most recently updated first.
    pub fn my_tasks(&self, actor: &Actor) -> ServiceResult<Vec<Task>> {
        Ok(self.store.tasks_for_assignee(&actor.id)?)
    }

    pub fn task_detail(&self, _actor: &Actor, task_id: &str) -> ServiceResult<TaskDetail> {
        let task = self.load_task(task_id)?;
        let assignee = match task.assignee_id.as_deref() {
            Some(id) => self.store.get_user(id)?,
            None => None,
        };
        let project = self.store.get_project(&task.project_id)?;
        let evidences = self.store.evidence_for_task(&task.id)?;
        Ok(TaskDetail { task, assignee, project, evidences })
    }

    /// Apply an update request under the lifecycle rules.
    ///
    /// Fields the actor's role may not change are dropped; an employee
    /// asking for `done` gets `review`.
    pub fn update_task(
        &self,
        actor: &Actor,
        task_id: &str,
        patch: TaskPatch,
        now: DateTime<Utc>,
    ) -> ServiceResult<Task> {
        let mut task = self.load_task(task_id)?;
        let changes = plan_update(actor.role, patch, now)?;
        if let Some(Some(assignee)) = &changes.assignee_id {
            check_id(assignee, "assignee")?;
        }

        changes.apply(&mut task);
        self.store.save_task(&task)?;

        tracing::info!(task = %task.id, user = %actor.id, status = %task.status, "Task updated");
        Ok(task)
    }

    /// Record evidence for a task, score it and move the task to review.
    ///
    /// AI unavailability never fails the submission; the fallback score is
    /// recorded instead.
    pub async fn submit_evidence(
        &self,
        actor: &Actor,
        task_id: &str,
        input: EvidenceInput,
        now: DateTime<Utc>,
    ) -> ServiceResult<Evidence> {
        check_id(task_id, "task")?;
        let file_url = input.file_url.trim();
        if file_url.is_empty() {
            return Err(ServiceError::Validation("File URL is required".to_string()));
        }
        let task = self.load_task(task_id)?;

        let evidence = Evidence {
            id: new_id(),
            task_id: task.id.clone(),
            user_id: actor.id.clone(),
            file_url: file_url.to_string(),
            public_id: non_blank(input.public_id),
            file_type: non_blank(input.file_type),
            description: non_blank(input.description),
            created_at: now,
        };
        self.store.insert_evidence(&evidence)?;

        let quality = QualityInput {
            title: task.title.clone(),
            description: task.description.clone().unwrap_or_else(|| "No description".to_string()),
            evidence_description: evidence
                .description
                .clone()
                .unwrap_or_else(|| "Evidence submitted".to_string()),
            lateness: Lateness::measure(task.due_date, now),
        };
        let assessment = self.analyzer.analyze_quality_or_fallback(&quality).await.into_value();

        let mut task = self.load_task(task_id)?;
        record_evidence(&mut task, &assessment, now);
        self.store.save_task(&task)?;

        tracing::info!(
            task = %task.id,
            evidence = %evidence.id,
            score = assessment.score,
            "Evidence submitted"
        );
        Ok(evidence)
    }

    /// Re-score a task from all of its evidence (pm/hr).
    pub async fn analyze_task_quality(
        &self,
        actor: &Actor,
        task_id: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<QualityAssessment> {
        require_role(actor, MANAGERS)?;
        let task = self.load_task(task_id)?;

        let evidences = self.store.evidence_for_task(&task.id)?;
        if evidences.is_empty() {
            return Err(ServiceError::Validation(
                "No evidence found. Cannot analyze quality.".to_string(),
            ));
        }
        let summary = evidences
            .iter()
            .map(|e| {
                format!(
                    "[{}] {}",
                    e.file_type.as_deref().unwrap_or("file"),
                    e.description.as_deref().unwrap_or("")
                )
            })
            .collect::<Vec<_>>()
            .join("; ");

        let finished = task.completed_date.unwrap_or(now);
        let due = task.due_date.unwrap_or(now);
        let quality = QualityInput {
            title: task.title.clone(),
            description: task.description.clone().unwrap_or_else(|| "No description".to_string()),
            evidence_description: summary,
            lateness: Lateness::measure(Some(due), finished),
        };
        let assessment = self.analyzer.analyze_quality_or_fallback(&quality).await.into_value();

        // the task may have changed during the AI call
        let mut task = self.load_task(task_id)?;
        task.quality_score = Some(assessment.score);
        task.quality_analysis = Some(assessment.analysis.clone());
        self.store.save_task(&task)?;

        tracing::info!(task = %task.id, score = assessment.score, "Quality analyzed");
        Ok(assessment)
    }

    /// Ask for a subtask breakdown of a task (pm/hr).
    ///
    /// A successful breakdown is stored on the task; the fallback is
    /// returned but not stored.
    pub async fn breakdown_task(
        &self,
        actor: &Actor,
        task_id: &str,
    ) -> ServiceResult<TaskBreakdown> {
        require_role(actor, MANAGERS)?;
        let task = self.load_task(task_id)?;

        let result = self
            .analyzer
            .breakdown_task_or_fallback(&task.title, task.description.as_deref().unwrap_or(""))
            .await;
        if result.used_fallback {
            return Ok(result.into_value());
        }

        let breakdown = result.into_value();
        let mut task = self.load_task(task_id)?;
        task.ai_breakdown = Some(breakdown.clone());
        self.store.save_task(&task)?;

        tracing::info!(task = %task.id, subtasks = breakdown.subtasks.len(), "Breakdown stored");
        Ok(breakdown)
    }

    /// Rate the risk of the actor's open workload.
    pub async fn workload_risk(&self, actor: &Actor) -> ServiceResult<WorkloadRisk> {
        let items: Vec<WorkloadItem> = self
            .store
            .tasks_for_assignee(&actor.id)?
            .into_iter()
            .filter(|t| t.status.is_active())
            .map(|t| WorkloadItem { title: t.title, due_date: t.due_date, status: t.status })
            .collect();

        if items.is_empty() {
            return Ok(WorkloadRisk {
                risk_level: RiskLevel::Low,
                insight: "No open tasks.".to_string(),
            });
        }

        Ok(self.analyzer.analyze_workload_risk_or_fallback(&items).await.into_value())
    }

    fn load_task(&self, task_id: &str) -> ServiceResult<Task> {
        check_id(task_id, "task")?;
        self.store.get_task(task_id)?.ok_or(ServiceError::NotFound("Task"))
    }
}
