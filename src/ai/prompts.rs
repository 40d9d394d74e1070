//! Prompt builders.
//!
//! Each analysis sends one self-contained prompt that describes the exact
//! JSON shape expected back.

use chrono::NaiveDate;

use super::analysis::{QualityInput, RiskCandidate, WorkloadItem};

/// Prompt for splitting a task into subtasks.
pub fn breakdown_prompt(title: &str, description: &str) -> String {
    format!(
        r#"You are an expert Project Manager AI. You will receive a task title and description.
Your job is to:
1. Break the task down into smaller, actionable subtasks (max 5).
2. Estimate the hours for each subtask.
3. Give a brief risk analysis.

Task Title: {title}
Task Description: {description}

Output exactly this JSON format (no markdown):
{{
  "subtasks": [{{"title": "Subtask 1", "estimatedHours": 2}}],
  "riskAnalysis": "Risk analysis text here...",
  "estimatedTotalHours": 10
}}"#
    )
}

/// Prompt for rating one user's workload.
pub fn workload_prompt(tasks: &[WorkloadItem]) -> String {
    let tasks = serde_json::to_string(tasks).unwrap_or_else(|_| "[]".to_string());
    format!(
        r#"Analyze the following user workload and determine the risk level (low, medium, high, critical) of missing deadlines or burnout.
Tasks: {tasks}

Output JSON:
{{
  "riskLevel": "medium",
  "insight": "Explain why..."
}}"#
    )
}

/// Prompt for scanning many tasks for deadline risk.
pub fn batch_risk_prompt(tasks: &[RiskCandidate], today: NaiveDate) -> String {
    let tasks = serde_json::to_string(tasks).unwrap_or_else(|_| "[]".to_string());
    format!(
        r#"You are a project risk analyzer. Review these tasks (Today is {today}):
{tasks}

Identify tasks that are at "high" or "critical" risk of missing deadlines.
Ignore tasks that are "done".

Return a JSON array ONLY for risky tasks:
[
  {{ "taskId": "...", "riskLevel": "high", "reason": "Deadline in 2 days but status is todo" }}
]
If no risky tasks, return []."#,
        today = today.format("%Y-%m-%d"),
    )
}

/// Prompt for scoring submitted work.
pub fn quality_prompt(input: &QualityInput) -> String {
    let timeliness = if input.lateness.is_late {
        format!("Late by {} days", input.lateness.days_late)
    } else {
        "On Time".to_string()
    };

    format!(
        r#"You are a strict QA Manager. Evaluate the quality of this completed task.

TASK: "{title}"
REQUIREMENTS: "{description}"
EVIDENCE SUBMITTED: "{evidence}"
TIMELINESS: {timeliness}

Rate the quality on a scale of 0-100 based on:
1. Alignment with requirements (Did they do what was asked?).
2. Clarity of evidence provided.
3. Timeliness (Penalize heavily if late).

Return JSON ONLY:
{{
  "score": 85,
  "analysis": "Good work, met all requirements. Evidence is clear. Perfect timing."
}}"#,
        title = input.title,
        description = input.description,
        evidence = input.evidence_description,
    )
}
