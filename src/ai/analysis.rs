//! Typed AI analyses.
//!
//! Every analysis builds a prompt, sends it through the gateway, parses the
//! reply strictly and validates it. Failures surface as [`AnalysisError`];
//! callers that must never fail use the `*_or_fallback` variants, which log
//! the error and substitute the documented default.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::prompts::{batch_risk_prompt, breakdown_prompt, quality_prompt, workload_prompt};
use super::{parse_json, AIError, AIGateway, ParseError};
use crate::core::{Lateness, RiskLevel, TaskStatus};

/// Maximum number of subtasks kept from a breakdown.
pub const MAX_SUBTASKS: usize = 5;

/// Errors from an analysis call.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Gateway(#[from] AIError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("AI response has an unexpected shape: {0}")]
    Schema(String),
}

/// A value together with whether it came from a fallback.
#[derive(Debug)]
pub struct FallbackResult<T> {
    /// The result value
    pub value: T,
    /// Whether a fallback was used
    pub used_fallback: bool,
    /// Why the fallback was used
    pub fallback_description: Option<String>,
}

impl<T> FallbackResult<T> {
    /// Create a primary (non-fallback) result.
    pub fn primary(value: T) -> Self {
        Self { value, used_fallback: false, fallback_description: None }
    }

    /// Create a fallback result.
    pub fn fallback(value: T, description: impl Into<String>) -> Self {
        Self { value, used_fallback: true, fallback_description: Some(description.into()) }
    }

    /// Discard the fallback bookkeeping.
    pub fn into_value(self) -> T {
        self.value
    }
}

/// Resolve an analysis outcome, substituting `fallback` on error.
///
/// The error is logged at warn level under `operation`.
pub fn with_fallback<T, E, F>(
    result: Result<T, E>,
    fallback: F,
    operation: &str,
) -> FallbackResult<T>
where
    E: fmt::Display,
    F: FnOnce() -> T,
{
    match result {
        Ok(value) => FallbackResult::primary(value),
        Err(e) => {
            tracing::warn!(operation, error = %e, "AI analysis failed, using fallback");
            FallbackResult::fallback(fallback(), e.to_string())
        }
    }
}

/// One step of a task breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    pub title: String,
    pub estimated_hours: f64,
}

/// A task split into subtasks with an effort estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskBreakdown {
    pub subtasks: Vec<Subtask>,
    pub risk_analysis: String,
    pub estimated_total_hours: f64,
}

impl TaskBreakdown {
    /// Returned when the breakdown cannot be produced.
    pub fn fallback() -> Self {
        Self {
            subtasks: Vec::new(),
            risk_analysis: "AI breakdown failed. Please review manually.".to_string(),
            estimated_total_hours: 0.0,
        }
    }
}

/// Deadline and burnout risk for one person's workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadRisk {
    pub risk_level: RiskLevel,
    pub insight: String,
}

impl WorkloadRisk {
    pub fn fallback() -> Self {
        Self { risk_level: RiskLevel::Low, insight: "AI analysis unavailable".to_string() }
    }
}

/// A task flagged by a batch scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskFinding {
    pub task_id: String,
    pub risk_level: RiskLevel,
    pub reason: String,
}

/// Quality score of submitted work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QualityAssessment {
    /// Always within 0..=100
    pub score: u8,
    pub analysis: String,
}

impl QualityAssessment {
    pub fn fallback() -> Self {
        Self {
            score: 70,
            analysis: "AI Analysis unavailable currently. Please review manually.".to_string(),
        }
    }
}

/// A task as seen by the workload analysis.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadItem {
    pub title: String,
    pub due_date: Option<DateTime<Utc>>,
    pub status: TaskStatus,
}

/// A task as seen by the batch risk scan.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskCandidate {
    pub id: String,
    pub title: String,
    /// RFC 3339 due date, empty when the task has none
    pub due_date: String,
    pub status: TaskStatus,
}

/// Inputs to a quality assessment.
#[derive(Debug, Clone)]
pub struct QualityInput {
    pub title: String,
    pub description: String,
    pub evidence_description: String,
    pub lateness: Lateness,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBreakdown {
    #[serde(default)]
    subtasks: Vec<Subtask>,
    risk_analysis: String,
    estimated_total_hours: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawWorkloadRisk {
    risk_level: String,
    insight: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFinding {
    task_id: String,
    risk_level: String,
    #[serde(default)]
    reason: String,
}

#[derive(Deserialize)]
struct RawQuality {
    score: f64,
    analysis: String,
}

fn hours_valid(hours: f64) -> bool {
    hours.is_finite() && hours >= 0.0
}

/// Runs analyses against an [`AIGateway`].
#[derive(Debug, Clone)]
pub struct Analyzer {
    gateway: Arc<AIGateway>,
}

impl Analyzer {
    /// Create an analyzer over a shared gateway.
    pub fn new(gateway: Arc<AIGateway>) -> Self {
        Self { gateway }
    }

    /// The underlying gateway.
    pub fn gateway(&self) -> &AIGateway {
        &self.gateway
    }

    async fn ask<T: serde::de::DeserializeOwned>(&self, prompt: &str) -> Result<T, AnalysisError> {
        let text = self.gateway.complete(prompt).await?;
        Ok(parse_json(&text)?)
    }

    /// Break a task into at most [`MAX_SUBTASKS`] subtasks.
    pub async fn breakdown_task(
        &self,
        title: &str,
        description: &str,
    ) -> Result<TaskBreakdown, AnalysisError> {
        let raw: RawBreakdown = self.ask(&breakdown_prompt(title, description)).await?;

        if !hours_valid(raw.estimated_total_hours)
            || raw.subtasks.iter().any(|s| !hours_valid(s.estimated_hours))
        {
            return Err(AnalysisError::Schema("negative or non-finite hour estimate".to_string()));
        }

        let mut subtasks = raw.subtasks;
        subtasks.truncate(MAX_SUBTASKS);

        Ok(TaskBreakdown {
            subtasks,
            risk_analysis: raw.risk_analysis,
            estimated_total_hours: raw.estimated_total_hours,
        })
    }

    pub async fn breakdown_task_or_fallback(
        &self,
        title: &str,
        description: &str,
    ) -> FallbackResult<TaskBreakdown> {
        with_fallback(
            self.breakdown_task(title, description).await,
            TaskBreakdown::fallback,
            "breakdown_task",
        )
    }

    /// Rate the risk of one person's workload.
    pub async fn analyze_workload_risk(
        &self,
        tasks: &[WorkloadItem],
    ) -> Result<WorkloadRisk, AnalysisError> {
        let raw: RawWorkloadRisk = self.ask(&workload_prompt(tasks)).await?;
        let risk_level = raw
            .risk_level
            .parse::<RiskLevel>()
            .map_err(|e| AnalysisError::Schema(e.to_string()))?;
        Ok(WorkloadRisk { risk_level, insight: raw.insight })
    }

    pub async fn analyze_workload_risk_or_fallback(
        &self,
        tasks: &[WorkloadItem],
    ) -> FallbackResult<WorkloadRisk> {
        with_fallback(
            self.analyze_workload_risk(tasks).await,
            WorkloadRisk::fallback,
            "analyze_workload_risk",
        )
    }

    /// Find tasks at high or critical risk of missing their deadline.
    ///
    /// Only elevated findings for tasks in `tasks` are returned. An empty
    /// input returns no findings without contacting any provider.
    pub async fn analyze_batch_risk(
        &self,
        tasks: &[RiskCandidate],
        today: NaiveDate,
    ) -> Result<Vec<RiskFinding>, AnalysisError> {
        if tasks.is_empty() {
            return Ok(Vec::new());
        }

        let raw: Vec<RawFinding> = self.ask(&batch_risk_prompt(tasks, today)).await?;
        let known: HashSet<&str> = tasks.iter().map(|t| t.id.as_str()).collect();

        let findings = raw
            .into_iter()
            .filter_map(|finding| {
                let Ok(risk_level) = finding.risk_level.parse::<RiskLevel>() else {
                    tracing::debug!(
                        task_id = %finding.task_id,
                        level = %finding.risk_level,
                        "Skipping finding with unknown risk level"
                    );
                    return None;
                };
                if !risk_level.is_elevated() || !known.contains(finding.task_id.as_str()) {
                    return None;
                }
                Some(RiskFinding { task_id: finding.task_id, risk_level, reason: finding.reason })
            })
            .collect();

        Ok(findings)
    }

    pub async fn analyze_batch_risk_or_fallback(
        &self,
        tasks: &[RiskCandidate],
        today: NaiveDate,
    ) -> FallbackResult<Vec<RiskFinding>> {
        with_fallback(self.analyze_batch_risk(tasks, today).await, Vec::new, "analyze_batch_risk")
    }

    /// Score submitted work from 0 to 100.
    pub async fn analyze_quality(
        &self,
        input: &QualityInput,
    ) -> Result<QualityAssessment, AnalysisError> {
        let raw: RawQuality = self.ask(&quality_prompt(input)).await?;

        if !raw.score.is_finite() || !(0.0..=100.0).contains(&raw.score) {
            return Err(AnalysisError::Schema(format!("score {} is outside 0-100", raw.score)));
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let score = raw.score.round() as u8;

        Ok(QualityAssessment { score, analysis: raw.analysis })
    }

    pub async fn analyze_quality_or_fallback(
        &self,
        input: &QualityInput,
    ) -> FallbackResult<QualityAssessment> {
        with_fallback(
            self.analyze_quality(input).await,
            QualityAssessment::fallback,
            "analyze_quality",
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::super::testing::ScriptedProvider;
    use super::*;

    fn analyzer(providers: &[&ScriptedProvider]) -> Analyzer {
        let boxed = providers
            .iter()
            .map(|p| Box::new((*p).clone()) as Box<dyn super::super::TextCompletionProvider>)
            .collect();
        Analyzer::new(Arc::new(AIGateway::new(boxed).unwrap()))
    }

    fn candidate(id: &str) -> RiskCandidate {
        RiskCandidate {
            id: id.to_string(),
            title: format!("Task {id}"),
            due_date: String::new(),
            status: TaskStatus::InProgress,
        }
    }

    fn quality_input(lateness: Lateness) -> QualityInput {
        QualityInput {
            title: "Write docs".to_string(),
            description: "No description".to_string(),
            evidence_description: "Evidence submitted".to_string(),
            lateness,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    // ==========================================================================
    // Fallback plumbing
    // ==========================================================================

    #[test]
    fn test_with_fallback() {
        let result = with_fallback(Ok::<_, &str>(42), || 0, "op");
        assert!(!result.used_fallback);
        assert_eq!(result.value, 42);

        let result = with_fallback(Err::<i32, _>("primary failed"), || 99, "op");
        assert!(result.used_fallback);
        assert_eq!(result.value, 99);
        assert_eq!(result.fallback_description.as_deref(), Some("primary failed"));
    }

    // ==========================================================================
    // Breakdown
    // ==========================================================================

    #[tokio::test]
    async fn test_breakdown_truncates_subtasks() {
        let subtasks: Vec<String> =
            (1..=7).map(|i| format!(r#"{{"title":"Step {i}","estimatedHours":1}}"#)).collect();
        let reply = format!(
            r#"{{"subtasks":[{}],"riskAnalysis":"Tight","estimatedTotalHours":7}}"#,
            subtasks.join(",")
        );
        let provider = ScriptedProvider::new("p").reply(&reply);

        let breakdown = analyzer(&[&provider]).breakdown_task("Build", "API").await.unwrap();
        assert_eq!(breakdown.subtasks.len(), MAX_SUBTASKS);
        assert_eq!(breakdown.subtasks[0].title, "Step 1");
        assert_eq!(breakdown.risk_analysis, "Tight");
    }

    #[tokio::test]
    async fn test_breakdown_negative_hours_falls_back() {
        let provider = ScriptedProvider::new("p").reply(
            r#"{"subtasks":[{"title":"x","estimatedHours":-2}],"riskAnalysis":"r","estimatedTotalHours":1}"#,
        );
        let result = analyzer(&[&provider]).breakdown_task_or_fallback("Build", "API").await;
        assert!(result.used_fallback);
        assert_eq!(result.value, TaskBreakdown::fallback());
        assert_eq!(result.value.risk_analysis, "AI breakdown failed. Please review manually.");
    }

    // ==========================================================================
    // Workload
    // ==========================================================================

    #[tokio::test]
    async fn test_workload_risk_level_is_case_insensitive() {
        let provider = ScriptedProvider::new("p")
            .reply("```json\n{\"riskLevel\": \"High\", \"insight\": \"Three deadlines this week\"}\n```");
        let risk = analyzer(&[&provider]).analyze_workload_risk(&[]).await.unwrap();
        assert_eq!(risk.risk_level, RiskLevel::High);
        assert_eq!(risk.insight, "Three deadlines this week");
    }

    #[tokio::test]
    async fn test_workload_unknown_level_falls_back() {
        let provider =
            ScriptedProvider::new("p").reply(r#"{"riskLevel": "extreme", "insight": "?"}"#);
        let result = analyzer(&[&provider]).analyze_workload_risk_or_fallback(&[]).await;
        assert!(result.used_fallback);
        assert_eq!(result.value, WorkloadRisk::fallback());
    }

    // ==========================================================================
    // Batch risk
    // ==========================================================================

    #[tokio::test]
    async fn test_batch_empty_input_skips_gateway() {
        let provider = ScriptedProvider::new("p").reply("[]");
        let findings = analyzer(&[&provider]).analyze_batch_risk(&[], today()).await.unwrap();
        assert!(findings.is_empty());
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_batch_keeps_elevated_known_findings() {
        let provider = ScriptedProvider::new("p").reply(
            r#"Sure:
            [
              {"taskId": "a", "riskLevel": "critical", "reason": "Due tomorrow, still todo"},
              {"taskId": "b", "riskLevel": "low", "reason": "Plenty of time"},
              {"taskId": "ghost", "riskLevel": "high", "reason": "Not one of ours"},
              {"taskId": "c", "riskLevel": "HIGH", "reason": "Blocked"}
            ]"#,
        );
        let tasks = [candidate("a"), candidate("b"), candidate("c")];
        let findings = analyzer(&[&provider]).analyze_batch_risk(&tasks, today()).await.unwrap();

        let ids: Vec<&str> = findings.iter().map(|f| f.task_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(findings[0].risk_level, RiskLevel::Critical);
        assert_eq!(findings[1].risk_level, RiskLevel::High);
        assert!(provider.prompts()[0].contains("Today is 2024-01-15"));
    }

    #[tokio::test]
    async fn test_batch_non_array_reply_falls_back_to_empty() {
        let provider = ScriptedProvider::new("p").reply(r#"{"risks": []}"#);
        let result =
            analyzer(&[&provider]).analyze_batch_risk_or_fallback(&[candidate("a")], today()).await;
        assert!(result.used_fallback);
        assert!(result.value.is_empty());
    }

    // ==========================================================================
    // Quality
    // ==========================================================================

    #[tokio::test]
    async fn test_quality_score_is_rounded() {
        let provider =
            ScriptedProvider::new("p").reply(r#"{"score": 84.6, "analysis": "Solid work"}"#);
        let assessment = analyzer(&[&provider])
            .analyze_quality(&quality_input(Lateness::default()))
            .await
            .unwrap();
        assert_eq!(assessment, QualityAssessment { score: 85, analysis: "Solid work".to_string() });
    }

    #[tokio::test]
    async fn test_quality_out_of_range_score_falls_back() {
        let provider = ScriptedProvider::new("p").reply(r#"{"score": 150, "analysis": "Wow"}"#);
        let result = analyzer(&[&provider])
            .analyze_quality_or_fallback(&quality_input(Lateness::default()))
            .await;
        assert!(result.used_fallback);
        assert_eq!(result.value.score, 70);
        assert!(result.value.score <= 100);
    }

    #[tokio::test]
    async fn test_quality_all_providers_down() {
        let primary = ScriptedProvider::new("gemini").fail("429");
        let secondary = ScriptedProvider::new("groq").fail("503");
        let result = analyzer(&[&primary, &secondary])
            .analyze_quality_or_fallback(&quality_input(Lateness::default()))
            .await;

        assert!(result.used_fallback);
        assert_eq!(result.value, QualityAssessment::fallback());
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 1);
    }

    #[tokio::test]
    async fn test_quality_prompt_reports_lateness() {
        let due = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let submitted = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        let lateness = Lateness::measure(Some(due), submitted);

        let provider = ScriptedProvider::new("p").reply(r#"{"score": 40, "analysis": "Late"}"#);
        analyzer(&[&provider]).analyze_quality(&quality_input(lateness)).await.unwrap();

        assert!(provider.prompts()[0].contains("TIMELINESS: Late by 5 days"));
    }
}
