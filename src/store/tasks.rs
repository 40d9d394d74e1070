use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::{placeholders, Store, StoreError};
use crate::ai::TaskBreakdown;
use crate::core::{RiskLevel, Task, TaskStatus};

const TASK_COLUMNS: &str = "id, project_id, title, description, status, priority, assignee_id, \
     creator_id, due_date, completed_date, estimated_hours, actual_hours, quality_score, \
     quality_analysis, risk_level, ai_risk_analysis, ai_breakdown, created_at, updated_at";

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let breakdown: Option<String> = row.get(16)?;
    let ai_breakdown = breakdown
        .map(|json| serde_json::from_str::<TaskBreakdown>(&json))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(16, Type::Text, Box::new(e)))?;

    Ok(Task {
        id: row.get(0)?,
        project_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        status: row.get(4)?,
        priority: row.get(5)?,
        assignee_id: row.get(6)?,
        creator_id: row.get(7)?,
        due_date: row.get(8)?,
        completed_date: row.get(9)?,
        estimated_hours: row.get(10)?,
        actual_hours: row.get(11)?,
        quality_score: row.get(12)?,
        quality_analysis: row.get(13)?,
        risk_level: row.get(14)?,
        ai_risk_analysis: row.get(15)?,
        ai_breakdown,
        created_at: row.get(17)?,
        updated_at: row.get(18)?,
    })
}

fn breakdown_json(task: &Task) -> Result<Option<String>, StoreError> {
    task.ai_breakdown
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| StoreError::Corrupt(e.to_string()))
}

/// Insert one task row; shared by single inserts and project transactions.
pub(super) fn insert_task_row(conn: &Connection, task: &Task) -> Result<(), StoreError> {
    conn.execute(
        &format!("INSERT INTO tasks ({TASK_COLUMNS}) VALUES ({})", placeholders(19)),
        params![
            task.id,
            task.project_id,
            task.title,
            task.description,
            task.status,
            task.priority,
            task.assignee_id,
            task.creator_id,
            task.due_date,
            task.completed_date,
            task.estimated_hours,
            task.actual_hours,
            task.quality_score,
            task.quality_analysis,
            task.risk_level,
            task.ai_risk_analysis,
            breakdown_json(task)?,
            task.created_at,
            task.updated_at,
        ],
    )?;
    Ok(())
}

/// Write back every mutable column of one task row; returns rows changed.
pub(super) fn update_task_row(conn: &Connection, task: &Task) -> Result<usize, StoreError> {
    let breakdown = breakdown_json(task)?;
    let changed = conn.execute(
        "UPDATE tasks SET title = ?2, description = ?3, status = ?4, priority = ?5, \
         assignee_id = ?6, due_date = ?7, completed_date = ?8, estimated_hours = ?9, \
         actual_hours = ?10, quality_score = ?11, quality_analysis = ?12, risk_level = ?13, \
         ai_risk_analysis = ?14, ai_breakdown = ?15, updated_at = ?16 \
         WHERE id = ?1",
        params![
            task.id,
            task.title,
            task.description,
            task.status,
            task.priority,
            task.assignee_id,
            task.due_date,
            task.completed_date,
            task.estimated_hours,
            task.actual_hours,
            task.quality_score,
            task.quality_analysis,
            task.risk_level,
            task.ai_risk_analysis,
            breakdown,
            task.updated_at,
        ],
    )?;
    Ok(changed)
}

impl Store {
    pub fn insert_task(&self, task: &Task) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        insert_task_row(&conn, task)
    }

    pub fn get_task(&self, id: &str) -> Result<Option<Task>, StoreError> {
        let conn = self.conn.lock();
        Ok(conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                params![id],
                task_from_row,
            )
            .optional()?)
    }

    /// Write back every mutable column of `task`. Last write wins.
    pub fn save_task(&self, task: &Task) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        if update_task_row(&conn, task)? == 0 {
            return Err(StoreError::UnknownId);
        }
        Ok(())
    }

    /// Record a risk scan result on one task.
    ///
    /// `updated_at` is left alone; the review queue reads it as the
    /// submission time.
    pub fn set_task_risk(
        &self,
        id: &str,
        level: RiskLevel,
        analysis: &str,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE tasks SET risk_level = ?2, ai_risk_analysis = ?3 WHERE id = ?1",
            params![id, level, analysis],
        )?;
        if changed == 0 {
            return Err(StoreError::UnknownId);
        }
        Ok(())
    }

    /// Tasks of one project, oldest first.
    pub fn tasks_for_project(&self, project_id: &str) -> Result<Vec<Task>, StoreError> {
        self.query_tasks(
            &format!(
                "SELECT {TASK_COLUMNS} FROM tasks WHERE project_id = ? ORDER BY created_at ASC"
            ),
            &[project_id],
        )
    }

    /// Tasks assigned to one user, most recently updated first.
    pub fn tasks_for_assignee(&self, user_id: &str) -> Result<Vec<Task>, StoreError> {
        self.query_tasks(
            &format!(
                "SELECT {TASK_COLUMNS} FROM tasks WHERE assignee_id = ? ORDER BY updated_at DESC"
            ),
            &[user_id],
        )
    }

    /// Tasks whose status is one of `statuses`, most recently updated first.
    pub fn tasks_with_status(&self, statuses: &[TaskStatus]) -> Result<Vec<Task>, StoreError> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }
        let names: Vec<&str> = statuses.iter().map(TaskStatus::as_str).collect();
        self.query_tasks(
            &format!(
                "SELECT {TASK_COLUMNS} FROM tasks WHERE status IN ({}) ORDER BY updated_at DESC",
                placeholders(names.len())
            ),
            &names,
        )
    }

    /// Every task, most recently updated first.
    pub fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        self.query_tasks(&format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY updated_at DESC"), &[])
    }

    fn query_tasks(&self, sql: &str, args: &[&str]) -> Result<Vec<Task>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let tasks = stmt
            .query_map(params_from_iter(args.iter()), task_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }
}
