use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::tasks::{insert_task_row, update_task_row};
use super::users::user_from_row;
use super::{Store, StoreError};
use crate::core::{Project, Task, User};

const PROJECT_COLUMNS: &str =
    "id, name, description, status, manager_id, start_date, end_date, created_at, updated_at";

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        status: row.get(3)?,
        manager_id: row.get(4)?,
        start_date: row.get(5)?,
        end_date: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn update_project_row(conn: &Connection, project: &Project) -> Result<(), StoreError> {
    let changed = conn.execute(
        "UPDATE projects SET name = ?2, description = ?3, status = ?4, start_date = ?5, \
         end_date = ?6, updated_at = ?7 WHERE id = ?1",
        params![
            project.id,
            project.name,
            project.description,
            project.status,
            project.start_date,
            project.end_date,
            project.updated_at,
        ],
    )?;
    if changed == 0 {
        return Err(StoreError::UnknownId);
    }
    Ok(())
}

/// Done/total task counts of one project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskCounts {
    pub done: u32,
    pub total: u32,
}

impl TaskCounts {
    /// Completion percentage, rounded; 0 for a project without tasks.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn progress(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        (f64::from(self.done) / f64::from(self.total) * 100.0).round() as u8
    }
}

impl Store {
    /// Create a project with its members and initial tasks in one transaction.
    pub fn create_project(
        &self,
        project: &Project,
        member_ids: &[String],
        tasks: &[Task],
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        tx.execute(
            &format!(
                "INSERT INTO projects ({PROJECT_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
            ),
            params![
                project.id,
                project.name,
                project.description,
                project.status,
                project.manager_id,
                project.start_date,
                project.end_date,
                project.created_at,
                project.updated_at,
            ],
        )?;

        for user_id in member_ids {
            tx.execute(
                "INSERT OR IGNORE INTO project_members (project_id, user_id, joined_at) \
                 VALUES (?1, ?2, ?3)",
                params![project.id, user_id, project.created_at],
            )?;
        }

        for task in tasks {
            insert_task_row(&tx, task)?;
        }

        tx.commit()?;
        Ok(())
    }

    pub fn get_project(&self, id: &str) -> Result<Option<Project>, StoreError> {
        let conn = self.conn.lock();
        Ok(conn
            .query_row(
                &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1"),
                params![id],
                project_from_row,
            )
            .optional()?)
    }

    /// All projects, newest first.
    pub fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects ORDER BY created_at DESC"
        ))?;
        let projects = stmt.query_map([], project_from_row)?.collect::<Result<Vec<_>, _>>()?;
        Ok(projects)
    }

    pub fn update_project(&self, project: &Project) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        update_project_row(&conn, project)
    }

    /// Update a project and reconcile its task list in one transaction.
    ///
    /// Tasks in `removed` are deleted with their evidence, `changed` tasks
    /// are written back and `added` tasks are inserted. Nothing is kept
    /// when any step fails.
    pub fn update_project_tasks(
        &self,
        project: &Project,
        removed: &[String],
        changed: &[Task],
        added: &[Task],
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        update_project_row(&tx, project)?;
        for id in removed {
            tx.execute("DELETE FROM task_evidence WHERE task_id = ?1", params![id])?;
            tx.execute(
                "DELETE FROM tasks WHERE id = ?1 AND project_id = ?2",
                params![id, project.id],
            )?;
        }
        for task in changed {
            if update_task_row(&tx, task)? == 0 {
                return Err(StoreError::UnknownId);
            }
        }
        for task in added {
            insert_task_row(&tx, task)?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Delete a project together with its tasks, their evidence and the
    /// membership rows. Returns `false` when the project does not exist.
    pub fn delete_project(&self, id: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM task_evidence \
             WHERE task_id IN (SELECT id FROM tasks WHERE project_id = ?1)",
            params![id],
        )?;
        tx.execute("DELETE FROM tasks WHERE project_id = ?1", params![id])?;
        tx.execute("DELETE FROM project_members WHERE project_id = ?1", params![id])?;
        let removed = tx.execute("DELETE FROM projects WHERE id = ?1", params![id])?;

        tx.commit()?;
        Ok(removed > 0)
    }

    /// Users who are members of a project, by name.
    pub fn project_members(&self, project_id: &str) -> Result<Vec<User>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT u.id, u.name, u.email, u.role, u.department, u.status, u.created_at \
             FROM users u JOIN project_members m ON m.user_id = u.id \
             WHERE m.project_id = ?1 ORDER BY u.name ASC",
        )?;
        let users = stmt
            .query_map(params![project_id], user_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    /// Done/total task counts for every project that has tasks.
    pub fn task_counts(&self) -> Result<HashMap<String, TaskCounts>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT project_id, COUNT(*), SUM(CASE WHEN status = 'done' THEN 1 ELSE 0 END) \
             FROM tasks GROUP BY project_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, TaskCounts { total: row.get(1)?, done: row.get(2)? }))
        })?;
        let counts = rows.collect::<Result<HashMap<_, _>, _>>()?;
        Ok(counts)
    }
}
