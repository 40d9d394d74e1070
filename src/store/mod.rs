//! SQLite persistence.
//!
//! One connection guarded by a mutex. Every method locks, runs one
//! statement or one transaction, and releases the lock before returning, so
//! the lock is never held across an `.await`.

mod evidence;
mod projects;
mod tasks;
mod users;

pub use projects::TaskCounts;

use std::path::Path;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, ErrorCode};

use crate::core::{Priority, ProjectStatus, RiskLevel, Role, TaskStatus, UserStatus};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    email       TEXT NOT NULL UNIQUE,
    role        TEXT NOT NULL,
    department  TEXT,
    status      TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS projects (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    description TEXT,
    status      TEXT NOT NULL,
    manager_id  TEXT NOT NULL REFERENCES users(id),
    start_date  TEXT,
    end_date    TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS project_members (
    project_id  TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    joined_at   TEXT NOT NULL,
    PRIMARY KEY (project_id, user_id)
);

CREATE TABLE IF NOT EXISTS tasks (
    id                TEXT PRIMARY KEY,
    project_id        TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    title             TEXT NOT NULL,
    description       TEXT,
    status            TEXT NOT NULL,
    priority          TEXT NOT NULL,
    assignee_id       TEXT REFERENCES users(id) ON DELETE SET NULL,
    creator_id        TEXT NOT NULL REFERENCES users(id),
    due_date          TEXT,
    completed_date    TEXT,
    estimated_hours   REAL,
    actual_hours      REAL,
    quality_score     INTEGER,
    quality_analysis  TEXT,
    risk_level        TEXT,
    ai_risk_analysis  TEXT,
    ai_breakdown      TEXT,
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks(project_id);
CREATE INDEX IF NOT EXISTS idx_tasks_assignee ON tasks(assignee_id);
CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);

CREATE TABLE IF NOT EXISTS task_evidence (
    id          TEXT PRIMARY KEY,
    task_id     TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
    user_id     TEXT NOT NULL REFERENCES users(id),
    file_url    TEXT NOT NULL,
    public_id   TEXT,
    file_type   TEXT,
    description TEXT,
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_evidence_task ON task_evidence(task_id);
"#;

/// Storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("sqlite: {0}")]
    Sql(rusqlite::Error),

    #[error("record already exists")]
    Conflict,

    #[error("referenced record does not exist")]
    UnknownReference,

    #[error("unknown id")]
    UnknownId,

    #[error("stored value is corrupt: {0}")]
    Corrupt(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(err, _) = &value {
            if err.code == ErrorCode::ConstraintViolation {
                match err.extended_code {
                    rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => return Self::UnknownReference,
                    rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => return Self::Conflict,
                    _ => {}
                }
            }
        }
        Self::Sql(value)
    }
}

/// SQLite-backed store for users, projects, tasks and evidence.
#[derive(Debug)]
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (creating if needed) the database at `path` and install the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::init(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }
}

/// Stores the closed string enums as their `snake_case` text.
macro_rules! sql_text_enum {
    ($($name:ty),+ $(,)?) => {
        $(
            impl ToSql for $name {
                fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                    Ok(ToSqlOutput::from(self.as_str()))
                }
            }

            impl FromSql for $name {
                fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                    value.as_str()?.parse().map_err(|e| FromSqlError::Other(Box::new(e)))
                }
            }
        )+
    };
}

sql_text_enum!(TaskStatus, Priority, RiskLevel, Role, UserStatus, ProjectStatus);

/// `?, ?, ...` with `n` placeholders.
fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Records for store and service tests.

    use chrono::{DateTime, TimeZone, Utc};

    use super::Store;
    use crate::core::{Project, Role, Task, User, UserStatus};

    pub fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 9, 0, 0).unwrap()
    }

    pub fn active_user(store: &Store, name: &str, role: Role) -> User {
        let mut user = User::new(name, format!("{}@example.com", name.to_lowercase()), role, at(1));
        user.status = UserStatus::Active;
        store.insert_user(&user).unwrap();
        user
    }

    pub fn project(store: &Store, manager: &User) -> Project {
        let project = Project::new("Website", &manager.id, at(1));
        store.create_project(&project, &[], &[]).unwrap();
        project
    }

    pub fn task(store: &Store, project: &Project, creator: &User, title: &str) -> Task {
        let task = Task::new(&project.id, title, &creator.id, at(2));
        store.insert_task(&task).unwrap();
        task
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("taskpulse.db");
        let store = Store::open(&path).unwrap();
        drop(store);
        assert!(path.exists());

        // reopening keeps the schema idempotent
        Store::open(&path).unwrap();
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(3), "?, ?, ?");
        assert_eq!(placeholders(1), "?");
    }
}
