use rusqlite::{params, OptionalExtension, Row};

use super::{Store, StoreError};
use crate::core::User;

const USER_COLUMNS: &str = "id, name, email, role, department, status, created_at";

pub(super) fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        role: row.get(3)?,
        department: row.get(4)?,
        status: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl Store {
    /// Insert a user. Fails with [`StoreError::Conflict`] on a duplicate email.
    pub fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO users (id, name, email, role, department, status, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user.id,
                user.name,
                user.email,
                user.role,
                user.department,
                user.status,
                user.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        let conn = self.conn.lock();
        Ok(conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                user_from_row,
            )
            .optional()?)
    }

    /// Look a user up by (already normalized) email.
    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let conn = self.conn.lock();
        Ok(conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![email],
                user_from_row,
            )
            .optional()?)
    }

    /// All users, newest first.
    pub fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC"))?;
        let users = stmt.query_map([], user_from_row)?.collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    /// Persist the mutable user fields (role, department, status).
    pub fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE users SET role = ?2, department = ?3, status = ?4 WHERE id = ?1",
            params![user.id, user.role, user.department, user.status],
        )?;
        if changed == 0 {
            return Err(StoreError::UnknownId);
        }
        Ok(())
    }
}
