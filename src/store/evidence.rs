use rusqlite::{params, Row};

use super::{Store, StoreError};
use crate::core::Evidence;

fn evidence_from_row(row: &Row<'_>) -> rusqlite::Result<Evidence> {
    Ok(Evidence {
        id: row.get(0)?,
        task_id: row.get(1)?,
        user_id: row.get(2)?,
        file_url: row.get(3)?,
        public_id: row.get(4)?,
        file_type: row.get(5)?,
        description: row.get(6)?,
        created_at: row.get(7)?,
    })
}

impl Store {
    /// Insert an evidence row. Evidence is never updated afterwards.
    pub fn insert_evidence(&self, evidence: &Evidence) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO task_evidence \
             (id, task_id, user_id, file_url, public_id, file_type, description, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                evidence.id,
                evidence.task_id,
                evidence.user_id,
                evidence.file_url,
                evidence.public_id,
                evidence.file_type,
                evidence.description,
                evidence.created_at,
            ],
        )?;
        Ok(())
    }

    /// Evidence of one task, oldest first.
    pub fn evidence_for_task(&self, task_id: &str) -> Result<Vec<Evidence>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, task_id, user_id, file_url, public_id, file_type, description, created_at \
             FROM task_evidence WHERE task_id = ?1 ORDER BY created_at ASC",
        )?;
        let evidence = stmt
            .query_map(params![task_id], evidence_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(evidence)
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{active_user, at, project, task};
    use super::*;
    use crate::core::{new_id, Role};

    fn evidence(task_id: &str, user_id: &str, day: u32) -> Evidence {
        Evidence {
            id: new_id(),
            task_id: task_id.to_string(),
            user_id: user_id.to_string(),
            file_url: format!("https://files.example.com/{day}.pdf"),
            public_id: Some(format!("uploads/{day}")),
            file_type: Some("pdf".to_string()),
            description: Some(format!("Report {day}")),
            created_at: at(day),
        }
    }

    #[test]
    fn test_evidence_listed_oldest_first() {
        let store = Store::open_in_memory().unwrap();
        let pm = active_user(&store, "Pat", Role::Pm);
        let project = project(&store, &pm);
        let task = task(&store, &project, &pm, "Report");

        let later = evidence(&task.id, &pm.id, 6);
        let earlier = evidence(&task.id, &pm.id, 4);
        store.insert_evidence(&later).unwrap();
        store.insert_evidence(&earlier).unwrap();

        assert_eq!(store.evidence_for_task(&task.id).unwrap(), vec![earlier, later]);
    }

    #[test]
    fn test_evidence_requires_task() {
        let store = Store::open_in_memory().unwrap();
        let pm = active_user(&store, "Pat", Role::Pm);
        let orphan = evidence("missing-task", &pm.id, 3);
        assert!(matches!(store.insert_evidence(&orphan), Err(StoreError::UnknownReference)));
    }
}
