//! Project operations.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{check_id, non_blank, require_role, ServiceError, ServiceResult, MANAGERS};
use crate::app::App;
use crate::core::{
    assignee_change, client_time, Actor, AssigneeChange, Priority, Project, ProjectStatus, Task,
    User,
};
use crate::store::TaskCounts;

/// A task to create, either inside a new project or on its own.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub estimated_hours: Option<f64>,
    #[serde(default, deserialize_with = "client_time::optional")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assignee_id: Option<String>,
}

/// Body of a project creation request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<ProjectStatus>,
    #[serde(default, deserialize_with = "client_time::optional")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "client_time::optional")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub member_ids: Vec<String>,
    #[serde(default)]
    pub tasks: Vec<NewTask>,
}

/// Body of a project update request; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<ProjectStatus>,
    #[serde(default, deserialize_with = "client_time::optional")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "client_time::optional")]
    pub end_date: Option<DateTime<Utc>>,
    /// The project's full task list; tasks left out are deleted
    #[serde(default)]
    pub tasks: Option<Vec<TaskEdit>>,
}

/// One entry of a project's task list in an update request.
///
/// Entries with an `id` edit that task and leave absent fields untouched;
/// entries without one create a new task.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskEdit {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub estimated_hours: Option<f64>,
    #[serde(default, deserialize_with = "assignee_change")]
    pub assignee_id: Option<AssigneeChange>,
}

/// Task rows to delete, rewrite and insert for one project update.
#[derive(Debug, Default)]
struct TaskSync {
    removed: Vec<String>,
    changed: Vec<Task>,
    added: Vec<Task>,
}

/// A project with its completion percentage.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    #[serde(flatten)]
    pub project: Project,
    pub progress: u8,
}

/// A project task with the assignee's display name.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRow {
    #[serde(flatten)]
    pub task: Task,
    pub assignee_name: Option<String>,
}

/// A project with progress, team and tasks.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub progress: u8,
    pub team: Vec<User>,
    pub tasks: Vec<TaskRow>,
}

fn task_title(title: Option<String>) -> ServiceResult<String> {
    non_blank(title).ok_or_else(|| ServiceError::Validation("Task title is required".to_string()))
}

fn estimated_hours(hours: f64) -> ServiceResult<f64> {
    if hours.is_finite() && hours >= 0.0 {
        Ok(hours)
    } else {
        Err(ServiceError::Validation("Estimated hours must be a non-negative number".to_string()))
    }
}

impl NewTask {
    fn into_task(
        self,
        project_id: &str,
        creator: &Actor,
        now: DateTime<Utc>,
    ) -> ServiceResult<Task> {
        let title = task_title(Some(self.title))?;
        let hours = estimated_hours(self.estimated_hours.unwrap_or(0.0))?;
        let assignee_id = non_blank(self.assignee_id).filter(|id| id != "unassigned");
        if let Some(id) = &assignee_id {
            check_id(id, "assignee")?;
        }

        let mut task = Task::new(project_id, title, &creator.id, now);
        task.description = non_blank(self.description);
        task.priority = self.priority.unwrap_or_default();
        task.estimated_hours = Some(hours);
        task.due_date = self.due_date;
        task.assignee_id = assignee_id;
        Ok(task)
    }
}

impl TaskEdit {
    fn into_new_task(self) -> NewTask {
        let assignee_id = match self.assignee_id {
            Some(AssigneeChange::Assign(id)) => Some(id),
            Some(AssigneeChange::Unassign) | None => None,
        };
        NewTask {
            title: self.title.unwrap_or_default(),
            description: self.description,
            priority: self.priority,
            estimated_hours: self.estimated_hours,
            due_date: None,
            assignee_id,
        }
    }

    fn apply_to(self, task: &mut Task) -> ServiceResult<()> {
        if self.title.is_some() {
            task.title = task_title(self.title)?;
        }
        if let Some(description) = self.description {
            task.description = non_blank(Some(description));
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(hours) = self.estimated_hours {
            task.estimated_hours = Some(estimated_hours(hours)?);
        }
        match self.assignee_id {
            Some(AssigneeChange::Assign(id)) => {
                check_id(&id, "assignee")?;
                task.assignee_id = Some(id);
            }
            Some(AssigneeChange::Unassign) => task.assignee_id = None,
            None => {}
        }
        Ok(())
    }
}

impl TaskSync {
    /// Match the requested task list against the project's current tasks.
    ///
    /// Edited tasks are stamped with `now` only when something changed.
    fn plan(
        existing: &[Task],
        edits: Vec<TaskEdit>,
        project_id: &str,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> ServiceResult<Self> {
        let mut sync = Self::default();
        let mut listed: Vec<String> = Vec::new();

        for mut edit in edits {
            let Some(id) = edit.id.take() else {
                sync.added.push(edit.into_new_task().into_task(project_id, actor, now)?);
                continue;
            };
            check_id(&id, "task")?;
            let Some(current) = existing.iter().find(|t| t.id == id) else {
                return Err(ServiceError::Validation(format!(
                    "Task {id} does not belong to this project"
                )));
            };
            if listed.contains(&id) {
                return Err(ServiceError::Validation(format!("Task {id} is listed twice")));
            }

            let mut task = current.clone();
            edit.apply_to(&mut task)?;
            if task != *current {
                task.updated_at = now;
                sync.changed.push(task);
            }
            listed.push(id);
        }

        sync.removed =
            existing.iter().filter(|t| !listed.contains(&t.id)).map(|t| t.id.clone()).collect();
        Ok(sync)
    }
}

impl App {
    /// All projects, newest first, with progress.
    pub fn list_projects(&self, _actor: &Actor) -> ServiceResult<Vec<ProjectSummary>> {
        let counts = self.store.task_counts()?;
        let projects = self
            .store
            .list_projects()?
            .into_iter()
            .map(|project| {
                let progress = counts.get(&project.id).map(|c| c.progress()).unwrap_or(0);
                ProjectSummary { project, progress }
            })
            .collect();
        Ok(projects)
    }

    /// Create a project with its members and initial tasks (pm/hr).
    pub fn create_project(
        &self,
        actor: &Actor,
        input: NewProject,
        now: DateTime<Utc>,
    ) -> ServiceResult<Project> {
        require_role(actor, MANAGERS)?;
        let Some(name) = non_blank(Some(input.name)) else {
            return Err(ServiceError::Validation("Name is required".to_string()));
        };
        for id in &input.member_ids {
            check_id(id, "member")?;
        }

        let mut project = Project::new(name, &actor.id, now);
        project.description = non_blank(input.description);
        project.status = input.status.unwrap_or_default();
        project.start_date = input.start_date;
        project.end_date = input.end_date;

        let tasks = input
            .tasks
            .into_iter()
            .map(|t| t.into_task(&project.id, actor, now))
            .collect::<ServiceResult<Vec<_>>>()?;

        self.store.create_project(&project, &input.member_ids, &tasks)?;
        tracing::info!(
            project = %project.id,
            members = input.member_ids.len(),
            tasks = tasks.len(),
            "Project created"
        );
        Ok(project)
    }

    pub fn project_detail(&self, _actor: &Actor, project_id: &str) -> ServiceResult<ProjectDetail> {
        let project = self.load_project(project_id)?;
        let team = self.store.project_members(&project.id)?;
        let tasks = self.store.tasks_for_project(&project.id)?;

        let names: HashMap<String, String> =
            self.store.list_users()?.into_iter().map(|u| (u.id, u.name)).collect();
        let done = tasks.iter().filter(|t| !t.status.is_active()).count();
        let progress = TaskCounts {
            done: u32::try_from(done).unwrap_or(u32::MAX),
            total: u32::try_from(tasks.len()).unwrap_or(u32::MAX),
        }
        .progress();

        let tasks = tasks
            .into_iter()
            .map(|task| {
                let assignee_name =
                    task.assignee_id.as_ref().and_then(|id| names.get(id)).cloned();
                TaskRow { task, assignee_name }
            })
            .collect();

        Ok(ProjectDetail { project, progress, team, tasks })
    }

    /// Change a project's name, description, status or dates (pm/hr).
    ///
    /// When the patch carries a task list, the project's tasks are
    /// reconciled against it in the same transaction.
    pub fn update_project(
        &self,
        actor: &Actor,
        project_id: &str,
        patch: ProjectPatch,
        now: DateTime<Utc>,
    ) -> ServiceResult<Project> {
        require_role(actor, MANAGERS)?;
        let mut project = self.load_project(project_id)?;

        if let Some(name) = patch.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(ServiceError::Validation("Name cannot be empty".to_string()));
            }
            project.name = name.to_string();
        }
        if let Some(description) = patch.description {
            project.description = non_blank(Some(description));
        }
        if let Some(status) = patch.status {
            project.status = status;
        }
        if patch.start_date.is_some() {
            project.start_date = patch.start_date;
        }
        if patch.end_date.is_some() {
            project.end_date = patch.end_date;
        }
        project.updated_at = now;

        match patch.tasks {
            None => self.store.update_project(&project)?,
            Some(edits) => {
                let existing = self.store.tasks_for_project(&project.id)?;
                let sync = TaskSync::plan(&existing, edits, &project.id, actor, now)?;
                self.store.update_project_tasks(
                    &project,
                    &sync.removed,
                    &sync.changed,
                    &sync.added,
                )?;
                tracing::info!(
                    project = %project.id,
                    removed = sync.removed.len(),
                    changed = sync.changed.len(),
                    added = sync.added.len(),
                    "Project tasks reconciled"
                );
            }
        }
        tracing::info!(project = %project.id, status = %project.status, "Project updated");
        Ok(project)
    }

    /// Delete a project with its tasks, their evidence and memberships (pm/hr).
    pub fn delete_project(&self, actor: &Actor, project_id: &str) -> ServiceResult<()> {
        require_role(actor, MANAGERS)?;
        check_id(project_id, "project")?;
        if !self.store.delete_project(project_id)? {
            return Err(ServiceError::NotFound("Project"));
        }
        tracing::info!(project = %project_id, user = %actor.id, "Project deleted");
        Ok(())
    }

    /// Add one task to an existing project (pm/hr).
    pub fn add_task(
        &self,
        actor: &Actor,
        project_id: &str,
        input: NewTask,
        now: DateTime<Utc>,
    ) -> ServiceResult<Task> {
        require_role(actor, MANAGERS)?;
        let project = self.load_project(project_id)?;
        let task = input.into_task(&project.id, actor, now)?;
        self.store.insert_task(&task)?;
        tracing::info!(task = %task.id, project = %project.id, "Task created");
        Ok(task)
    }

    fn load_project(&self, project_id: &str) -> ServiceResult<Project> {
        check_id(project_id, "project")?;
        self.store.get_project(project_id)?.ok_or(ServiceError::NotFound("Project"))
    }
}
