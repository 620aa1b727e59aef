use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::auth::guard::Owned;
use crate::models::User;

/// Represents the priority of a task.
/// Corresponds to the `task_priority` SQL enum.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, sqlx::Type)]
#[sqlx(type_name = "task_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    /// Low priority.
    Low,
    /// Medium priority.
    #[default]
    Medium,
    /// High priority.
    High,
    /// Urgent priority.
    Urgent,
}

/// Represents the status of a task.
/// Corresponds to the `task_status` SQL enum.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task is yet to be started.
    #[default]
    Todo,
    /// Task is currently being worked on.
    InProgress,
    /// Task is completed and under review.
    Review,
    /// Task is completed.
    Done,
}

/// Input structure for creating a task.
#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TaskInput {
    /// Must be between 1 and 200 characters.
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    /// Maximum length of 1000 characters if provided.
    #[validate(length(max = 1000))]
    pub description: Option<String>,

    /// Defaults to `medium`.
    pub priority: Option<TaskPriority>,

    /// Defaults to `todo`.
    pub status: Option<TaskStatus>,

    pub due_date: Option<DateTime<Utc>>,

    /// Project the task belongs to, if any.
    pub project_id: Option<Uuid>,

    /// Email of an existing user to assign the task to.
    #[validate(email)]
    pub assignee_email: Option<String>,
}

/// Partial update of a task. Absent fields are left untouched.
#[derive(Debug, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
    pub due_date: Option<DateTime<Utc>>,
    #[validate(email)]
    pub assignee_email: Option<String>,
}

/// Query parameters for listing tasks. Every present filter must match.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskQuery {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub project_id: Option<Uuid>,
    pub assignee_email: Option<String>,
    /// Case-insensitive substring of the title or description.
    pub search: Option<String>,
}

impl TaskQuery {
    /// Whether `task` satisfies every present filter.
    pub fn matches(&self, task: &Task) -> bool {
        let search_hit = |needle: &str| {
            let needle = needle.to_lowercase();
            task.title.to_lowercase().contains(&needle)
                || task
                    .description
                    .as_deref()
                    .map_or(false, |d| d.to_lowercase().contains(&needle))
        };

        self.status.map_or(true, |s| task.status == s)
            && self.priority.map_or(true, |p| task.priority == p)
            && self.project_id.map_or(true, |id| task.project_id == Some(id))
            && self
                .assignee_email
                .as_deref()
                .map_or(true, |e| task.assignee_email.as_deref() == Some(e))
            && self.search.as_deref().map_or(true, search_hit)
    }
}

/// Represents a task entity as stored in the database and returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier for the task (UUID v4).
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub due_date: Option<DateTime<Utc>>,
    pub project_id: Option<Uuid>,
    /// The user who created the task. Only the creator may change or delete it.
    pub creator_id: i64,
    pub creator_email: String,
    pub assignee_id: Option<i64>,
    pub assignee_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Applies the present fields of `patch`. Reassignment is resolved by the
    /// caller and passed as `assignee`.
    pub fn apply(&mut self, patch: TaskPatch, assignee: Option<&User>) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = Some(due_date);
        }
        if let Some(assignee) = assignee {
            self.assignee_id = Some(assignee.id);
            self.assignee_email = Some(assignee.email.clone());
        }
        self.updated_at = Utc::now();
    }
}

impl Owned for Task {
    const KIND: &'static str = "Task";

    fn owner_email(&self) -> Option<&str> {
        Some(&self.creator_email)
    }
}

/// Fields required to insert a task.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub due_date: Option<DateTime<Utc>>,
    pub project_id: Option<Uuid>,
    pub creator_id: i64,
    pub creator_email: String,
    pub assignee_id: Option<i64>,
    pub assignee_email: Option<String>,
}

impl NewTask {
    /// Builds a task created by `creator`, optionally assigned to `assignee`.
    pub fn new(input: TaskInput, creator: &User, assignee: Option<&User>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: input.title,
            description: input.description,
            priority: input.priority.unwrap_or_default(),
            status: input.status.unwrap_or_default(),
            due_date: input.due_date,
            project_id: input.project_id,
            creator_id: creator.id,
            creator_email: creator.email.clone(),
            assignee_id: assignee.map(|u| u.id),
            assignee_email: assignee.map(|u| u.email.clone()),
        }
    }
}
