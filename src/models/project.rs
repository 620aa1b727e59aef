use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::auth::guard::Owned;
use crate::models::{Task, User};

/// A project groups tasks and belongs to exactly one owner.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub owner_id: i64,
    pub owner_email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Applies the present fields of `patch`. Ownership transfer is resolved
    /// by the caller and passed as `new_owner`.
    pub fn apply(&mut self, patch: ProjectPatch, new_owner: Option<&User>) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(owner) = new_owner {
            self.owner_id = owner.id;
            self.owner_email = owner.email.clone();
        }
        self.updated_at = Utc::now();
    }
}

impl Owned for Project {
    const KIND: &'static str = "Project";

    fn owner_email(&self) -> Option<&str> {
        Some(&self.owner_email)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProjectInput {
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
}

/// Partial update of a project. `ownerEmail` transfers ownership to another
/// existing user.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPatch {
    #[validate(length(min = 1, max = 100))]
    pub title: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[validate(email)]
    pub owner_email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewProject {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub owner_id: i64,
    pub owner_email: String,
}

impl NewProject {
    pub fn new(input: ProjectInput, owner: &User) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: input.title,
            description: input.description,
            owner_id: owner.id,
            owner_email: owner.email.clone(),
        }
    }
}

/// Project detail response: the project plus its tasks.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub tasks: Vec<Task>,
}
