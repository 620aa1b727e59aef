//! Persistence collaborators.
//!
//! The authentication core and the HTTP handlers only ever see these traits.
//! Two implementations ship with the crate: [`postgres`] (sqlx) for the real
//! service and [`memory`] for tests and local experimentation.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{NewProject, NewTask, NewUser, Project, Task, TaskQuery, User};

pub use crate::auth::ledger::TokenLedger;

/// Errors raised by a store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint was violated (duplicate email, duplicate token).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A referenced row does not exist (e.g. unknown owner id).
    #[error("Missing reference: {0}")]
    MissingReference(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Lookup and maintenance of user accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<User>>;

    /// Inserts a new account. Fails with [`StoreError::Conflict`] when the
    /// email is already registered.
    ///
    /// The first account of an empty store is also granted `Role::Admin`. The
    /// emptiness check and the insert happen atomically, so concurrent first
    /// registrations yield a single administrator.
    async fn create(&self, user: NewUser) -> StoreResult<User>;

    /// Persists every mutable field of `user` and returns the stored row.
    async fn update(&self, user: &User) -> StoreResult<User>;
}

#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn create(&self, project: NewProject) -> StoreResult<Project>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<Project>>;

    async fn list(&self) -> StoreResult<Vec<Project>>;

    async fn update(&self, project: &Project) -> StoreResult<Project>;

    /// Removes the project and its tasks. Returns `false` if nothing was deleted.
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create(&self, task: NewTask) -> StoreResult<Task>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<Task>>;

    /// Tasks matching `query`, newest first.
    async fn list(&self, query: &TaskQuery) -> StoreResult<Vec<Task>>;

    async fn list_by_project(&self, project_id: Uuid) -> StoreResult<Vec<Task>>;

    async fn update(&self, task: &Task) -> StoreResult<Task>;

    async fn delete(&self, id: Uuid) -> StoreResult<bool>;
}
