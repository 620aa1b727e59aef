//! In-process stores backed by `parking_lot` locks.
//!
//! Project and task rows keep only user ids as the source of truth. Owner,
//! creator, and assignee emails are filled in from [`MemoryUserStore`] on every
//! read, the same way the Postgres store joins `users`.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::ledger::{LedgerEntry, NewLedgerEntry, TokenLedger};
use crate::models::{NewProject, NewTask, NewUser, Project, Role, Task, TaskQuery, User};
use crate::store::{ProjectStore, StoreError, StoreResult, TaskStore, UserStore};

#[derive(Default)]
struct UserTable {
    rows: BTreeMap<i64, User>,
    next_id: i64,
}

#[derive(Default)]
pub struct MemoryUserStore {
    table: RwLock<UserTable>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn email_of(&self, id: i64) -> Option<String> {
        self.table.read().rows.get(&id).map(|u| u.email.clone())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let table = self.table.read();
        Ok(table.rows.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        Ok(self.table.read().rows.get(&id).cloned())
    }

    async fn create(&self, mut user: NewUser) -> StoreResult<User> {
        let mut table = self.table.write();
        if table.rows.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(format!("email {}", user.email)));
        }
        if table.rows.is_empty() && !user.roles.contains(&Role::Admin) {
            user.roles.push(Role::Admin);
        }

        table.next_id += 1;
        let row = User {
            id: table.next_id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            password_hash: user.password_hash,
            is_active: user.is_active,
            roles: user.roles,
            created_at: Utc::now(),
        };
        table.rows.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update(&self, user: &User) -> StoreResult<User> {
        let mut table = self.table.write();
        if table
            .rows
            .values()
            .any(|u| u.id != user.id && u.email == user.email)
        {
            return Err(StoreError::Conflict(format!("email {}", user.email)));
        }

        let row = table
            .rows
            .get_mut(&user.id)
            .ok_or_else(|| StoreError::MissingReference(format!("user {}", user.id)))?;
        *row = User {
            created_at: row.created_at,
            ..user.clone()
        };
        Ok(row.clone())
    }
}

#[derive(Default)]
pub struct MemoryTokenLedger {
    entries: RwLock<HashMap<String, LedgerEntry>>,
}

impl MemoryTokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn set_flag(&self, token: &str, apply: impl FnOnce(&mut LedgerEntry)) -> bool {
        match self.entries.write().get_mut(token) {
            Some(entry) => {
                apply(entry);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl TokenLedger for MemoryTokenLedger {
    async fn record(&self, entry: NewLedgerEntry) -> StoreResult<LedgerEntry> {
        let mut entries = self.entries.write();
        if entries.contains_key(&entry.token) {
            return Err(StoreError::Conflict("token already recorded".to_string()));
        }

        let row = LedgerEntry {
            id: Uuid::new_v4(),
            token: entry.token,
            kind: entry.kind,
            revoked: false,
            expired: false,
            created_at: entry.issued_at,
            expires_at: entry.expires_at,
            user_id: entry.user_id,
        };
        entries.insert(row.token.clone(), row.clone());
        Ok(row)
    }

    async fn lookup(&self, token: &str) -> StoreResult<Option<LedgerEntry>> {
        Ok(self.entries.read().get(token).cloned())
    }

    async fn revoke(&self, token: &str) -> StoreResult<bool> {
        Ok(self.set_flag(token, |e| e.revoked = true))
    }

    async fn mark_expired(&self, token: &str) -> StoreResult<bool> {
        Ok(self.set_flag(token, |e| e.expired = true))
    }

    async fn revoke_all_for_user(&self, user_id: i64) -> StoreResult<u64> {
        let mut entries = self.entries.write();
        let mut revoked = 0;
        for entry in entries
            .values_mut()
            .filter(|e| e.user_id == user_id && !e.revoked)
        {
            entry.revoked = true;
            revoked += 1;
        }
        Ok(revoked)
    }
}

fn newest_first<T, F>(mut rows: Vec<T>, created_at: F) -> Vec<T>
where
    F: Fn(&T) -> chrono::DateTime<Utc>,
{
    rows.sort_by_key(|r| std::cmp::Reverse(created_at(r)));
    rows
}

pub struct MemoryTaskStore {
    rows: RwLock<HashMap<Uuid, Task>>,
    users: Arc<MemoryUserStore>,
}

impl MemoryTaskStore {
    pub fn new(users: Arc<MemoryUserStore>) -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            users,
        }
    }

    fn remove_project(&self, project_id: Uuid) {
        self.rows
            .write()
            .retain(|_, t| t.project_id != Some(project_id));
    }

    /// Replaces the stored creator and assignee emails with the accounts' current ones.
    fn resolve(&self, mut task: Task) -> Task {
        if let Some(email) = self.users.email_of(task.creator_id) {
            task.creator_email = email;
        }
        if let Some(id) = task.assignee_id {
            task.assignee_email = self.users.email_of(id);
        }
        task
    }

    fn snapshot<F>(&self, keep: F) -> Vec<Task>
    where
        F: Fn(&Task) -> bool,
    {
        let rows: Vec<Task> = self.rows.read().values().cloned().collect();
        let rows = rows
            .into_iter()
            .map(|t| self.resolve(t))
            .filter(|t| keep(t))
            .collect();
        newest_first(rows, |t: &Task| t.created_at)
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn create(&self, task: NewTask) -> StoreResult<Task> {
        let now = Utc::now();
        let row = Task {
            id: task.id,
            title: task.title,
            description: task.description,
            priority: task.priority,
            status: task.status,
            due_date: task.due_date,
            project_id: task.project_id,
            creator_id: task.creator_id,
            creator_email: task.creator_email,
            assignee_id: task.assignee_id,
            assignee_email: task.assignee_email,
            created_at: now,
            updated_at: now,
        };

        {
            let mut rows = self.rows.write();
            if rows.contains_key(&row.id) {
                return Err(StoreError::Conflict(format!("task {}", row.id)));
            }
            rows.insert(row.id, row.clone());
        }
        Ok(self.resolve(row))
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Task>> {
        let row = self.rows.read().get(&id).cloned();
        Ok(row.map(|t| self.resolve(t)))
    }

    async fn list(&self, query: &TaskQuery) -> StoreResult<Vec<Task>> {
        Ok(self.snapshot(|t| query.matches(t)))
    }

    async fn list_by_project(&self, project_id: Uuid) -> StoreResult<Vec<Task>> {
        Ok(self.snapshot(|t| t.project_id == Some(project_id)))
    }

    async fn update(&self, task: &Task) -> StoreResult<Task> {
        let row = {
            let mut rows = self.rows.write();
            let row = rows
                .get_mut(&task.id)
                .ok_or_else(|| StoreError::MissingReference(format!("task {}", task.id)))?;
            *row = task.clone();
            row.clone()
        };
        Ok(self.resolve(row))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.rows.write().remove(&id).is_some())
    }
}

/// Project store that removes a deleted project's tasks from `tasks`.
pub struct MemoryProjectStore {
    rows: RwLock<HashMap<Uuid, Project>>,
    users: Arc<MemoryUserStore>,
    tasks: Arc<MemoryTaskStore>,
}

impl MemoryProjectStore {
    pub fn new(users: Arc<MemoryUserStore>, tasks: Arc<MemoryTaskStore>) -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            users,
            tasks,
        }
    }

    fn resolve(&self, mut project: Project) -> Project {
        if let Some(email) = self.users.email_of(project.owner_id) {
            project.owner_email = email;
        }
        project
    }
}

#[async_trait]
impl ProjectStore for MemoryProjectStore {
    async fn create(&self, project: NewProject) -> StoreResult<Project> {
        let now = Utc::now();
        let row = Project {
            id: project.id,
            title: project.title,
            description: project.description,
            owner_id: project.owner_id,
            owner_email: project.owner_email,
            created_at: now,
            updated_at: now,
        };

        {
            let mut rows = self.rows.write();
            if rows.contains_key(&row.id) {
                return Err(StoreError::Conflict(format!("project {}", row.id)));
            }
            rows.insert(row.id, row.clone());
        }
        Ok(self.resolve(row))
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Project>> {
        let row = self.rows.read().get(&id).cloned();
        Ok(row.map(|p| self.resolve(p)))
    }

    async fn list(&self) -> StoreResult<Vec<Project>> {
        let rows: Vec<Project> = self.rows.read().values().cloned().collect();
        let rows = rows.into_iter().map(|p| self.resolve(p)).collect();
        Ok(newest_first(rows, |p: &Project| p.created_at))
    }

    async fn update(&self, project: &Project) -> StoreResult<Project> {
        let row = {
            let mut rows = self.rows.write();
            let row = rows
                .get_mut(&project.id)
                .ok_or_else(|| StoreError::MissingReference(format!("project {}", project.id)))?;
            *row = project.clone();
            row.clone()
        };
        Ok(self.resolve(row))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let removed = self.rows.write().remove(&id).is_some();
        if removed {
            self.tasks.remove_project(id);
        }
        Ok(removed)
    }
}
