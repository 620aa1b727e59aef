//! sqlx/Postgres implementations of the store traits.
//!
//! Owner, creator, and assignee emails are joined from `users` on every read,
//! so they always reflect the account's current address.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::auth::ledger::{LedgerEntry, NewLedgerEntry, TokenLedger};
use crate::models::{NewProject, NewTask, NewUser, Project, Role, Task, TaskQuery, User};
use crate::store::{ProjectStore, StoreError, StoreResult, TaskStore, UserStore};

const USER_COLUMNS: &str =
    "id, first_name, last_name, email, password_hash, is_active, roles, created_at";

const LEDGER_COLUMNS: &str = "id, token, kind, revoked, expired, created_at, expires_at, user_id";

const PROJECT_SELECT: &str = "SELECT p.id, p.title, p.description, p.owner_id, \
     u.email AS owner_email, p.created_at, p.updated_at \
     FROM projects p JOIN users u ON u.id = p.owner_id";

const TASK_SELECT: &str = "SELECT t.id, t.title, t.description, t.priority, t.status, \
     t.due_date, t.project_id, t.creator_id, c.email AS creator_email, \
     t.assignee_id, a.email AS assignee_email, t.created_at, t.updated_at \
     FROM tasks t JOIN users c ON c.id = t.creator_id \
     LEFT JOIN users a ON a.id = t.assignee_id";

/// Runs the embedded migrations under `migrations/`.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Maps constraint violations onto the store's own error variants.
fn classify(error: sqlx::Error, what: impl Into<String>) -> StoreError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(what.into()),
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            StoreError::MissingReference(what.into())
        }
        _ => StoreError::Database(error),
    }
}

/// `users` row with roles stored as `TEXT[]`.
#[derive(FromRow)]
struct UserRow {
    id: i64,
    first_name: String,
    last_name: String,
    email: String,
    password_hash: String,
    is_active: bool,
    roles: Vec<String>,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            password_hash: row.password_hash,
            is_active: row.is_active,
            roles: row.roles.iter().filter_map(|r| r.parse().ok()).collect(),
            created_at: row.created_at,
        }
    }
}

fn role_names(roles: &[Role]) -> Vec<String> {
    roles.iter().map(|r| r.as_str().to_string()).collect()
}

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn create(&self, user: NewUser) -> StoreResult<User> {
        // Serializes inserts so only one of several concurrent first accounts sees an empty table.
        let mut tx = self.pool.begin().await?;
        sqlx::query("LOCK TABLE users IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await?;

        let sql = format!(
            "INSERT INTO users (first_name, last_name, email, password_hash, is_active, roles) \
             VALUES ($1, $2, $3, $4, $5, \
                 CASE WHEN EXISTS (SELECT 1 FROM users) OR $7 = ANY($6::TEXT[]) \
                      THEN $6::TEXT[] ELSE array_append($6::TEXT[], $7) END) \
             RETURNING {}",
            USER_COLUMNS
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.is_active)
            .bind(role_names(&user.roles))
            .bind(Role::Admin.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| classify(e, format!("email {}", user.email)))?;
        tx.commit().await?;
        Ok(row.into())
    }

    async fn update(&self, user: &User) -> StoreResult<User> {
        let sql = format!(
            "UPDATE users SET first_name = $1, last_name = $2, email = $3, password_hash = $4, \
             is_active = $5, roles = $6 WHERE id = $7 RETURNING {}",
            USER_COLUMNS
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.is_active)
            .bind(role_names(&user.roles))
            .bind(user.id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| classify(e, format!("email {}", user.email)))?
            .ok_or_else(|| StoreError::MissingReference(format!("user {}", user.id)))?;
        Ok(row.into())
    }
}

#[derive(Clone)]
pub struct PgTokenLedger {
    pool: PgPool,
}

impl PgTokenLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn flag(&self, sql: &str, token: &str) -> StoreResult<bool> {
        let result = sqlx::query(sql).bind(token).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl TokenLedger for PgTokenLedger {
    async fn record(&self, entry: NewLedgerEntry) -> StoreResult<LedgerEntry> {
        let sql = format!(
            "INSERT INTO tokens (id, token, kind, revoked, expired, created_at, expires_at, user_id) \
             VALUES ($1, $2, $3, FALSE, FALSE, $4, $5, $6) RETURNING {}",
            LEDGER_COLUMNS
        );
        sqlx::query_as::<_, LedgerEntry>(&sql)
            .bind(Uuid::new_v4())
            .bind(&entry.token)
            .bind(entry.kind)
            .bind(entry.issued_at)
            .bind(entry.expires_at)
            .bind(entry.user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| classify(e, format!("{} token for user {}", entry.kind, entry.user_id)))
    }

    async fn lookup(&self, token: &str) -> StoreResult<Option<LedgerEntry>> {
        let sql = format!("SELECT {} FROM tokens WHERE token = $1", LEDGER_COLUMNS);
        Ok(sqlx::query_as::<_, LedgerEntry>(&sql)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn revoke(&self, token: &str) -> StoreResult<bool> {
        self.flag("UPDATE tokens SET revoked = TRUE WHERE token = $1", token)
            .await
    }

    async fn mark_expired(&self, token: &str) -> StoreResult<bool> {
        self.flag("UPDATE tokens SET expired = TRUE WHERE token = $1", token)
            .await
    }

    async fn revoke_all_for_user(&self, user_id: i64) -> StoreResult<u64> {
        let result =
            sqlx::query("UPDATE tokens SET revoked = TRUE WHERE user_id = $1 AND NOT revoked")
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Clone)]
pub struct PgProjectStore {
    pool: PgPool,
}

impl PgProjectStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, id: Uuid) -> StoreResult<Project> {
        self.get(id)
            .await?
            .ok_or_else(|| StoreError::MissingReference(format!("project {}", id)))
    }
}

#[async_trait]
impl ProjectStore for PgProjectStore {
    async fn create(&self, project: NewProject) -> StoreResult<Project> {
        sqlx::query("INSERT INTO projects (id, title, description, owner_id) VALUES ($1, $2, $3, $4)")
            .bind(project.id)
            .bind(&project.title)
            .bind(&project.description)
            .bind(project.owner_id)
            .execute(&self.pool)
            .await
            .map_err(|e| classify(e, format!("owner {}", project.owner_id)))?;

        self.fetch(project.id).await
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Project>> {
        let sql = format!("{} WHERE p.id = $1", PROJECT_SELECT);
        Ok(sqlx::query_as::<_, Project>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list(&self) -> StoreResult<Vec<Project>> {
        let sql = format!("{} ORDER BY p.created_at DESC", PROJECT_SELECT);
        Ok(sqlx::query_as::<_, Project>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn update(&self, project: &Project) -> StoreResult<Project> {
        let result = sqlx::query(
            "UPDATE projects SET title = $1, description = $2, owner_id = $3, updated_at = $4 \
             WHERE id = $5",
        )
        .bind(&project.title)
        .bind(&project.description)
        .bind(project.owner_id)
        .bind(project.updated_at)
        .bind(project.id)
        .execute(&self.pool)
        .await
        .map_err(|e| classify(e, format!("owner {}", project.owner_id)))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::MissingReference(format!("project {}", project.id)));
        }
        self.fetch(project.id).await
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        // Tasks go with it through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Clone)]
pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, id: Uuid) -> StoreResult<Task> {
        self.get(id)
            .await?
            .ok_or_else(|| StoreError::MissingReference(format!("task {}", id)))
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn create(&self, task: NewTask) -> StoreResult<Task> {
        sqlx::query(
            "INSERT INTO tasks (id, title, description, priority, status, due_date, project_id, \
             creator_id, assignee_id) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(task.id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.priority)
        .bind(task.status)
        .bind(task.due_date)
        .bind(task.project_id)
        .bind(task.creator_id)
        .bind(task.assignee_id)
        .execute(&self.pool)
        .await
        .map_err(|e| classify(e, "task project or user"))?;

        self.fetch(task.id).await
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Task>> {
        let sql = format!("{} WHERE t.id = $1", TASK_SELECT);
        Ok(sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list(&self, query: &TaskQuery) -> StoreResult<Vec<Task>> {
        // Filters are appended in a fixed order and bound in the same order.
        let mut conditions: Vec<String> = Vec::new();
        let mut param = 1;

        if query.status.is_some() {
            conditions.push(format!("t.status = ${}", param));
            param += 1;
        }
        if query.priority.is_some() {
            conditions.push(format!("t.priority = ${}", param));
            param += 1;
        }
        if query.project_id.is_some() {
            conditions.push(format!("t.project_id = ${}", param));
            param += 1;
        }
        if query.assignee_email.is_some() {
            conditions.push(format!("a.email = ${}", param));
            param += 1;
        }
        if query.search.is_some() {
            conditions.push(format!(
                "(t.title ILIKE ${0} OR t.description ILIKE ${0})",
                param
            ));
        }

        let mut sql = String::from(TASK_SELECT);
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY t.created_at DESC");

        let mut statement = sqlx::query_as::<_, Task>(&sql);
        if let Some(status) = query.status {
            statement = statement.bind(status);
        }
        if let Some(priority) = query.priority {
            statement = statement.bind(priority);
        }
        if let Some(project_id) = query.project_id {
            statement = statement.bind(project_id);
        }
        if let Some(email) = &query.assignee_email {
            statement = statement.bind(email);
        }
        if let Some(search) = &query.search {
            statement = statement.bind(format!("%{}%", search));
        }

        Ok(statement.fetch_all(&self.pool).await?)
    }

    async fn list_by_project(&self, project_id: Uuid) -> StoreResult<Vec<Task>> {
        let sql = format!(
            "{} WHERE t.project_id = $1 ORDER BY t.created_at DESC",
            TASK_SELECT
        );
        Ok(sqlx::query_as::<_, Task>(&sql)
            .bind(project_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn update(&self, task: &Task) -> StoreResult<Task> {
        let result = sqlx::query(
            "UPDATE tasks SET title = $1, description = $2, priority = $3, status = $4, \
             due_date = $5, assignee_id = $6, updated_at = $7 WHERE id = $8",
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.priority)
        .bind(task.status)
        .bind(task.due_date)
        .bind(task.assignee_id)
        .bind(task.updated_at)
        .bind(task.id)
        .execute(&self.pool)
        .await
        .map_err(|e| classify(e, "task assignee"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::MissingReference(format!("task {}", task.id)));
        }
        self.fetch(task.id).await
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
