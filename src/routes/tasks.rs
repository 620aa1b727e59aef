use crate::{
    auth::{authorize, Authenticated, MaybeAuthenticated},
    error::AppError,
    models::{NewTask, TaskInput, TaskPatch, TaskQuery},
    routes::projects::{current_user, user_by_email},
    state::AppState,
};
use actix_web::{delete, get, patch, post, web, HttpResponse, Responder};
use uuid::Uuid;
use validator::Validate;

/// Retrieves tasks, newest first.
///
/// ## Query Parameters:
/// - `status` (optional): e.g. `todo`, `in_progress`, `done`.
/// - `priority` (optional): e.g. `low`, `urgent`.
/// - `projectId` (optional): only tasks of this project.
/// - `assigneeEmail` (optional): only tasks assigned to this user.
/// - `search` (optional): case-insensitive match on title or description.
#[get("")]
pub async fn get_tasks(
    state: web::Data<AppState>,
    query_params: web::Query<TaskQuery>,
) -> Result<impl Responder, AppError> {
    let tasks = state.tasks.list(&query_params).await?;
    Ok(HttpResponse::Ok().json(tasks))
}

/// Creates a task owned by the caller.
///
/// ## Responses:
/// - `201 Created`: the new task.
/// - `400 Bad Request`: the project or assignee does not exist.
/// - `401 Unauthorized`: anonymous caller.
/// - `422 Unprocessable Entity`: validation failed.
#[post("")]
pub async fn create_task(
    state: web::Data<AppState>,
    auth: Authenticated,
    task_data: web::Json<TaskInput>,
) -> Result<impl Responder, AppError> {
    task_data.validate()?;
    let creator = current_user(&state, &auth.0).await?;
    let task_data = task_data.into_inner();

    if let Some(project_id) = task_data.project_id {
        if state.projects.get(project_id).await?.is_none() {
            return Err(AppError::BadRequest("Project does not exist".into()));
        }
    }
    let assignee = match &task_data.assignee_email {
        Some(email) => Some(user_by_email(&state, email, "assignee").await?),
        None => None,
    };

    let task = state
        .tasks
        .create(NewTask::new(task_data, &creator, assignee.as_ref()))
        .await?;

    Ok(HttpResponse::Created().json(task))
}

#[get("/{id}")]
pub async fn get_task(
    state: web::Data<AppState>,
    task_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let task = state
        .tasks
        .get(task_id.into_inner())
        .await?
        .ok_or_else(|| AppError::NotFound("Task not found".into()))?;
    Ok(HttpResponse::Ok().json(task))
}

/// Updates a task. Only its creator or an administrator may do this.
#[patch("/{id}")]
pub async fn update_task(
    state: web::Data<AppState>,
    auth: MaybeAuthenticated,
    task_id: web::Path<Uuid>,
    task_data: web::Json<TaskPatch>,
) -> Result<impl Responder, AppError> {
    let existing = state.tasks.get(task_id.into_inner()).await?;
    let mut task = authorize(auth.principal(), existing)?;

    task_data.validate()?;
    let task_data = task_data.into_inner();

    let assignee = match &task_data.assignee_email {
        Some(email) => Some(user_by_email(&state, email, "assignee").await?),
        None => None,
    };
    task.apply(task_data, assignee.as_ref());

    let task = state.tasks.update(&task).await?;
    Ok(HttpResponse::Ok().json(task))
}

/// Deletes a task. Only its creator or an administrator may do this.
///
/// ## Responses:
/// - `204 No Content`: deleted.
/// - `401 Unauthorized`: anonymous caller.
/// - `403 Forbidden`: the caller neither created the task nor is an administrator.
/// - `404 Not Found`: no such task.
#[delete("/{id}")]
pub async fn delete_task(
    state: web::Data<AppState>,
    auth: MaybeAuthenticated,
    task_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let existing = state.tasks.get(task_id.into_inner()).await?;
    let task = authorize(auth.principal(), existing)?;

    if !state.tasks.delete(task.id).await? {
        return Err(AppError::NotFound("Task not found".into()));
    }

    Ok(HttpResponse::NoContent().finish())
}
