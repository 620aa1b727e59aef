use crate::{
    auth::{authorize, normalize_email, Authenticated, MaybeAuthenticated, Principal},
    error::AppError,
    models::{NewProject, ProjectDetail, ProjectInput, ProjectPatch, User},
    state::AppState,
};
use actix_web::{delete, get, patch, post, web, HttpResponse, Responder};
use log::info;
use uuid::Uuid;
use validator::Validate;

/// Loads the caller's account. A principal whose account vanished mid-request is treated as anonymous.
pub(crate) async fn current_user(state: &AppState, principal: &Principal) -> Result<User, AppError> {
    state
        .users
        .find_by_id(principal.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))
}

/// Resolves an email from a request body to an existing user.
pub(crate) async fn user_by_email(
    state: &AppState,
    email: &str,
    role: &str,
) -> Result<User, AppError> {
    state
        .users
        .find_by_email(&normalize_email(email))
        .await?
        .ok_or_else(|| AppError::BadRequest(format!("No user with that {} email", role)))
}

#[post("")]
pub async fn create_project(
    state: web::Data<AppState>,
    auth: Authenticated,
    project_data: web::Json<ProjectInput>,
) -> Result<impl Responder, AppError> {
    project_data.validate()?;
    let owner = current_user(&state, &auth.0).await?;

    let project = state
        .projects
        .create(NewProject::new(project_data.into_inner(), &owner))
        .await?;
    info!("user {} created project {}", owner.id, project.id);

    Ok(HttpResponse::Created().json(project))
}

#[get("")]
pub async fn get_projects(state: web::Data<AppState>) -> Result<impl Responder, AppError> {
    Ok(HttpResponse::Ok().json(state.projects.list().await?))
}

/// Project detail with its tasks embedded.
#[get("/{id}")]
pub async fn get_project(
    state: web::Data<AppState>,
    project_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let project_id = project_id.into_inner();
    let project = state
        .projects
        .get(project_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found".into()))?;
    let tasks = state.tasks.list_by_project(project_id).await?;

    Ok(HttpResponse::Ok().json(ProjectDetail { project, tasks }))
}

/// Update a project
///
/// `ownerEmail` hands the project to another existing user.
#[patch("/{id}")]
pub async fn update_project(
    state: web::Data<AppState>,
    auth: MaybeAuthenticated,
    project_id: web::Path<Uuid>,
    patch_data: web::Json<ProjectPatch>,
) -> Result<impl Responder, AppError> {
    let existing = state.projects.get(project_id.into_inner()).await?;
    let mut project = authorize(auth.principal(), existing)?;

    patch_data.validate()?;
    let mut patch_data = patch_data.into_inner();

    let new_owner = match patch_data.owner_email.take() {
        Some(email) => Some(user_by_email(&state, &email, "owner").await?),
        None => None,
    };
    project.apply(patch_data, new_owner.as_ref());

    let project = state.projects.update(&project).await?;
    Ok(HttpResponse::Ok().json(project))
}

/// Delete a project and all of its tasks
#[delete("/{id}")]
pub async fn delete_project(
    state: web::Data<AppState>,
    auth: MaybeAuthenticated,
    project_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let existing = state.projects.get(project_id.into_inner()).await?;
    let project = authorize(auth.principal(), existing)?;

    if !state.projects.delete(project.id).await? {
        return Err(AppError::NotFound("Project not found".into()));
    }
    info!("project {} deleted", project.id);

    Ok(HttpResponse::NoContent().finish())
}
