use crate::{
    auth::{
        authorize, hash_password, normalize_email, Authenticated, LoginRequest, LoginResponse,
        MaybeAuthenticated, RefreshRequest, RefreshResponse, RegisterRequest,
    },
    error::AppError,
    models::{NewUser, Role, UserPatch},
    state::AppState,
};
use actix_web::{get, patch, post, web, HttpResponse, Responder};
use log::info;
use serde_json::json;
use validator::Validate;

/// Register a new user
///
/// The first account ever registered is made an administrator.
///
/// ## Responses:
/// - `201 Created`: the new user (without password hash).
/// - `409 Conflict`: the email is already registered.
/// - `422 Unprocessable Entity`: validation failed.
#[post("/register")]
pub async fn register(
    state: web::Data<AppState>,
    register_data: web::Json<RegisterRequest>,
) -> Result<impl Responder, AppError> {
    register_data.validate()?;
    let register_data = register_data.into_inner();
    let email = normalize_email(&register_data.email);

    if state.users.find_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let password_hash = hash_password(&register_data.password, state.sessions.config().bcrypt_cost)?;

    let user = state
        .users
        .create(NewUser {
            first_name: register_data.first_name,
            last_name: register_data.last_name,
            email,
            password_hash,
            is_active: true,
            roles: vec![Role::User],
        })
        .await?;
    info!("registered user {}", user.id);

    Ok(HttpResponse::Created().json(user))
}

/// Login user
///
/// Returns `{"token", "refreshToken"}`. Any credential problem is a uniform 401.
#[post("/login")]
pub async fn login(
    state: web::Data<AppState>,
    login_data: web::Json<LoginRequest>,
) -> Result<impl Responder, AppError> {
    login_data.validate()?;

    let pair = state
        .sessions
        .login(&normalize_email(&login_data.email), &login_data.password)
        .await?;

    Ok(HttpResponse::Ok().json(LoginResponse {
        token: pair.access_token,
        refresh_token: pair.refresh_token,
    }))
}

/// Exchange a refresh token for a new access token
///
/// ## Responses:
/// - `200 OK`: `{"token": "<access token>"}`.
/// - `401 Unauthorized`: the refresh token is unknown, revoked, expired, or invalid.
/// - `404 Not Found`: the body has no `refreshToken`.
#[post("/refresh")]
pub async fn refresh(
    state: web::Data<AppState>,
    refresh_data: web::Json<RefreshRequest>,
) -> Result<impl Responder, AppError> {
    let refresh_token = refresh_data
        .into_inner()
        .refresh_token
        .ok_or_else(|| AppError::NotFound("Refresh token not provided".into()))?;

    let token = state.sessions.refresh(&refresh_token).await?;
    Ok(HttpResponse::Ok().json(RefreshResponse { token }))
}

/// Revoke every token issued to the caller
#[post("/logout")]
pub async fn logout(
    state: web::Data<AppState>,
    auth: Authenticated,
) -> Result<impl Responder, AppError> {
    let revoked = state.sessions.logout(auth.0.user_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "revoked": revoked })))
}

#[get("/me")]
pub async fn me(
    state: web::Data<AppState>,
    auth: Authenticated,
) -> Result<impl Responder, AppError> {
    let user = state
        .users
        .find_by_id(auth.0.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    Ok(HttpResponse::Ok().json(user))
}

#[get("/{id}")]
pub async fn get_user(
    state: web::Data<AppState>,
    user_id: web::Path<i64>,
) -> Result<impl Responder, AppError> {
    let user = state
        .users
        .find_by_id(user_id.into_inner())
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    Ok(HttpResponse::Ok().json(user))
}

/// Update a user account
///
/// Only the account holder or an administrator may do this.
#[patch("/{id}")]
pub async fn update_user(
    state: web::Data<AppState>,
    auth: MaybeAuthenticated,
    user_id: web::Path<i64>,
    patch_data: web::Json<UserPatch>,
) -> Result<impl Responder, AppError> {
    let target = state.users.find_by_id(user_id.into_inner()).await?;
    let mut user = authorize(auth.principal(), target)?;

    patch_data.validate()?;
    let patch_data = patch_data.into_inner();

    if let Some(email) = patch_data.email {
        let email = normalize_email(&email);
        if email != user.email {
            if state.users.find_by_email(&email).await?.is_some() {
                return Err(AppError::Conflict("Email already registered".into()));
            }
            user.email = email;
        }
    }
    if let Some(first_name) = patch_data.first_name {
        user.first_name = first_name;
    }
    if let Some(last_name) = patch_data.last_name {
        user.last_name = last_name;
    }
    if let Some(password) = patch_data.password {
        user.password_hash = hash_password(&password, state.sessions.config().bcrypt_cost)?;
    }
    if let Some(is_active) = patch_data.is_active {
        user.is_active = is_active;
    }

    let user = state.users.update(&user).await?;
    Ok(HttpResponse::Ok().json(user))
}
