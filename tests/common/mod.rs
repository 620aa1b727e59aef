#![allow(dead_code)]

use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::{Method, StatusCode};
use actix_web::{test, web};
use serde_json::{json, Value};
use std::sync::Arc;

use tasktrack::auth::{AuthMiddleware, SessionConfig, SessionService, Signer};
use tasktrack::state::AppState;
use tasktrack::store::memory::{
    MemoryProjectStore, MemoryTaskStore, MemoryTokenLedger, MemoryUserStore,
};

pub const SECRET: &[u8] = b"integration-test-secret-at-least-32-bytes";
pub const PASSWORD: &str = "password123";

/// In-memory wiring of the whole application.
pub struct TestContext {
    pub state: web::Data<AppState>,
    pub signer: Arc<Signer>,
    pub users: Arc<MemoryUserStore>,
    pub ledger: Arc<MemoryTokenLedger>,
}

impl TestContext {
    pub fn new() -> Self {
        let signer = Arc::new(Signer::new(SECRET).unwrap());
        let users = Arc::new(MemoryUserStore::new());
        let ledger = Arc::new(MemoryTokenLedger::new());
        let tasks = Arc::new(MemoryTaskStore::new(users.clone()));
        let projects = Arc::new(MemoryProjectStore::new(users.clone(), tasks.clone()));
        let sessions = SessionService::new(
            signer.clone(),
            ledger.clone(),
            users.clone(),
            SessionConfig {
                bcrypt_cost: 4,
                ..SessionConfig::default()
            },
        )
        .unwrap();

        let state = web::Data::new(AppState {
            users: users.clone(),
            projects,
            tasks,
            sessions: Arc::new(sessions),
        });

        Self {
            state,
            signer,
            users,
            ledger,
        }
    }

    pub fn auth(&self) -> AuthMiddleware {
        AuthMiddleware::new(self.signer.clone(), self.users.clone())
    }
}

/// Builds the same `App` as `main`, minus Postgres.
macro_rules! test_app {
    ($ctx:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data($ctx.state.clone())
                .wrap($ctx.auth())
                .wrap(
                    actix_cors::Cors::default()
                        .allow_any_origin()
                        .allow_any_method()
                        .allow_any_header()
                        .max_age(3600),
                )
                .wrap(actix_web::middleware::Logger::default())
                .service(tasktrack::routes::health::health)
                .service(actix_web::web::scope("/api").configure(tasktrack::routes::config)),
        )
        .await
    };
}

pub fn request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> actix_http::Request {
    let mut req = test::TestRequest::default().method(method).uri(uri);
    if let Some(token) = token {
        req = req.insert_header(("Authorization", format!("Bearer {}", token)));
    }
    if let Some(body) = body {
        req = req.set_json(body);
    }
    req.to_request()
}

/// Sends `req` and returns the status with the body parsed as JSON (`Null` when empty).
pub async fn call<S, B>(app: &S, req: actix_http::Request) -> (StatusCode, Value)
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let resp = test::call_service(app, req).await;
    let status = resp.status();
    let body = test::read_body(resp).await;
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()))
    };
    (status, json)
}

pub async fn register<S, B>(app: &S, first_name: &str, email: &str) -> Value
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let payload = json!({
        "firstName": first_name,
        "lastName": "Tester",
        "email": email,
        "password": PASSWORD
    });
    let (status, body) = call(
        app,
        request(Method::POST, "/api/users/register", None, Some(payload)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "registration failed: {}", body);
    body
}

/// Logs in and returns `(access token, refresh token)`.
pub async fn login<S, B>(app: &S, email: &str) -> (String, String)
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let payload = json!({ "email": email, "password": PASSWORD });
    let (status, body) = call(
        app,
        request(Method::POST, "/api/users/login", None, Some(payload)),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    (
        body["token"].as_str().unwrap().to_string(),
        body["refreshToken"].as_str().unwrap().to_string(),
    )
}

/// Registers and logs in, returning the access token.
pub async fn sign_up<S, B>(app: &S, first_name: &str, email: &str) -> String
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    register(app, first_name, email).await;
    login(app, email).await.0
}
