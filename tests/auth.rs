#[macro_use]
mod common;

use actix_web::http::{Method, StatusCode};
use actix_web::{rt, web, App, HttpServer};
use chrono::Duration;
use pretty_assertions::assert_eq;
use serde_json::{json, Map};
use std::net::TcpListener;

use common::{call, login, register, request, sign_up, TestContext};
use tasktrack::auth::token::{REFRESH_TOKEN_USE, TOKEN_USE_CLAIM};
use tasktrack::auth::TokenLedger;
use tasktrack::routes::{self, health};

#[test_log::test(actix_rt::test)]
async fn test_register_login_refresh_flow() {
    let ctx = TestContext::new();
    let app = test_app!(ctx);

    let user = register(&app, "Alice", "Alice@Example.com").await;
    assert_eq!(user["email"], "alice@example.com");
    assert_eq!(user["roles"], json!(["USER", "ADMIN"]));
    assert!(user.get("passwordHash").is_none());

    // Second account is a plain user.
    let second = register(&app, "Bob", "bob@example.com").await;
    assert_eq!(second["roles"], json!(["USER"]));

    // Duplicate email, differently cased.
    let (status, body) = call(
        &app,
        request(
            Method::POST,
            "/api/users/register",
            None,
            Some(json!({
                "firstName": "Alice",
                "lastName": "Again",
                "email": "ALICE@example.com",
                "password": "password123"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "{}", body);

    let (access, refresh) = login(&app, "alice@example.com").await;
    let claims = ctx.signer.verify(&access).unwrap();
    assert_eq!(claims.sub, "alice@example.com");
    assert_eq!(claims.exp - claims.iat, 24 * 60 * 60);
    let refresh_claims = ctx.signer.verify(&refresh).unwrap();
    assert_eq!(refresh_claims.exp - refresh_claims.iat, 7 * 24 * 60 * 60);

    let (status, me) = call(&app, request(Method::GET, "/api/users/me", Some(&access), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "alice@example.com");

    let (status, body) = call(
        &app,
        request(
            Method::POST,
            "/api/users/refresh",
            None,
            Some(json!({ "refreshToken": refresh })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let fresh = body["token"].as_str().unwrap().to_string();
    assert_ne!(fresh, access);
    assert_eq!(ctx.signer.verify(&fresh).unwrap().sub, "alice@example.com");

    let (status, me) = call(&app, request(Method::GET, "/api/users/me", Some(&fresh), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["firstName"], "Alice");

    // Refresh tokens are not rotated.
    let (status, _) = call(
        &app,
        request(
            Method::POST,
            "/api/users/refresh",
            None,
            Some(json!({ "refreshToken": refresh })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_rt::test]
async fn test_login_failures_are_uniform() {
    let ctx = TestContext::new();
    let app = test_app!(ctx);
    register(&app, "Alice", "alice@example.com").await;

    let attempt = |email: &str, password: &str| {
        request(
            Method::POST,
            "/api/users/login",
            None,
            Some(json!({ "email": email, "password": password })),
        )
    };

    let (wrong_status, wrong_body) = call(&app, attempt("alice@example.com", "nope-nope")).await;
    let (unknown_status, unknown_body) = call(&app, attempt("nobody@example.com", "password123")).await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_body, unknown_body);

    let (status, _) = call(&app, attempt("not-an-email", "password123")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[actix_rt::test]
async fn test_refresh_rejections() {
    let ctx = TestContext::new();
    let app = test_app!(ctx);
    register(&app, "Alice", "alice@example.com").await;
    let (access, refresh) = login(&app, "alice@example.com").await;

    let refresh_with = |body: serde_json::Value| {
        request(Method::POST, "/api/users/refresh", None, Some(body))
    };

    // No token in the body at all.
    let (status, _) = call(&app, refresh_with(json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Correctly signed but never issued by the service.
    let mut extra = Map::new();
    extra.insert(TOKEN_USE_CLAIM.to_string(), json!(REFRESH_TOKEN_USE));
    let forged = ctx
        .signer
        .issue("alice@example.com", Duration::days(7), extra)
        .unwrap()
        .token;
    let (status, body) = call(&app, refresh_with(json!({ "refreshToken": forged }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Refresh token not found");

    let (status, _) = call(&app, refresh_with(json!({ "refreshToken": "garbage" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // An access token cannot be used to refresh.
    let (status, _) = call(&app, refresh_with(json!({ "refreshToken": access }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Logout revokes the access and refresh entries.
    let (status, body) = call(&app, request(Method::POST, "/api/users/logout", Some(&access), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["revoked"], 2);

    let (status, body) = call(&app, refresh_with(json!({ "refreshToken": refresh }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Refresh token has been revoked");
}

#[actix_rt::test]
async fn test_access_token_revocation_is_advisory() {
    let ctx = TestContext::new();
    let app = test_app!(ctx);
    register(&app, "Alice", "alice@example.com").await;
    let (access, _) = login(&app, "alice@example.com").await;

    assert!(ctx.ledger.revoke(&access).await.unwrap());
    assert!(ctx.ledger.lookup(&access).await.unwrap().unwrap().revoked);

    // Authentication only looks at the signature, expiry and the live account.
    let (status, _) = call(&app, request(Method::GET, "/api/users/me", Some(&access), None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_rt::test]
async fn test_bad_credentials_leave_request_anonymous() {
    let ctx = TestContext::new();
    let app = test_app!(ctx);
    register(&app, "Alice", "alice@example.com").await;
    let expired = ctx
        .signer
        .issue("alice@example.com", Duration::seconds(-10), Map::new())
        .unwrap()
        .token;

    for token in ["garbage", expired.as_str()] {
        // Public routes still answer normally.
        let (status, _) = call(&app, request(Method::GET, "/health", Some(token), None)).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&app, request(Method::GET, "/api/tasks", Some(token), None)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(&app, request(Method::GET, "/api/users/me", Some(token), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let (status, body) = call(&app, request(Method::GET, "/api/users/me", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Authentication required");
}

#[actix_rt::test]
async fn test_deactivated_account_loses_access() {
    let ctx = TestContext::new();
    let app = test_app!(ctx);
    let admin = sign_up(&app, "Admin", "admin@example.com").await;
    let bob_user = register(&app, "Bob", "bob@example.com").await;
    let (bob, bob_refresh) = login(&app, "bob@example.com").await;

    let uri = format!("/api/users/{}", bob_user["id"]);
    let (status, body) = call(
        &app,
        request(Method::PATCH, &uri, Some(&admin), Some(json!({ "isActive": false }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["isActive"], false);

    let (status, _) = call(&app, request(Method::GET, "/api/users/me", Some(&bob), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(
        &app,
        request(
            Method::POST,
            "/api/users/refresh",
            None,
            Some(json!({ "refreshToken": bob_refresh })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(
        &app,
        request(
            Method::POST,
            "/api/users/login",
            None,
            Some(json!({ "email": "bob@example.com", "password": common::PASSWORD })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn test_user_patch_is_guarded() {
    let ctx = TestContext::new();
    let app = test_app!(ctx);
    register(&app, "Admin", "admin@example.com").await;
    let alice_user = register(&app, "Alice", "alice@example.com").await;
    let alice = login(&app, "alice@example.com").await.0;
    let bob = sign_up(&app, "Bob", "bob@example.com").await;
    let alice_uri = format!("/api/users/{}", alice_user["id"]);

    let (status, _) = call(
        &app,
        request(Method::PATCH, &alice_uri, None, Some(json!({ "firstName": "Eve" }))),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(
        &app,
        request(Method::PATCH, &alice_uri, Some(&bob), Some(json!({ "firstName": "Eve" }))),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "You are not the owner of this user");

    let (status, _) = call(
        &app,
        request(Method::PATCH, "/api/users/999", Some(&bob), Some(json!({ "firstName": "Eve" }))),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(
        &app,
        request(Method::PATCH, &alice_uri, Some(&alice), Some(json!({ "firstName": "Alicia" }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["firstName"], "Alicia");

    let (status, _) = call(
        &app,
        request(
            Method::PATCH,
            &alice_uri,
            Some(&alice),
            Some(json!({ "email": "bob@example.com" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = call(&app, request(Method::GET, &alice_uri, None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "alice@example.com");
}

#[actix_rt::test]
async fn test_create_task_unauthorized_over_http() {
    let ctx = TestContext::new();
    let state = ctx.state.clone();
    let signer = ctx.signer.clone();
    let users = ctx.users.clone();

    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(tasktrack::auth::AuthMiddleware::new(signer.clone(), users.clone()))
            .service(health::health)
            .service(web::scope("/api").configure(routes::config))
    })
    .workers(1)
    .listen(listener)
    .expect("Failed to listen")
    .run();
    let handle = server.handle();
    rt::spawn(server);

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://127.0.0.1:{}/api/tasks", port))
        .json(&json!({ "title": "Unauthorized Task" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);

    let resp = client
        .get(format!("http://127.0.0.1:{}/health", port))
        .send()
        .await
        .expect("Failed to send request");
    assert!(resp.status().is_success());

    handle.stop(true).await;
}
