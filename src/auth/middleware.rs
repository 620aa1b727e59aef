//! Bearer-token authentication.
//!
//! The middleware never rejects a request. A good token installs a
//! [`Principal`] in the request extensions; anything else leaves the request
//! anonymous and lets the handler or the ownership guard decide.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderMap, AUTHORIZATION},
    Error, HttpMessage,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use log::{debug, warn};
use std::rc::Rc;
use std::sync::Arc;

use crate::auth::token::Signer;
use crate::auth::Principal;
use crate::store::UserStore;

/// Pulls the token out of `Authorization: Bearer <token>`.
///
/// The scheme is matched exactly; other schemes and an empty token yield `None`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Turns a bearer token into a principal with a fresh user lookup.
///
/// The ledger is not consulted: an access token stays usable until its
/// signed expiry even if its ledger entry was revoked.
#[derive(Clone)]
pub struct Authenticator {
    signer: Arc<Signer>,
    users: Arc<dyn UserStore>,
}

impl Authenticator {
    pub fn new(signer: Arc<Signer>, users: Arc<dyn UserStore>) -> Self {
        Self { signer, users }
    }

    pub async fn authenticate(&self, token: &str) -> Option<Principal> {
        let claims = match self.signer.verify(token) {
            Ok(claims) => claims,
            Err(e) => {
                debug!("bearer token rejected: {}", e);
                return None;
            }
        };

        if claims.is_refresh_token() {
            debug!("refresh token presented as bearer credential for {}", claims.sub);
            return None;
        }

        match self.users.find_by_email(&claims.sub).await {
            Ok(Some(user)) if user.is_active => Some(Principal::from(&user)),
            Ok(Some(user)) => {
                debug!("bearer token subject {} is inactive", user.id);
                None
            }
            Ok(None) => {
                debug!("bearer token subject {} does not exist", claims.sub);
                None
            }
            Err(e) => {
                warn!("user lookup failed during authentication: {}", e);
                None
            }
        }
    }
}

/// Installs a [`Principal`] for requests carrying a valid access token.
///
/// Wrapping a service twice is harmless: a request that already has a
/// principal is passed through untouched.
#[derive(Clone)]
pub struct AuthMiddleware {
    authenticator: Authenticator,
}

impl AuthMiddleware {
    pub fn new(signer: Arc<Signer>, users: Arc<dyn UserStore>) -> Self {
        Self {
            authenticator: Authenticator::new(signer, users),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
            authenticator: self.authenticator.clone(),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
    authenticator: Authenticator,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let authenticator = self.authenticator.clone();

        Box::pin(async move {
            let already_authenticated = req.extensions().contains::<Principal>();
            if !already_authenticated {
                if let Some(token) = bearer_token(req.headers()).map(str::to_owned) {
                    if let Some(principal) = authenticator.authenticate(&token).await {
                        req.extensions_mut().insert(principal);
                    }
                }
            }

            service.call(req).await
        })
    }
}
