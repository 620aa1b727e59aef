use std::sync::Arc;

use crate::auth::session::SessionService;
use crate::store::{ProjectStore, TaskStore, UserStore};

/// Shared application state handed to every handler through `web::Data`.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub projects: Arc<dyn ProjectStore>,
    pub tasks: Arc<dyn TaskStore>,
    pub sessions: Arc<SessionService>,
}
