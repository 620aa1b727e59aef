use std::collections::HashSet;

use crate::models::{Role, User};

/// The authenticated identity attached to a single request.
///
/// Built by the authentication middleware from a live user lookup and stored
/// in that request's extensions; it is dropped with the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    /// The token subject: the user's email.
    pub subject: String,
    pub roles: HashSet<Role>,
    pub active: bool,
}

impl Principal {
    /// Whether any held role overrides ownership checks.
    pub fn is_elevated(&self) -> bool {
        self.roles.iter().any(Role::is_elevated)
    }
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            subject: user.email.clone(),
            roles: user.roles.iter().copied().collect(),
            active: user.is_active,
        }
    }
}
