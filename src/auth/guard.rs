//! Resource ownership authorization.
//!
//! Every mutate/delete handler runs the same decision through [`authorize`],
//! whatever the resource type:
//!
//! 1. no principal → [`AccessError::Unauthenticated`]
//! 2. no such resource → [`AccessError::NotFound`]
//! 3. principal is the owner, or holds an elevated role → allowed
//! 4. otherwise → [`AccessError::Forbidden`]
//!
//! Existence is revealed to authenticated callers only.

use log::debug;
use thiserror::Error;

use crate::auth::Principal;

/// A resource with a declared owner.
pub trait Owned {
    /// Human-readable resource name used in error messages.
    const KIND: &'static str;

    /// Email of the owning user, if the resource has one.
    fn owner_email(&self) -> Option<&str>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("You are not the owner of this {}", .0.to_lowercase())]
    Forbidden(&'static str),
}

/// `principal.subject == resource.owner_email`.
pub fn is_owner<R: Owned + ?Sized>(principal: &Principal, resource: &R) -> bool {
    resource.owner_email() == Some(principal.subject.as_str())
}

/// Ownership or an elevated role.
pub fn may_mutate<R: Owned + ?Sized>(principal: &Principal, resource: &R) -> bool {
    is_owner(principal, resource) || principal.is_elevated()
}

/// Runs the ownership decision and hands the resource back when allowed.
pub fn authorize<R: Owned>(
    principal: Option<&Principal>,
    resource: Option<R>,
) -> Result<R, AccessError> {
    let principal = principal.ok_or(AccessError::Unauthenticated)?;
    let resource = resource.ok_or(AccessError::NotFound(R::KIND))?;

    if may_mutate(principal, &resource) {
        Ok(resource)
    } else {
        debug!(
            "{} denied mutation of {} owned by someone else",
            principal.subject,
            R::KIND
        );
        Err(AccessError::Forbidden(R::KIND))
    }
}
