//! This module provides protection mechanisms for the endpoints that make the hub
//! push messages.
//!
//! Authentication happens in the [`AuthenticatedUser`] extractor; the rules here
//! decide whether an authenticated user may trigger a given kind of broadcast.
//!
//! [`AuthenticatedUser`]: crate::extractors::authenticated_user::AuthenticatedUser

pub(crate) mod notifications;

use crate::AppState;
use async_trait::async_trait;
use axum::{extract::Request, http::StatusCode, middleware::Next, response::IntoResponse};
use hub::Identity;
use log::*;

pub(crate) const ADMIN_ROLE: &str = "admin";
pub(crate) const SUPERVISOR_ROLE: &str = "supervisor";

/// Trait representing a single authorization rule.
///
/// Implementors answer **“is the authenticated user allowed to proceed?”**.
#[async_trait]
pub trait Check: Send + Sync {
    async fn eval(&self, app: &AppState, user: &Identity) -> bool;
}

/// Boxed [`Check`] so rules of different types can be evaluated together.
pub(crate) struct Predicate {
    predicate: Box<dyn Check>,
}

impl Predicate {
    pub(crate) fn new<C: Check + 'static>(predicate: C) -> Self {
        Self {
            predicate: Box::new(predicate),
        }
    }

    pub(crate) async fn check(&self, app_state: &AppState, user: &Identity) -> bool {
        self.predicate.eval(app_state, user).await
    }
}

/// Evaluates each predicate in order; the first one that fails aborts the
/// request with **403 FORBIDDEN**. When all pass the wrapped handler runs.
pub(crate) async fn authorize(
    app_state: &AppState,
    authenticated_user: Identity,
    request: Request,
    next: Next,
    checks: Vec<Predicate>,
) -> impl IntoResponse {
    for check in checks {
        if !check.check(app_state, &authenticated_user).await {
            warn!(
                "User {} with role '{}' denied {}",
                authenticated_user.user_id,
                authenticated_user.role,
                request.uri().path()
            );
            return (StatusCode::FORBIDDEN, "FORBIDDEN").into_response();
        }
    }
    next.run(request).await
}

/// Passes when the user's role is one of the listed roles.
pub struct UserHasRole(pub &'static [&'static str]);

#[async_trait]
impl Check for UserHasRole {
    async fn eval(&self, _app_state: &AppState, authenticated_user: &Identity) -> bool {
        self.0.contains(&authenticated_user.role.as_str())
    }
}
