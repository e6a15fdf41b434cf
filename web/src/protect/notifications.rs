use crate::extractors::authenticated_user::AuthenticatedUser;
use crate::protect::{authorize, Predicate, UserHasRole, ADMIN_ROLE, SUPERVISOR_ROLE};
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};

/// Direct notifications to one user may be sent by admins and supervisors.
///  Intended to be given to axum::middleware::from_fn_with_state in the router
pub(crate) async fn notify_user(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    request: Request,
    next: Next,
) -> impl IntoResponse {
    let checks = vec![Predicate::new(UserHasRole(&[ADMIN_ROLE, SUPERVISOR_ROLE]))];
    authorize(&app_state, user, request, next, checks).await
}

/// Role-wide notifications and announcements are admin only.
pub(crate) async fn broadcast(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    request: Request,
    next: Next,
) -> impl IntoResponse {
    let checks = vec![Predicate::new(UserHasRole(&[ADMIN_ROLE]))];
    authorize(&app_state, user, request, next, checks).await
}
