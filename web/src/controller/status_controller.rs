use crate::controller::ApiResponse;
use crate::extractors::authenticated_user::AuthenticatedUser;
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use hub::UserId;
use log::*;
use serde::Serialize;
use utoipa::ToSchema;

/// Hub-wide connection counters. Snapshots; they may be stale by the time
/// they are read.
#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct HubStatus {
    connected_users: usize,
    connections: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct UserPresence {
    user_id: UserId,
    connected: bool,
    connections: usize,
}

/// GET live connection counts
#[utoipa::path(
    get,
    path = "/status",
    responses(
        (status = 200, description = "Current number of connected users and connections", body = HubStatus),
    )
)]
pub async fn index(State(app_state): State<AppState>) -> impl IntoResponse {
    let presence = app_state.hub.presence();
    trace!("Hub presence: {presence:?}");

    Json(ApiResponse::new(
        StatusCode::OK.into(),
        HubStatus {
            connected_users: presence.connected_users,
            connections: presence.connections,
        },
    ))
}

/// GET whether a particular user currently has live connections
#[utoipa::path(
    get,
    path = "/status/users/{user_id}",
    params(
        ("user_id" = i64, Path, description = "User id to look up")
    ),
    responses(
        (status = 200, description = "Presence of the user", body = UserPresence),
        (status = 401, description = "Unauthorized"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn read_user(
    AuthenticatedUser(_user): AuthenticatedUser,
    State(app_state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> impl IntoResponse {
    let connections = app_state.hub.user_connection_count(user_id);

    Json(ApiResponse::new(
        StatusCode::OK.into(),
        UserPresence {
            user_id,
            connected: connections > 0,
            connections,
        },
    ))
}
