use crate::controller::ApiResponse;
use crate::extractors::authenticated_user::AuthenticatedUser;
use crate::params::notification::{AnnouncementParams, NotificationParams};
use crate::{AppState, Error};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use events::DomainEvent;
use hub::error::Error as HubError;
use hub::UserId;
use serde_json::json;

use log::*;

/// POST a notification to every live connection of one user
#[utoipa::path(
    post,
    path = "/notifications/users/{user_id}",
    params(
        ("user_id" = i64, Path, description = "Recipient user id")
    ),
    request_body = NotificationParams,
    responses(
        (status = 202, description = "Notification accepted for delivery"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 503, description = "Hub is not running")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn notify_user(
    AuthenticatedUser(sender): AuthenticatedUser,
    State(app_state): State<AppState>,
    Path(user_id): Path<UserId>,
    Json(params): Json<NotificationParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("POST notification to user {user_id} from {}", sender.username);
    ensure_hub_running(&app_state)?;

    app_state
        .event_publisher
        .publish(DomainEvent::NotificationCreated {
            user_id,
            notification: params.into_payload(&sender.username),
        })
        .await;

    Ok(accepted(format!("Notification queued for user {user_id}")))
}

/// POST a notification to every connection whose user holds a role
#[utoipa::path(
    post,
    path = "/notifications/roles/{role}",
    params(
        ("role" = String, Path, description = "Recipient role")
    ),
    request_body = NotificationParams,
    responses(
        (status = 202, description = "Notification accepted for delivery"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 503, description = "Hub is not running")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn notify_role(
    AuthenticatedUser(sender): AuthenticatedUser,
    State(app_state): State<AppState>,
    Path(role): Path<String>,
    Json(params): Json<NotificationParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("POST notification to role '{role}' from {}", sender.username);
    ensure_hub_running(&app_state)?;

    let message = format!("Notification queued for role {role}");
    app_state
        .event_publisher
        .publish(DomainEvent::RoleNotificationCreated {
            role,
            notification: params.into_payload(&sender.username),
        })
        .await;

    Ok(accepted(message))
}

/// POST an announcement to everyone connected
#[utoipa::path(
    post,
    path = "/broadcasts",
    request_body = AnnouncementParams,
    responses(
        (status = 202, description = "Announcement accepted for delivery"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 503, description = "Hub is not running")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn announce(
    AuthenticatedUser(sender): AuthenticatedUser,
    State(app_state): State<AppState>,
    Json(params): Json<AnnouncementParams>,
) -> Result<impl IntoResponse, Error> {
    info!("Announcement '{}' from {}", params.title, sender.username);
    ensure_hub_running(&app_state)?;

    app_state
        .event_publisher
        .publish(DomainEvent::Announcement {
            title: params.title,
            message: params.message,
        })
        .await;

    Ok(accepted("Announcement queued".to_string()))
}

// Publishing never reports failures, so a stopped hub is detected up front.
fn ensure_hub_running(app_state: &AppState) -> Result<(), Error> {
    if app_state.hub.is_running() {
        Ok(())
    } else {
        Err(HubError::hub_closed().into())
    }
}

fn accepted(message: String) -> impl IntoResponse {
    (
        StatusCode::ACCEPTED,
        Json(ApiResponse::new(
            StatusCode::ACCEPTED.into(),
            json!({ "message": message }),
        )),
    )
}
