use crate::extractors::authenticated_user::AuthenticatedUser;
use crate::AppState;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use hub::{pump, Client, Identity};
use log::*;

/// Upgrades an authenticated request to a WebSocket and attaches it to the hub.
/// Every upgrade is a separate connection, so one user may hold several.
#[utoipa::path(
    get,
    path = "/ws",
    params(
        ("token" = Option<String>, Query, description = "Bearer token, for clients that cannot set headers on the upgrade request")
    ),
    responses(
        (status = 101, description = "Switching protocols to WebSocket"),
        (status = 401, description = "Unauthorized"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn connect(
    AuthenticatedUser(identity): AuthenticatedUser,
    State(app_state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    debug!(
        "Upgrading connection for user {} ({})",
        identity.user_id, identity.role
    );

    ws.on_upgrade(move |socket| serve(app_state, identity, socket))
}

async fn serve(app_state: AppState, identity: Identity, socket: WebSocket) {
    let (client, queue) = Client::new(identity, app_state.config.client_queue_capacity);
    let key = client.key();

    if let Err(e) = app_state.hub.register(client).await {
        error!("Could not register client {key}: {e}");
        return;
    }

    info!("Client {key} connected");

    // Pumps run detached; the hub tears them down by closing the queue.
    pump::spawn(
        app_state.hub.clone(),
        queue,
        socket,
        app_state.config.heartbeat(),
    );
}
