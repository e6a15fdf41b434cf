use crate::{controller::health_check_controller, params, protect, AppState};
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

use crate::controller::{notification_controller, status_controller, websocket_controller};

use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_rapidoc::RapiDoc;

// This is the global definition of our OpenAPI spec. To be a part
// of the rendered spec, a path and schema must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "Realtime Hub API"
        ),
        paths(
            health_check_controller::health_check,
            status_controller::index,
            status_controller::read_user,
            websocket_controller::connect,
            notification_controller::notify_user,
            notification_controller::notify_role,
            notification_controller::announce,
        ),
        components(
            schemas(
                params::notification::NotificationParams,
                params::notification::AnnouncementParams,
                status_controller::HubStatus,
                status_controller::UserPresence,
            )
        ),
        modifiers(&SecurityAddon),
        tags(
            (name = "realtime_hub", description = "Real-time WebSocket notification hub")
        )
    )]
struct ApiDoc;

struct SecurityAddon;

// Bearer tokens are HS256 JWTs issued by the login service.
impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            )
        }
    }
}

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(status_routes(app_state.clone()))
        .merge(websocket_routes(app_state.clone()))
        .merge(notification_routes(app_state))
        .merge(RapiDoc::with_openapi("/api-docs/openapi.json", ApiDoc::openapi()).path("/rapidoc"))
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn status_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/status", get(status_controller::index))
        .route("/status/users/{user_id}", get(status_controller::read_user))
        .with_state(app_state)
}

fn websocket_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/ws", get(websocket_controller::connect))
        .with_state(app_state)
}

fn notification_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(
            // POST /notifications/users/{user_id}
            Router::new()
                .route(
                    "/notifications/users/{user_id}",
                    post(notification_controller::notify_user),
                )
                .route_layer(from_fn_with_state(
                    app_state.clone(),
                    protect::notifications::notify_user,
                )),
        )
        .merge(
            // POST /notifications/roles/{role} and POST /broadcasts
            Router::new()
                .route(
                    "/notifications/roles/{role}",
                    post(notification_controller::notify_role),
                )
                .route("/broadcasts", post(notification_controller::announce))
                .route_layer(from_fn_with_state(
                    app_state.clone(),
                    protect::notifications::broadcast,
                )),
        )
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::authenticated_user::tests::{token_for, SECRET};
    use axum::body::{to_bytes, Body};
    use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
    use axum::http::{Request, StatusCode};
    use clap::Parser;
    use hub::{Client, Hub, Identity};
    use serde_json::{json, Value};
    use service::config::Config;
    use std::num::NonZeroUsize;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let config = Config::try_parse_from(["realtime_hub"])
            .unwrap()
            .set_jwt_secret(SECRET.to_string());
        let hub = Hub::spawn(NonZeroUsize::new(16).unwrap());
        AppState::new(config, hub)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, token: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_check_is_public() {
        let app = define_routes(test_state());

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_status_reports_empty_hub() {
        let app = define_routes(test_state());

        let response = app
            .oneshot(Request::get("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"status_code": 200, "data": {"connected_users": 0, "connections": 0}})
        );
    }

    #[tokio::test]
    async fn test_websocket_requires_a_token() {
        let app = define_routes(test_state());

        let response = app
            .oneshot(Request::get("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_websocket_rejects_a_bad_token() {
        let app = define_routes(test_state());

        let response = app
            .oneshot(
                Request::get("/ws?token=not-a-jwt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_user_presence_requires_authentication() {
        let app = define_routes(test_state());

        let response = app
            .oneshot(Request::get("/status/users/7").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_announcement_is_forbidden_for_operators() {
        let app = define_routes(test_state());

        let response = app
            .oneshot(post_json(
                "/broadcasts",
                &token_for(3, "operator"),
                json!({"title": "Shift change", "message": "In ten minutes"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_supervisor_may_not_notify_a_role() {
        let app = define_routes(test_state());

        let response = app
            .oneshot(post_json(
                "/notifications/roles/operator",
                &token_for(2, "supervisor"),
                json!({"type": "info", "title": "Heads up", "message": "Line 3 paused"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_admin_notification_reaches_connected_user() {
        let app_state = test_state();
        let identity = Identity {
            user_id: 7,
            username: "user-7".to_string(),
            role: "operator".to_string(),
        };
        let (client, mut queue) = Client::new(identity, NonZeroUsize::new(8).unwrap());
        app_state.hub.register(client).await.unwrap();

        let response = define_routes(app_state.clone())
            .oneshot(post_json(
                "/notifications/users/7",
                &token_for(1, "admin"),
                json!({"type": "approval", "title": "Batch 42", "message": "Needs review"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let welcome = queue.recv().await.unwrap();
        assert_eq!(welcome.event, "connected");

        let notification = tokio::time::timeout(Duration::from_secs(1), queue.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(notification.event, "new_notification");

        let data = notification.data.as_ref().unwrap();
        assert_eq!(data["title"], "Batch 42");
        assert_eq!(data["sender"], "user-1");
        assert_eq!(data["user_id"], 7);
    }

    #[tokio::test]
    async fn test_user_presence_reports_live_connections() {
        let app_state = test_state();
        let identity = Identity {
            user_id: 9,
            username: "user-9".to_string(),
            role: "operator".to_string(),
        };
        let (client, mut queue) = Client::new(identity, NonZeroUsize::new(8).unwrap());
        app_state.hub.register(client).await.unwrap();
        queue.recv().await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), async {
            while !app_state.hub.is_user_connected(9) {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .unwrap();

        let response = define_routes(app_state.clone())
            .oneshot(
                Request::get("/status/users/9")
                    .header(AUTHORIZATION, format!("Bearer {}", token_for(1, "admin")))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await["data"],
            json!({"user_id": 9, "connected": true, "connections": 1})
        );
    }
}
