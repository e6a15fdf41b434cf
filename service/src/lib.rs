use config::Config;
use events::EventPublisher;
use hub::{Hub, HubEventHandler};
use log::info;
use std::sync::Arc;

pub mod config;
pub mod logging;

/// Starts the process-wide hub. Must be called from within a tokio runtime.
pub fn init_hub(config: &Config) -> Hub {
    info!(
        "Hub config: client_queue_capacity={}, hub_intake_capacity={}, heartbeat={:?}",
        config.client_queue_capacity,
        config.hub_intake_capacity,
        config.heartbeat().interval,
    );

    Hub::spawn(config.hub_intake_capacity)
}

// Service-level state containing only infrastructure concerns
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub hub: Hub,
    pub event_publisher: Arc<EventPublisher>,
}

impl AppState {
    /// Builds state around an already running hub, with the hub's domain event
    /// handler registered on the publisher.
    pub fn new(app_config: Config, hub: Hub) -> Self {
        let event_publisher =
            EventPublisher::new().with_handler(Arc::new(HubEventHandler::new(hub.clone())));

        Self {
            config: app_config,
            hub,
            event_publisher: Arc::new(event_publisher),
        }
    }
}
