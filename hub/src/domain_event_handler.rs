use crate::message::{Envelope, Message};
use crate::Hub;
use async_trait::async_trait;
use events::{DomainEvent, EventHandler};
use log::*;
use serde_json::{Map, Value};

pub const NEW_DATA_EVENT: &str = "new_data";
pub const NEW_NOTIFICATION_EVENT: &str = "new_notification";
pub const ANNOUNCEMENT_EVENT: &str = "announcement";

/// Handles domain events by converting them to hub messages and submitting
/// them for delivery.
///
/// The producer already decided the audience; this handler only maps each
/// event onto an envelope and a scope.
pub struct HubEventHandler {
    hub: Hub,
}

impl HubEventHandler {
    pub fn new(hub: Hub) -> Self {
        Self { hub }
    }
}

/// Turns a domain event into the message pushed to clients.
pub fn to_message(event: &DomainEvent) -> Message {
    match event {
        DomainEvent::InstanceCreated { instance } => {
            Message::to_all(Envelope::new(NEW_DATA_EVENT).with_data(into_payload(instance)))
        }
        DomainEvent::NotificationCreated {
            user_id,
            notification,
        } => Message::to_user(
            *user_id,
            Envelope::new(NEW_NOTIFICATION_EVENT)
                .with_data(into_payload(notification))
                .with_field("user_id", *user_id),
        ),
        DomainEvent::RoleNotificationCreated { role, notification } => Message::to_role(
            role.clone(),
            Envelope::new(NEW_NOTIFICATION_EVENT)
                .with_data(into_payload(notification))
                .with_field("role", role.clone()),
        ),
        DomainEvent::Announcement { title, message } => Message::to_all(
            Envelope::new(ANNOUNCEMENT_EVENT)
                .with_field("title", title.clone())
                .with_field("message", message.clone()),
        ),
    }
}

// Payloads are maps; anything else is wrapped under "value".
fn into_payload(value: &Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map.clone(),
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other.clone());
            map
        }
    }
}

#[async_trait]
impl EventHandler for HubEventHandler {
    async fn handle(&self, event: &DomainEvent) {
        let message = to_message(event);
        debug!(
            "Handling {} as '{}' for {:?}",
            event.name(),
            message.envelope.event,
            message.scope
        );

        if let Err(e) = self.hub.send_message(message).await {
            error!("Failed to submit {} to the hub: {e}", event.name());
        }
    }
}
