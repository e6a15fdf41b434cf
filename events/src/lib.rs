//! Event system infrastructure for the realtime hub.
//!
//! This crate decouples business logic from delivery concerns (like pushing
//! messages to live WebSocket connections).
//!
//! # Architecture
//!
//! - **DomainEvent**: Enum representing all business events that are pushed to clients
//! - **EventHandler**: Trait for implementing event handlers
//! - **EventPublisher**: Publishes events to registered handlers
//!
//! This crate has no dependencies on internal crates, avoiding circular
//! dependencies. Record data is carried as serialized JSON values.

use async_trait::async_trait;
use log::*;
use serde_json::Value;
use std::sync::Arc;

/// Numeric user identifier, matching the one carried in bearer tokens.
pub type UserId = i64;

/// Domain events that represent business-level changes in the system.
/// These events are emitted after the owning operation completed successfully.
///
/// The producer decides who should hear about an event: everybody, one user,
/// or every holder of a role.
#[derive(Debug, Clone)]
pub enum DomainEvent {
    /// A new process instance (data record) was saved.
    /// Every connected client is told so dashboards can refresh.
    InstanceCreated {
        /// Serialized instance summary (id, workflow id, template id, status, ...).
        instance: Value,
    },
    /// A notification was stored for one user.
    /// Delivered to every live connection of that user.
    NotificationCreated {
        /// Recipient of the notification.
        user_id: UserId,
        /// Serialized notification (id, type, title, message, ...).
        notification: Value,
    },
    /// A notification addressed to every user holding a role.
    RoleNotificationCreated {
        role: String,
        notification: Value,
    },
    /// A free-form announcement to everyone connected.
    Announcement { title: String, message: String },
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::InstanceCreated { .. } => "instance_created",
            DomainEvent::NotificationCreated { .. } => "notification_created",
            DomainEvent::RoleNotificationCreated { .. } => "role_notification_created",
            DomainEvent::Announcement { .. } => "announcement",
        }
    }
}

/// Trait for handling domain events.
/// Implementations perform side effects like pushing notifications to clients.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &DomainEvent);
}

/// Publishes domain events to registered handlers.
/// Handlers are called sequentially in registration order.
#[derive(Clone)]
pub struct EventPublisher {
    handlers: Arc<Vec<Arc<dyn EventHandler>>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Vec::new()),
        }
    }

    /// Register a new event handler.
    /// Note: This creates a new publisher instance with the additional handler.
    /// Store the returned publisher in your application state.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        let mut handlers = (*self.handlers).clone();
        handlers.push(handler);
        self.handlers = Arc::new(handlers);
        self
    }

    /// Publish an event to all registered handlers.
    /// Handlers report their own failures; publishing never fails.
    pub async fn publish(&self, event: DomainEvent) {
        debug!(
            "Publishing {} to {} handler(s)",
            event.name(),
            self.handlers.len()
        );

        for handler in self.handlers.iter() {
            handler.handle(&event).await;
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}
