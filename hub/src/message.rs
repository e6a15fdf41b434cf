use crate::client::UserId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// Event name of the acknowledgement every client receives right after registration.
pub const CONNECTED_EVENT: &str = "connected";

/// The unit delivered to a connection, serialized as a JSON text frame.
///
/// `timestamp` is overwritten by the hub at dispatch time, so every recipient of
/// one dispatch observes the same send instant regardless of when the envelope
/// was built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
    pub timestamp: DateTime<Utc>,
}

impl Envelope {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = Some(data);
        self
    }

    /// Inserts one payload field, creating the payload map if absent.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    pub(crate) fn stamp(&mut self) {
        self.timestamp = Utc::now();
    }

    /// Builds the welcome envelope sent on registration.
    pub(crate) fn connected(user_id: UserId, username: &str, role: &str) -> Self {
        Envelope::new(CONNECTED_EVENT)
            .with_field("message", "Successfully connected to WebSocket")
            .with_field("user_id", user_id)
            .with_field("username", username)
            .with_field("role", role)
    }
}

/// An envelope together with its addressing. The scope never leaves the hub.
#[derive(Debug, Clone)]
pub struct Message {
    pub envelope: Envelope,
    pub scope: MessageScope,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageScope {
    /// Send to every connection
    All,
    /// Send to all connections for a specific user
    User { user_id: UserId },
    /// Send to every connection whose owner holds the role
    Role { role: String },
}

impl Message {
    pub fn to_all(envelope: Envelope) -> Self {
        Self {
            envelope,
            scope: MessageScope::All,
        }
    }

    pub fn to_user(user_id: UserId, envelope: Envelope) -> Self {
        Self {
            envelope,
            scope: MessageScope::User { user_id },
        }
    }

    pub fn to_role(role: impl Into<String>, envelope: Envelope) -> Self {
        Self {
            envelope,
            scope: MessageScope::Role { role: role.into() },
        }
    }
}
