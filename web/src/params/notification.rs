use serde::Deserialize;
use serde_json::{json, Value};
use utoipa::ToSchema;

/// Body of a notification pushed to one user or to a role.
#[derive(Debug, Deserialize, ToSchema)]
#[schema(example = json!({"type": "approval", "title": "Batch 42 needs review", "message": "QC flagged two readings"}))]
pub(crate) struct NotificationParams {
    #[serde(rename = "type")]
    pub(crate) kind: String,
    pub(crate) title: String,
    pub(crate) message: String,
}

impl NotificationParams {
    /// Payload delivered to clients, with the sender's username attached.
    pub(crate) fn into_payload(self, sender: &str) -> Value {
        json!({
            "type": self.kind,
            "title": self.title,
            "message": self.message,
            "sender": sender,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct AnnouncementParams {
    pub(crate) title: String,
    pub(crate) message: String,
}
