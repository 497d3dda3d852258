use serde::{Deserialize, Serialize};

use crate::models::Message;

/// Events pushed from the server to every connected socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// A message was stored.
    #[serde(rename = "message")]
    MessageCreated(Message),

    /// A message was removed by an admin. Carries the deleted row.
    #[serde(rename = "messageDeleted")]
    MessageDeleted(Message),
}

impl GatewayEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::MessageCreated(_) => "message",
            Self::MessageDeleted(_) => "messageDeleted",
        }
    }
}

/// Commands sent FROM client TO server over the socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Tag the connection with a display name. Unauthenticated; only used
    /// for logging.
    #[serde(rename = "join")]
    Join(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn created_event_wire_shape() {
        let event = GatewayEvent::MessageCreated(Message {
            id: Uuid::nil(),
            username: "A".into(),
            message: "hi".into(),
            timestamp: Utc::now(),
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "message");
        assert_eq!(json["data"]["username"], "A");
        assert_eq!(json["data"]["message"], "hi");
    }

    #[test]
    fn join_command_carries_bare_username() {
        let cmd: GatewayCommand =
            serde_json::from_str(r#"{"type":"join","data":"alice"}"#).unwrap();
        assert_eq!(cmd, GatewayCommand::Join("alice".into()));
    }
}
