use chatbox_types::models::{Message, User};
use chrono::{DateTime, Utc};

use crate::StoreError;

// Database row types. These map directly to SQLite rows.
// Distinct from chatbox-types API models to keep the DB layer independent.

#[derive(Debug)]
pub struct UserRow {
    pub username: String,
    pub password: String,
    pub is_admin: bool,
    pub created_at: String,
}

#[derive(Debug)]
pub struct MessageRow {
    pub id: String,
    pub username: String,
    pub message: String,
    pub created_at: String,
}

/// Fixed-width RFC 3339 so lexical order in SQLite matches time order.
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("timestamp '{}': {}", raw, e)))
}

impl UserRow {
    pub fn to_user(&self) -> User {
        User {
            username: self.username.clone(),
            is_admin: self.is_admin,
        }
    }
}

impl TryFrom<MessageRow> for Message {
    type Error = StoreError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        let id = row
            .id
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("message id '{}': {}", row.id, e)))?;
        let timestamp = parse_timestamp(&row.created_at)?;

        Ok(Message {
            id,
            username: row.username,
            message: row.message,
            timestamp,
        })
    }
}
