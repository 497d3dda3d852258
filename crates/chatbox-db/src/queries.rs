use chatbox_types::models::User;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::debug;
use uuid::Uuid;

use crate::models::{MessageRow, UserRow, format_timestamp, parse_timestamp};
use crate::{Database, StoreError};

impl Database {
    // -- Users --

    /// Insert a new non-admin account. Uniqueness is enforced by the primary
    /// key, so a concurrent duplicate loses atomically and leaves the
    /// existing row untouched.
    pub fn create_user(&self, username: &str, password_hash: &str) -> Result<UserRow, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                "INSERT INTO users (username, password, is_admin) VALUES (?1, ?2, 0)
                 RETURNING username, password, is_admin, created_at",
                (username, password_hash),
                user_from_row,
            )
            .map_err(|e| {
                if StoreError::is_unique_violation(&e) {
                    StoreError::DuplicateUsername
                } else {
                    e.into()
                }
            })
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>, StoreError> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    /// All accounts as `{username, isAdmin}`, oldest first.
    pub fn list_users(&self) -> Result<Vec<User>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT username, is_admin FROM users ORDER BY created_at, username")?;
            let users = stmt
                .query_map([], |row| {
                    Ok(User {
                        username: row.get(0)?,
                        is_admin: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(users)
        })
    }

    /// Grant admin. Re-granting is a no-op that still returns the row.
    pub fn set_admin(&self, username: &str) -> Result<UserRow, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                "UPDATE users SET is_admin = 1 WHERE username = ?1
                 RETURNING username, password, is_admin, created_at",
                [username],
                user_from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::UserNotFound(username.to_string()))
        })
    }

    // -- Messages --

    /// Append a message. The timestamp is taken under the connection lock and
    /// never falls behind the newest stored row, so insertion order and time
    /// order agree even if the wall clock steps backwards.
    pub fn insert_message(&self, username: &str, text: &str) -> Result<MessageRow, StoreError> {
        if text.trim().is_empty() {
            return Err(StoreError::EmptyMessage);
        }

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let last: Option<String> = tx
                .query_row(
                    "SELECT created_at FROM messages ORDER BY created_at DESC, seq DESC LIMIT 1",
                    [],
                    |row| row.get(0),
                )
                .optional()?;

            let mut now = Utc::now();
            if let Some(last) = last {
                let last = parse_timestamp(&last)?;
                if last > now {
                    now = last;
                }
            }

            let id = Uuid::new_v4().to_string();
            let created_at = format_timestamp(now);
            tx.execute(
                "INSERT INTO messages (id, username, message, created_at) VALUES (?1, ?2, ?3, ?4)",
                (&id, username, text, &created_at),
            )?;
            tx.commit()?;

            debug!("Stored message {} from {}", id, username);
            Ok(MessageRow {
                id,
                username: username.to_string(),
                message: text.to_string(),
                created_at,
            })
        })
    }

    /// Full history, oldest first.
    pub fn list_messages(&self) -> Result<Vec<MessageRow>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, username, message, created_at
                 FROM messages
                 ORDER BY created_at ASC, seq ASC",
            )?;
            let rows = stmt
                .query_map([], message_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn delete_message(&self, id: &str) -> Result<MessageRow, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                "DELETE FROM messages WHERE id = ?1 RETURNING id, username, message, created_at",
                [id],
                message_from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::MessageNotFound(id.to_string()))
        })
    }
}

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT username, password, is_admin, created_at FROM users WHERE username = ?1",
    )?;

    let row = stmt.query_row([username], user_from_row).optional()?;
    Ok(row)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        username: row.get(0)?,
        password: row.get(1)?,
        is_admin: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        username: row.get(1)?,
        message: row.get(2)?,
        created_at: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatbox_types::models::Message;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn duplicate_username_is_rejected_and_original_kept() {
        let db = db();
        db.create_user("alice", "hash-1").unwrap();

        let err = db.create_user("alice", "hash-2").unwrap_err();
        assert!(matches!(err, StoreError::DuplicateUsername));

        let stored = db.get_user_by_username("alice").unwrap().unwrap();
        assert_eq!(stored.password, "hash-1");
        assert!(!stored.is_admin);
    }

    #[test]
    fn unknown_user_lookup_is_none() {
        assert!(db().get_user_by_username("ghost").unwrap().is_none());
    }

    #[test]
    fn set_admin_is_idempotent() {
        let db = db();
        db.create_user("root", "h").unwrap();

        assert!(db.set_admin("root").unwrap().is_admin);
        assert!(db.set_admin("root").unwrap().is_admin);
    }

    #[test]
    fn set_admin_on_missing_user_fails() {
        let err = db().set_admin("ghost").unwrap_err();
        assert!(matches!(err, StoreError::UserNotFound(name) if name == "ghost"));
    }

    #[test]
    fn list_users_reports_roles() {
        let db = db();
        db.create_user("a", "h").unwrap();
        db.create_user("b", "h").unwrap();
        db.set_admin("b").unwrap();

        let mut users = db.list_users().unwrap();
        users.sort_by(|x, y| x.username.cmp(&y.username));
        assert_eq!(
            users,
            vec![
                User { username: "a".into(), is_admin: false },
                User { username: "b".into(), is_admin: true },
            ]
        );
    }

    #[test]
    fn empty_message_is_rejected() {
        let db = db();
        assert!(matches!(db.insert_message("a", ""), Err(StoreError::EmptyMessage)));
        assert!(matches!(db.insert_message("a", "   "), Err(StoreError::EmptyMessage)));
        assert!(db.list_messages().unwrap().is_empty());
    }

    #[test]
    fn messages_list_in_insertion_order() {
        let db = db();
        for i in 0..20 {
            db.insert_message("a", &format!("m{}", i)).unwrap();
        }

        let messages: Vec<Message> = db
            .list_messages()
            .unwrap()
            .into_iter()
            .map(|row| Message::try_from(row).unwrap())
            .collect();

        let texts: Vec<&str> = messages.iter().map(|m| m.message.as_str()).collect();
        let expected: Vec<String> = (0..20).map(|i| format!("m{}", i)).collect();
        assert_eq!(texts, expected.iter().map(String::as_str).collect::<Vec<_>>());
        assert!(messages.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn delete_returns_row_then_not_found() {
        let db = db();
        let keep = db.insert_message("a", "keep").unwrap();
        let gone = db.insert_message("a", "gone").unwrap();

        let deleted = db.delete_message(&gone.id).unwrap();
        assert_eq!(deleted.message, "gone");

        assert!(matches!(
            db.delete_message(&gone.id),
            Err(StoreError::MessageNotFound(_))
        ));

        let remaining = db.list_messages().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, keep.id);
    }
}
