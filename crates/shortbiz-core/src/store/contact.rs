//! Contact form messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Store;
use crate::error::StoreResult;

/// A message left through the contact form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactMessage {
    /// Row id.
    pub id: i64,
    /// Sender name.
    pub name: String,
    /// Sender email.
    pub email: String,
    /// Optional subject line.
    pub subject: Option<String>,
    /// Message body.
    pub message: String,
    /// Receive time.
    pub created_at: DateTime<Utc>,
}

impl Store {
    /// Persist a contact message.
    pub fn insert_contact(
        &self,
        name: &str,
        email: &str,
        subject: Option<&str>,
        message: &str,
    ) -> StoreResult<ContactMessage> {
        let created_at = Utc::now();
        let id = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO contact_messages (name, email, subject, message, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![name, email, subject, message, created_at],
            )?;
            Ok(conn.last_insert_rowid())
        })?;
        Ok(ContactMessage {
            id,
            name: name.to_string(),
            email: email.to_string(),
            subject: subject.map(str::to_string),
            message: message.to_string(),
            created_at,
        })
    }

    /// All contact messages, newest first.
    pub fn contact_messages(&self) -> StoreResult<Vec<ContactMessage>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, email, subject, message, created_at
                 FROM contact_messages ORDER BY created_at DESC, id DESC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(ContactMessage {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    email: row.get(2)?,
                    subject: row.get(3)?,
                    message: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }
}
