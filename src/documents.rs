//! Document store seam and the profile document record.
//!
//! Records are plain JSON objects. The profile document lives in the
//! `users` collection keyed by the identity's uid and is written once, at
//! signup. This crate never updates or deletes it.

use serde_json::Value;

use crate::error::StoreError;

/// Collection holding one profile document per identity.
pub const USERS_COLLECTION: &str = "users";

/// A stored document: field name to JSON value.
pub type Record = serde_json::Map<String, Value>;

/// Remote, fallible key/record store.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create or overwrite `collection/key`.
    async fn put(&self, collection: &str, key: &str, record: Record) -> Result<(), StoreError>;

    /// Read `collection/key`. A missing document is `Ok(None)`, not an error.
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Record>, StoreError>;
}

// =============================================================================
// PROFILE DOCUMENT
// =============================================================================

/// User-supplied profile fields persisted at signup. Stored under camelCase
/// keys; see [`ProfileDocument::to_record`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileDocument {
    pub full_name: String,
    pub phone_number: String,
    pub email: String,
    /// RFC 3339 UTC timestamp.
    pub created_at: String,
}

impl ProfileDocument {
    /// Serialize into a store record with camelCase field names.
    #[must_use]
    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert("fullName".into(), Value::String(self.full_name.clone()));
        record.insert("phoneNumber".into(), Value::String(self.phone_number.clone()));
        record.insert("email".into(), Value::String(self.email.clone()));
        record.insert("createdAt".into(), Value::String(self.created_at.clone()));
        record
    }

    /// Lenient read: fields that are missing or not strings come back empty.
    #[must_use]
    pub fn from_record(record: &Record) -> Self {
        let field = |name: &str| {
            record
                .get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned()
        };
        Self {
            full_name: field("fullName"),
            phone_number: field("phoneNumber"),
            email: field("email"),
            created_at: field("createdAt"),
        }
    }
}

/// Current time as an RFC 3339 UTC string. Empty if formatting fails.
#[must_use]
pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "documents_test.rs"]
mod tests;
