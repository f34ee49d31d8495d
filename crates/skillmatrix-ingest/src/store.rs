//! Record persistence collaborator.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use skillmatrix_core::RawRecord;

use crate::StoreError;

/// Persists user records one at a time.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist one record.
    async fn create_record(&self, record: &RawRecord) -> Result<(), StoreError>;

    /// Number of persisted records.
    async fn count(&self) -> usize;
}

#[derive(Default)]
struct Users {
    records: Vec<RawRecord>,
    user_ids: HashSet<String>,
    emails: HashSet<String>,
}

/// In-memory store with unique `userId` and `email` constraints.
#[derive(Default)]
pub struct MemoryRecordStore {
    users: RwLock<Users>,
    unavailable: AtomicBool,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the backing database going away (or coming back).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Snapshot of persisted records, in insertion order.
    pub async fn records(&self) -> Vec<RawRecord> {
        self.users.read().await.records.clone()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create_record(&self, record: &RawRecord) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("connection refused".to_string()));
        }

        let user_id = key_of(record, "userId")?;
        let email = key_of(record, "email")?;
        if !email.contains('@') {
            return Err(StoreError::Invalid(format!("invalid email '{}'", email)));
        }

        let mut users = self.users.write().await;
        if users.user_ids.contains(&user_id) {
            return Err(StoreError::Duplicate {
                field: "userId".to_string(),
                value: user_id,
            });
        }
        let email = email.to_lowercase();
        if users.emails.contains(&email) {
            return Err(StoreError::Duplicate {
                field: "email".to_string(),
                value: email,
            });
        }

        users.user_ids.insert(user_id);
        users.emails.insert(email);
        users.records.push(record.clone());
        Ok(())
    }

    async fn count(&self) -> usize {
        self.users.read().await.records.len()
    }
}

fn key_of(record: &RawRecord, field: &str) -> Result<String, StoreError> {
    match record.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(StoreError::Invalid(format!("'{}' must be a non-empty string", field))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str, email: &str) -> RawRecord {
        RawRecord::new()
            .with_field("userId", id)
            .with_field("email", email)
    }

    #[tokio::test]
    async fn test_create_and_count() {
        let store = MemoryRecordStore::new();
        store.create_record(&user("U-1", "a@example.com")).await.unwrap();
        store.create_record(&user("U-2", "b@example.com")).await.unwrap();
        assert_eq!(store.count().await, 2);
    }

    #[tokio::test]
    async fn test_duplicates_rejected() {
        let store = MemoryRecordStore::new();
        store.create_record(&user("U-1", "a@example.com")).await.unwrap();

        let err = store.create_record(&user("U-1", "z@example.com")).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::Duplicate {
                field: "userId".to_string(),
                value: "U-1".to_string(),
            }
        );

        let err = store.create_record(&user("U-2", "A@example.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { ref field, .. } if field == "email"));
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn test_invalid_email() {
        let store = MemoryRecordStore::new();
        let err = store.create_record(&user("U-1", "not-an-email")).await.unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_unavailable() {
        let store = MemoryRecordStore::new();
        store.set_unavailable(true);
        let err = store.create_record(&user("U-1", "a@example.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));

        store.set_unavailable(false);
        assert!(store.create_record(&user("U-1", "a@example.com")).await.is_ok());
    }
}
