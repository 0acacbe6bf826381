//! Persistence boundary. Core code talks to these traits only; `PgStore` backs
//! them in production and `MemoryStore` in tests and local runs.

pub mod memory;
pub mod postgres;
pub mod retry;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::chat::{Conversation, Message, NewMessage, ShortlistRecord};
use crate::models::profile::{CandidateProfile, Posting};
use crate::models::user::Role;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use retry::{with_read_retry, RetryPolicy};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("record already exists")]
    Conflict,

    /// I/O-level failure. Safe to retry on read paths.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        let transient = matches!(
            err,
            sqlx::Error::Io(_)
                | sqlx::Error::PoolTimedOut
                | sqlx::Error::PoolClosed
                | sqlx::Error::WorkerCrashed
        );
        if transient {
            return StoreError::Unavailable(err.to_string());
        }
        if matches!(err, sqlx::Error::RowNotFound) {
            return StoreError::NotFound;
        }
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return StoreError::Conflict;
            }
            if db.is_foreign_key_violation() {
                return StoreError::NotFound;
            }
        }
        StoreError::Database(err)
    }
}

/// Profiles, postings and shortlist records.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn upsert_profile(&self, profile: &CandidateProfile) -> Result<(), StoreError>;
    async fn fetch_profile(&self, id: &str) -> Result<Option<CandidateProfile>, StoreError>;
    /// Every profile, in a stable order (first saved first).
    async fn list_profiles(&self) -> Result<Vec<CandidateProfile>, StoreError>;

    async fn insert_posting(&self, posting: &Posting) -> Result<(), StoreError>;
    async fn fetch_posting(&self, id: Uuid) -> Result<Option<Posting>, StoreError>;
    async fn list_postings(&self) -> Result<Vec<Posting>, StoreError>;

    async fn insert_shortlist(&self, record: &ShortlistRecord) -> Result<(), StoreError>;
    async fn shortlists_for_candidate(
        &self,
        candidate_id: &str,
    ) -> Result<Vec<ShortlistRecord>, StoreError>;
}

/// Conversations and their message logs.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Inserts `conversation` unless its id is already taken. Returns the stored
    /// row and whether this call created it. `updated_at` is stamped with the
    /// store's clock, the same clock that stamps messages.
    async fn insert_conversation_if_absent(
        &self,
        conversation: &Conversation,
    ) -> Result<(Conversation, bool), StoreError>;
    async fn fetch_conversation(&self, id: &str) -> Result<Option<Conversation>, StoreError>;
    /// Conversations where the user sits on the given side, most recently
    /// updated first.
    async fn conversations_for(
        &self,
        user_id: &str,
        role: Role,
    ) -> Result<Vec<Conversation>, StoreError>;

    /// Appends a message stamped with the store's clock. `NotFound` if the
    /// conversation does not exist.
    async fn insert_message(&self, message: NewMessage<'_>) -> Result<Message, StoreError>;
    /// Sets the preview unless a newer write already landed.
    async fn touch_conversation(
        &self,
        id: &str,
        preview: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
    /// Rebuilds the preview from the latest message. Idempotent.
    async fn reconcile_preview(&self, id: &str) -> Result<(), StoreError>;
    /// The full log, ordered by timestamp then insertion.
    async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, StoreError>;
    /// Flips `read` to true for the given messages, skipping any sent by
    /// `viewer_id`. Returns how many actually flipped.
    async fn mark_read(
        &self,
        conversation_id: &str,
        ids: &[Uuid],
        viewer_id: &str,
    ) -> Result<u64, StoreError>;
    async fn unread_count(&self, user_id: &str) -> Result<i64, StoreError>;
}
