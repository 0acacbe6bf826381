use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The single channel between one recruiter, one candidate and one posting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Conversation {
    pub id: String,
    pub recruiter_id: String,
    pub candidate_id: String,
    pub posting_id: Uuid,
    /// Advisory preview of the latest message. Last writer wins.
    pub last_message: String,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn involves(&self, user_id: &str) -> bool {
        self.recruiter_id == user_id || self.candidate_id == user_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: String,
    pub sender_id: String,
    pub text: String,
    /// Assigned by the store, never by the client.
    pub sent_at: DateTime<Utc>,
    pub read: bool,
}

/// Fields the caller supplies when appending. Id, timestamp and read state
/// are owned by the store.
#[derive(Debug, Clone, Copy)]
pub struct NewMessage<'a> {
    pub id: Uuid,
    pub conversation_id: &'a str,
    pub sender_id: &'a str,
    pub text: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ShortlistRecord {
    pub id: Uuid,
    pub recruiter_id: String,
    pub candidate_id: String,
    pub posting_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
}
