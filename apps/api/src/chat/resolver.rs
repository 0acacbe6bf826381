//! Deterministic conversation identity.
//!
//! The conversation id is a pure function of (recruiter, candidate, posting),
//! so creation is an upsert on that key and concurrent callers converge on
//! the same row without any lookup-then-insert window.

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::chat::Conversation;
use crate::store::ChatStore;

/// Builds the conversation key. Each component keeps `[A-Za-z0-9-]` and
/// escapes every other byte as `_XX` (upper-case hex), so `.` never appears
/// inside a component and distinct triples never share a key.
pub fn conversation_key(recruiter_id: &str, candidate_id: &str, posting_id: Uuid) -> String {
    format!(
        "{}.{}.{}",
        sanitize_component(recruiter_id),
        sanitize_component(candidate_id),
        posting_id
    )
}

fn sanitize_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("_{byte:02X}"));
        }
    }
    out
}

/// Returns the conversation for the triple, creating it on first contact.
/// Safe to call any number of times, from any number of tasks.
pub async fn resolve_or_create(
    store: &dyn ChatStore,
    recruiter_id: &str,
    candidate_id: &str,
    posting_id: Uuid,
) -> Result<Conversation, AppError> {
    if recruiter_id.trim().is_empty() || candidate_id.trim().is_empty() {
        return Err(AppError::Validation(
            "recruiter_id and candidate_id cannot be empty".to_string(),
        ));
    }
    if recruiter_id == candidate_id {
        return Err(AppError::Validation(
            "a conversation needs two distinct parties".to_string(),
        ));
    }

    let fresh = Conversation {
        id: conversation_key(recruiter_id, candidate_id, posting_id),
        recruiter_id: recruiter_id.to_string(),
        candidate_id: candidate_id.to_string(),
        posting_id,
        last_message: String::new(),
        updated_at: Utc::now(),
    };

    let (conversation, created) = store.insert_conversation_if_absent(&fresh).await?;
    if created {
        info!(
            "Created conversation {} (recruiter {recruiter_id}, candidate {candidate_id}, posting {posting_id})",
            conversation.id
        );
    } else {
        debug!("Resolved existing conversation {}", conversation.id);
    }
    Ok(conversation)
}
