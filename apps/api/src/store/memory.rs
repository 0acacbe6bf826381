use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ChatStore, DirectoryStore, StoreError};
use crate::models::chat::{Conversation, Message, NewMessage, ShortlistRecord};
use crate::models::profile::{CandidateProfile, Posting};
use crate::models::user::Role;

/// Process-local store. Every operation holds the lock for its whole
/// duration, so check-then-insert sequences are atomic.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    /// Insertion order is the pool iteration order.
    profiles: Vec<CandidateProfile>,
    postings: Vec<Posting>,
    shortlists: Vec<ShortlistRecord>,
    conversations: HashMap<String, Conversation>,
    /// Per-conversation log in append order.
    messages: HashMap<String, Vec<Message>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DirectoryStore for MemoryStore {
    async fn upsert_profile(&self, profile: &CandidateProfile) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        match state.profiles.iter_mut().find(|p| p.id == profile.id) {
            Some(existing) => *existing = profile.clone(),
            None => state.profiles.push(profile.clone()),
        }
        Ok(())
    }

    async fn fetch_profile(&self, id: &str) -> Result<Option<CandidateProfile>, StoreError> {
        let state = self.state.read().await;
        Ok(state.profiles.iter().find(|p| p.id == id).cloned())
    }

    async fn list_profiles(&self) -> Result<Vec<CandidateProfile>, StoreError> {
        Ok(self.state.read().await.profiles.clone())
    }

    async fn insert_posting(&self, posting: &Posting) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.postings.iter().any(|p| p.id == posting.id) {
            return Err(StoreError::Conflict);
        }
        state.postings.push(posting.clone());
        Ok(())
    }

    async fn fetch_posting(&self, id: Uuid) -> Result<Option<Posting>, StoreError> {
        let state = self.state.read().await;
        Ok(state.postings.iter().find(|p| p.id == id).cloned())
    }

    async fn list_postings(&self) -> Result<Vec<Posting>, StoreError> {
        let state = self.state.read().await;
        // Newest first, matching the Postgres ordering.
        Ok(state.postings.iter().rev().cloned().collect())
    }

    async fn insert_shortlist(&self, record: &ShortlistRecord) -> Result<(), StoreError> {
        self.state.write().await.shortlists.push(record.clone());
        Ok(())
    }

    async fn shortlists_for_candidate(
        &self,
        candidate_id: &str,
    ) -> Result<Vec<ShortlistRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .shortlists
            .iter()
            .filter(|s| s.candidate_id == candidate_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn insert_conversation_if_absent(
        &self,
        conversation: &Conversation,
    ) -> Result<(Conversation, bool), StoreError> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.conversations.get(&conversation.id) {
            return Ok((existing.clone(), false));
        }
        let stored = Conversation {
            updated_at: Utc::now(),
            ..conversation.clone()
        };
        state
            .conversations
            .insert(stored.id.clone(), stored.clone());
        Ok((stored, true))
    }

    async fn fetch_conversation(&self, id: &str) -> Result<Option<Conversation>, StoreError> {
        Ok(self.state.read().await.conversations.get(id).cloned())
    }

    async fn conversations_for(
        &self,
        user_id: &str,
        role: Role,
    ) -> Result<Vec<Conversation>, StoreError> {
        let state = self.state.read().await;
        let mut found: Vec<Conversation> = state
            .conversations
            .values()
            .filter(|c| match role {
                Role::Recruiter => c.recruiter_id == user_id,
                Role::Student => c.candidate_id == user_id,
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn insert_message(&self, message: NewMessage<'_>) -> Result<Message, StoreError> {
        let mut state = self.state.write().await;
        if !state.conversations.contains_key(message.conversation_id) {
            return Err(StoreError::NotFound);
        }
        let log = state
            .messages
            .entry(message.conversation_id.to_string())
            .or_default();

        // Never stamp earlier than the tail so timestamp order equals append order.
        let now = Utc::now();
        let sent_at = log.last().map_or(now, |last| last.sent_at.max(now));

        let stored = Message {
            id: message.id,
            conversation_id: message.conversation_id.to_string(),
            sender_id: message.sender_id.to_string(),
            text: message.text.to_string(),
            sent_at,
            read: false,
        };
        log.push(stored.clone());
        Ok(stored)
    }

    async fn touch_conversation(
        &self,
        id: &str,
        preview: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let conversation = state.conversations.get_mut(id).ok_or(StoreError::NotFound)?;
        if conversation.updated_at <= at {
            conversation.last_message = preview.to_string();
            conversation.updated_at = at;
        }
        Ok(())
    }

    async fn reconcile_preview(&self, id: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let latest = state
            .messages
            .get(id)
            .and_then(|log| log.last())
            .map(|m| (m.text.clone(), m.sent_at));
        let conversation = state.conversations.get_mut(id).ok_or(StoreError::NotFound)?;
        if let Some((text, sent_at)) = latest {
            if conversation.updated_at <= sent_at {
                conversation.last_message = text;
                conversation.updated_at = sent_at;
            }
        }
        Ok(())
    }

    async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .messages
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn mark_read(
        &self,
        conversation_id: &str,
        ids: &[Uuid],
        viewer_id: &str,
    ) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        let Some(log) = state.messages.get_mut(conversation_id) else {
            return Ok(0);
        };
        let mut flipped = 0;
        for message in log
            .iter_mut()
            .filter(|m| !m.read && m.sender_id != viewer_id && ids.contains(&m.id))
        {
            message.read = true;
            flipped += 1;
        }
        Ok(flipped)
    }

    async fn unread_count(&self, user_id: &str) -> Result<i64, StoreError> {
        let state = self.state.read().await;
        let count = state
            .conversations
            .values()
            .filter(|c| c.involves(user_id))
            .filter_map(|c| state.messages.get(&c.id))
            .flatten()
            .filter(|m| !m.read && m.sender_id != user_id)
            .count();
        Ok(count as i64)
    }
}
