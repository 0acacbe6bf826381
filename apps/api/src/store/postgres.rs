use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::PgListener;
use sqlx::{FromRow, PgPool};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use super::{ChatStore, DirectoryStore, StoreError};
use crate::chat::hub::ConversationHub;
use crate::models::chat::{Conversation, Message, NewMessage, ShortlistRecord};
use crate::models::profile::{CandidateProfile, Posting, RequirementSkill, Skill};
use crate::models::user::Role;

/// NOTIFY channel carrying the id of a conversation whose log changed.
pub const CONVERSATION_EVENTS_CHANNEL: &str = "conversation_events";

const CONVERSATION_COLUMNS: &str =
    "id, recruiter_id, candidate_id, posting_id, last_message, updated_at";
const MESSAGE_COLUMNS: &str = "id, conversation_id, sender_id, text, sent_at, read";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn notify_changed(&self, conversation_id: &str) {
        // Live delivery is best effort; the write itself already succeeded.
        if let Err(e) = sqlx::query("SELECT pg_notify($1, $2)")
            .bind(CONVERSATION_EVENTS_CHANNEL)
            .bind(conversation_id)
            .execute(&self.pool)
            .await
        {
            warn!("pg_notify for conversation {conversation_id} failed: {e}");
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Row types (JSONB columns decoded leniently)
// ────────────────────────────────────────────────────────────────────────────

#[derive(FromRow)]
struct ProfileRow {
    id: String,
    skills: Option<Value>,
    cgpa: f64,
    project_count: i32,
}

impl From<ProfileRow> for CandidateProfile {
    fn from(row: ProfileRow) -> Self {
        // A payload that no longer decodes scores as "no skills" instead of
        // failing the whole ranking pass.
        let skills = row.skills.and_then(|raw| {
            serde_json::from_value::<Vec<Skill>>(raw)
                .map_err(|e| warn!("Profile {} has malformed skills: {e}", row.id))
                .ok()
        });
        CandidateProfile {
            id: row.id,
            skills,
            cgpa: row.cgpa,
            project_count: row.project_count,
        }
    }
}

#[derive(FromRow)]
struct PostingRow {
    id: Uuid,
    title: String,
    required_skills: Value,
    owner_id: String,
    created_at: DateTime<Utc>,
}

impl From<PostingRow> for Posting {
    fn from(row: PostingRow) -> Self {
        let required_skills = serde_json::from_value::<Vec<RequirementSkill>>(row.required_skills)
            .unwrap_or_else(|e| {
                warn!("Posting {} has malformed requirements: {e}", row.id);
                Vec::new()
            });
        Posting {
            id: row.id,
            title: row.title,
            required_skills,
            owner_id: row.owner_id,
            created_at: row.created_at,
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value)
        .map_err(|e| StoreError::Database(sqlx::Error::Protocol(format!("JSON encode failed: {e}"))))
}

// ────────────────────────────────────────────────────────────────────────────
// DirectoryStore
// ────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl DirectoryStore for PgStore {
    async fn upsert_profile(&self, profile: &CandidateProfile) -> Result<(), StoreError> {
        let skills = profile.skills.as_ref().map(to_json).transpose()?;
        sqlx::query(
            r#"
            INSERT INTO candidate_profiles (id, skills, cgpa, project_count)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET skills = EXCLUDED.skills,
                cgpa = EXCLUDED.cgpa,
                project_count = EXCLUDED.project_count,
                updated_at = now()
            "#,
        )
        .bind(&profile.id)
        .bind(skills)
        .bind(profile.cgpa)
        .bind(profile.project_count)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch_profile(&self, id: &str) -> Result<Option<CandidateProfile>, StoreError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            "SELECT id, skills, cgpa, project_count FROM candidate_profiles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(CandidateProfile::from))
    }

    async fn list_profiles(&self) -> Result<Vec<CandidateProfile>, StoreError> {
        let rows = sqlx::query_as::<_, ProfileRow>(
            "SELECT id, skills, cgpa, project_count FROM candidate_profiles ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(CandidateProfile::from).collect())
    }

    async fn insert_posting(&self, posting: &Posting) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO postings (id, title, required_skills, owner_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(posting.id)
        .bind(&posting.title)
        .bind(to_json(&posting.required_skills)?)
        .bind(&posting.owner_id)
        .bind(posting.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch_posting(&self, id: Uuid) -> Result<Option<Posting>, StoreError> {
        let row = sqlx::query_as::<_, PostingRow>(
            "SELECT id, title, required_skills, owner_id, created_at FROM postings WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Posting::from))
    }

    async fn list_postings(&self) -> Result<Vec<Posting>, StoreError> {
        let rows = sqlx::query_as::<_, PostingRow>(
            "SELECT id, title, required_skills, owner_id, created_at FROM postings ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Posting::from).collect())
    }

    async fn insert_shortlist(&self, record: &ShortlistRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO shortlists (id, recruiter_id, candidate_id, posting_id, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.id)
        .bind(&record.recruiter_id)
        .bind(&record.candidate_id)
        .bind(record.posting_id)
        .bind(&record.status)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn shortlists_for_candidate(
        &self,
        candidate_id: &str,
    ) -> Result<Vec<ShortlistRecord>, StoreError> {
        Ok(sqlx::query_as::<_, ShortlistRecord>(
            r#"
            SELECT id, recruiter_id, candidate_id, posting_id, status, created_at
            FROM shortlists
            WHERE candidate_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(candidate_id)
        .fetch_all(&self.pool)
        .await?)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ChatStore
// ────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl ChatStore for PgStore {
    async fn insert_conversation_if_absent(
        &self,
        conversation: &Conversation,
    ) -> Result<(Conversation, bool), StoreError> {
        // Conflicts on either the id or the (recruiter, candidate, posting)
        // unique constraint are a no-op. updated_at uses the database clock so
        // it compares cleanly against message sent_at.
        let inserted = sqlx::query(
            r#"
            INSERT INTO conversations
                (id, recruiter_id, candidate_id, posting_id, last_message, updated_at)
            VALUES ($1, $2, $3, $4, $5, clock_timestamp())
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(&conversation.id)
        .bind(&conversation.recruiter_id)
        .bind(&conversation.candidate_id)
        .bind(conversation.posting_id)
        .bind(&conversation.last_message)
        .execute(&self.pool)
        .await?
        .rows_affected()
            == 1;

        // A row stored under a legacy id for the same triple wins if it is older.
        let stored = sqlx::query_as::<_, Conversation>(&format!(
            r#"
            SELECT {CONVERSATION_COLUMNS}
            FROM conversations
            WHERE id = $1
               OR (recruiter_id = $2 AND candidate_id = $3 AND posting_id = $4)
            ORDER BY created_at ASC
            LIMIT 1
            "#
        ))
        .bind(&conversation.id)
        .bind(&conversation.recruiter_id)
        .bind(&conversation.candidate_id)
        .bind(conversation.posting_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((stored, inserted))
    }

    async fn fetch_conversation(&self, id: &str) -> Result<Option<Conversation>, StoreError> {
        Ok(sqlx::query_as::<_, Conversation>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn conversations_for(
        &self,
        user_id: &str,
        role: Role,
    ) -> Result<Vec<Conversation>, StoreError> {
        let column = match role {
            Role::Recruiter => "recruiter_id",
            Role::Student => "candidate_id",
        };
        Ok(sqlx::query_as::<_, Conversation>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE {column} = $1 ORDER BY updated_at DESC, id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_message(&self, message: NewMessage<'_>) -> Result<Message, StoreError> {
        // sent_at defaults to clock_timestamp(); seq breaks ties in insert order.
        let stored = sqlx::query_as::<_, Message>(&format!(
            r#"
            INSERT INTO messages (id, conversation_id, sender_id, text)
            VALUES ($1, $2, $3, $4)
            RETURNING {MESSAGE_COLUMNS}
            "#
        ))
        .bind(message.id)
        .bind(message.conversation_id)
        .bind(message.sender_id)
        .bind(message.text)
        .fetch_one(&self.pool)
        .await?;

        self.notify_changed(message.conversation_id).await;
        Ok(stored)
    }

    async fn touch_conversation(
        &self,
        id: &str,
        preview: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE conversations
            SET last_message = $2, updated_at = $3
            WHERE id = $1 AND updated_at <= $3
            "#,
        )
        .bind(id)
        .bind(preview)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn reconcile_preview(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE conversations c
            SET last_message = latest.text, updated_at = latest.sent_at
            FROM (
                SELECT text, sent_at
                FROM messages
                WHERE conversation_id = $1
                ORDER BY sent_at DESC, seq DESC
                LIMIT 1
            ) latest
            WHERE c.id = $1 AND c.updated_at <= latest.sent_at
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, StoreError> {
        Ok(sqlx::query_as::<_, Message>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id = $1 ORDER BY sent_at ASC, seq ASC"
        ))
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn mark_read(
        &self,
        conversation_id: &str,
        ids: &[Uuid],
        viewer_id: &str,
    ) -> Result<u64, StoreError> {
        // `read = FALSE` in the predicate keeps the flip one-way.
        let flipped = sqlx::query(
            r#"
            UPDATE messages
            SET read = TRUE
            WHERE conversation_id = $1
              AND id = ANY($2)
              AND sender_id <> $3
              AND read = FALSE
            "#,
        )
        .bind(conversation_id)
        .bind(ids.to_vec())
        .bind(viewer_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if flipped > 0 {
            self.notify_changed(conversation_id).await;
        }
        Ok(flipped)
    }

    async fn unread_count(&self, user_id: &str) -> Result<i64, StoreError> {
        Ok(sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM messages m
            JOIN conversations c ON c.id = m.conversation_id
            WHERE (c.recruiter_id = $1 OR c.candidate_id = $1)
              AND m.sender_id <> $1
              AND NOT m.read
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Cross-replica relay
// ────────────────────────────────────────────────────────────────────────────

/// Forwards `conversation_events` notifications into the local hub so
/// subscribers re-snapshot no matter which replica took the write.
pub async fn spawn_notification_relay(
    pool: &PgPool,
    hub: Arc<ConversationHub>,
) -> Result<JoinHandle<()>, StoreError> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(CONVERSATION_EVENTS_CHANNEL).await?;
    info!("Listening for {CONVERSATION_EVENTS_CHANNEL} notifications");

    Ok(tokio::spawn(async move {
        loop {
            match listener.recv().await {
                Ok(notification) => hub.publish(notification.payload()),
                Err(e) => {
                    warn!("Notification relay error, retrying in 1s: {e}");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::scoring::compute_match_score;
    use serde_json::json;

    fn profile_row(skills: Option<Value>) -> ProfileRow {
        ProfileRow {
            id: "c1".to_string(),
            skills,
            cgpa: 6.0,
            project_count: 3,
        }
    }

    fn posting_row(required_skills: Value) -> PostingRow {
        PostingRow {
            id: Uuid::nil(),
            title: "Backend intern".to_string(),
            required_skills,
            owner_id: "r1".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_malformed_profile_skills_decode_as_absent() {
        let profile = CandidateProfile::from(profile_row(Some(json!({"bogus": 1}))));
        assert_eq!(profile.skills, None);
        assert_eq!(profile.cgpa, 6.0);

        let posting = Posting::from(posting_row(json!([
            {"name": "Rust", "weight": 3, "min_level": 2}
        ])));
        let score = compute_match_score(&profile, &posting);
        assert_eq!(score.final_score, 0);
        assert!(score.gaps.is_empty());
    }

    #[test]
    fn test_malformed_requirements_decode_as_empty() {
        let posting = Posting::from(posting_row(json!({"bogus": 1})));
        assert!(posting.required_skills.is_empty());

        let profile = CandidateProfile::from(profile_row(Some(json!([
            {"name": "Rust", "level": 4}
        ]))));
        assert_eq!(compute_match_score(&profile, &posting).final_score, 0);
    }

    #[test]
    fn test_well_formed_rows_decode() {
        let profile = CandidateProfile::from(profile_row(Some(json!([
            {"name": "Rust", "level": 4}
        ]))));
        assert_eq!(
            profile.skills,
            Some(vec![Skill {
                name: "Rust".to_string(),
                level: 4
            }])
        );
        assert_eq!(CandidateProfile::from(profile_row(None)).skills, None);
    }

    #[test]
    fn test_to_json_encodes_requirements() {
        let encoded = to_json(&vec![RequirementSkill {
            name: "SQL".to_string(),
            weight: 2,
            min_level: 3,
        }])
        .unwrap();
        assert_eq!(encoded, json!([{"name": "SQL", "weight": 2, "min_level": 3}]));
    }
}
