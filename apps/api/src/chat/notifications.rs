//! Unread / notification aggregation for badges.

use serde::Serialize;

use crate::errors::AppError;
use crate::identity::CurrentUser;
use crate::models::chat::ShortlistRecord;
use crate::models::user::Role;
use crate::store::{with_read_retry, ChatStore, DirectoryStore, RetryPolicy};

#[derive(Debug, Clone, Serialize)]
pub struct NotificationSummary {
    pub unread_count: i64,
    /// Each record is itself the notification; there is no "seen" state.
    pub shortlists: Vec<ShortlistRecord>,
}

/// Unread messages from other parties across every conversation the user
/// takes part in.
pub async fn unread_count(
    store: &dyn ChatStore,
    retry: &RetryPolicy,
    user_id: &str,
) -> Result<i64, AppError> {
    Ok(with_read_retry(retry, move || store.unread_count(user_id)).await?)
}

pub async fn shortlist_notifications(
    store: &dyn DirectoryStore,
    retry: &RetryPolicy,
    candidate_id: &str,
) -> Result<Vec<ShortlistRecord>, AppError> {
    Ok(with_read_retry(retry, move || store.shortlists_for_candidate(candidate_id)).await?)
}

pub async fn summarize(
    chat: &dyn ChatStore,
    directory: &dyn DirectoryStore,
    retry: &RetryPolicy,
    user: &CurrentUser,
) -> Result<NotificationSummary, AppError> {
    let unread_count = unread_count(chat, retry, &user.id).await?;
    let shortlists = match user.role {
        Role::Student => shortlist_notifications(directory, retry, &user.id).await?,
        Role::Recruiter => Vec::new(),
    };
    Ok(NotificationSummary {
        unread_count,
        shortlists,
    })
}
