//! Axum route handlers for conversations, messages and notifications.

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
    Json,
};
use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::chat::notifications::{summarize, NotificationSummary};
use crate::chat::resolver::resolve_or_create;
use crate::chat::stream::{MessageSnapshot, Subscription};
use crate::directory::service::require_candidate;
use crate::errors::AppError;
use crate::identity::CurrentUser;
use crate::models::chat::{Conversation, Message};
use crate::models::user::Role;
use crate::state::AppState;
use crate::store::with_read_retry;

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct OpenConversationRequest {
    pub candidate_id: String,
    pub posting_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/conversations
///
/// Recruiter opens (or re-opens) the conversation with a candidate about a
/// posting. Both must exist. Idempotent.
pub async fn handle_open_conversation(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<OpenConversationRequest>,
) -> Result<Json<Conversation>, AppError> {
    user.require(Role::Recruiter)?;

    let retry = state.retry_policy();
    let directory = state.directory.as_ref();
    let posting_id = request.posting_id;
    let candidate_id = request.candidate_id.trim();
    with_read_retry(&retry, move || directory.fetch_posting(posting_id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Posting {posting_id} not found")))?;
    require_candidate(directory, &retry, candidate_id).await?;

    let conversation =
        resolve_or_create(state.chat.as_ref(), &user.id, candidate_id, posting_id).await?;
    Ok(Json(conversation))
}

/// GET /api/v1/conversations
///
/// The caller's conversations, most recently active first.
pub async fn handle_list_conversations(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<Conversation>>, AppError> {
    let chat = state.chat.as_ref();
    let (user_id, role) = (user.id.as_str(), user.role);
    let conversations =
        with_read_retry(&state.retry_policy(), move || chat.conversations_for(user_id, role)).await?;
    Ok(Json(conversations))
}

/// GET /api/v1/conversations/:id/messages
pub async fn handle_get_messages(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(conversation_id): Path<String>,
) -> Result<Json<MessageSnapshot>, AppError> {
    let snapshot = state
        .message_stream()
        .snapshot(&conversation_id, &user.id)
        .await?;
    Ok(Json(snapshot))
}

/// POST /api/v1/conversations/:id/messages
pub async fn handle_send_message(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(conversation_id): Path<String>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<Message>, AppError> {
    let message = state
        .message_stream()
        .append(&conversation_id, &user.id, &request.text)
        .await?;
    Ok(Json(message))
}

/// GET /api/v1/conversations/:id/live
///
/// WebSocket feed. Every frame is a full `MessageSnapshot`; closing the
/// socket cancels the subscription.
pub async fn handle_live(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(conversation_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let subscription = state
        .message_stream()
        .subscribe(&conversation_id, &user.id)
        .await?;
    Ok(ws.on_upgrade(move |socket| pump_snapshots(socket, subscription)))
}

async fn pump_snapshots(mut socket: WebSocket, mut subscription: Subscription) {
    loop {
        tokio::select! {
            snapshot = subscription.next() => {
                let Some(snapshot) = snapshot else { break };
                let payload = match serde_json::to_string(&snapshot) {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!("Failed to encode snapshot: {e}");
                        continue;
                    }
                };
                if socket.send(WsMessage::Text(payload)).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    subscription.cancel();
    debug!("Live socket closed");
}

/// GET /api/v1/notifications
pub async fn handle_notifications(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<NotificationSummary>, AppError> {
    let summary = summarize(
        state.chat.as_ref(),
        state.directory.as_ref(),
        &state.retry_policy(),
        &user,
    )
    .await?;
    Ok(Json(summary))
}
