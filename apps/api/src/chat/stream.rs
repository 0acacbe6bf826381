//! Message log for one conversation: append, ordered snapshots, live
//! subscriptions and read-state tracking.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chat::hub::ConversationHub;
use crate::errors::AppError;
use crate::models::chat::{Conversation, Message, NewMessage};
use crate::store::{with_read_retry, ChatStore, RetryPolicy};

/// One delivery to a subscriber: the whole log, oldest first.
#[derive(Debug, Clone, Serialize)]
pub struct MessageSnapshot {
    pub conversation_id: String,
    pub messages: Vec<Message>,
}

#[derive(Clone)]
pub struct MessageStream {
    store: Arc<dyn ChatStore>,
    hub: Arc<ConversationHub>,
    retry: RetryPolicy,
    buffer: usize,
}

impl MessageStream {
    pub fn new(
        store: Arc<dyn ChatStore>,
        hub: Arc<ConversationHub>,
        retry: RetryPolicy,
        buffer: usize,
    ) -> Self {
        Self {
            store,
            hub,
            retry,
            buffer: buffer.max(1),
        }
    }

    /// Appends a message from `sender_id`. The store stamps the time.
    ///
    /// The preview update that follows is a separate write. If it fails the
    /// message still stands and a background reconcile repairs the preview.
    pub async fn append(
        &self,
        conversation_id: &str,
        sender_id: &str,
        text: &str,
    ) -> Result<Message, AppError> {
        if text.trim().is_empty() {
            return Err(AppError::Validation("text cannot be empty".to_string()));
        }
        let conversation = self
            .store
            .fetch_conversation(conversation_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Conversation {conversation_id} not found")))?;
        if !conversation.involves(sender_id) {
            return Err(AppError::Forbidden);
        }

        let message = self
            .store
            .insert_message(NewMessage {
                id: Uuid::new_v4(),
                conversation_id,
                sender_id,
                text,
            })
            .await?;
        self.hub.publish(conversation_id);
        debug!("Appended message {} to {conversation_id}", message.id);

        if let Err(e) = self
            .store
            .touch_conversation(conversation_id, &message.text, message.sent_at)
            .await
        {
            warn!("Preview update for {conversation_id} failed, scheduling reconcile: {e}");
            self.spawn_reconcile(conversation_id.to_string());
        }

        Ok(message)
    }

    fn spawn_reconcile(&self, conversation_id: String) {
        let store = Arc::clone(&self.store);
        let retry = RetryPolicy {
            // Reconcile is idempotent, so it can afford a few more tries.
            attempts: self.retry.attempts.max(5),
            base_delay: self.retry.base_delay,
        };
        tokio::spawn(async move {
            let store = store.as_ref();
            let id = conversation_id.as_str();
            match with_read_retry(&retry, move || store.reconcile_preview(id)).await {
                Ok(()) => info!("Reconciled preview for {id}"),
                Err(e) => warn!("Preview for {id} is still stale: {e}"),
            }
        });
    }

    /// Current ordered log for a participant. Unread messages from the other
    /// party are marked read as a side effect.
    pub async fn snapshot(
        &self,
        conversation_id: &str,
        viewer_id: &str,
    ) -> Result<MessageSnapshot, AppError> {
        self.authorize(conversation_id, viewer_id).await?;
        let store = self.store.as_ref();
        let messages = with_read_retry(&self.retry, move || store.messages(conversation_id)).await?;
        let unseen = unseen_ids(&messages, viewer_id);
        mark_seen(store, &self.hub, conversation_id, viewer_id, &unseen).await;
        Ok(MessageSnapshot {
            conversation_id: conversation_id.to_string(),
            messages,
        })
    }

    /// Opens a live subscription. The first snapshot is the full log; a new
    /// one follows every change. Each call starts from the beginning again.
    pub async fn subscribe(
        &self,
        conversation_id: &str,
        viewer_id: &str,
    ) -> Result<Subscription, AppError> {
        self.authorize(conversation_id, viewer_id).await?;

        // Watch before the first load so no change can slip in between.
        let changes = self.hub.watch(conversation_id);
        let (tx, rx) = mpsc::channel(self.buffer);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let feed = SubscriptionFeed {
            store: Arc::clone(&self.store),
            hub: Arc::clone(&self.hub),
            retry: self.retry,
            conversation_id: conversation_id.to_string(),
            viewer_id: viewer_id.to_string(),
        };
        tokio::spawn(feed.run(changes, tx, shutdown_rx));

        debug!("Subscribed {viewer_id} to {conversation_id}");
        Ok(Subscription {
            snapshots: rx,
            shutdown: shutdown_tx,
        })
    }

    async fn authorize(&self, conversation_id: &str, viewer_id: &str) -> Result<Conversation, AppError> {
        let store = self.store.as_ref();
        let conversation = with_read_retry(&self.retry, move || store.fetch_conversation(conversation_id))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Conversation {conversation_id} not found")))?;
        if !conversation.involves(viewer_id) {
            return Err(AppError::Forbidden);
        }
        Ok(conversation)
    }
}

/// Handle to a live feed. Dropping it, or calling `cancel`, stops the feed;
/// appends already issued are unaffected.
pub struct Subscription {
    snapshots: mpsc::Receiver<MessageSnapshot>,
    shutdown: watch::Sender<bool>,
}

impl Subscription {
    /// Next snapshot, or `None` once the feed has stopped.
    pub async fn next(&mut self) -> Option<MessageSnapshot> {
        self.snapshots.recv().await
    }

    /// Idempotent.
    pub fn cancel(&self) {
        self.shutdown.send_replace(true);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

struct SubscriptionFeed {
    store: Arc<dyn ChatStore>,
    hub: Arc<ConversationHub>,
    retry: RetryPolicy,
    conversation_id: String,
    viewer_id: String,
}

impl SubscriptionFeed {
    async fn run(
        self,
        mut changes: broadcast::Receiver<()>,
        tx: mpsc::Sender<MessageSnapshot>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let store = self.store.as_ref();
        let id = self.conversation_id.as_str();

        while !*shutdown.borrow() {
            match with_read_retry(&self.retry, move || store.messages(id)).await {
                Ok(messages) => {
                    let unseen = unseen_ids(&messages, &self.viewer_id);
                    let snapshot = MessageSnapshot {
                        conversation_id: self.conversation_id.clone(),
                        messages,
                    };
                    tokio::select! {
                        sent = tx.send(snapshot) => {
                            if sent.is_err() {
                                break;
                            }
                        }
                        _ = shutdown.changed() => break,
                    }
                    mark_seen(store, &self.hub, id, &self.viewer_id, &unseen).await;
                }
                // A failed load never ends the subscription; the next change retries.
                Err(e) => warn!("Snapshot load for {id} failed, waiting for next change: {e}"),
            }

            tokio::select! {
                _ = shutdown.changed() => break,
                change = changes.recv() => match change {
                    Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }

        debug!("Subscription for {} on {id} ended", self.viewer_id);
    }
}

/// Messages the viewer is seeing for the first time: unread and not their own.
fn unseen_ids(messages: &[Message], viewer_id: &str) -> Vec<Uuid> {
    messages
        .iter()
        .filter(|m| !m.read && m.sender_id != viewer_id)
        .map(|m| m.id)
        .collect()
}

/// Flips read flags. Failures are logged and swallowed; delivery never
/// depends on this.
async fn mark_seen(
    store: &dyn ChatStore,
    hub: &ConversationHub,
    conversation_id: &str,
    viewer_id: &str,
    unseen: &[Uuid],
) {
    if unseen.is_empty() {
        return;
    }
    match store.mark_read(conversation_id, unseen, viewer_id).await {
        Ok(0) => {}
        Ok(flipped) => {
            debug!("{viewer_id} read {flipped} message(s) in {conversation_id}");
            hub.publish(conversation_id);
        }
        Err(e) => debug!("Ignoring mark-read failure in {conversation_id}: {e}"),
    }
}
