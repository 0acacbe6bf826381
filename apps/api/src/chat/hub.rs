use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::broadcast;

/// In-process fan-out of "this conversation changed" signals.
///
/// Signals carry no payload: a subscriber that receives one reloads its
/// snapshot from the store, so duplicates and lag are harmless.
pub struct ConversationHub {
    channels: Mutex<HashMap<String, broadcast::Sender<()>>>,
    capacity: usize,
}

impl ConversationHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn watch(&self, conversation_id: &str) -> broadcast::Receiver<()> {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        // Drop channels whose subscribers all went away without a later publish.
        channels.retain(|_, sender| sender.receiver_count() > 0);
        channels
            .entry(conversation_id.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    pub fn publish(&self, conversation_id: &str) {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        let Some(sender) = channels.get(conversation_id) else {
            return;
        };
        if sender.send(()).is_err() {
            // Nobody is watching any more.
            channels.remove(conversation_id);
        }
    }

    #[cfg(test)]
    pub fn watched(&self) -> usize {
        self.channels.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Default for ConversationHub {
    fn default() -> Self {
        Self::new(64)
    }
}
