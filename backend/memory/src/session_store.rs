//! Per-conversation message histories.
//!
//! Histories live in an arena keyed by [`ConversationKey`]. The arena map is
//! only locked for lookup/insert; each slot carries its own history mutex and
//! its own turn lock, so work on different conversations never contends.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use concierge_core::{ConciergeError, ConversationKey, Message};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info, warn};

use crate::transcript::TranscriptWriter;

/// Read-only handle to one conversation's ordered message log.
///
/// Every handle for the same key points at the same sequence; appends go
/// through [`SessionStore::append`].
#[derive(Debug, Clone, Default)]
pub struct History {
    messages: Arc<Mutex<Vec<Message>>>,
}

impl History {
    /// Copy of the messages, oldest first.
    pub async fn snapshot(&self) -> Vec<Message> {
        self.messages.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.messages.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.lock().await.is_empty()
    }

    pub async fn last(&self) -> Option<Message> {
        self.messages.lock().await.last().cloned()
    }

    /// True when both handles refer to the same underlying sequence.
    pub fn same_as(&self, other: &History) -> bool {
        Arc::ptr_eq(&self.messages, &other.messages)
    }

    async fn extend(&self, new_messages: Vec<Message>) -> usize {
        let mut messages = self.messages.lock().await;
        messages.extend(new_messages);
        messages.len()
    }

    async fn reset(&self) {
        self.messages.lock().await.clear();
    }
}

#[derive(Default)]
struct Slot {
    history: History,
    turn: Arc<Mutex<()>>,
}

/// Exclusive right to run one turn for a conversation.
///
/// Waiters are served in FIFO order; the lock is released on drop.
pub struct TurnGuard {
    key: ConversationKey,
    _guard: OwnedMutexGuard<()>,
}

impl TurnGuard {
    pub fn key(&self) -> &ConversationKey {
        &self.key
    }
}

/// Owns every conversation history for the life of the process.
#[derive(Default)]
pub struct SessionStore {
    slots: RwLock<HashMap<ConversationKey, Arc<Slot>>>,
    transcripts: Option<TranscriptWriter>,
}

impl SessionStore {
    /// Store without a transcript sink; `persist` fails with a persistence error.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transcripts(writer: TranscriptWriter) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            transcripts: Some(writer),
        }
    }

    async fn slot(&self, key: &ConversationKey) -> Arc<Slot> {
        if let Some(slot) = self.slots.read().await.get(key) {
            return Arc::clone(slot);
        }

        let mut slots = self.slots.write().await;
        let slot = slots.entry(key.clone()).or_insert_with(|| {
            debug!(key = %key, "Created conversation history");
            Arc::new(Slot::default())
        });
        Arc::clone(slot)
    }

    /// Existing history for `key`, or a freshly registered empty one.
    pub async fn get_history(&self, key: &ConversationKey) -> History {
        self.slot(key).await.history.clone()
    }

    /// Append `messages` in argument order as one atomic step.
    pub async fn append<I>(&self, key: &ConversationKey, messages: I)
    where
        I: IntoIterator<Item = Message>,
    {
        let messages: Vec<Message> = messages.into_iter().collect();
        if messages.is_empty() {
            return;
        }
        let added = messages.len();
        let total = self.slot(key).await.history.extend(messages).await;
        debug!(key = %key, added, total, "Appended to history");
    }

    /// Reset the key's history to empty. Existing handles observe the reset.
    pub async fn clear(&self, key: &ConversationKey) {
        self.slot(key).await.history.reset().await;
        info!(key = %key, "Cleared conversation history");
    }

    /// Write the key's transcript to the configured sink.
    pub async fn persist(&self, key: &ConversationKey) -> Result<PathBuf, ConciergeError> {
        let writer = self.transcripts.as_ref().ok_or_else(|| {
            ConciergeError::Persistence("no transcript directory configured".to_string())
        })?;

        let messages = self.get_history(key).await.snapshot().await;
        match writer.write(key, &messages).await {
            Ok(path) => {
                info!(key = %key, path = %path.display(), lines = messages.len(), "Persisted transcript");
                Ok(path)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Transcript persistence failed");
                Err(e)
            }
        }
    }

    /// Wait for, then hold, the single-writer turn lock of `key`.
    pub async fn begin_turn(&self, key: &ConversationKey) -> TurnGuard {
        let turn = Arc::clone(&self.slot(key).await.turn);
        TurnGuard {
            key: key.clone(),
            _guard: turn.lock_owned().await,
        }
    }

    pub async fn keys(&self) -> Vec<ConversationKey> {
        let mut keys: Vec<ConversationKey> = self.slots.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn key(user: &str, conversation: &str) -> ConversationKey {
        ConversationKey::new(user, conversation)
    }

    #[tokio::test]
    async fn test_get_history_is_idempotent() {
        let store = SessionStore::new();
        let k = key("alice", "c1");

        let first = store.get_history(&k).await;
        let second = store.get_history(&k).await;
        assert!(first.same_as(&second));
        assert_eq!(store.len().await, 1);

        store.append(&k, [Message::user("hello")]).await;
        assert_eq!(second.snapshot().await, vec![Message::user("hello")]);
        assert_eq!(first.len().await, 1);
    }

    #[tokio::test]
    async fn test_append_preserves_argument_order() {
        let store = SessionStore::new();
        let k = key("alice", "c1");
        store
            .append(&k, [Message::user("one"), Message::assistant("two")])
            .await;
        store.append(&k, [Message::user("three")]).await;
        store.append(&k, Vec::new()).await;

        let contents: Vec<String> = store
            .get_history(&k)
            .await
            .snapshot()
            .await
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_key_isolation() {
        let store = SessionStore::new();
        let a = key("alice", "c1");
        let b = key("bob", "c1");

        for i in 0..5 {
            store.append(&a, [Message::user(format!("a{i}"))]).await;
            if i % 2 == 0 {
                store.append(&b, [Message::user(format!("b{i}"))]).await;
            }
        }

        let a_history = store.get_history(&a).await.snapshot().await;
        let b_history = store.get_history(&b).await.snapshot().await;
        assert_eq!(a_history.len(), 5);
        assert_eq!(b_history.len(), 3);
        assert!(a_history.iter().all(|m| m.content.starts_with('a')));
        assert!(b_history.iter().all(|m| m.content.starts_with('b')));
    }

    #[tokio::test]
    async fn test_clear_resets_shared_handle() {
        let store = SessionStore::new();
        let k = key("alice", "c1");
        let handle = store.get_history(&k).await;
        store.append(&k, [Message::user("hi")]).await;

        store.clear(&k).await;
        assert!(handle.is_empty().await);

        store.append(&k, [Message::user("again")]).await;
        assert_eq!(handle.last().await, Some(Message::user("again")));
    }

    #[tokio::test]
    async fn test_concurrent_turns_are_serialized() {
        let store = Arc::new(SessionStore::new());
        let k = key("alice", "c1");

        let mut tasks = Vec::new();
        for i in 0..50 {
            let store = Arc::clone(&store);
            let k = k.clone();
            tasks.push(tokio::spawn(async move {
                let _turn = store.begin_turn(&k).await;
                let history_len = store.get_history(&k).await.len().await;
                tokio::task::yield_now().await;
                store
                    .append(&k, [Message::user(format!("q{i}")), Message::assistant(format!("a{i}"))])
                    .await;
                history_len
            }));
        }

        let mut seen_lengths = Vec::new();
        for task in tasks {
            seen_lengths.push(task.await.unwrap());
        }
        seen_lengths.sort();
        let expected: Vec<usize> = (0..50).map(|i| i * 2).collect();
        assert_eq!(seen_lengths, expected);

        let history = store.get_history(&k).await.snapshot().await;
        assert_eq!(history.len(), 100);
        for pair in history.chunks(2) {
            let n = pair[0].content.trim_start_matches('q');
            assert_eq!(pair[1].content, format!("a{n}"));
        }
    }

    #[tokio::test]
    async fn test_turn_lock_does_not_block_other_keys() {
        let store = Arc::new(SessionStore::new());
        let a = key("alice", "c1");
        let b = key("bob", "c1");

        let _held = store.begin_turn(&a).await;
        let other = tokio::time::timeout(Duration::from_secs(1), store.begin_turn(&b)).await;
        assert!(other.is_ok());

        let same = tokio::time::timeout(Duration::from_millis(50), store.begin_turn(&a)).await;
        assert!(same.is_err());
    }

    #[tokio::test]
    async fn test_persist_without_sink_fails_without_touching_history() {
        let store = SessionStore::new();
        let k = key("alice", "c1");
        store.append(&k, [Message::user("hi")]).await;

        let err = store.persist(&k).await.unwrap_err();
        assert!(matches!(err, ConciergeError::Persistence(_)));
        assert_eq!(store.get_history(&k).await.len().await, 1);
    }

    #[tokio::test]
    async fn test_persist_writes_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::with_transcripts(TranscriptWriter::new(dir.path()));
        let k = key("user_123", "conversation_123");
        store
            .append(&k, [Message::user("Hi"), Message::assistant("Hello! How can I help?")])
            .await;

        let path = store.persist(&k).await.unwrap();
        let written = std::fs::read_to_string(path).unwrap();
        assert_eq!(written, "User: Hi\nBot: Hello! How can I help?\n");
        assert_eq!(store.keys().await, vec![k]);
    }
}
