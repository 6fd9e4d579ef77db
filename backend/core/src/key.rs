/// Conversation key: the composite identity of one dialogue.
///
/// Combines the `user_id` and `conversation_id` supplied at login into a
/// stable value used to look up the conversation's history.
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationKey {
    pub user_id: String,
    pub conversation_id: String,
}

impl ConversationKey {
    pub fn new(user_id: impl Into<String>, conversation_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            conversation_id: conversation_id.into(),
        }
    }

    /// A short stable hash usable as a file identifier.
    pub fn hash(&self) -> String {
        // Length-prefixed so ("ab", "c") and ("a", "bc") never collide.
        let raw = format!(
            "{}:{}|{}",
            self.user_id.len(),
            self.user_id,
            self.conversation_id
        );
        let digest = Sha256::digest(raw.as_bytes());
        hex::encode(&digest[..8])
    }

    pub fn to_display_string(&self) -> String {
        format!(
            "user:{}/conversation:{}",
            self.user_id, self.conversation_id
        )
    }
}

impl std::fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable_and_distinct() {
        let a = ConversationKey::new("alice", "c1");
        assert_eq!(a.hash(), ConversationKey::new("alice", "c1").hash());
        assert_eq!(a.hash().len(), 16);
        assert_ne!(a.hash(), ConversationKey::new("alice", "c2").hash());
        assert_ne!(
            ConversationKey::new("ab", "c").hash(),
            ConversationKey::new("a", "bc").hash()
        );
    }

    #[test]
    fn test_display() {
        let key = ConversationKey::new("user_123", "conversation_123");
        assert_eq!(key.to_string(), "user:user_123/conversation:conversation_123");
    }
}
