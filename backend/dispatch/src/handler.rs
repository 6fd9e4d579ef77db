/// Handler contract.
///
/// A handler turns one customer message into a reply. It reads the
/// conversation through [`SessionContext`] and never writes to it: the
/// messages to record travel back in [`Reply::append`].
use async_trait::async_trait;
use concierge_agent::StageOutput;
use concierge_core::{ConciergeError, ConversationKey, Message};
use concierge_memory::History;

/// Context passed to every handler.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub key: ConversationKey,
    pub history: History,
}

impl SessionContext {
    /// The authenticated customer.
    pub fn customer_id(&self) -> &str {
        &self.key.user_id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    /// Appended to the conversation, in order, once the turn succeeds.
    pub append: Vec<Message>,
}

impl Reply {
    /// A reply recording `[user(input), assistant(text)]`.
    pub fn turn(input: &str, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            append: vec![Message::user(input), Message::assistant(text.clone())],
            text,
        }
    }
}

impl From<StageOutput> for Reply {
    fn from(output: StageOutput) -> Self {
        Self {
            text: output.text,
            append: output.append,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutcome {
    Reply(Reply),
    /// Hand the message to the handler registered for this intent.
    Reroute(String),
}

#[async_trait]
pub trait Handler: Send + Sync {
    fn name(&self) -> &str;

    async fn invoke(
        &self,
        text: &str,
        session: &SessionContext,
    ) -> Result<HandlerOutcome, ConciergeError>;
}
