/// Development review loop.
///
/// A reviewer confirms each predicted intent. Confirmed turns are dispatched
/// normally; rejected ones are recorded in the new-intent log as training
/// data and never reach a handler.
use std::sync::Arc;

use async_trait::async_trait;
use concierge_core::{ConciergeError, ConversationKey};
use concierge_memory::IntentLog;
use tracing::info;

use crate::dispatcher::Dispatcher;

pub const NO_INTENT_REPLY: &str = "I'm sorry, I don't understand that intention.";
pub const INTENT_ADDED_REPLY: &str = "New intention added successfully.";
pub const INVALID_ANSWER_REPLY: &str = "You should enter 'Y' or 'N'. Please try again.";

/// The person reviewing predictions.
#[async_trait]
pub trait IntentReviewer: Send + Sync {
    /// Raw answer to `It's correct? [Y/N]` for the predicted intent.
    async fn confirm(&self, predicted: &str) -> String;

    /// The correct intention, picked from `options`. `None` aborts the review.
    async fn choose_intention(&self, options: &[String]) -> Option<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAnswer {
    Yes,
    No,
    Invalid,
}

impl ReviewAnswer {
    pub fn parse(answer: &str) -> Self {
        match answer.trim().to_lowercase().as_str() {
            "y" => ReviewAnswer::Yes,
            "n" => ReviewAnswer::No,
            _ => ReviewAnswer::Invalid,
        }
    }
}

pub struct DevSession {
    dispatcher: Arc<Dispatcher>,
    intent_log: IntentLog,
    intentions: Vec<String>,
    reviewer: Arc<dyn IntentReviewer>,
}

impl DevSession {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        intent_log: IntentLog,
        intentions: Vec<String>,
        reviewer: Arc<dyn IntentReviewer>,
    ) -> Self {
        Self {
            dispatcher,
            intent_log,
            intentions,
            reviewer,
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub async fn process(&self, key: &ConversationKey, text: &str) -> Result<String, ConciergeError> {
        let Some(intent) = self.dispatcher.classify(text).await else {
            return Ok(NO_INTENT_REPLY.to_string());
        };

        let answer = self.reviewer.confirm(&intent).await;
        match ReviewAnswer::parse(&answer) {
            ReviewAnswer::Yes => self.dispatcher.dispatch_intent(key, text, Some(&intent)).await,
            ReviewAnswer::No => {
                let Some(chosen) = self.reviewer.choose_intention(&self.intentions).await else {
                    return Ok("No intention selected.".to_string());
                };
                let id = self.intent_log.append(&chosen, text).await?;
                info!(id, predicted = %intent, chosen = %chosen, "Reviewer corrected intent");
                Ok(INTENT_ADDED_REPLY.to_string())
            }
            ReviewAnswer::Invalid => Ok(INVALID_ANSWER_REPLY.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{Handler, HandlerOutcome, Reply, SessionContext};
    use crate::registry::HandlerRegistry;
    use concierge_memory::SessionStore;
    use concierge_routing::StaticClassifier;
    use std::sync::Mutex;

    struct Scripted {
        answer: &'static str,
        choice: Option<&'static str>,
        asked: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl IntentReviewer for Scripted {
        async fn confirm(&self, predicted: &str) -> String {
            self.asked.lock().unwrap().push(predicted.to_string());
            self.answer.to_string()
        }
        async fn choose_intention(&self, options: &[String]) -> Option<String> {
            self.choice.filter(|c| options.iter().any(|o| o == c)).map(str::to_string)
        }
    }

    struct Echo;

    #[async_trait]
    impl Handler for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        async fn invoke(&self, text: &str, _: &SessionContext) -> Result<HandlerOutcome, ConciergeError> {
            Ok(HandlerOutcome::Reply(Reply::turn(text, format!("echo: {text}"))))
        }
    }

    fn session(
        dir: &std::path::Path,
        answer: &'static str,
        choice: Option<&'static str>,
    ) -> (DevSession, Arc<Scripted>) {
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(StaticClassifier::new().with_intent("where is my order", "order_status")),
            Arc::new(
                HandlerRegistry::builder()
                    .register("order_status", Arc::new(Echo))
                    .build(),
            ),
            Arc::new(SessionStore::new()),
        ));
        let reviewer = Arc::new(Scripted { answer, choice, asked: Mutex::new(Vec::new()) });
        let dev = DevSession::new(
            dispatcher,
            IntentLog::new(dir.join("new_intentions.json")),
            vec!["create_order".into(), "order_status".into()],
            reviewer.clone(),
        );
        (dev, reviewer)
    }

    fn key() -> ConversationKey {
        ConversationKey::new("dev", "review")
    }

    #[test]
    fn test_parse_answer() {
        assert_eq!(ReviewAnswer::parse(" Y "), ReviewAnswer::Yes);
        assert_eq!(ReviewAnswer::parse("n"), ReviewAnswer::No);
        assert_eq!(ReviewAnswer::parse("yes"), ReviewAnswer::Invalid);
    }

    #[tokio::test]
    async fn test_no_intent_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let (dev, reviewer) = session(dir.path(), "y", None);
        assert_eq!(dev.process(&key(), "gibberish").await.unwrap(), NO_INTENT_REPLY);
        assert!(reviewer.asked.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_confirmed_intent_is_dispatched() {
        let dir = tempfile::tempdir().unwrap();
        let (dev, reviewer) = session(dir.path(), "Y", None);
        let reply = dev.process(&key(), "where is my order").await.unwrap();
        assert_eq!(reply, "echo: where is my order");
        assert_eq!(*reviewer.asked.lock().unwrap(), vec!["order_status".to_string()]);
        assert_eq!(dev.dispatcher().sessions().get_history(&key()).await.len().await, 2);
    }

    #[tokio::test]
    async fn test_rejected_intent_is_logged() {
        let dir = tempfile::tempdir().unwrap();
        let (dev, _) = session(dir.path(), "n", Some("create_order"));
        let reply = dev.process(&key(), "where is my order").await.unwrap();
        assert_eq!(reply, INTENT_ADDED_REPLY);

        let log = IntentLog::new(dir.path().join("new_intentions.json"));
        let records = log.records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].intention, "create_order");
        assert_eq!(records[0].message, "where is my order");
        assert_eq!(records[0].id, 1);
        assert!(dev.dispatcher().sessions().get_history(&key()).await.is_empty().await);
    }

    #[tokio::test]
    async fn test_invalid_answer_asks_again() {
        let dir = tempfile::tempdir().unwrap();
        let (dev, _) = session(dir.path(), "maybe", None);
        assert_eq!(
            dev.process(&key(), "where is my order").await.unwrap(),
            INVALID_ANSWER_REPLY
        );
        assert!(!dir.path().join("new_intentions.json").exists());
    }
}
