/// Turn dispatcher: classify a message, resolve its handler, run it, and
/// record the turn.
///
/// One turn per conversation runs at a time (the session store's turn lock
/// is held for the whole turn). History is appended once, after the handler
/// succeeds; a failed or timed-out turn leaves it untouched.
use std::sync::Arc;
use std::time::Duration;

use concierge_core::{ConciergeError, ConversationKey};
use concierge_logging::{TurnEvent, TurnEventLogger};
use concierge_memory::SessionStore;
use concierge_routing::{Classification, IntentClassifier, top_intent};
use tracing::{info, instrument, warn};

use crate::handler::{Handler, HandlerOutcome, Reply, SessionContext};
use crate::registry::HandlerRegistry;

pub const DEFAULT_TURN_TIMEOUT: Duration = Duration::from_secs(120);

/// Result of one turn as seen by a front end.
#[derive(Debug)]
pub enum TurnOutcome {
    Delivered(String),
    Rejected {
        error: ConciergeError,
        /// Customer-facing explanation.
        message: String,
    },
}

pub struct Dispatcher {
    classifier: Arc<dyn IntentClassifier>,
    registry: Arc<HandlerRegistry>,
    sessions: Arc<SessionStore>,
    turn_timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new(
        classifier: Arc<dyn IntentClassifier>,
        registry: Arc<HandlerRegistry>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            classifier,
            registry,
            sessions,
            turn_timeout: Some(DEFAULT_TURN_TIMEOUT),
        }
    }

    /// `None` disables the per-invocation timeout.
    pub fn with_turn_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.turn_timeout = timeout;
        self
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Top intent for `text`, or `None` when classification is unusable.
    pub async fn classify(&self, text: &str) -> Option<String> {
        let routes = match self.classifier.classify(text).await {
            Ok(routes) => routes,
            Err(e) => {
                warn!(error = %e, "Classifier failed, treating as no intent");
                return None;
            }
        };

        match top_intent(&routes) {
            Classification::Intent(intent) => Some(intent),
            Classification::Ambiguous => None,
            Classification::Malformed(detail) => {
                warn!(error = %ConciergeError::ClassificationMalformed(detail), "Ignoring malformed route");
                None
            }
        }
    }

    /// Run one turn: classify, resolve, invoke, append.
    #[instrument(skip_all, fields(conversation = %key.hash()))]
    pub async fn dispatch(&self, key: &ConversationKey, text: &str) -> Result<String, ConciergeError> {
        let conversation = key.hash();
        TurnEventLogger::log_event(&conversation, TurnEvent::Received { text: text.to_string() });

        let _turn = self.sessions.begin_turn(key).await;
        let intent = self.classify(text).await;
        TurnEventLogger::log_event(&conversation, TurnEvent::Classified { intent: intent.clone() });

        self.finish(&conversation, self.run_locked(key, text, intent.as_deref()).await)
    }

    /// Run one turn with an intent decided elsewhere (e.g. confirmed by a reviewer).
    pub async fn dispatch_intent(
        &self,
        key: &ConversationKey,
        text: &str,
        intent: Option<&str>,
    ) -> Result<String, ConciergeError> {
        let conversation = key.hash();
        TurnEventLogger::log_event(&conversation, TurnEvent::Received { text: text.to_string() });

        let _turn = self.sessions.begin_turn(key).await;
        TurnEventLogger::log_event(
            &conversation,
            TurnEvent::Classified { intent: intent.map(str::to_string) },
        );

        self.finish(&conversation, self.run_locked(key, text, intent).await)
    }

    /// Like [`Dispatcher::dispatch`], but every failure becomes a customer-facing message.
    pub async fn handle_turn(&self, key: &ConversationKey, text: &str) -> TurnOutcome {
        match self.dispatch(key, text).await {
            Ok(reply) => TurnOutcome::Delivered(reply),
            Err(error) => TurnOutcome::Rejected {
                message: user_message(&error),
                error,
            },
        }
    }

    fn finish(
        &self,
        conversation: &str,
        result: Result<Reply, ConciergeError>,
    ) -> Result<String, ConciergeError> {
        match result {
            Ok(reply) => {
                TurnEventLogger::log_event(
                    conversation,
                    TurnEvent::Delivered {
                        reply: reply.text.clone(),
                        appended: reply.append.len(),
                    },
                );
                Ok(reply.text)
            }
            Err(error) => {
                TurnEventLogger::log_event(conversation, TurnEvent::Rejected { error: error.to_string() });
                Err(error)
            }
        }
    }

    async fn run_locked(
        &self,
        key: &ConversationKey,
        text: &str,
        intent: Option<&str>,
    ) -> Result<Reply, ConciergeError> {
        let conversation = key.hash();
        let session = SessionContext {
            key: key.clone(),
            history: self.sessions.get_history(key).await,
        };

        let handler = self.registry.resolve(intent)?;
        TurnEventLogger::log_event(
            &conversation,
            TurnEvent::Resolved { handler: handler.name().to_string() },
        );

        let reply = match self.invoke(handler.as_ref(), text, &session).await? {
            HandlerOutcome::Reply(reply) => reply,
            HandlerOutcome::Reroute(label) => {
                TurnEventLogger::log_event(&conversation, TurnEvent::Rerouted { intent: label.clone() });
                let handler = self
                    .registry
                    .get(&label)
                    .ok_or_else(|| ConciergeError::HandlerNotFound(label.clone()))?;
                info!(intent = %label, handler = %handler.name(), "Re-routing turn");

                match self.invoke(handler.as_ref(), text, &session).await? {
                    HandlerOutcome::Reply(reply) => reply,
                    HandlerOutcome::Reroute(second) => {
                        warn!(first = %label, second = %second, "Refusing a second re-route");
                        return Err(ConciergeError::HandlerNotFound(second));
                    }
                }
            }
        };

        self.sessions.append(key, reply.append.clone()).await;
        Ok(reply)
    }

    async fn invoke(
        &self,
        handler: &dyn Handler,
        text: &str,
        session: &SessionContext,
    ) -> Result<HandlerOutcome, ConciergeError> {
        let Some(limit) = self.turn_timeout else {
            return handler.invoke(text, session).await;
        };
        match tokio::time::timeout(limit, handler.invoke(text, session)).await {
            Ok(result) => result,
            Err(_) => Err(ConciergeError::generation(
                handler.name(),
                format!("no reply within {}s", limit.as_secs()),
            )),
        }
    }
}

/// Customer-facing text for a failed turn.
pub fn user_message(error: &ConciergeError) -> String {
    match error {
        ConciergeError::ClassificationAmbiguous
        | ConciergeError::ClassificationMalformed(_)
        | ConciergeError::HandlerNotFound(_) => {
            "I'm sorry, I couldn't work out what you need. Could you rephrase your request?".to_string()
        }
        ConciergeError::Unauthorized { .. } => "You are not authorized to view this order.".to_string(),
        ConciergeError::Generation { .. }
        | ConciergeError::MalformedOutput { .. }
        | ConciergeError::Other(_) => {
            "Something went wrong while preparing your answer.".to_string()
        }
        ConciergeError::Persistence(_) => "Your conversation could not be saved.".to_string(),
        ConciergeError::ClassifierLoad(_) | ConciergeError::Storage(_) | ConciergeError::Config(_) => {
            "The assistant is not available right now.".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use concierge_core::Message;
    use concierge_routing::{IntentRoute, StaticClassifier};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Echoes the text, optionally after a delay, counting invocations.
    struct Echo {
        name: &'static str,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl Echo {
        fn new(name: &'static str) -> Arc<Self> {
            Arc::new(Self { name, delay: Duration::ZERO, calls: AtomicUsize::new(0) })
        }
    }

    #[async_trait]
    impl Handler for Echo {
        fn name(&self) -> &str {
            self.name
        }
        async fn invoke(&self, text: &str, _: &SessionContext) -> Result<HandlerOutcome, ConciergeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(HandlerOutcome::Reply(Reply::turn(text, format!("{}: {}", self.name, text))))
        }
    }

    /// Always re-routes to a fixed label.
    struct Rerouter(&'static str);

    #[async_trait]
    impl Handler for Rerouter {
        fn name(&self) -> &str {
            "rerouter"
        }
        async fn invoke(&self, _: &str, _: &SessionContext) -> Result<HandlerOutcome, ConciergeError> {
            Ok(HandlerOutcome::Reroute(self.0.to_string()))
        }
    }

    struct Failing;

    #[async_trait]
    impl Handler for Failing {
        fn name(&self) -> &str {
            "failing"
        }
        async fn invoke(&self, _: &str, _: &SessionContext) -> Result<HandlerOutcome, ConciergeError> {
            Err(ConciergeError::generation("mock", "upstream 503"))
        }
    }

    fn key() -> ConversationKey {
        ConversationKey::new("alice", "c1")
    }

    fn dispatcher(classifier: StaticClassifier, registry: HandlerRegistry) -> Dispatcher {
        Dispatcher::new(
            Arc::new(classifier),
            Arc::new(registry),
            Arc::new(SessionStore::new()),
        )
    }

    #[tokio::test]
    async fn test_known_intent_reaches_its_handler_and_appends() {
        let orders = Echo::new("orders");
        let d = dispatcher(
            StaticClassifier::new().with_intent("where is my order", "order_status"),
            HandlerRegistry::builder()
                .register("order_status", orders.clone())
                .fallback(Echo::new("fallback"))
                .build(),
        );

        let reply = d.dispatch(&key(), "where is my order").await.unwrap();
        assert_eq!(reply, "orders: where is my order");
        let history = d.sessions().get_history(&key()).await.snapshot().await;
        assert_eq!(
            history,
            vec![Message::user("where is my order"), Message::assistant("orders: where is my order")]
        );
    }

    #[tokio::test]
    async fn test_unusable_classification_uses_fallback() {
        let fallback = Echo::new("fallback");
        let d = dispatcher(
            StaticClassifier::new()
                .with_answer("malformed", vec![IntentRoute::malformed("number (3)")])
                .with_answer("blank", vec![IntentRoute::named("   ", 0.9)])
                .with_intent("unknown", "refunds"),
            HandlerRegistry::builder().fallback(fallback.clone()).build(),
        );

        for text in ["gibberish xyzzy", "malformed", "blank", "unknown"] {
            assert_eq!(d.dispatch(&key(), text).await.unwrap(), format!("fallback: {text}"));
        }
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_reroute_reaches_named_handler_once() {
        let orders = Echo::new("orders");
        let d = dispatcher(
            StaticClassifier::new(),
            HandlerRegistry::builder()
                .register("order_status", orders.clone())
                .fallback(Arc::new(Rerouter("order_status")))
                .build(),
        );

        assert_eq!(d.dispatch(&key(), "hmm").await.unwrap(), "orders: hmm");
        assert_eq!(orders.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fallback_is_bounded_to_one_reroute() {
        let d = dispatcher(
            StaticClassifier::new(),
            HandlerRegistry::builder()
                .register("loop", Arc::new(Rerouter("loop")))
                .fallback(Arc::new(Rerouter("loop")))
                .build(),
        );

        let err = d.dispatch(&key(), "anything").await.unwrap_err();
        assert!(matches!(err, ConciergeError::HandlerNotFound(ref label) if label == "loop"));
        assert!(d.sessions().get_history(&key()).await.is_empty().await);
    }

    #[tokio::test]
    async fn test_reroute_to_unknown_label_fails_loudly() {
        let d = dispatcher(
            StaticClassifier::new(),
            HandlerRegistry::builder()
                .fallback(Arc::new(Rerouter("refunds")))
                .build(),
        );

        match d.handle_turn(&key(), "refund please").await {
            TurnOutcome::Rejected { error, message } => {
                assert!(matches!(error, ConciergeError::HandlerNotFound(ref l) if l == "refunds"));
                assert!(message.contains("rephrase"));
            }
            TurnOutcome::Delivered(reply) => panic!("unexpected reply {reply}"),
        }
    }

    #[tokio::test]
    async fn test_failed_turn_appends_nothing() {
        let d = dispatcher(
            StaticClassifier::new().with_intent("buy", "create_order"),
            HandlerRegistry::builder()
                .register("create_order", Arc::new(Failing))
                .build(),
        );

        let outcome = d.handle_turn(&key(), "buy").await;
        assert!(matches!(outcome, TurnOutcome::Rejected { error: ConciergeError::Generation { .. }, .. }));
        assert!(d.sessions().get_history(&key()).await.is_empty().await);
    }

    #[tokio::test]
    async fn test_timeout_is_generation_error() {
        let slow = Arc::new(Echo { name: "slow", delay: Duration::from_secs(5), calls: AtomicUsize::new(0) });
        let d = dispatcher(
            StaticClassifier::new(),
            HandlerRegistry::builder().fallback(slow).build(),
        )
        .with_turn_timeout(Some(Duration::from_millis(20)));

        let err = d.dispatch(&key(), "hello").await.unwrap_err();
        assert!(matches!(err, ConciergeError::Generation { ref provider, .. } if provider == "slow"));
        assert!(d.sessions().get_history(&key()).await.is_empty().await);
    }

    #[tokio::test]
    async fn test_no_fallback_and_no_intent_is_handler_not_found() {
        let d = dispatcher(StaticClassifier::new(), HandlerRegistry::builder().build());
        assert!(matches!(
            d.dispatch(&key(), "hello").await,
            Err(ConciergeError::HandlerNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_turns_on_one_key_keep_pairs_adjacent() {
        let handler = Arc::new(Echo { name: "bot", delay: Duration::from_millis(1), calls: AtomicUsize::new(0) });
        let d = Arc::new(dispatcher(
            StaticClassifier::new(),
            HandlerRegistry::builder().fallback(handler).build(),
        ));

        let tasks: Vec<_> = (0..50)
            .map(|i| {
                let d = Arc::clone(&d);
                tokio::spawn(async move { d.dispatch(&key(), &format!("q{i}")).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let history = d.sessions().get_history(&key()).await.snapshot().await;
        assert_eq!(history.len(), 100);
        for pair in history.chunks(2) {
            assert_eq!(pair[0].role, concierge_core::Role::User);
            assert_eq!(pair[1].content, format!("bot: {}", pair[0].content));
        }
    }

    #[tokio::test]
    async fn test_keys_are_isolated() {
        let d = dispatcher(
            StaticClassifier::new(),
            HandlerRegistry::builder().fallback(Echo::new("bot")).build(),
        );
        let alice = ConversationKey::new("alice", "c1");
        let bob = ConversationKey::new("bob", "c1");

        d.dispatch(&alice, "hi from alice").await.unwrap();
        d.dispatch(&bob, "hi from bob").await.unwrap();
        d.dispatch(&bob, "again").await.unwrap();

        assert_eq!(d.sessions().get_history(&alice).await.len().await, 2);
        assert_eq!(d.sessions().get_history(&bob).await.len().await, 4);
    }
}
