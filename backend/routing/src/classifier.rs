/// Intent classifier contract.
///
/// A classifier turns raw customer text into zero or more ranked routes.
/// Position is rank: the first route is the most confident one.
use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

/// The label carried by a route as it came out of the classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteName {
    Named(String),
    /// The route matched but carries no label.
    Absent,
    /// The backing data held a non-string label; the payload describes it.
    Malformed(String),
}

impl RouteName {
    /// Interpret a raw JSON label.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => RouteName::Absent,
            Value::String(s) => RouteName::Named(s.clone()),
            Value::Bool(_) => RouteName::Malformed(format!("bool ({value})")),
            Value::Number(_) => RouteName::Malformed(format!("number ({value})")),
            Value::Array(_) => RouteName::Malformed("array".to_string()),
            Value::Object(_) => RouteName::Malformed("object".to_string()),
        }
    }

    pub fn as_named(&self) -> Option<&str> {
        match self {
            RouteName::Named(name) => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntentRoute {
    pub name: RouteName,
    pub score: f32,
}

impl IntentRoute {
    pub fn named(name: impl Into<String>, score: f32) -> Self {
        Self {
            name: RouteName::Named(name.into()),
            score,
        }
    }

    pub fn absent() -> Self {
        Self {
            name: RouteName::Absent,
            score: 0.0,
        }
    }

    pub fn malformed(description: impl Into<String>) -> Self {
        Self {
            name: RouteName::Malformed(description.into()),
            score: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Classifier trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Ranked candidate routes for `text`, best first. May be empty.
    async fn classify(&self, text: &str) -> Result<Vec<IntentRoute>>;
}

/// What the dispatcher makes of a classifier result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Intent(String),
    /// Nothing usable: no routes, an unlabeled route, or a blank label.
    Ambiguous,
    /// The top route carried a non-string label.
    Malformed(String),
}

/// Consume only the top-ranked route.
pub fn top_intent(routes: &[IntentRoute]) -> Classification {
    match routes.first().map(|r| &r.name) {
        None | Some(RouteName::Absent) => Classification::Ambiguous,
        Some(RouteName::Named(name)) if name.trim().is_empty() => Classification::Ambiguous,
        Some(RouteName::Named(name)) => Classification::Intent(name.trim().to_string()),
        Some(RouteName::Malformed(description)) => Classification::Malformed(description.clone()),
    }
}

// ---------------------------------------------------------------------------
// Static classifier
// ---------------------------------------------------------------------------

/// Classifier with a fixed answer per exact (trimmed, lowercased) input.
#[derive(Debug, Clone, Default)]
pub struct StaticClassifier {
    answers: HashMap<String, Vec<IntentRoute>>,
    default: Vec<IntentRoute>,
}

impl StaticClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_answer(mut self, text: &str, routes: Vec<IntentRoute>) -> Self {
        self.answers.insert(normalize(text), routes);
        self
    }

    pub fn with_intent(self, text: &str, intent: &str) -> Self {
        self.with_answer(text, vec![IntentRoute::named(intent, 1.0)])
    }

    /// Routes returned for inputs without a fixed answer.
    pub fn with_default(mut self, routes: Vec<IntentRoute>) -> Self {
        self.default = routes;
        self
    }
}

#[async_trait]
impl IntentClassifier for StaticClassifier {
    async fn classify(&self, text: &str) -> Result<Vec<IntentRoute>> {
        Ok(self
            .answers
            .get(&normalize(text))
            .cloned()
            .unwrap_or_else(|| self.default.clone()))
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}
