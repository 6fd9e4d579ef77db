/// Intent label → handler table, fixed at startup.
use std::collections::HashMap;
use std::sync::Arc;

use concierge_core::ConciergeError;
use tracing::debug;

use crate::handler::Handler;

pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
    fallback: Option<Arc<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder::default()
    }

    /// Exact match on `intent`; absent or unknown intents get the fallback.
    pub fn resolve(&self, intent: Option<&str>) -> Result<Arc<dyn Handler>, ConciergeError> {
        if let Some(handler) = intent.and_then(|label| self.handlers.get(label)) {
            return Ok(Arc::clone(handler));
        }
        debug!(intent = ?intent, "No direct handler, using fallback");
        self.fallback.clone().ok_or_else(|| {
            ConciergeError::HandlerNotFound(intent.unwrap_or("<none>").to_string())
        })
    }

    /// Exact match only, never the fallback.
    pub fn get(&self, intent: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(intent).cloned()
    }

    /// Registered intent labels, sorted.
    pub fn intents(&self) -> Vec<String> {
        let mut intents: Vec<String> = self.handlers.keys().cloned().collect();
        intents.sort();
        intents
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

#[derive(Default)]
pub struct HandlerRegistryBuilder {
    handlers: HashMap<String, Arc<dyn Handler>>,
    fallback: Option<Arc<dyn Handler>>,
}

impl HandlerRegistryBuilder {
    pub fn register(mut self, intent: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        self.handlers.insert(intent.into(), handler);
        self
    }

    pub fn fallback(mut self, handler: Arc<dyn Handler>) -> Self {
        self.fallback = Some(handler);
        self
    }

    pub fn build(self) -> HandlerRegistry {
        HandlerRegistry {
            handlers: self.handlers,
            fallback: self.fallback,
        }
    }
}
