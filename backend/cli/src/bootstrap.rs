//! Startup wiring: load every fixed collaborator once and assemble the dispatcher.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use concierge_core::{ConciergeError, LlmProvider};
use concierge_dispatch::{build_default_registry, DevSession, Dispatcher, IntentReviewer};
use concierge_memory::{IntentLog, SessionStore, TranscriptWriter};
use concierge_providers::{OpenAiProvider, ProviderRegistry};
use concierge_routing::RouteLayer;
use concierge_store::{Catalog, OrderStore};

use crate::config::Config;

const PROVIDER_TIMEOUT: Duration = Duration::from_secs(60);

/// Everything a session needs, loaded and validated.
pub struct App {
    pub dispatcher: Arc<Dispatcher>,
    /// Route labels known to the classifier, offered to reviewers.
    pub intentions: Vec<String>,
    pub products: usize,
}

impl App {
    pub async fn load(config: &Config) -> Result<Self> {
        let layer = RouteLayer::from_json_file(&config.layer_path)?;
        let intentions = layer.route_names();
        let catalog = Arc::new(Catalog::from_json_file(&config.catalog_path)?);
        let store = Arc::new(OrderStore::open(&config.db_path)?);
        let provider = provider(config)?;

        let registry = build_default_registry(
            catalog.clone(),
            store,
            provider.clone(),
            config.model_config(),
        );
        info!(
            provider = provider.name(),
            model = %config.model,
            intents = ?registry.intents(),
            "Handler registry ready"
        );

        let sessions = SessionStore::with_transcripts(TranscriptWriter::new(&config.transcript_dir));
        let dispatcher = Dispatcher::new(Arc::new(layer), Arc::new(registry), Arc::new(sessions))
            .with_turn_timeout(config.turn_timeout());

        Ok(Self {
            dispatcher: Arc::new(dispatcher),
            intentions,
            products: catalog.len(),
        })
    }

    pub fn dev_session(&self, config: &Config, reviewer: Arc<dyn IntentReviewer>) -> DevSession {
        DevSession::new(
            self.dispatcher.clone(),
            IntentLog::new(&config.intent_log_path),
            self.intentions.clone(),
            reviewer,
        )
    }
}

/// Resolve the configured provider from the registry of available ones.
pub fn provider(config: &Config) -> Result<Arc<dyn LlmProvider>> {
    let api_key = config.require_api_key()?;
    let openai = OpenAiProvider::new(api_key)
        .with_base_url(&config.base_url)
        .with_timeout(PROVIDER_TIMEOUT)?;

    let mut registry = ProviderRegistry::new();
    registry.register("openai", Arc::new(openai));

    registry.get(&config.provider).ok_or_else(|| {
        ConciergeError::Config(format!(
            "unknown provider '{}' (available: {})",
            config.provider,
            registry.list().join(", ")
        ))
        .into()
    })
}

/// Create the order database from the catalog. Returns the number of products stored.
pub async fn seed(config: &Config) -> Result<usize> {
    let catalog = Catalog::from_json_file(&config.catalog_path)?;
    let store = OrderStore::create(&config.db_path, &catalog)
        .await
        .with_context(|| format!("Failed to seed {}", config.db_path.display()))?;
    Ok(store.product_names().await?.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    const LAYER: &str = r#"{"routes": [
        {"name": "product_information", "utterances": ["tell me about the laptop"]},
        {"name": "order_status", "utterances": ["where is my order"]}
    ]}"#;
    const CATALOG: &str = r#"{"products": [
        {"name": "CineView 4K TV", "category": "Televisions and Home Theater Systems", "price": 599.99}
    ]}"#;

    fn config_in(dir: &Path) -> Config {
        std::fs::write(dir.join("layer.json"), LAYER).unwrap();
        std::fs::write(dir.join("catalog.json"), CATALOG).unwrap();
        Config {
            api_key: Some("sk-test".to_string()),
            layer_path: dir.join("layer.json"),
            catalog_path: dir.join("catalog.json"),
            db_path: dir.join("db/orders.db"),
            transcript_dir: dir.join("transcripts"),
            intent_log_path: dir.join("new_intentions.json"),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_load_requires_seeded_database() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let err = App::load(&config).await.err().unwrap();
        let err = err.downcast_ref::<ConciergeError>().unwrap();
        assert!(matches!(err, ConciergeError::Storage(_)));

        assert_eq!(seed(&config).await.unwrap(), 1);
        let app = App::load(&config).await.unwrap();
        assert_eq!(app.intentions, vec!["product_information", "order_status"]);
        assert_eq!(app.products, 1);
        assert!(app.dispatcher.registry().has_fallback());
    }

    #[tokio::test]
    async fn test_missing_layer_is_classifier_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            layer_path: dir.path().join("absent.json"),
            ..config_in(dir.path())
        };
        let err = App::load(&config).await.err().unwrap();
        assert!(matches!(
            err.downcast_ref::<ConciergeError>(),
            Some(ConciergeError::ClassifierLoad(_))
        ));
    }

    #[test]
    fn test_provider_needs_key_and_known_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        assert_eq!(provider(&config).unwrap().name(), "openai");

        config.provider = "anthropic".to_string();
        let err = provider(&config).err().unwrap().to_string();
        assert!(err.contains("available: openai"));

        config.api_key = None;
        assert!(provider(&config).is_err());
    }
}
