//! Structured (JSON) stage output.
//!
//! Models wrap JSON in code fences or prose often enough that parsing first
//! cuts out the outermost `{...}` object. A reply that still fails to parse
//! gets exactly one retry with a correction note.

use serde::de::DeserializeOwned;
use tracing::warn;

use concierge_core::ConciergeError;

use crate::prompt::PromptVars;
use crate::stage::{Memory, Stage};

/// Instructions appended to structured prompts via `{format_instructions}`.
pub fn format_instructions(example: &str) -> String {
    format!(
        "Respond with a single JSON object shaped like this example and nothing else:\n{example}"
    )
}

/// The outermost JSON object in `text`, if any.
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

pub(crate) fn parse<T: DeserializeOwned>(text: &str) -> Result<T, String> {
    let candidate = extract_json(text).ok_or_else(|| "no JSON object in reply".to_string())?;
    serde_json::from_str(candidate).map_err(|e| e.to_string())
}

impl Stage {
    /// Run the stage and decode its reply as `T`.
    pub async fn run_structured<T: DeserializeOwned>(
        &self,
        vars: &PromptVars,
        memory: Memory<'_>,
    ) -> Result<T, ConciergeError> {
        let (system, human) = self.template().render(vars)?;
        let history = self.history_for(memory).await;

        let first = self
            .complete(system.clone(), history.clone(), human.clone())
            .await?;
        let error = match parse::<T>(&first) {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };
        warn!(stage = %self.name(), error = %error, "Unparsable stage output, retrying once");

        let corrected = format!(
            "{human}\n\nYour previous reply could not be parsed ({error}). \
             Reply again with only the JSON object."
        );
        let second = self.complete(system, history, corrected).await?;
        parse::<T>(&second).map_err(|e| ConciergeError::malformed(self.name(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_config::ModelConfig;
    use crate::prompt::{PromptTemplate, vars};
    use concierge_providers::MockProvider;
    use serde::Deserialize;
    use std::sync::Arc;

    #[derive(Debug, Deserialize, PartialEq)]
    struct OrderId {
        order_id: i64,
    }

    fn stage(provider: Arc<MockProvider>) -> Stage {
        Stage::new(
            "order_id",
            PromptTemplate::new("Identify the order_id.", "Customer Query: {customer_input}"),
            provider,
            ModelConfig::default(),
        )
    }

    #[test]
    fn test_extract_json_from_fenced_reply() {
        let text = "Here you go:\n```json\n{\"order_id\": 7}\n```";
        assert_eq!(extract_json(text), Some("{\"order_id\": 7}"));
        assert_eq!(extract_json("no json"), None);
        assert_eq!(extract_json("} backwards {"), None);
    }

    #[tokio::test]
    async fn test_first_reply_parses() {
        let provider = Arc::new(MockProvider::new("mock").with_script(["```json\n{\"order_id\": 12}\n```"]));
        let value: OrderId = stage(provider.clone())
            .run_structured(&vars([("customer_input", "order 12?")]), Memory::Detached)
            .await
            .unwrap();
        assert_eq!(value, OrderId { order_id: 12 });
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_retries_once_with_correction() {
        let provider = Arc::new(
            MockProvider::new("mock").with_script(["order twelve", "{\"order_id\": 12}"]),
        );
        let value: OrderId = stage(provider.clone())
            .run_structured(&vars([("customer_input", "order 12?")]), Memory::Detached)
            .await
            .unwrap();
        assert_eq!(value.order_id, 12);

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].user_prompt.contains("could not be parsed"));
    }

    #[tokio::test]
    async fn test_second_failure_is_malformed_output() {
        let provider = Arc::new(MockProvider::new("mock").with_script(["nope", "{\"id\": \"x\"}"]));
        let err = stage(provider.clone())
            .run_structured::<OrderId>(&vars([("customer_input", "?")]), Memory::Detached)
            .await
            .unwrap_err();
        assert!(matches!(err, ConciergeError::MalformedOutput { ref stage, .. } if stage == "order_id"));
        assert_eq!(provider.call_count(), 2);
    }
}
