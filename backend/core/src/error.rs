use thiserror::Error;

/// Top-level error type for the Concierge runtime.
///
/// Per-turn variants are converted to user-visible text at the turn boundary;
/// only the startup variants (`ClassifierLoad`, `Storage`, `Config`) stop the process.
#[derive(Debug, Error)]
pub enum ConciergeError {
    #[error("no usable intent in classifier output")]
    ClassificationAmbiguous,

    #[error("classifier returned a malformed route: {0}")]
    ClassificationMalformed(String),

    #[error("no handler registered for intent {0:?}")]
    HandlerNotFound(String),

    #[error("text generation failed ({provider}): {message}")]
    Generation { provider: String, message: String },

    #[error("stage {stage} produced malformed output: {message}")]
    MalformedOutput { stage: String, message: String },

    #[error("customer {customer_id} is not authorized to access order {order_id}")]
    Unauthorized { customer_id: String, order_id: i64 },

    #[error("transcript persistence failed: {0}")]
    Persistence(String),

    #[error("failed to load intent classifier: {0}")]
    ClassifierLoad(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ConciergeError {
    pub fn generation(provider: impl Into<String>, message: impl ToString) -> Self {
        Self::Generation {
            provider: provider.into(),
            message: message.to_string(),
        }
    }

    pub fn malformed(stage: impl Into<String>, message: impl ToString) -> Self {
        Self::MalformedOutput {
            stage: stage.into(),
            message: message.to_string(),
        }
    }

    /// True for failures that may succeed if the customer simply asks again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Generation { .. } | Self::MalformedOutput { .. } | Self::Other(_)
        )
    }

    /// True for failures that must abort process start.
    pub fn is_startup_fatal(&self) -> bool {
        matches!(
            self,
            Self::ClassifierLoad(_) | Self::Storage(_) | Self::Config(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConciergeError::HandlerNotFound("refunds".into());
        assert_eq!(err.to_string(), "no handler registered for intent \"refunds\"");

        let err = ConciergeError::Unauthorized {
            customer_id: "alice".into(),
            order_id: 7,
        };
        assert_eq!(
            err.to_string(),
            "customer alice is not authorized to access order 7"
        );

        let err = ConciergeError::malformed("product_reasoning", "expected value at line 1");
        assert_eq!(
            err.to_string(),
            "stage product_reasoning produced malformed output: expected value at line 1"
        );
    }

    #[test]
    fn test_error_classes() {
        assert!(ConciergeError::generation("openai", "timeout").is_transient());
        assert!(!ConciergeError::HandlerNotFound("x".into()).is_transient());
        assert!(ConciergeError::ClassifierLoad("missing".into()).is_startup_fatal());
        assert!(!ConciergeError::Persistence("disk full".into()).is_startup_fatal());
    }

    #[test]
    fn test_from_anyhow() {
        let err: ConciergeError = anyhow::anyhow!("socket closed").into();
        assert!(matches!(err, ConciergeError::Other(_)));
        assert_eq!(err.to_string(), "socket closed");
    }
}
