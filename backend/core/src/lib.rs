pub mod error;
pub mod key;
pub mod message;
pub mod tools;
pub mod traits;

pub use error::ConciergeError;
pub use key::ConversationKey;
pub use message::{Message, Role};
pub use tools::ToolRegistry;
pub use traits::{LlmProvider, LlmRequest, LlmResponse, Tool};
