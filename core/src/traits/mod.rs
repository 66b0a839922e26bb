pub mod invocable;
pub mod provider;

pub use invocable::{Invocable, REQUEST_PARAM, ToolSpec};
pub use provider::{ChatMessage, ChatRequest, ChatResponse, Provider, ToolCall};
