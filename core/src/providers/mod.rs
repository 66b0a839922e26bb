pub mod factory;
pub mod gemini;
pub mod openai;
pub mod scripted;

pub use factory::{create_client, create_provider};
pub use gemini::GeminiProvider;
pub use openai::OpenAIProvider;
pub use scripted::{RecordedRequest, ScriptedProvider};
