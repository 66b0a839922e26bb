pub mod agent;
pub mod config;
pub mod error;
pub mod providers;
pub mod retry;
pub mod runner;
pub mod state;
pub mod tools;
pub mod traits;

#[cfg(test)]
mod testing;

pub use agent::{CompletionClient, Loop, Parallel, RunContext, Sequential, ToolRef, ToolRegistry, Unit};
pub use config::{Config, RetryConfig};
pub use error::{ChildPosition, FailureClass, PipelineError, ProviderError, Result};
pub use providers::*;
pub use retry::{Classify, RetryError, RetryPolicy};
pub use runner::{RunResult, Runner};
pub use state::{SessionState, StateSnapshot, USER_QUERY_KEY};
pub use tools::{FunctionTool, UnitTool};
pub use traits::*;
