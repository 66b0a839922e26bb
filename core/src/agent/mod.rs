pub mod client;
pub mod context;
pub mod loop_;
pub mod parallel;
pub mod registry;
pub mod sequential;
pub mod template;
pub mod unit;

pub use client::CompletionClient;
pub use context::RunContext;
pub use loop_::Loop;
pub use parallel::Parallel;
pub use registry::{ToolRef, ToolRegistry};
pub use sequential::Sequential;
pub use unit::Unit;
