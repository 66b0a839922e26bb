use crate::agent::RunContext;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

pub const REQUEST_PARAM: &str = "request";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolSpec {
    pub fn for_request(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    REQUEST_PARAM: {
                        "type": "string",
                        "description": "Input for the tool"
                    }
                },
                "required": [REQUEST_PARAM]
            }),
        }
    }
}

#[async_trait]
pub trait Invocable: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// State keys this invocable writes when it succeeds.
    fn output_keys(&self) -> Vec<String> {
        vec![]
    }

    fn children(&self) -> Vec<Arc<dyn Invocable>> {
        vec![]
    }

    fn validate(&self) -> Result<()> {
        Ok(())
    }

    async fn run(&self, input: &str, ctx: &RunContext) -> Result<String>;

    fn spec(&self) -> ToolSpec {
        ToolSpec::for_request(self.name(), self.description())
    }
}
