use crate::agent::RunContext;
use crate::error::Result;
use crate::tools::{FunctionTool, UnitTool, extract_request_arg};
use crate::traits::{Invocable, ToolCall, ToolSpec};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub enum ToolRef {
    Function(Arc<FunctionTool>),
    Unit(UnitTool),
}

impl ToolRef {
    pub fn function(tool: FunctionTool) -> Self {
        Self::Function(Arc::new(tool))
    }

    pub fn unit(target: Arc<dyn Invocable>) -> Self {
        Self::Unit(UnitTool::new(target))
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Function(tool) => tool.name(),
            Self::Unit(tool) => tool.target().name(),
        }
    }

    pub fn spec(&self) -> ToolSpec {
        match self {
            Self::Function(tool) => tool.spec(),
            Self::Unit(tool) => tool.target().spec(),
        }
    }

    pub async fn invoke(&self, argument: &str, ctx: &RunContext) -> Result<String> {
        match self {
            Self::Function(tool) => tool.call(argument, &ctx.cancel).await,
            Self::Unit(tool) => tool.call(argument, ctx).await,
        }
    }
}

impl From<FunctionTool> for ToolRef {
    fn from(tool: FunctionTool) -> Self {
        Self::function(tool)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolRef>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: ToolRef) {
        self.tools.push(tool);
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn tools(&self) -> &[ToolRef] {
        &self.tools
    }

    pub fn get(&self, name: &str) -> Option<&ToolRef> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn get_specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.spec()).collect()
    }

    pub fn duplicate_name(&self) -> Option<&str> {
        self.tools.iter().enumerate().find_map(|(i, tool)| {
            self.tools[..i]
                .iter()
                .any(|earlier| earlier.name() == tool.name())
                .then(|| tool.name())
        })
    }

    pub async fn execute(&self, call: &ToolCall, ctx: &RunContext) -> Result<String> {
        let Some(tool) = self.get(&call.name) else {
            warn!(tool = %call.name, "service requested an unknown tool");
            return Ok(format!("Tool '{}' not found", call.name));
        };

        let argument = extract_request_arg(&call.arguments);
        debug!(tool = %call.name, "invoking tool");
        tool.invoke(&argument, ctx).await
    }
}

impl FromIterator<ToolRef> for ToolRegistry {
    fn from_iter<I: IntoIterator<Item = ToolRef>>(iter: I) -> Self {
        Self {
            tools: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ToolRegistry {
        [
            ToolRef::function(FunctionTool::from_fn("upper", "Uppercase", |s: &str| {
                Ok(s.to_uppercase())
            })),
            ToolRef::function(FunctionTool::from_fn("broken", "Always fails", |_: &str| {
                anyhow::bail!("disk on fire")
            })),
        ]
        .into_iter()
        .collect()
    }

    fn call(name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: "call_1".into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    #[tokio::test]
    async fn executes_by_name_with_request_argument() {
        let out = registry()
            .execute(&call("upper", r#"{"request":"hi"}"#), &RunContext::default())
            .await
            .unwrap();
        assert_eq!(out, "HI");
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_as_text() {
        let out = registry()
            .execute(&call("nope", "{}"), &RunContext::default())
            .await
            .unwrap();
        assert_eq!(out, "Tool 'nope' not found");
    }

    #[tokio::test]
    async fn failing_tool_does_not_abort() {
        let out = registry()
            .execute(&call("broken", r#"{"request":"x"}"#), &RunContext::default())
            .await
            .unwrap();
        assert!(out.contains("disk on fire"));
    }

    #[test]
    fn specs_follow_registration_order() {
        let names: Vec<_> = registry().get_specs().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["upper", "broken"]);
    }

    #[test]
    fn detects_duplicate_names() {
        let mut registry = registry();
        assert!(registry.duplicate_name().is_none());
        registry.register(ToolRef::function(FunctionTool::from_fn("upper", "again", |s: &str| {
            Ok(s.to_string())
        })));
        assert_eq!(registry.duplicate_name(), Some("upper"));
    }
}
