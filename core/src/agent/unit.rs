use crate::agent::{CompletionClient, RunContext, ToolRef, ToolRegistry, template};
use crate::error::{PipelineError, Result};
use crate::traits::Invocable;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{Instrument, debug, info, info_span};

#[derive(Debug, Clone)]
pub struct Unit {
    name: String,
    description: String,
    instruction: String,
    client: CompletionClient,
    tools: ToolRegistry,
    output_key: Option<String>,
}

impl Unit {
    pub fn new(name: impl Into<String>, client: CompletionClient) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            instruction: String::new(),
            client,
            tools: ToolRegistry::new(),
            output_key: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn with_tool(mut self, tool: impl Into<ToolRef>) -> Self {
        self.tools.register(tool.into());
        self
    }

    pub fn with_unit_tool(self, target: Arc<dyn Invocable>) -> Self {
        self.with_tool(ToolRef::unit(target))
    }

    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn output_key(&self) -> Option<&str> {
        self.output_key.as_deref()
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn client(&self) -> &CompletionClient {
        &self.client
    }
}

#[async_trait]
impl Invocable for Unit {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn output_keys(&self) -> Vec<String> {
        self.output_key.iter().cloned().collect()
    }

    fn children(&self) -> Vec<Arc<dyn Invocable>> {
        self.tools
            .tools()
            .iter()
            .filter_map(|tool| match tool {
                ToolRef::Unit(unit_tool) => Some(unit_tool.target().clone()),
                ToolRef::Function(_) => None,
            })
            .collect()
    }

    fn validate(&self) -> Result<()> {
        template::parse(&self.instruction)?;

        if let Some(tool) = self.tools.duplicate_name() {
            return Err(PipelineError::DuplicateTool {
                unit: self.name.clone(),
                tool: tool.to_string(),
            });
        }
        Ok(())
    }

    async fn run(&self, input: &str, ctx: &RunContext) -> Result<String> {
        let span = info_span!("unit", name = %self.name, model = %self.client.model());

        async move {
            let instruction = template::resolve(&self.instruction, &ctx.state)?;
            debug!(chars = instruction.len(), "instruction resolved");

            let text = self
                .client
                .complete(&self.name, &instruction, input, &self.tools, ctx)
                .await?;

            if let Some(key) = &self.output_key {
                ctx.state.set(key.as_str(), text.as_str())?;
                debug!(key = %key, "output stored");
            }

            info!(chars = text.len(), "unit finished");
            Ok(text)
        }
        .instrument(span)
        .await
    }
}
