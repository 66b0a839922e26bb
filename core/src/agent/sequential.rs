use crate::agent::RunContext;
use crate::error::{ChildPosition, PipelineError, Result};
use crate::traits::Invocable;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{Instrument, debug, info_span};

pub struct Sequential {
    name: String,
    description: String,
    children: Vec<Arc<dyn Invocable>>,
}

impl Sequential {
    pub fn new(name: impl Into<String>, children: Vec<Arc<dyn Invocable>>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            children,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

#[async_trait]
impl Invocable for Sequential {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn output_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for key in self.children.iter().flat_map(|c| c.output_keys()) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    fn children(&self) -> Vec<Arc<dyn Invocable>> {
        self.children.clone()
    }

    async fn run(&self, input: &str, ctx: &RunContext) -> Result<String> {
        let span = info_span!("sequential", name = %self.name);

        async move {
            let mut last = String::new();

            for (index, child) in self.children.iter().enumerate() {
                debug!(index, child = %child.name(), "running step");

                last = child.run(input, ctx).await.map_err(|source| {
                    PipelineError::CompositeChild {
                        composite: self.name.clone(),
                        child: child.name().to_string(),
                        position: ChildPosition::Index(index),
                        source: Box::new(source),
                    }
                })?;
            }

            Ok(last)
        }
        .instrument(span)
        .await
    }
}
