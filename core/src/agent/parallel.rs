use crate::agent::RunContext;
use crate::error::{ChildPosition, PipelineError, Result};
use crate::state::WriteScope;
use crate::traits::Invocable;
use async_trait::async_trait;
use futures_util::future::join_all;
use std::sync::Arc;
use tracing::{Instrument, debug, info_span, warn};

pub struct Parallel {
    name: String,
    description: String,
    children: Vec<Arc<dyn Invocable>>,
}

impl std::fmt::Debug for Parallel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let children: Vec<_> = self.children.iter().map(|c| c.name()).collect();
        f.debug_struct("Parallel")
            .field("name", &self.name)
            .field("children", &children)
            .finish()
    }
}

impl Parallel {
    pub fn new(name: impl Into<String>, children: Vec<Arc<dyn Invocable>>) -> Result<Self> {
        let name = name.into();

        let mut seen: Vec<String> = Vec::new();
        for key in children.iter().flat_map(|c| c.output_keys()) {
            if seen.contains(&key) {
                return Err(PipelineError::DuplicateOutputKey {
                    composite: name,
                    key,
                });
            }
            seen.push(key);
        }

        Ok(Self {
            name,
            description: String::new(),
            children,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

#[async_trait]
impl Invocable for Parallel {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn output_keys(&self) -> Vec<String> {
        self.children.iter().flat_map(|c| c.output_keys()).collect()
    }

    fn children(&self) -> Vec<Arc<dyn Invocable>> {
        self.children.clone()
    }

    async fn run(&self, input: &str, ctx: &RunContext) -> Result<String> {
        let span = info_span!("parallel", name = %self.name, children = self.children.len());

        async move {
            let scope = Arc::new(WriteScope::new());
            let group = ctx.cancel.child_token();

            let runs = self.children.iter().enumerate().map(|(index, child)| {
                let child_ctx = ctx.sibling(&scope, index, group.clone());
                let group = group.clone();
                async move {
                    debug!(index, child = %child.name(), "branch started");
                    let outcome = child.run(input, &child_ctx).await;
                    if let Err(err) = &outcome
                        && !group.is_cancelled()
                    {
                        warn!(index, child = %child.name(), error = %err, "branch failed, cancelling siblings");
                        group.cancel();
                    }
                    outcome
                }
            });

            let outcomes = join_all(runs).await;

            let mut texts = Vec::with_capacity(outcomes.len());
            let mut failure: Option<(usize, PipelineError)> = None;

            for (index, outcome) in outcomes.into_iter().enumerate() {
                match outcome {
                    Ok(text) => texts.push(text),
                    Err(err) => {
                        let replace = match &failure {
                            None => true,
                            Some((_, current)) => current.is_cancelled() && !err.is_cancelled(),
                        };
                        if replace {
                            failure = Some((index, err));
                        }
                    }
                }
            }

            if let Some((index, source)) = failure {
                return Err(PipelineError::CompositeChild {
                    composite: self.name.clone(),
                    child: self.children[index].name().to_string(),
                    position: ChildPosition::Index(index),
                    source: Box::new(source),
                });
            }

            Ok(texts.join("\n\n"))
        }
        .instrument(span)
        .await
    }
}
