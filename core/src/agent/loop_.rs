use crate::agent::RunContext;
use crate::error::{ChildPosition, PipelineError, Result};
use crate::state::SessionState;
use crate::traits::Invocable;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{Instrument, debug, info, info_span};

type Predicate = dyn Fn(&SessionState) -> bool + Send + Sync;

pub struct Loop {
    name: String,
    description: String,
    child: Arc<dyn Invocable>,
    max_iterations: usize,
    until: Arc<Predicate>,
}

impl Loop {
    /// A loop that always runs `max_iterations` times unless a step fails.
    pub fn new(name: impl Into<String>, child: Arc<dyn Invocable>, max_iterations: usize) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            child,
            max_iterations,
            until: Arc::new(|_| false),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn until<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&SessionState) -> bool + Send + Sync + 'static,
    {
        self.until = Arc::new(predicate);
        self
    }

    pub fn until_equals(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        self.until(move |state| state.get(&key).is_some_and(|v| v.trim() == value))
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }
}

#[async_trait]
impl Invocable for Loop {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn output_keys(&self) -> Vec<String> {
        self.child.output_keys()
    }

    fn children(&self) -> Vec<Arc<dyn Invocable>> {
        vec![self.child.clone()]
    }

    fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "loop '{}' must allow at least one iteration",
                self.name
            )));
        }
        Ok(())
    }

    async fn run(&self, input: &str, ctx: &RunContext) -> Result<String> {
        let span = info_span!("loop", name = %self.name, max = self.max_iterations);

        async move {
            let mut last = String::new();

            for iteration in 1..=self.max_iterations {
                debug!(iteration, "iteration started");

                last = self.child.run(input, ctx).await.map_err(|source| {
                    PipelineError::CompositeChild {
                        composite: self.name.clone(),
                        child: self.child.name().to_string(),
                        position: ChildPosition::Iteration(iteration),
                        source: Box::new(source),
                    }
                })?;

                if (self.until)(&ctx.state) {
                    info!(iteration, "termination condition met");
                    return Ok(last);
                }
            }

            info!("iteration limit reached");
            Ok(last)
        }
        .instrument(span)
        .await
    }
}
