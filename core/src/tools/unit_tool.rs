use crate::agent::RunContext;
use crate::error::Result;
use crate::tools::tool_error_text;
use crate::traits::Invocable;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct UnitTool {
    target: Arc<dyn Invocable>,
}

impl std::fmt::Debug for UnitTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitTool")
            .field("target", &self.target.name())
            .finish()
    }
}

impl UnitTool {
    pub fn new(target: Arc<dyn Invocable>) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &Arc<dyn Invocable> {
        &self.target
    }

    pub async fn call(&self, argument: &str, ctx: &RunContext) -> Result<String> {
        let nested = ctx.nested();
        let name = self.target.name();
        debug!(tool = %name, "starting nested run");

        match self.target.run(argument, &nested).await {
            Ok(text) => {
                for key in self.target.output_keys() {
                    if let Some(value) = nested.state.get_local(&key) {
                        ctx.state.set(key, value)?;
                    }
                }
                Ok(text)
            }
            Err(err) if err.is_cancelled() => Err(err),
            Err(err) => {
                warn!(tool = %name, error = %err, "nested run failed");
                Ok(tool_error_text(name, err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::state::SessionState;
    use async_trait::async_trait;

    struct Echo {
        output_key: Option<&'static str>,
        scratch: bool,
    }

    #[async_trait]
    impl Invocable for Echo {
        fn name(&self) -> &str {
            "Echo"
        }

        fn description(&self) -> &str {
            "Echoes the request with the parent's topic"
        }

        fn output_keys(&self) -> Vec<String> {
            self.output_key.map(String::from).into_iter().collect()
        }

        async fn run(&self, input: &str, ctx: &RunContext) -> Result<String> {
            let topic = ctx.state.get("topic").unwrap_or_default();
            let text = format!("{input} about {topic}");
            if self.scratch {
                ctx.state.set("scratch", "private")?;
            }
            if let Some(key) = self.output_key {
                ctx.state.set(key, text.clone())?;
            }
            Ok(text)
        }
    }

    struct Failing;

    #[async_trait]
    impl Invocable for Failing {
        fn name(&self) -> &str {
            "Failing"
        }

        fn description(&self) -> &str {
            "Always fails"
        }

        async fn run(&self, _input: &str, _ctx: &RunContext) -> Result<String> {
            Err(PipelineError::UnresolvedKey {
                key: "missing".into(),
            })
        }
    }

    fn ctx() -> RunContext {
        RunContext::new([("topic", "ferris")].into_iter().collect::<SessionState>())
    }

    #[tokio::test]
    async fn nested_run_reads_parent_and_publishes_output_key() {
        let ctx = ctx();
        let tool = UnitTool::new(Arc::new(Echo {
            output_key: Some("findings"),
            scratch: true,
        }));

        let out = tool.call("facts", &ctx).await.unwrap();

        assert_eq!(out, "facts about ferris");
        assert_eq!(ctx.state.get("findings").as_deref(), Some("facts about ferris"));
        assert!(!ctx.state.contains_key("scratch"));
    }

    #[tokio::test]
    async fn nested_failure_becomes_text() {
        let out = UnitTool::new(Arc::new(Failing))
            .call("anything", &ctx())
            .await
            .unwrap();
        assert!(out.starts_with("Error executing tool 'Failing'"));
        assert!(out.contains("missing"));
    }

    #[tokio::test]
    async fn cancellation_propagates() {
        struct Cancelled;

        #[async_trait]
        impl Invocable for Cancelled {
            fn name(&self) -> &str {
                "Cancelled"
            }
            fn description(&self) -> &str {
                ""
            }
            async fn run(&self, _input: &str, _ctx: &RunContext) -> Result<String> {
                Err(PipelineError::Cancelled)
            }
        }

        let err = UnitTool::new(Arc::new(Cancelled))
            .call("x", &ctx())
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
