use crate::agent::RunContext;
use crate::error::{PipelineError, Result};
use crate::retry::{RetryError, RetryPolicy};
use crate::tools::tool_error_text;
use crate::traits::Invocable;
use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::future::{self, BoxFuture};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

type ToolFn = dyn Fn(String) -> BoxFuture<'static, anyhow::Result<String>> + Send + Sync;

#[derive(Clone)]
pub struct FunctionTool {
    name: String,
    description: String,
    func: Arc<ToolFn>,
    retry: Option<RetryPolicy>,
}

impl std::fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.name)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl FunctionTool {
    pub fn new<F, Fut>(name: impl Into<String>, description: impl Into<String>, func: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            func: Arc::new(move |argument: String| func(argument).boxed()),
            retry: None,
        }
    }

    /// For functions that never wait on anything.
    pub fn from_fn<F>(name: impl Into<String>, description: impl Into<String>, func: F) -> Self
    where
        F: Fn(&str) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        Self::new(name, description, move |argument: String| {
            future::ready(func(&argument))
        })
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub async fn call(&self, argument: &str, cancel: &CancellationToken) -> Result<String> {
        let outcome = match &self.retry {
            None => tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
                output = (self.func)(argument.to_string()) => output.map_err(|e| format!("{e:#}")),
            },
            Some(policy) => {
                match policy
                    .run(cancel, |_| (self.func)(argument.to_string()))
                    .await
                {
                    Ok(output) => Ok(output),
                    Err(RetryError::Cancelled) => return Err(PipelineError::Cancelled),
                    Err(RetryError::Fatal(e) | RetryError::Exhausted { last: e, .. }) => {
                        Err(format!("{e:#}"))
                    }
                }
            }
        };

        match outcome {
            Ok(output) => Ok(output),
            Err(cause) => {
                warn!(tool = %self.name, error = %cause, "tool failed");
                Ok(tool_error_text(&self.name, cause))
            }
        }
    }
}

#[async_trait]
impl Invocable for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, input: &str, ctx: &RunContext) -> Result<String> {
        self.call(input, &ctx.cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn upper() -> FunctionTool {
        FunctionTool::from_fn("upper", "Uppercases text", |s: &str| Ok(s.to_uppercase()))
    }

    #[tokio::test]
    async fn returns_function_output() {
        let out = upper().call("abc", &CancellationToken::new()).await.unwrap();
        assert_eq!(out, "ABC");
    }

    #[tokio::test]
    async fn failure_becomes_text() {
        let tool = FunctionTool::from_fn("search_wikipedia", "Looks things up", |_: &str| {
            anyhow::bail!("page not found")
        });
        let out = tool.call("nothing", &CancellationToken::new()).await.unwrap();
        assert!(out.contains("search_wikipedia"));
        assert!(out.contains("page not found"));
    }

    #[tokio::test]
    async fn retried_function_recovers() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let tool = FunctionTool::from_fn("flaky", "Fails once", move |s: &str| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                anyhow::bail!("temporary")
            }
            Ok(s.to_string())
        })
        .with_retry(
            RetryPolicy::new(3, Duration::from_millis(1), 2.0)
                .unwrap()
                .with_jitter(0.0)
                .unwrap(),
        );

        let out = tool.call("ok", &CancellationToken::new()).await.unwrap();
        assert_eq!(out, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cancelled_call_reports_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let tool = upper().with_retry(RetryPolicy::none());
        let err = tool.call("x", &cancel).await.unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
    }

    #[tokio::test]
    async fn awaits_async_function() {
        let tool = FunctionTool::new("fetch", "Fetches a page", |url: String| async move {
            tokio::task::yield_now().await;
            anyhow::Ok(format!("<html>{url}</html>"))
        });
        let out = tool.call("rust-lang.org", &CancellationToken::new()).await.unwrap();
        assert_eq!(out, "<html>rust-lang.org</html>");
    }

    #[tokio::test(start_paused = true)]
    async fn pending_call_stops_when_cancelled() {
        let tool = FunctionTool::new("slow", "Sleeps", |_| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            anyhow::Ok("late".to_string())
        });
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });
        let started = tokio::time::Instant::now();

        let err = tool.call("x", &cancel).await.unwrap_err();

        assert!(matches!(err, PipelineError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test]
    async fn runs_as_pipeline_child() {
        let ctx = RunContext::default();
        let out = upper().run("pipeline", &ctx).await.unwrap();
        assert_eq!(out, "PIPELINE");
        assert_eq!(upper().spec().name, "upper");
    }
}
