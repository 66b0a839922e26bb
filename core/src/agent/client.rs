use crate::agent::{RunContext, ToolRegistry};
use crate::error::{PipelineError, ProviderError, Result};
use crate::retry::{RetryError, RetryPolicy};
use crate::traits::{ChatMessage, ChatRequest, ChatResponse, Provider, ToolSpec};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 8;

#[derive(Clone)]
pub struct CompletionClient {
    provider: Arc<dyn Provider>,
    model: String,
    retry: RetryPolicy,
    attempt_timeout: Option<Duration>,
    max_tool_rounds: usize,
}

impl std::fmt::Debug for CompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionClient")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("retry", &self.retry)
            .field("attempt_timeout", &self.attempt_timeout)
            .field("max_tool_rounds", &self.max_tool_rounds)
            .finish()
    }
}

impl CompletionClient {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            retry: RetryPolicy::default(),
            attempt_timeout: None,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Bounds each attempt; an attempt that runs over counts as a transient failure.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds.max(1);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub async fn complete(
        &self,
        unit: &str,
        instruction: &str,
        input: &str,
        tools: &ToolRegistry,
        ctx: &RunContext,
    ) -> Result<String> {
        let specs = tools.get_specs();
        let mut messages = vec![ChatMessage::system(instruction), ChatMessage::user(input)];

        for round in 1..=self.max_tool_rounds {
            let response = self.request(unit, &messages, &specs, ctx).await?;

            if !response.has_tool_calls() {
                return Ok(response.text.unwrap_or_default());
            }

            debug!(
                unit,
                round,
                calls = response.tool_calls.len(),
                "service requested tools"
            );

            messages.push(ChatMessage::assistant_with_tool_calls(
                response.text_or_empty(),
                response.tool_calls.clone(),
            ));

            for call in &response.tool_calls {
                let output = tools.execute(call, ctx).await?;
                messages.push(ChatMessage::tool_result(call, output));
            }
        }

        Err(PipelineError::ToolRoundsExhausted {
            unit: unit.to_string(),
            rounds: self.max_tool_rounds,
        })
    }

    async fn request(
        &self,
        unit: &str,
        messages: &[ChatMessage],
        specs: &[ToolSpec],
        ctx: &RunContext,
    ) -> Result<ChatResponse> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            tools: if specs.is_empty() { None } else { Some(specs) },
        };

        let outcome = self
            .retry
            .run(&ctx.cancel, move |attempt| async move {
                trace!(unit, attempt, model = %self.model, "calling completion service");
                match self.attempt_timeout {
                    Some(limit) => tokio::time::timeout(limit, self.provider.chat(request))
                        .await
                        .unwrap_or(Err(ProviderError::Timeout)),
                    None => self.provider.chat(request).await,
                }
            })
            .await;

        outcome.map_err(|err| match err {
            RetryError::Fatal(source) => PipelineError::FatalService {
                unit: unit.to_string(),
                source,
            },
            RetryError::Exhausted { attempts, last } => PipelineError::RetryExhausted {
                unit: unit.to_string(),
                attempts,
                source: last,
            },
            RetryError::Cancelled => PipelineError::Cancelled,
        })
    }
}
