use crate::error::ProviderError;
use crate::traits::{ChatMessage, ChatRequest, ChatResponse, Provider};
use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

type Responder =
    dyn Fn(&ChatRequest<'_>) -> Result<ChatResponse, ProviderError> + Send + Sync;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<String>,
}

impl RecordedRequest {
    pub fn system_text(&self) -> &str {
        self.messages
            .first()
            .filter(|m| m.role == "system")
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }
}

pub struct ScriptedProvider {
    responder: Box<Responder>,
    latency: Option<Duration>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedProvider {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&ChatRequest<'_>) -> Result<ChatResponse, ProviderError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            latency: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::new(move |_| Ok(ChatResponse::text(text.clone())))
    }

    pub fn routed<N, R>(rules: impl IntoIterator<Item = (N, R)>) -> Self
    where
        N: Into<String>,
        R: Into<String>,
    {
        let rules: Vec<(String, String)> = rules
            .into_iter()
            .map(|(needle, reply)| (needle.into(), reply.into()))
            .collect();

        Self::new(move |request| {
            let system = request.system_text().unwrap_or("");
            rules
                .iter()
                .find(|(needle, _)| system.contains(needle.as_str()))
                .map(|(_, reply)| ChatResponse::text(reply.clone()))
                .ok_or_else(|| ProviderError::Status {
                    status: 400,
                    body: "no scripted reply for this instruction".into(),
                })
        })
    }

    /// Sleeps before answering, so concurrent callers overlap.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, request: ChatRequest<'_>) -> Result<ChatResponse, ProviderError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedRequest {
                model: request.model.to_string(),
                messages: request.messages.to_vec(),
                tools: request
                    .tools
                    .unwrap_or_default()
                    .iter()
                    .map(|t| t.name.clone())
                    .collect(),
            });

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        (self.responder)(&request)
    }
}
