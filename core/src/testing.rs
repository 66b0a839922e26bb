use crate::agent::{RunContext, template};
use crate::error::{PipelineError, Result};
use crate::traits::Invocable;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Default)]
pub(crate) struct Stub {
    name: String,
    reply: String,
    template: Option<String>,
    output_key: Option<String>,
    declared: bool,
    delay: Option<Duration>,
    fails: bool,
    runs: AtomicUsize,
}

impl Stub {
    pub(crate) fn writes(name: &str, key: &str, reply: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            reply: reply.into(),
            output_key: Some(key.into()),
            declared: true,
            ..Self::default()
        })
    }

    pub(crate) fn template(name: &str, template: &str, key: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            template: Some(template.into()),
            output_key: Some(key.into()),
            declared: true,
            ..Self::default()
        })
    }

    pub(crate) fn undeclared(name: &str, key: &str, reply: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            reply: reply.into(),
            output_key: Some(key.into()),
            ..Self::default()
        })
    }

    pub(crate) fn failing(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            fails: true,
            ..Self::default()
        })
    }

    pub(crate) fn slow(name: &str, key: &str, reply: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            reply: reply.into(),
            output_key: Some(key.into()),
            declared: true,
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub(crate) fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Invocable for Stub {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "stub"
    }

    fn output_keys(&self) -> Vec<String> {
        match (&self.output_key, self.declared) {
            (Some(key), true) => vec![key.clone()],
            _ => vec![],
        }
    }

    async fn run(&self, _input: &str, ctx: &RunContext) -> Result<String> {
        self.runs.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::select! {
                _ = ctx.cancel.cancelled() => return Err(PipelineError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        if self.fails {
            return Err(PipelineError::FatalService {
                unit: self.name.clone(),
                source: crate::error::ProviderError::Status {
                    status: 400,
                    body: "stub failure".into(),
                },
            });
        }

        let text = match &self.template {
            Some(template) => template::resolve(template, &ctx.state)?,
            None => self.reply.clone(),
        };

        if let Some(key) = &self.output_key {
            ctx.state.set(key.as_str(), text.as_str())?;
        }
        Ok(text)
    }
}
