use crate::agent::RunContext;
use crate::error::{PipelineError, Result};
use crate::state::{SessionState, StateSnapshot, USER_QUERY_KEY};
use crate::traits::Invocable;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub run_id: String,
    pub text: String,
    pub state: StateSnapshot,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

pub struct Runner {
    root: Arc<dyn Invocable>,
    deadline: Option<Duration>,
}

impl Runner {
    pub fn new(root: Arc<dyn Invocable>) -> Result<Self> {
        validate_tree(&root)?;
        Ok(Self {
            root,
            deadline: None,
        })
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn root(&self) -> &Arc<dyn Invocable> {
        &self.root
    }

    pub async fn execute(&self, query: &str) -> Result<String> {
        Ok(self.execute_debug(query).await?.text)
    }

    pub async fn execute_debug(&self, query: &str) -> Result<RunResult> {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("run", run_id = %run_id, root = %self.root.name());

        async move {
            let state = SessionState::new();
            state.set(USER_QUERY_KEY, query)?;
            let ctx = RunContext::new(state.clone());
            let started_at = Utc::now();

            let outcome = match self.deadline {
                Some(limit) => {
                    match tokio::time::timeout(limit, self.root.run(query, &ctx)).await {
                        Ok(outcome) => outcome,
                        Err(_) => {
                            ctx.cancel.cancel();
                            Err(PipelineError::DeadlineExceeded { after: limit })
                        }
                    }
                }
                None => self.root.run(query, &ctx).await,
            };

            let text = outcome.inspect_err(|err| error!(error = %err, "run failed"))?;
            let finished_at = Utc::now();
            info!(
                elapsed_ms = (finished_at - started_at).num_milliseconds(),
                "run finished"
            );

            Ok(RunResult {
                run_id,
                text,
                state: state.snapshot(),
                started_at,
                finished_at,
            })
        }
        .instrument(span)
        .await
    }
}

fn validate_tree(root: &Arc<dyn Invocable>) -> Result<()> {
    let mut visited: Vec<*const ()> = Vec::new();
    let mut names: Vec<String> = Vec::new();
    let mut pending = vec![root.clone()];

    while let Some(node) = pending.pop() {
        let ptr = Arc::as_ptr(&node) as *const ();
        if visited.contains(&ptr) {
            continue;
        }
        visited.push(ptr);

        node.validate()?;

        let name = node.name().to_string();
        if names.contains(&name) {
            return Err(PipelineError::DuplicateName { name });
        }
        names.push(name);

        pending.extend(node.children());
    }

    Ok(())
}
