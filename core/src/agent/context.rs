use crate::state::{SessionState, WriteScope};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub state: SessionState,
    pub cancel: CancellationToken,
}

impl RunContext {
    pub fn new(state: SessionState) -> Self {
        Self {
            state,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn nested(&self) -> Self {
        Self {
            state: self.state.layered(),
            cancel: self.cancel.child_token(),
        }
    }

    pub fn sibling(&self, scope: &Arc<WriteScope>, index: usize, cancel: CancellationToken) -> Self {
        Self {
            state: self.state.in_scope(scope, index),
            cancel,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
