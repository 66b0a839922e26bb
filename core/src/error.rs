use std::fmt;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if err.is_decode() {
            ProviderError::InvalidResponse(err.to_string())
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::InvalidResponse(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Transient,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildPosition {
    Index(usize),
    Iteration(usize),
}

impl fmt::Display for ChildPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "index {i}"),
            Self::Iteration(n) => write!(f, "iteration {n}"),
        }
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("instruction references unknown state key '{key}'")]
    UnresolvedKey { key: String },

    #[error("malformed instruction template at byte {position}: {reason}")]
    MalformedTemplate {
        template: String,
        position: usize,
        reason: String,
    },

    #[error("unit '{unit}' failed with a non-retryable service error: {source}")]
    FatalService {
        unit: String,
        #[source]
        source: ProviderError,
    },

    #[error("unit '{unit}' gave up after {attempts} attempts: {source}")]
    RetryExhausted {
        unit: String,
        attempts: u32,
        #[source]
        source: ProviderError,
    },

    #[error("unit '{unit}' exceeded {rounds} tool-call rounds without a final answer")]
    ToolRoundsExhausted { unit: String, rounds: usize },

    #[error("'{composite}' failed in child '{child}' at {position}: {source}")]
    CompositeChild {
        composite: String,
        child: String,
        position: ChildPosition,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("parallel composite '{composite}' has more than one child writing '{key}'")]
    DuplicateOutputKey { composite: String, key: String },

    #[error("name '{name}' is used by more than one unit in the pipeline")]
    DuplicateName { name: String },

    #[error("unit '{unit}' lists tool '{tool}' more than once")]
    DuplicateTool { unit: String, tool: String },

    #[error("state key '{key}' was written by two parallel siblings")]
    WriteCollision { key: String },

    #[error("run cancelled")]
    Cancelled,

    #[error("run exceeded its deadline of {after:?}")]
    DeadlineExceeded { after: Duration },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PipelineError {
    /// The failure that started a chain of composite errors.
    pub fn root_cause(&self) -> &PipelineError {
        match self {
            Self::CompositeChild { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.root_cause(), Self::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
