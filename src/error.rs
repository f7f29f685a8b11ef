//! Fatal error types for the clip factory.
//!
//! Only precondition failures live here. Per-clip provider failures are
//! plain values (`api::ProviderFailure`) and never abort a run.

use thiserror::Error;

pub type FactoryResult<T> = Result<T, FactoryError>;

#[derive(Debug, Error)]
pub enum FactoryError {
    #[error("no providers configured")]
    NoProviders,

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("provider {0} registered twice")]
    DuplicateProvider(String),

    #[error("fallback for {from} points at unregistered provider {to}")]
    InvalidFallback { from: String, to: String },

    #[error("prompt list is empty")]
    EmptyPromptList,

    #[error("prompt {ordinal} is blank")]
    BlankPrompt { ordinal: usize },

    #[error("run directory already exists: {}", .0.display())]
    RunDirExists(std::path::PathBuf),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unrecognized prompt file format: {0}")]
    PromptFile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FactoryError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
