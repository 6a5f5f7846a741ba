//! `RuntimeError`: the crate-boundary error enum for `AgentRuntime` and its
//! trigger sources. Mistakes a caller could have avoided (`GraphNotFound`,
//! `EntryPointNotFound`) are separated from the ones `ExecutionStream`
//! already folds `StoreError`/`GraphError` into (`StreamBusy`,
//! `SessionNotFound`), reached here through `#[from] StreamError` the same
//! way `GraphError` folds in `LlmError`/`ToolError` at its own boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("graph '{0}' not found")]
    GraphNotFound(String),

    #[error("entry point '{0}' not found on graph '{1}'")]
    EntryPointNotFound(String, String),

    #[error("cannot remove the primary graph")]
    CannotRemovePrimary,

    #[error("credential '{0}' unavailable")]
    CredentialUnavailable(String),

    #[error("webhook signature verification failed")]
    WebhookUnauthorized,

    #[error("{0}")]
    Config(String),

    #[error(transparent)]
    Stream(#[from] runtime_core::StreamError),

    #[error(transparent)]
    Graph(#[from] runtime_core::GraphError),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
