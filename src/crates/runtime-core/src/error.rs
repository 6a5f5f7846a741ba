//! Error types raised by the graph execution core.
//!
//! `GraphError` is the crate-boundary error enum for `runtime-core`: the
//! graph loader, the judge, the expression evaluator and the
//! [`crate::executor::GraphExecutor`] step loop all return it. Errors raised
//! by collaborator crates (`runtime-store`, `runtime-llm`, `runtime-tools`)
//! are folded in via `#[from]` at the narrow-interface boundary (see
//! [`crate::llm_client::LlmError`], [`crate::tool_registry::ToolError`]) so a
//! single `Result<T>` alias covers the whole step loop.

use thiserror::Error;

use crate::llm_client::LlmError;
use crate::store_traits::StoreError;
use crate::tool_registry::ToolError;

/// Convenience alias used throughout `runtime-core`.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors raised while validating, loading or executing a graph.
#[derive(Error, Debug)]
pub enum GraphError {
    /// A `GraphSpec` failed structural validation at load time (invariants
    /// 1-3: dangling edge endpoints, `nullableOutputKeys ⊄ outputKeys`,
    /// forever-alive nodes with no outgoing edge) or a fan-out introduced
    /// overlapping `outputKeys`.
    #[error("graph validation failed: {0}")]
    Validation(String),

    /// `GraphId` has no registered entry point with the given id.
    #[error("entry point '{0}' not found")]
    EntryPointNotFound(String),

    /// The CONDITIONAL edge expression failed to parse at graph load time.
    /// Parse errors are fatal per the expression language contract; only
    /// evaluation-time lookups on missing keys are tolerated (they yield
    /// `false`, not an error).
    #[error("invalid edge expression '{expr}': {reason}")]
    ExpressionParse { expr: String, reason: String },

    /// The judge returned `ESCALATE`, or an implicit rule forced escalation
    /// (fan-out with overlapping output keys, `maxNodeVisits` exceeded).
    /// Does not roll back already-persisted outputs.
    #[error("node '{node}' escalated: {rationale}")]
    JudgeEscalated { node: String, rationale: String },

    /// A node visit exceeded `loop_config.max_iterations` without an
    /// ACCEPT/ESCALATE verdict.
    #[error("node '{node}' exceeded max iterations ({max})")]
    MaxIterationsExceeded { node: String, max: u32 },

    /// Traversal found neither a matching forward edge nor a matching
    /// feedback edge and the node is not terminal.
    #[error("execution reached a dead end at node '{0}'")]
    DeadEnd(String),

    /// Required credentials for a node's tools or LLM calls were
    /// unavailable at stream start.
    #[error("credential '{0}' unavailable")]
    CredentialUnavailable(String),

    /// Wraps an LLM client failure surfaced through the narrow
    /// `LlmClient` interface.
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// Wraps a tool registry failure surfaced through the narrow
    /// `ToolRegistry` interface. Tool failures are not retried by the
    /// framework; they are normally turned into a `tool_result` message
    /// instead of propagating, so this variant is reserved for failures
    /// the executor cannot route back to the model (e.g. the tool named in
    /// a call does not exist).
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// Wraps a persistence failure surfaced through the narrow
    /// `ConversationStore`/`CheckpointStore`/`SessionStore` interfaces.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The cursor or conversation log for a (session, node) pair could not
    /// be parsed back into a [`crate::model::NodeCursor`]. The executor
    /// falls back to the previous checkpoint or marks the session failed;
    /// this variant carries the failure up to that decision point.
    #[error("corrupt cursor for session '{session_id}' node '{node_id}': {reason}")]
    CorruptCursor {
        session_id: String,
        node_id: String,
        reason: String,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Custom(String),
}

impl GraphError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn escalated(node: impl Into<String>, rationale: impl Into<String>) -> Self {
        Self::JudgeEscalated {
            node: node.into(),
            rationale: rationale.into(),
        }
    }
}
