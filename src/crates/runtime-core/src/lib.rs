//! # runtime-core
//!
//! Graph execution core for the agent runtime: graph/node/edge
//! specifications, the typed event bus, the implicit judge, the narrow
//! interfaces external collaborators (LLM backends, tool registries,
//! persistence) are accessed through, and the `GraphExecutor` step loop
//! that drives one node visit at a time.
//!
//! `runtime-core` owns every trait a collaborator crate implements
//! (`LlmClient`, `ToolRegistry`, `ConversationStore`, `SessionStore`,
//! `CheckpointStore`) rather than depending on those crates directly, so
//! `runtime-store`/`runtime-llm`/`runtime-tools` can each depend on this
//! crate without a cycle.
//!
//! ```text
//! runtime-core (traits + graph model + executor)
//!       ▲                ▲                ▲
//!       │                │                │
//! runtime-store    runtime-llm     runtime-tools
//! ```
//!
//! `runtime-orchestrator` wires concrete implementations from those
//! crates into an `AgentRuntime` and drives `ExecutionStream`s from it.

pub mod error;
pub mod event_bus;
pub mod executor;
pub mod expr;
pub mod graph;
pub mod judge;
pub mod llm_client;
pub mod model;
pub mod retry;
pub mod store_traits;
pub mod stream;
pub mod tool_registry;

pub use error::{GraphError, Result};
pub use event_bus::{AgentEvent, EventBus, EventType, SubscriptionFilter, SubscriptionId};
pub use executor::{
    CancellationToken, EdgeDecision, GraphExecutor, LoopConfig, NodeOutcome, PendingInput, VisitIdentity,
    evaluate_edges,
};
pub use expr::ConditionExpr;
pub use graph::{
    ConversationMode, EdgeCondition, EdgeSpec, EntryPointSpec, Goal, GraphSpec, IsolationLevel, NodeSpec,
    SuccessCriterion, TriggerConfig, TriggerType,
};
pub use judge::{ImplicitJudge, Judge, JudgeInput, JudgeOutcome, Verdict};
pub use llm_client::{GenerateResult, LlmClient, LlmError, Message, Role, ToolCallRequest, ToolDef};
pub use model::{
    ConversationMessage, EscalationTicket, MessageKind, NodeCursor, Severity, SessionState, SessionStatus,
    SharedMemory, ToolCallRecord,
};
pub use retry::{state_lock_retry_policy, RetryPolicy, RetryState};
pub use store_traits::{repair_orphans, CheckpointStore, ConversationStore, OutputAccumulator, SessionStore, StoreError};
pub use stream::{ExecutionStream, StreamError, StreamHandle};
pub use tool_registry::{ToolCallResult, ToolContext, ToolError, ToolRegistry};
