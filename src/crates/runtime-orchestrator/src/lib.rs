//! # runtime-orchestrator
//!
//! `AgentRuntime`: the multi-graph registry that composes `runtime-core`'s
//! `ExecutionStream`s, `runtime-store`'s persistence, `runtime-llm`'s
//! backend, and `runtime-tools`'s registry into a running system, plus
//! the trigger sources (Timer/Event/Webhook) that fire entry points
//! without an external caller, and the HTTP/WS front implementing the
//! Runtime RPC surface.
//!
//! ```text
//! runtime-orchestrator
//!       │
//!       ├── agent_runtime: AgentRuntime, Registration
//!       ├── triggers: TriggerTask, spawn_timer_trigger, spawn_event_trigger
//!       ├── config: RuntimeConfig, YAML loader
//!       └── api: Axum router over the Runtime RPC surface
//! ```

pub mod agent_runtime;
pub mod api;
pub mod config;
pub mod error;
pub mod triggers;

pub use agent_runtime::{AgentRuntime, Registration};
pub use error::{Result, RuntimeError};
pub use triggers::{spawn_event_trigger, spawn_timer_trigger, verify_webhook_signature, TriggerTask, WebhookRoute};
