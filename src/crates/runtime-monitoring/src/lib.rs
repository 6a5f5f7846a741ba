//! # runtime-monitoring
//!
//! The reference monitoring pattern: a pair of secondary graphs, Health
//! Judge and Queen, built entirely on the primitives every primary graph
//! uses (`GraphSpec`, `GraphExecutor`, `ToolRegistry`, `EventBus`). A
//! Health Judge watches worker progress and escalates stalls by calling
//! [`tool_handlers::EmitEscalationTicketTool`]; a Queen reacts to
//! escalations by calling [`tool_handlers::NotifyOperatorTool`]. Neither
//! graph is special-cased by the executor — they are ordinary `GraphSpec`s
//! with ordinary tools, wired up by `runtime-orchestrator` like any other
//! secondary graph.
//!
//! Grounded on `langgraph-prebuilt`'s role as the pack's "ready-to-use
//! agent architecture" crate, generalized from chat-agent patterns
//! (ReAct/Plan-Execute/Reflection) to this runtime's one prebuilt pattern.

pub mod graphs;
pub mod tool_handlers;

pub use graphs::{health_judge_graph, queen_graph};
pub use tool_handlers::{EmitEscalationTicketTool, NotifyOperatorTool};
