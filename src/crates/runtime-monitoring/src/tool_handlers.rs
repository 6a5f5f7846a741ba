//! The two tools that make the Health Judge / Queen pattern real:
//! `emit_escalation_ticket` (Health Judge) publishes a
//! `WORKER_ESCALATION_TICKET` event; `notify_operator` (Queen) publishes
//! `QUEEN_INTERVENTION_REQUESTED`. Neither writes to `SharedMemory` — they
//! are pure EventBus producers, so they hold their own `Arc<EventBus>`
//! rather than reaching for one through `ToolContext` (which only carries
//! the accumulator's `set_output` callback, per `runtime-core`'s narrow
//! contract for the one tool it does make real).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use runtime_core::{
    AgentEvent, EscalationTicket, EventBus, EventType, Severity, ToolCallResult, ToolContext, ToolDef, ToolError,
};
use runtime_tools::ToolHandler;
use serde_json::Value;
use uuid::Uuid;

fn parse_severity(value: &Value, tool_name: &str) -> Result<Severity, ToolError> {
    match value.as_str() {
        Some("low") => Ok(Severity::Low),
        Some("medium") => Ok(Severity::Medium),
        Some("high") => Ok(Severity::High),
        Some("critical") => Ok(Severity::Critical),
        other => Err(ToolError::Failed {
            name: tool_name.to_string(),
            reason: format!("invalid severity '{other:?}', expected one of low/medium/high/critical"),
        }),
    }
}

fn required_str<'a>(args: &'a Value, field: &str, tool_name: &str) -> Result<&'a str, ToolError> {
    args.get(field).and_then(Value::as_str).ok_or_else(|| ToolError::Failed {
        name: tool_name.to_string(),
        reason: format!("missing required field '{field}'"),
    })
}

/// Builds and publishes an `EscalationTicket` from the Health Judge's
/// findings about a worker graph it has been observing over the shared
/// EventBus and conversation store. The judge's own conversation mode is
/// `isolated` per visit, so every field the ticket needs is an explicit
/// argument rather than something read off `ToolContext`.
pub struct EmitEscalationTicketTool {
    bus: Arc<EventBus>,
}

impl EmitEscalationTicketTool {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl ToolHandler for EmitEscalationTicketTool {
    fn def(&self) -> ToolDef {
        ToolDef {
            name: "emit_escalation_ticket".to_string(),
            description: "File an escalation ticket describing a stalled or failing worker node."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "workerAgentId": {"type": "string"},
                    "workerSessionId": {"type": "string"},
                    "workerNodeId": {"type": "string"},
                    "workerGraphId": {"type": "string"},
                    "severity": {"type": "string", "enum": ["low", "medium", "high", "critical"]},
                    "cause": {"type": "string"},
                    "judgeReasoning": {"type": "string"},
                    "suggestedAction": {"type": "string"},
                    "recentVerdicts": {"type": "array", "items": {"type": "string"}},
                    "totalStepsChecked": {"type": "integer"},
                    "stepsSinceLastAccept": {"type": "integer"},
                    "stallMinutes": {"type": "number"},
                    "evidenceSnippet": {"type": "string"},
                },
                "required": [
                    "workerAgentId", "workerSessionId", "workerNodeId", "workerGraphId",
                    "severity", "cause", "judgeReasoning", "suggestedAction",
                    "recentVerdicts", "totalStepsChecked", "stepsSinceLastAccept", "evidenceSnippet",
                ],
            }),
        }
    }

    async fn call(&self, args: Value, ctx: &ToolContext<'_>) -> Result<ToolCallResult, ToolError> {
        let name = "emit_escalation_ticket";
        let severity = parse_severity(args.get("severity").unwrap_or(&Value::Null), name)?;
        let recent_verdicts = args
            .get("recentVerdicts")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        let ticket = EscalationTicket {
            ticket_id: Uuid::new_v4(),
            created_at: Utc::now(),
            worker_agent_id: required_str(&args, "workerAgentId", name)?.to_string(),
            worker_session_id: required_str(&args, "workerSessionId", name)?.to_string(),
            worker_node_id: required_str(&args, "workerNodeId", name)?.to_string(),
            worker_graph_id: required_str(&args, "workerGraphId", name)?.to_string(),
            severity,
            cause: required_str(&args, "cause", name)?.to_string(),
            judge_reasoning: required_str(&args, "judgeReasoning", name)?.to_string(),
            suggested_action: required_str(&args, "suggestedAction", name)?.to_string(),
            recent_verdicts,
            total_steps_checked: args.get("totalStepsChecked").and_then(Value::as_u64).unwrap_or(0) as u32,
            steps_since_last_accept: args.get("stepsSinceLastAccept").and_then(Value::as_u64).unwrap_or(0) as u32,
            stall_minutes: args.get("stallMinutes").and_then(Value::as_f64),
            evidence_snippet: EscalationTicket::truncate_evidence(required_str(&args, "evidenceSnippet", name)?),
        };

        let event = AgentEvent::new(EventType::WorkerEscalationTicket, serde_json::json!({ "ticket": ticket }))
            .with_graph(ctx.graph_id)
            .with_node(ctx.node_id);
        self.bus.publish(event).await;

        Ok(ToolCallResult::ok(serde_json::json!({ "ticketId": ticket.ticket_id })))
    }
}

/// Queen's response to a `WORKER_ESCALATION_TICKET`: publishes
/// `QUEEN_INTERVENTION_REQUESTED` so a human-facing subscriber picks it up.
/// `queenStreamId` is derived the same way `stream.rs` derives a stream's
/// id from its graph id (`format!("stream-{}", graph.id)`), since the tool
/// only has the Queen's own `ctx.graph_id` to work from.
pub struct NotifyOperatorTool {
    bus: Arc<EventBus>,
}

impl NotifyOperatorTool {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl ToolHandler for NotifyOperatorTool {
    fn def(&self) -> ToolDef {
        ToolDef {
            name: "notify_operator".to_string(),
            description: "Notify a human operator that an escalation ticket needs attention."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "ticketId": {"type": "string"},
                    "analysis": {"type": "string"},
                    "severity": {"type": "string", "enum": ["low", "medium", "high", "critical"]},
                },
                "required": ["ticketId", "analysis", "severity"],
            }),
        }
    }

    async fn call(&self, args: Value, ctx: &ToolContext<'_>) -> Result<ToolCallResult, ToolError> {
        let name = "notify_operator";
        let severity = parse_severity(args.get("severity").unwrap_or(&Value::Null), name)?;
        let ticket_id = required_str(&args, "ticketId", name)?.to_string();
        let analysis = required_str(&args, "analysis", name)?.to_string();

        let event = AgentEvent::new(
            EventType::QueenInterventionRequested,
            serde_json::json!({
                "ticketId": ticket_id,
                "analysis": analysis,
                "severity": severity,
                "queenGraphId": ctx.graph_id,
                "queenStreamId": format!("stream-{}", ctx.graph_id),
            }),
        )
        .with_graph(ctx.graph_id)
        .with_node(ctx.node_id);
        self.bus.publish(event).await;

        Ok(ToolCallResult::ok(serde_json::json!({ "notified": true })))
    }
}
