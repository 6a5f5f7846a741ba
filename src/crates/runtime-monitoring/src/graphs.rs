//! Reference `GraphSpec`s for the monitoring pattern.
//!
//! ```text
//!   worker graph (any primary graph)
//!        │ conversation/session store reads
//!        ▼
//!   ┌───────────────┐  2-min timer   ┌────────────────────────┐
//!   │  Health Judge │◀───────────────│ TriggerSources (Timer) │
//!   │   "watch"     │                └────────────────────────┘
//!   └──────┬────────┘
//!          │ emit_escalation_ticket → WORKER_ESCALATION_TICKET
//!          ▼
//!   ┌────────────────┐  event trigger
//!   │  Queen "triage" │◀── subscribes to WORKER_ESCALATION_TICKET
//!   └──────┬──────────┘
//!          │ notify_operator → QUEEN_INTERVENTION_REQUESTED
//!          ▼
//!     human operator
//! ```
//!
//! Both graphs are single terminal-node loops: the node's only job each
//! visit is to decide whether to call its one tool, so `outputKeys` is
//! empty and the implicit judge ACCEPTs on any turn with no tool calls
//! left pending (rule 2/3 of §4.6 — nothing is required, so a plain
//! assistant reply or a completed tool call both satisfy it).

use runtime_core::{
    ConversationMode, EdgeSpec, EntryPointSpec, GraphSpec, IsolationLevel, NodeSpec, Result, TriggerConfig,
    TriggerType,
};

fn watcher_node() -> NodeSpec {
    NodeSpec {
        id: "watch".to_string(),
        description: "Observes a worker's recent verdicts and evidence, escalating stalls.".to_string(),
        system_prompt: "You are the Health Judge. You are given a worker's recent judge verdicts \
            and evidence. If the worker has stalled (many consecutive RETRY verdicts against the \
            same evidence), call emit_escalation_ticket describing the stall. Otherwise reply with \
            a short 'healthy' observation and make no tool call."
            .to_string(),
        input_keys: vec!["workerVerdicts".to_string(), "workerEvidence".to_string()],
        output_keys: Vec::new(),
        nullable_output_keys: Vec::new(),
        tools: vec!["emit_escalation_ticket".to_string()],
        client_facing: false,
        isolation_level: IsolationLevel::Isolated,
        conversation_mode: ConversationMode::Isolated,
        max_node_visits: 0,
        max_retries: 3,
        success_criteria: "Escalate stalled workers; stay silent otherwise.".to_string(),
        metadata: Default::default(),
    }
}

fn triage_node() -> NodeSpec {
    NodeSpec {
        id: "triage".to_string(),
        description: "Reviews an incoming escalation ticket and decides whether to page a human."
            .to_string(),
        system_prompt: "You are the Queen. You receive an EscalationTicket. If its severity is \
            medium or higher, call notify_operator with a short analysis. Low-severity tickets may \
            be acknowledged without a tool call."
            .to_string(),
        input_keys: vec!["ticket".to_string()],
        output_keys: Vec::new(),
        nullable_output_keys: Vec::new(),
        tools: vec!["notify_operator".to_string()],
        client_facing: false,
        isolation_level: IsolationLevel::Isolated,
        conversation_mode: ConversationMode::Isolated,
        max_node_visits: 0,
        max_retries: 3,
        success_criteria: "Page the operator for medium+ severity tickets.".to_string(),
        metadata: Default::default(),
    }
}

/// A secondary graph that wakes every two minutes, inspects a worker's
/// recent judge verdicts, and escalates on a stall.
pub fn health_judge_graph() -> Result<GraphSpec> {
    let spec = GraphSpec {
        id: "health-judge".to_string(),
        name: Some("Health Judge".to_string()),
        description: Some("Reference monitoring graph: escalates stalled worker nodes.".to_string()),
        nodes: vec![watcher_node()],
        edges: Vec::<EdgeSpec>::new(),
        entry_node: "watch".to_string(),
        terminal_nodes: std::iter::once("watch".to_string()).collect(),
        pause_nodes: Default::default(),
        entry_points: vec![EntryPointSpec {
            id: "watch-timer".to_string(),
            entry_node: "watch".to_string(),
            trigger_type: TriggerType::Timer,
            trigger_config: TriggerConfig {
                interval_minutes: Some(2),
                ..Default::default()
            },
            isolation_level: IsolationLevel::Isolated,
            max_concurrent: 1,
        }],
        goal: None,
    };
    spec.validate()?;
    Ok(spec)
}

/// A secondary graph triggered by `WORKER_ESCALATION_TICKET` events,
/// deciding whether to page a human operator.
pub fn queen_graph() -> Result<GraphSpec> {
    let spec = GraphSpec {
        id: "queen".to_string(),
        name: Some("Queen".to_string()),
        description: Some("Reference monitoring graph: triages escalation tickets.".to_string()),
        nodes: vec![triage_node()],
        edges: Vec::<EdgeSpec>::new(),
        entry_node: "triage".to_string(),
        terminal_nodes: std::iter::once("triage".to_string()).collect(),
        pause_nodes: Default::default(),
        entry_points: vec![EntryPointSpec {
            id: "triage-on-ticket".to_string(),
            entry_node: "triage".to_string(),
            trigger_type: TriggerType::Event,
            trigger_config: TriggerConfig {
                event_types: vec!["WORKER_ESCALATION_TICKET".to_string()],
                exclude_own_graph: true,
                ..Default::default()
            },
            isolation_level: IsolationLevel::Isolated,
            max_concurrent: 4,
        }],
        goal: None,
    };
    spec.validate()?;
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_judge_graph_is_structurally_valid() {
        let spec = health_judge_graph().unwrap();
        assert_eq!(spec.entry_node, "watch");
        assert!(spec.terminal_nodes.contains("watch"));
        assert_eq!(spec.entry_points[0].trigger_type, TriggerType::Timer);
    }

    #[test]
    fn queen_graph_subscribes_to_worker_escalation_ticket_events() {
        let spec = queen_graph().unwrap();
        assert_eq!(spec.entry_points[0].trigger_type, TriggerType::Event);
        assert_eq!(spec.entry_points[0].trigger_config.event_types, vec!["WORKER_ESCALATION_TICKET".to_string()]);
        assert!(spec.entry_points[0].trigger_config.exclude_own_graph);
    }

    #[test]
    fn both_graphs_reference_their_tool_in_the_watcher_triage_node() {
        let judge = health_judge_graph().unwrap();
        let queen = queen_graph().unwrap();
        assert!(judge.nodes[0].tools.contains(&"emit_escalation_ticket".to_string()));
        assert!(queen.nodes[0].tools.contains(&"notify_operator".to_string()));
    }
}
