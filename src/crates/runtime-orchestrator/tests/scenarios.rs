//! Orchestration-level scenario coverage: the parts of the spec that need
//! an `AgentRuntime` (trigger wiring, deterministic continuous session
//! ids, cross-graph event routing) rather than a bare `ExecutionStream`.

use std::sync::Arc;
use std::time::Duration;

use runtime_core::{
    ConversationMode, EdgeSpec, EntryPointSpec, EventType, GraphSpec, ImplicitJudge, IsolationLevel, LoopConfig,
    MessageKind, NodeSpec, SharedMemory, SubscriptionFilter, ToolCallRequest, TriggerConfig, TriggerType,
};
use runtime_llm::{MockLlmClient, ScriptedTurn};
use runtime_monitoring::{queen_graph, NotifyOperatorTool};
use runtime_orchestrator::AgentRuntime;
use runtime_store::FileSessionStore;
use runtime_tools::ToolRegistryBuilder;

fn client_facing_graph() -> GraphSpec {
    let node = NodeSpec {
        id: "greeter".to_string(),
        description: "Greets the user then waits for their question.".to_string(),
        system_prompt: "Greet the user and wait for a question, then set the answer.".to_string(),
        input_keys: Vec::new(),
        output_keys: vec!["answer".to_string()],
        nullable_output_keys: Vec::new(),
        tools: vec!["set_output".to_string()],
        client_facing: true,
        isolation_level: IsolationLevel::Isolated,
        conversation_mode: ConversationMode::Isolated,
        max_node_visits: 0,
        max_retries: 5,
        success_criteria: "Present to the user, then answer once they reply.".to_string(),
        metadata: Default::default(),
    };
    GraphSpec {
        id: "interactive".to_string(),
        name: None,
        description: None,
        nodes: vec![node],
        edges: Vec::<EdgeSpec>::new(),
        entry_node: "greeter".to_string(),
        terminal_nodes: std::iter::once("greeter".to_string()).collect(),
        pause_nodes: Default::default(),
        entry_points: vec![EntryPointSpec {
            id: "manual".to_string(),
            entry_node: "greeter".to_string(),
            trigger_type: TriggerType::Manual,
            trigger_config: TriggerConfig::default(),
            isolation_level: IsolationLevel::Isolated,
            max_concurrent: 1,
        }],
        goal: None,
    }
}

/// Scenario 2 (client-facing block + inject): the greeter presents to the
/// user on its first turn (no required output yet, so the judge retries,
/// but the retry is a wait-for-reply, not a stall) and only answers once
/// `InjectInput` delivers content.
#[tokio::test]
async fn client_facing_node_blocks_on_client_input_requested_then_accepts() {
    let dir = tempfile::tempdir().unwrap();
    let script = vec![
        ScriptedTurn::Text("Hello! What would you like to know?".to_string()),
        ScriptedTurn::ToolCalls(vec![ToolCallRequest {
            call_id: "c1".into(),
            name: "set_output".into(),
            args: serde_json::json!({ "key": "answer", "value": "42" }),
        }]),
        ScriptedTurn::Text("There you go.".to_string()),
    ];
    let runtime = AgentRuntime::new(
        runtime_core::EventBus::new(),
        Arc::new(MockLlmClient::new(script)),
        Arc::new(ToolRegistryBuilder::with_defaults().build()),
        Arc::new(ImplicitJudge),
        LoopConfig::default(),
        dir.path().to_path_buf(),
    );
    runtime.add_graph("interactive".to_string(), client_facing_graph(), None, None, true).await.unwrap();

    let event_bus = runtime.event_bus();
    let (_sub, mut rx) = event_bus.subscribe(SubscriptionFilter::default()).await;

    let runtime_for_trigger = runtime.clone();
    let trigger = tokio::spawn(async move {
        runtime_for_trigger
            .trigger(Some("interactive".to_string()), "manual", SharedMemory::default(), None)
            .await
    });

    let mut requested = false;
    while let Ok(Some(event)) = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await {
        if event.event_type == EventType::ClientInputRequested {
            requested = true;
            break;
        }
    }
    assert!(requested, "greeter should have asked a question before any output is set");

    let delivered = runtime.inject_input("greeter", "What is the answer to everything?".to_string(), None).await.unwrap();
    assert!(delivered);

    let handle = tokio::time::timeout(Duration::from_secs(2), trigger)
        .await
        .expect("execution should finish after input is delivered")
        .unwrap()
        .unwrap();

    let session_store = FileSessionStore::new(dir.path().to_path_buf());
    let state = runtime_core::SessionStore::read_state(&session_store, &handle.session_id).await.unwrap();
    assert_eq!(state.memory.get("answer"), Some(&serde_json::Value::from("42")));
}

fn ticking_graph(id: &str) -> GraphSpec {
    let node = NodeSpec {
        id: "tick".to_string(),
        description: "A periodic worker with no required output.".to_string(),
        system_prompt: "Reply briefly; you have nothing to report.".to_string(),
        input_keys: Vec::new(),
        output_keys: Vec::new(),
        nullable_output_keys: Vec::new(),
        tools: Vec::new(),
        client_facing: false,
        isolation_level: IsolationLevel::Shared,
        conversation_mode: ConversationMode::Continuous,
        max_node_visits: 0,
        max_retries: 3,
        success_criteria: "always".to_string(),
        metadata: Default::default(),
    };
    GraphSpec {
        id: id.to_string(),
        name: None,
        description: None,
        nodes: vec![node],
        edges: Vec::<EdgeSpec>::new(),
        entry_node: "tick".to_string(),
        terminal_nodes: std::iter::once("tick".to_string()).collect(),
        pause_nodes: Default::default(),
        entry_points: vec![EntryPointSpec {
            id: "timer".to_string(),
            entry_node: "tick".to_string(),
            trigger_type: TriggerType::Timer,
            trigger_config: TriggerConfig {
                interval_minutes: Some(2),
                ..Default::default()
            },
            isolation_level: IsolationLevel::Shared,
            max_concurrent: 1,
        }],
        goal: None,
    }
}

/// Scenario 4 (timer-driven continuous session): three manual fires of the
/// same entry point (standing in for three real timer ticks, without
/// waiting out `spawn_timer_trigger`'s own sleep) resume the same
/// deterministic session id and append to one shared conversation log,
/// each preceded by a `system_marker` transition.
#[tokio::test]
async fn repeated_continuous_fires_share_one_session_and_conversation() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = AgentRuntime::new(
        runtime_core::EventBus::new(),
        Arc::new(MockLlmClient::single_text("nothing to report")),
        Arc::new(ToolRegistryBuilder::with_defaults().build()),
        Arc::new(ImplicitJudge),
        LoopConfig::default(),
        dir.path().to_path_buf(),
    );
    runtime.add_graph("watcher".to_string(), ticking_graph("watcher"), None, None, true).await.unwrap();

    let mut session_ids = Vec::new();
    for _ in 0..3 {
        let handle = runtime
            .trigger_continuous("watcher".to_string(), "timer".to_string(), SharedMemory::default())
            .await
            .unwrap();
        session_ids.push(handle.session_id);
    }
    assert_eq!(session_ids[0], "watcher-timer");
    assert!(session_ids.iter().all(|id| *id == session_ids[0]));

    let session_store = FileSessionStore::new(dir.path().to_path_buf());
    let conversation =
        runtime_core::SessionStore::conversation_store_for(&session_store, "tick", &session_ids[0]);
    let messages = runtime_core::ConversationStore::read_from(&*conversation, 0).await.unwrap();
    let markers = messages.iter().filter(|m| matches!(m.kind, MessageKind::SystemMarker)).count();
    let replies = messages.iter().filter(|m| matches!(m.kind, MessageKind::Assistant)).count();
    assert_eq!(markers, 3, "each fire should announce the transition into the shared conversation");
    assert_eq!(replies, 3, "each fire should leave its own reply in the same log");
}

fn queen_tool_registry(bus: runtime_core::EventBus) -> runtime_tools::DefaultToolRegistry {
    ToolRegistryBuilder::with_defaults().with_tool(NotifyOperatorTool::new(Arc::new(bus))).build()
}

/// Scenario 5 (escalation ticket routing): a `WORKER_ESCALATION_TICKET`
/// published on the shared bus (standing in for the Health Judge's
/// `emit_escalation_ticket` call) reaches the Queen graph's event-triggered
/// entry point, which calls `notify_operator` and publishes
/// `QUEEN_INTERVENTION_REQUESTED` in response.
#[tokio::test]
async fn worker_escalation_ticket_drives_the_queen_to_notify_the_operator() {
    let dir = tempfile::tempdir().unwrap();
    let event_bus = runtime_core::EventBus::new();
    let script = vec![
        ScriptedTurn::ToolCalls(vec![ToolCallRequest {
            call_id: "n1".into(),
            name: "notify_operator".into(),
            args: serde_json::json!({ "ticketId": "ticket-1", "analysis": "worker stalled 18 steps", "severity": "high" }),
        }]),
        ScriptedTurn::Text("paged the operator".to_string()),
    ];
    let runtime = AgentRuntime::new(
        event_bus.clone(),
        Arc::new(MockLlmClient::new(script)),
        Arc::new(queen_tool_registry(event_bus.clone())),
        Arc::new(ImplicitJudge),
        LoopConfig::default(),
        dir.path().to_path_buf(),
    );
    runtime.add_graph("queen".to_string(), queen_graph().unwrap(), None, Some("queen".to_string()), false).await.unwrap();

    let (_sub, mut rx) = event_bus.subscribe(SubscriptionFilter::default()).await;

    event_bus
        .publish(
            runtime_core::AgentEvent::new(
                EventType::WorkerEscalationTicket,
                serde_json::json!({ "ticket": { "ticketId": "ticket-1" } }),
            )
            .with_graph("health-judge"),
        )
        .await;

    let mut intervened = None;
    while let Ok(Some(event)) = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await {
        if event.event_type == EventType::QueenInterventionRequested {
            intervened = Some(event);
            break;
        }
    }
    let event = intervened.expect("queen should have published an intervention request");
    assert_eq!(event.payload.get("ticketId").and_then(|v| v.as_str()), Some("ticket-1"));
}

/// Scenario 7 (isolation of secondary graphs): a secondary graph's session
/// lives under its own `storage_subpath` and never touches the primary's
/// `state.json`; removing the secondary leaves the primary session intact.
#[tokio::test]
async fn secondary_graph_state_is_isolated_from_the_primary() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = AgentRuntime::new(
        runtime_core::EventBus::new(),
        Arc::new(MockLlmClient::single_text("nothing to report")),
        Arc::new(ToolRegistryBuilder::with_defaults().build()),
        Arc::new(ImplicitJudge),
        LoopConfig::default(),
        dir.path().to_path_buf(),
    );
    runtime.add_graph("primary".to_string(), ticking_graph("primary"), None, None, true).await.unwrap();
    runtime.add_graph("health-judge".to_string(), ticking_graph("health-judge"), None, Some("health-judge".to_string()), false).await.unwrap();

    let primary_handle = runtime.trigger_continuous("primary".to_string(), "timer".to_string(), SharedMemory::default()).await.unwrap();
    let secondary_handle =
        runtime.trigger_continuous("health-judge".to_string(), "timer".to_string(), SharedMemory::default()).await.unwrap();

    let primary_state_path = dir.path().join(&primary_handle.session_id).join("state.json");
    let secondary_state_path = dir.path().join("health-judge").join(&secondary_handle.session_id).join("state.json");
    assert!(primary_state_path.exists(), "primary session state should live at the storage root");
    assert!(secondary_state_path.exists(), "secondary session state should live under its own subpath");
    assert!(
        !dir.path().join(&secondary_handle.session_id).join("state.json").exists(),
        "secondary session must not also land at the storage root"
    );

    runtime.remove_graph("health-judge").await.unwrap();
    assert!(primary_state_path.exists(), "removing a secondary graph must not touch the primary's session");
}

/// Round-trip law: `InjectInput` followed by `CLIENT_INPUT_RECEIVED`
/// increments `userInteractionCount` by exactly 1, not once per queued
/// reply or per retry turn.
#[tokio::test]
async fn inject_input_increments_user_interaction_count_by_exactly_one() {
    let dir = tempfile::tempdir().unwrap();
    let script = vec![
        ScriptedTurn::Text("What would you like to know?".to_string()),
        ScriptedTurn::ToolCalls(vec![ToolCallRequest {
            call_id: "c1".into(),
            name: "set_output".into(),
            args: serde_json::json!({ "key": "answer", "value": "42" }),
        }]),
    ];
    let runtime = AgentRuntime::new(
        runtime_core::EventBus::new(),
        Arc::new(MockLlmClient::new(script)),
        Arc::new(ToolRegistryBuilder::with_defaults().build()),
        Arc::new(ImplicitJudge),
        LoopConfig::default(),
        dir.path().to_path_buf(),
    );
    runtime.add_graph("interactive".to_string(), client_facing_graph(), None, None, true).await.unwrap();

    let event_bus = runtime.event_bus();
    let (_sub, mut rx) = event_bus.subscribe(SubscriptionFilter::default()).await;

    let runtime_for_trigger = runtime.clone();
    let trigger = tokio::spawn(async move {
        runtime_for_trigger.trigger(Some("interactive".to_string()), "manual", SharedMemory::default(), None).await
    });

    while let Ok(Some(event)) = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await {
        if event.event_type == EventType::ClientInputRequested {
            break;
        }
    }
    runtime.inject_input("greeter", "What is the answer to everything?".to_string(), None).await.unwrap();

    let handle = tokio::time::timeout(Duration::from_secs(2), trigger).await.unwrap().unwrap().unwrap();

    let session_store = FileSessionStore::new(dir.path().to_path_buf());
    let state = runtime_core::SessionStore::read_state(&session_store, &handle.session_id).await.unwrap();
    assert_eq!(state.cursor.user_interaction_count, 1);
}
