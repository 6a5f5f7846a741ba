//! `GraphExecutor`: the step loop for one node visit — LLM call, tool
//! dispatch, judge, accumulate, transition — plus the pure edge-evaluation
//! function that decides what happens after a visit completes.
//!
//! ```text
//! ┌─ node visit ──────────────────────────────────────────────┐
//! │ loop:                                                     │
//! │   llm.generate(history, tools) ──▶ deltas, toolCalls      │
//! │   publish LLM_TEXT_DELTA (+ CLIENT_OUTPUT_DELTA)          │
//! │   toolCalls? ─▶ tools.call(...) ─▶ accumulator.set(...)   │
//! │   judge.evaluate(...) ─▶ CONTINUE | RETRY | ACCEPT | ESC  │
//! │   persist cursor                                          │
//! └────────────────────────────────────────────────────────────┘
//!                         │ ACCEPT
//!                         ▼
//!              evaluate_edges(graph, node, memory)
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{oneshot, Mutex};

use crate::error::{GraphError, Result};
use crate::event_bus::{AgentEvent, EventBus, EventType};
use crate::graph::{EdgeCondition, EdgeSpec, GraphSpec, NodeSpec};
use crate::judge::{Judge, JudgeInput, Verdict};
use crate::llm_client::{LlmClient, LlmError, Message, ToolDef};
use crate::model::{ConversationMessage, MessageKind, SharedMemory};
use crate::retry::RetryPolicy;
use crate::store_traits::{ConversationStore, OutputAccumulator};
use crate::tool_registry::{ToolContext, ToolRegistry};

/// Per-runtime/per-loop-config knobs sourced from the environment (§6).
#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub max_iterations: u32,
    pub max_tool_calls_per_turn: u32,
    pub max_history_tokens: Option<u32>,
    /// Consecutive RETRY verdicts with no progress before the loop forces
    /// an ESCALATE. Left as an explicit knob since §4.6 only says
    /// "if thresholds exceeded" without naming a default.
    pub max_stall_retries: u32,
    pub llm_retry_policy: RetryPolicy,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            max_tool_calls_per_turn: 16,
            max_history_tokens: None,
            max_stall_retries: 10,
            llm_retry_policy: RetryPolicy::default(),
        }
    }
}

/// A cooperative cancellation flag shared between an `ExecutionStream` and
/// the `GraphExecutor` it drives. Checked between the LLM call and tool
/// dispatch, and between each tool call (§5).
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Tracks nodes awaiting `CLIENT_INPUT_RECEIVED`. `ExecutionStream`
/// forwards `InjectInput` calls here; the step loop blocks on
/// `wait_for` while `CLIENT_INPUT_REQUESTED` is outstanding.
#[derive(Default)]
pub struct PendingInput {
    waiters: Mutex<HashMap<String, oneshot::Sender<String>>>,
}

impl PendingInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn wait_for(&self, node_id: &str) -> String {
        let (tx, rx) = oneshot::channel();
        self.waiters.lock().await.insert(node_id.to_string(), tx);
        rx.await.unwrap_or_default()
    }

    /// Returns `true` if a waiter was present and has been delivered to.
    pub async fn deliver(&self, node_id: &str, content: String) -> bool {
        if let Some(tx) = self.waiters.lock().await.remove(node_id) {
            tx.send(content).is_ok()
        } else {
            false
        }
    }
}

/// Identifies the (graph, stream, execution) a node visit belongs to, for
/// event stamping.
#[derive(Debug, Clone)]
pub struct VisitIdentity {
    pub session_id: String,
    pub graph_id: String,
    pub stream_id: String,
    pub execution_id: String,
}

/// Outcome of a completed node visit, handed to edge evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOutcome {
    Accepted,
    Failed,
}

pub struct GraphExecutor {
    pub graph: Arc<GraphSpec>,
    pub llm: Arc<dyn LlmClient>,
    pub tools: Arc<dyn ToolRegistry>,
    pub judge: Arc<dyn Judge>,
    pub event_bus: EventBus,
    pub loop_config: LoopConfig,
    pub pending_input: Arc<PendingInput>,
}

impl GraphExecutor {
    /// Runs the step loop for one visit of `node` in `identity`. Returns
    /// the outcome and the (already cursor-persisted) accumulator so the
    /// caller can flush it into `SharedMemory` and run edge evaluation.
    pub async fn run_node_visit(
        &self,
        identity: &VisitIdentity,
        node: &NodeSpec,
        goal_context: &str,
        conversation: Arc<dyn ConversationStore>,
        memory: &SharedMemory,
        cancel: &CancellationToken,
        replayed_tail: &[ConversationMessage],
    ) -> Result<(NodeOutcome, OutputAccumulator)> {
        let mut accumulator = OutputAccumulator::open(conversation.clone()).await?;
        let mut iteration = accumulator.cursor().iteration;
        let mut user_interaction_count = accumulator.cursor().user_interaction_count;
        let mut stall_count = accumulator.cursor().stall_count;

        let mut history: Vec<Message> = vec![Message::system(compose_system_prompt(node, goal_context))];
        // On resume, `replayed_tail` is the un-cursored log `repair_orphans`
        // already replayed (including any synthetic interrupted results);
        // folding it back in here is what lets a node pick up a ReAct loop
        // mid-turn instead of starting the model over with no memory of
        // what it had already called.
        for msg in replayed_tail {
            if let Some(m) = conversation_message_as_history(msg) {
                history.push(m);
            }
        }
        let tool_defs: Vec<ToolDef> = self.tools.list(&node.tools);

        self.event_bus
            .publish(self.stamp(identity, node, AgentEvent::new(EventType::NodeLoopStarted, Value::Null)))
            .await;

        loop {
            if iteration >= self.loop_config.max_iterations {
                self.publish_escalation(identity, node, "max iterations exceeded").await;
                return self.finish_visit(identity, node, NodeOutcome::Failed, accumulator).await;
            }
            if cancel.is_cancelled() {
                return self.cancel_cleanup(identity, node, accumulator).await;
            }

            let turn = match self.generate_with_retry(&history, &tool_defs).await {
                Ok(turn) => turn,
                Err(GraphError::Llm(LlmError::Fatal(reason))) => {
                    self.publish_escalation(identity, node, &format!("llm call failed: {}", reason))
                        .await;
                    return self.finish_visit(identity, node, NodeOutcome::Failed, accumulator).await;
                }
                Err(other) => return Err(other),
            };

            for delta in &turn.deltas {
                self.event_bus
                    .publish(self.stamp(identity, node, AgentEvent::new(
                        EventType::LlmTextDelta,
                        serde_json::json!({ "text": delta }),
                    )))
                    .await;
                if node.client_facing {
                    self.event_bus
                        .publish(self.stamp(identity, node, AgentEvent::new(
                            EventType::ClientOutputDelta,
                            serde_json::json!({ "text": delta }),
                        )))
                        .await;
                }
            }

            if turn.has_tool_calls() {
                let tool_call_msg =
                    ConversationMessage::new(MessageKind::ToolCall, serde_json::to_value(&turn.tool_calls)?);
                conversation
                    .append(tool_call_msg.clone())
                    .await
                    .map_err(store_to_graph_error(identity, node))?;
                if let Some(m) = conversation_message_as_history(&tool_call_msg) {
                    history.push(m);
                }

                for call in turn.tool_calls.iter().take(self.loop_config.max_tool_calls_per_turn as usize) {
                    if cancel.is_cancelled() {
                        return self.cancel_cleanup(identity, node, accumulator).await;
                    }
                    self.event_bus
                        .publish(self.stamp(identity, node, AgentEvent::new(
                            EventType::ToolCallStarted,
                            serde_json::json!({ "callId": call.call_id, "name": call.name, "args": call.args }),
                        )))
                        .await;

                    let set_key: Mutex<Option<(String, Value)>> = Mutex::new(None);
                    let capture = |k: String, v: Value| {
                        // `try_lock` is safe here: the closure runs
                        // synchronously inside `tools.call`, never
                        // concurrently with this scope.
                        if let Ok(mut slot) = set_key.try_lock() {
                            *slot = Some((k, v));
                        }
                    };
                    let ctx = ToolContext {
                        session_id: &identity.session_id,
                        graph_id: &identity.graph_id,
                        node_id: &node.id,
                        set_output: &capture,
                    };
                    let result = self.tools.call(&call.name, call.args.clone(), &ctx).await;

                    let (result_payload, is_set_output) = match result {
                        Ok(r) => (r.content, call.name == "set_output"),
                        Err(e) => (serde_json::json!({ "error": e.to_string() }), false),
                    };

                    let tool_result_msg = ConversationMessage::new(
                        MessageKind::ToolResult,
                        serde_json::json!({ "callId": call.call_id, "result": result_payload }),
                    );
                    conversation
                        .append(tool_result_msg.clone())
                        .await
                        .map_err(store_to_graph_error(identity, node))?;
                    if let Some(m) = conversation_message_as_history(&tool_result_msg) {
                        history.push(m);
                    }
                    self.event_bus
                        .publish(self.stamp(identity, node, AgentEvent::new(
                            EventType::ToolCallCompleted,
                            serde_json::json!({ "callId": call.call_id, "result": result_payload }),
                        )))
                        .await;

                    if is_set_output {
                        if let Some((key, value)) = set_key.into_inner() {
                            accumulator.set(key, value).await.map_err(store_to_graph_error(identity, node))?;
                        }
                    }
                    push_capped(
                        &mut accumulator.cursor_mut().recent_tool_fingerprints,
                        format!("{}:{}", call.name, call.args),
                    );
                }
            } else {
                conversation
                    .append(ConversationMessage::new(
                        MessageKind::Assistant,
                        serde_json::json!({ "text": turn.final_text.clone().unwrap_or_default() }),
                    ))
                    .await
                    .map_err(store_to_graph_error(identity, node))?;
                if let Some(text) = &turn.final_text {
                    history.push(Message::assistant(text.clone()));
                    push_capped(&mut accumulator.cursor_mut().recent_responses, text.clone());
                }
            }

            iteration += 1;
            let outcome = self
                .judge
                .evaluate(JudgeInput {
                    node,
                    turn: &turn,
                    accumulator: &accumulator,
                    user_interaction_count,
                })
                .await;

            accumulator.cursor_mut().iteration = iteration;
            accumulator.cursor_mut().user_interaction_count = user_interaction_count;
            accumulator.cursor_mut().stall_count = stall_count;
            accumulator.cursor_mut().last_message_ordinal =
                conversation.last_ordinal().await.map_err(store_to_graph_error(identity, node))?;
            accumulator.persist_cursor().await.map_err(store_to_graph_error(identity, node))?;

            match outcome.verdict {
                Verdict::Continue => {}
                Verdict::Retry if node.client_facing && turn.has_visible_text() && !turn.has_tool_calls() => {
                    // The turn presented to the user (rule 2 is satisfied) but
                    // still owes required outputs (rule 3 retried) — block on
                    // a reply rather than burning a stall count, since the
                    // model is waiting on the user, not stuck.
                    self.event_bus
                        .publish(self.stamp(identity, node, AgentEvent::new(
                            EventType::ClientInputRequested,
                            serde_json::json!({ "nodeId": node.id, "prompt": turn.final_text }),
                        )))
                        .await;
                    let reply = self.pending_input.wait_for(&node.id).await;
                    user_interaction_count += 1;
                    history.push(Message::user(reply.clone()));
                    self.event_bus
                        .publish(self.stamp(identity, node, AgentEvent::new(
                            EventType::ClientInputReceived,
                            serde_json::json!({ "nodeId": node.id, "content": reply }),
                        )))
                        .await;
                }
                Verdict::Retry => {
                    stall_count += 1;
                    if stall_count >= self.loop_config.max_stall_retries {
                        self.publish_escalation(identity, node, &outcome.rationale).await;
                        return self.finish_visit(identity, node, NodeOutcome::Failed, accumulator).await;
                    }
                }
                Verdict::Accept => {
                    return self.finish_visit(identity, node, NodeOutcome::Accepted, accumulator).await;
                }
                Verdict::Escalate => {
                    self.publish_escalation(identity, node, &outcome.rationale).await;
                    return self.finish_visit(identity, node, NodeOutcome::Failed, accumulator).await;
                }
            }
        }
    }

    async fn generate_with_retry(
        &self,
        history: &[Message],
        tools: &[ToolDef],
    ) -> Result<crate::llm_client::GenerateResult> {
        let policy = &self.loop_config.llm_retry_policy;
        let mut attempt = 0usize;
        loop {
            match self.llm.generate(history, tools).await {
                Ok(result) => return Ok(result),
                Err(e @ LlmError::Transient(_)) if policy.should_retry(attempt) => {
                    tracing::warn!(attempt, error = %e, "transient LLM failure, retrying");
                    tokio::time::sleep(policy.calculate_delay(attempt)).await;
                    attempt += 1;
                }
                Err(e) => return Err(GraphError::Llm(e)),
            }
        }
    }

    async fn cancel_cleanup(
        &self,
        identity: &VisitIdentity,
        node: &NodeSpec,
        accumulator: OutputAccumulator,
    ) -> Result<(NodeOutcome, OutputAccumulator)> {
        // Five-step cleanup (§5) items (a)-(c); the caller (ExecutionStream)
        // performs (d) state.json write and (e) event emission, since it
        // owns the session-wide memory/state handle this function does not.
        accumulator.persist_cursor().await.ok();
        self.event_bus
            .publish(self.stamp(identity, node, AgentEvent::new(
                EventType::ExecutionPaused,
                serde_json::json!({ "reason": "cancelled" }),
            )))
            .await;
        self.finish_visit(identity, node, NodeOutcome::Failed, accumulator).await
    }

    /// Common exit point for every branch of the step loop: emits
    /// `NODE_LOOP_COMPLETED` once and hands the outcome back to the caller.
    async fn finish_visit(
        &self,
        identity: &VisitIdentity,
        node: &NodeSpec,
        outcome: NodeOutcome,
        accumulator: OutputAccumulator,
    ) -> Result<(NodeOutcome, OutputAccumulator)> {
        self.event_bus
            .publish(self.stamp(identity, node, AgentEvent::new(
                EventType::NodeLoopCompleted,
                serde_json::json!({ "outcome": format!("{:?}", outcome) }),
            )))
            .await;
        Ok((outcome, accumulator))
    }

    async fn publish_escalation(&self, identity: &VisitIdentity, node: &NodeSpec, rationale: &str) {
        tracing::warn!(node = %node.id, rationale, "node visit escalated");
        self.event_bus
            .publish(self.stamp(identity, node, AgentEvent::new(
                EventType::ExecutionFailed,
                serde_json::json!({ "nodeId": node.id, "rationale": rationale }),
            )))
            .await;
    }

    fn stamp(&self, identity: &VisitIdentity, node: &NodeSpec, event: AgentEvent) -> AgentEvent {
        event
            .with_graph(identity.graph_id.clone())
            .with_stream(identity.stream_id.clone())
            .with_node(node.id.clone())
            .with_execution(identity.execution_id.clone())
    }
}

fn store_to_graph_error<'a>(
    identity: &'a VisitIdentity,
    node: &'a NodeSpec,
) -> impl Fn(crate::store_traits::StoreError) -> GraphError + 'a {
    move |e| GraphError::CorruptCursor {
        session_id: identity.session_id.clone(),
        node_id: node.id.clone(),
        reason: e.to_string(),
    }
}

/// Cap on `NodeCursor::recent_responses` / `recent_tool_fingerprints`,
/// enough history for a Health Judge to spot a repeating loop without the
/// cursor growing unboundedly across a long-lived node visit.
const RECENT_HISTORY_CAP: usize = 5;

fn push_capped(list: &mut Vec<String>, item: String) {
    list.push(item);
    if list.len() > RECENT_HISTORY_CAP {
        list.remove(0);
    }
}

/// Projects one persisted conversation entry onto the flat `Message`
/// history an `LlmClient` sees, so a tool call and its result are fed back
/// into the next `generate` call the same way whether they were just
/// written this turn or replayed from the log on resume. `SystemMarker`
/// entries are bookkeeping only and never surface here.
fn conversation_message_as_history(msg: &ConversationMessage) -> Option<Message> {
    match msg.kind {
        MessageKind::Assistant => msg
            .content
            .get("text")
            .and_then(|v| v.as_str())
            .filter(|t| !t.is_empty())
            .map(|t| Message::assistant(t.to_string())),
        MessageKind::ToolCall => Some(Message::assistant(msg.content.to_string())),
        MessageKind::ToolResult => {
            let call_id = msg.content.get("callId").and_then(|v| v.as_str()).unwrap_or_default();
            let body = msg
                .content
                .get("result")
                .or_else(|| msg.content.get("error"))
                .cloned()
                .unwrap_or(Value::Null);
            Some(Message::tool_result(call_id, body.to_string()))
        }
        MessageKind::User => msg
            .content
            .as_str()
            .map(str::to_string)
            .or_else(|| msg.content.get("text").and_then(|v| v.as_str()).map(str::to_string))
            .map(Message::user),
        MessageKind::SystemMarker => None,
    }
}

/// "identity + accounts + narrative + focus(N)" per §4.6; identity/account
/// composition belongs to the agent-package loader (out of scope per §1),
/// so this folds in the node's own prompt plus the informational goal
/// context the caller supplies.
fn compose_system_prompt(node: &NodeSpec, goal_context: &str) -> String {
    let mut prompt = String::new();
    if !goal_context.is_empty() {
        prompt.push_str(goal_context);
        prompt.push('\n');
    }
    if !node.description.is_empty() {
        prompt.push_str(&node.description);
        prompt.push('\n');
    }
    prompt.push_str(&node.system_prompt);
    if !node.success_criteria.is_empty() {
        prompt.push_str("\n\nSuccess criteria: ");
        prompt.push_str(&node.success_criteria);
    }
    prompt
}

/// Result of edge evaluation after a node visit ACCEPTs or fails, per
/// §4.6 steps 1-6.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeDecision {
    /// One or more forward edges matched; spawn a child execution per
    /// target. Their `outputKeys` have already been checked disjoint.
    FanOut(Vec<String>),
    /// No forward edge matched but a feedback edge did; loop back to this
    /// single target.
    Loopback(String),
    /// No edge matched and the node is terminal.
    Complete,
    /// No edge matched and the node is not terminal.
    DeadEnd,
}

fn edge_matches(edge: &EdgeSpec, outcome: NodeOutcome, memory: &SharedMemory) -> Result<bool> {
    Ok(match &edge.condition {
        EdgeCondition::OnSuccess => outcome == NodeOutcome::Accepted,
        EdgeCondition::OnFailure => outcome == NodeOutcome::Failed,
        EdgeCondition::Always => true,
        EdgeCondition::Conditional { .. } => edge
            .parsed_condition()?
            .map(|expr| expr.eval(memory))
            .unwrap_or(false),
    })
}

/// Pure function of `(graph, node, outcome, memory)` — invariant 5, edge
/// determinism. `visit_counts` is read-only here; the caller increments it
/// for the chosen loop-back target and checks `maxNodeVisits` itself so
/// this function never needs to know about escalation side effects.
pub fn evaluate_edges(
    graph: &GraphSpec,
    node_id: &str,
    outcome: NodeOutcome,
    memory: &SharedMemory,
) -> Result<EdgeDecision> {
    let mut forward: Vec<&EdgeSpec> = graph.edges_from(node_id).filter(|e| e.is_forward()).collect();
    let mut feedback: Vec<&EdgeSpec> = graph.edges_from(node_id).filter(|e| !e.is_forward()).collect();
    forward.sort_by(|a, b| b.priority.cmp(&a.priority));
    feedback.sort_by(|a, b| b.priority.cmp(&a.priority));

    let mut matched_forward = Vec::new();
    for edge in &forward {
        if edge_matches(edge, outcome, memory)? {
            matched_forward.push(edge.target.clone());
        }
    }

    if !matched_forward.is_empty() {
        if matched_forward.len() >= 2 {
            graph.check_disjoint_outputs(matched_forward.iter().map(String::as_str))?;
        }
        return Ok(EdgeDecision::FanOut(matched_forward));
    }

    for edge in &feedback {
        if edge_matches(edge, outcome, memory)? {
            return Ok(EdgeDecision::Loopback(edge.target.clone()));
        }
    }

    if graph.terminal_nodes.contains(node_id) {
        Ok(EdgeDecision::Complete)
    } else {
        Ok(EdgeDecision::DeadEnd)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use serde_json::Map;

    use super::*;
    use crate::graph::{ConversationMode, IsolationLevel};

    fn node(id: &str) -> NodeSpec {
        NodeSpec {
            id: id.to_string(),
            description: String::new(),
            system_prompt: String::new(),
            input_keys: vec![],
            output_keys: vec![],
            nullable_output_keys: vec![],
            tools: vec![],
            client_facing: false,
            isolation_level: IsolationLevel::Shared,
            conversation_mode: ConversationMode::Isolated,
            max_node_visits: 0,
            max_retries: 3,
            success_criteria: String::new(),
            metadata: Map::new(),
        }
    }

    fn edge(id: &str, source: &str, target: &str, condition: EdgeCondition, priority: i32) -> EdgeSpec {
        EdgeSpec {
            id: id.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            condition,
            priority,
            metadata: Map::new(),
        }
    }

    fn graph(nodes: Vec<NodeSpec>, edges: Vec<EdgeSpec>, terminal: &[&str]) -> GraphSpec {
        GraphSpec {
            id: "g".into(),
            name: None,
            description: None,
            nodes,
            edges,
            entry_node: "start".into(),
            terminal_nodes: terminal.iter().map(|s| s.to_string()).collect(),
            pause_nodes: HashSet::new(),
            entry_points: vec![],
            goal: None,
        }
    }

    #[test]
    fn fan_out_on_multiple_matching_forward_edges() {
        let mut a = node("a");
        a.output_keys = vec!["x".into()];
        let mut b = node("b");
        b.output_keys = vec!["y".into()];
        let g = graph(
            vec![node("start"), a, b],
            vec![
                edge("e1", "start", "a", EdgeCondition::Always, 1),
                edge("e2", "start", "b", EdgeCondition::Always, 1),
            ],
            &["a", "b"],
        );
        let decision = evaluate_edges(&g, "start", NodeOutcome::Accepted, &SharedMemory::default()).unwrap();
        match decision {
            EdgeDecision::FanOut(targets) => {
                assert_eq!(targets.len(), 2);
            }
            other => panic!("expected fan-out, got {:?}", other),
        }
    }

    #[test]
    fn fan_out_with_overlapping_outputs_errors() {
        let mut a = node("a");
        a.output_keys = vec!["x".into()];
        let mut b = node("b");
        b.output_keys = vec!["x".into()];
        let g = graph(
            vec![node("start"), a, b],
            vec![
                edge("e1", "start", "a", EdgeCondition::Always, 1),
                edge("e2", "start", "b", EdgeCondition::Always, 1),
            ],
            &["a", "b"],
        );
        assert!(evaluate_edges(&g, "start", NodeOutcome::Accepted, &SharedMemory::default()).is_err());
    }

    #[test]
    fn feedback_loop_back_when_no_forward_matches() {
        let g = graph(
            vec![node("start"), node("retry")],
            vec![edge("e1", "start", "retry", EdgeCondition::OnFailure, -1)],
            &["start"],
        );
        let decision = evaluate_edges(&g, "start", NodeOutcome::Failed, &SharedMemory::default()).unwrap();
        assert_eq!(decision, EdgeDecision::Loopback("retry".to_string()));
    }

    #[test]
    fn terminal_node_with_no_matching_edge_completes() {
        let g = graph(vec![node("start")], vec![], &["start"]);
        let decision = evaluate_edges(&g, "start", NodeOutcome::Accepted, &SharedMemory::default()).unwrap();
        assert_eq!(decision, EdgeDecision::Complete);
    }

    #[test]
    fn non_terminal_node_with_no_matching_edge_is_dead_end() {
        let g = graph(vec![node("start")], vec![], &[]);
        let decision = evaluate_edges(&g, "start", NodeOutcome::Accepted, &SharedMemory::default()).unwrap();
        assert_eq!(decision, EdgeDecision::DeadEnd);
    }

    #[test]
    fn edge_selection_is_a_pure_function_of_memory_and_graph() {
        let g = graph(
            vec![node("start"), node("a")],
            vec![edge(
                "e1",
                "start",
                "a",
                EdgeCondition::Conditional {
                    condition_expr: "ready == true".to_string(),
                },
                1,
            )],
            &["a"],
        );
        let mut memory = SharedMemory::default();
        memory.insert("ready", Value::from(false));
        let first = evaluate_edges(&g, "start", NodeOutcome::Accepted, &memory).unwrap();
        let second = evaluate_edges(&g, "start", NodeOutcome::Accepted, &memory).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, EdgeDecision::DeadEnd);
    }
}
