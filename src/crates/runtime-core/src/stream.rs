//! `ExecutionStream`: owns one `GraphExecutor` and drives node visits from
//! an entry node to completion, spawning child executions on fan-out and
//! looping back on feedback edges, subject to the isolation contract (§4.7):
//! a stream rejects a concurrent `Execute` unless its entry point's
//! `maxConcurrent > 1`.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::error::GraphError;
use crate::event_bus::{AgentEvent, EventBus, EventType};
use crate::executor::{evaluate_edges, CancellationToken, EdgeDecision, GraphExecutor, NodeOutcome, PendingInput, VisitIdentity};
use crate::graph::GraphSpec;
use crate::model::{ConversationMessage, MessageKind, SessionState, SessionStatus, SharedMemory};
use crate::store_traits::{repair_orphans, CheckpointStore, SessionStore};

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("stream is already executing; retry once the in-flight execution completes")]
    Busy,

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Store(#[from] crate::store_traits::StoreError),
}

/// A reference to a running or completed `Execute` call, returned to the
/// caller so it can `Cancel` it later.
#[derive(Debug, Clone)]
pub struct StreamHandle {
    pub execution_id: String,
    pub session_id: String,
}

/// One `GraphSpec` bound to one session root, replaying or starting fresh
/// node visits through a shared `GraphExecutor`.
pub struct ExecutionStream {
    pub graph: Arc<GraphSpec>,
    pub executor: Arc<GraphExecutor>,
    pub session_store: Arc<dyn SessionStore>,
    pub checkpoint_store: Arc<dyn CheckpointStore>,
    pub event_bus: EventBus,
    pub pending_input: Arc<PendingInput>,
    max_concurrent: u32,
    active_count: AtomicU32,
    execution_counter: AtomicU64,
    cancel: CancellationToken,
    /// `(sessionId, executionId)` pairs currently inside `execute`, so the
    /// external `Stop(sessionId, executionId)` RPC can target the right run
    /// instead of cancelling every execution a stream happens to be driving.
    in_flight: Mutex<HashSet<(String, String)>>,
}

impl ExecutionStream {
    pub fn new(
        graph: Arc<GraphSpec>,
        executor: Arc<GraphExecutor>,
        session_store: Arc<dyn SessionStore>,
        checkpoint_store: Arc<dyn CheckpointStore>,
        event_bus: EventBus,
        pending_input: Arc<PendingInput>,
        max_concurrent: u32,
    ) -> Self {
        Self {
            graph,
            executor,
            session_store,
            checkpoint_store,
            event_bus,
            pending_input,
            max_concurrent: max_concurrent.max(1),
            active_count: AtomicU32::new(0),
            execution_counter: AtomicU64::new(0),
            cancel: CancellationToken::new(),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Starts (or resumes) one execution at `entry_node`, driving node
    /// visits until the graph completes, dead-ends, or escalates.
    pub async fn execute(
        &self,
        session_id: String,
        entry_node: String,
        initial_inputs: SharedMemory,
        resume: bool,
    ) -> Result<StreamHandle, StreamError> {
        if self.active_count.fetch_add(1, Ordering::SeqCst) >= self.max_concurrent {
            self.active_count.fetch_sub(1, Ordering::SeqCst);
            return Err(StreamError::Busy);
        }

        let execution_id = format!("exec-{}", self.execution_counter.fetch_add(1, Ordering::SeqCst));
        let stream_id = format!("stream-{}", self.graph.id);
        let in_flight_key = (session_id.clone(), execution_id.clone());
        self.in_flight.lock().unwrap().insert(in_flight_key.clone());
        let _in_flight_guard = InFlightGuard { stream: self, key: in_flight_key };

        let mut state = if resume {
            self.session_store.read_state(&session_id).await?
        } else {
            let mut fresh = SessionState::new(session_id.clone(), self.graph.id.clone());
            fresh.memory.extend(initial_inputs.0);
            fresh
        };
        state.status = SessionStatus::Active;
        self.session_store.write_state(&state).await?;

        self.event_bus
            .publish(
                AgentEvent::new(EventType::ExecutionStarted, serde_json::json!({ "entryNode": entry_node.clone() }))
                    .with_graph(self.graph.id.clone())
                    .with_stream(stream_id.clone())
                    .with_execution(execution_id.clone()),
            )
            .await;

        let mut visit_counts: HashMap<String, u32> = HashMap::new();
        let mut join_arrivals: HashMap<String, HashSet<String>> = HashMap::new();
        let result = self
            .run_node(&session_id, &stream_id, &execution_id, entry_node, &mut visit_counts, &mut join_arrivals)
            .await;

        self.active_count.fetch_sub(1, Ordering::SeqCst);

        match &result {
            Ok(()) => {
                self.event_bus
                    .publish(
                        AgentEvent::new(EventType::ExecutionCompleted, serde_json::json!({}))
                            .with_graph(self.graph.id.clone())
                            .with_stream(stream_id.clone())
                            .with_execution(execution_id.clone()),
                    )
                    .await;
            }
            Err(e) => {
                self.event_bus
                    .publish(
                        AgentEvent::new(
                            EventType::ExecutionFailed,
                            serde_json::json!({ "error": e.to_string() }),
                        )
                        .with_graph(self.graph.id.clone())
                        .with_stream(stream_id.clone())
                        .with_execution(execution_id.clone()),
                    )
                    .await;
            }
        }

        result.map(|()| StreamHandle { execution_id, session_id })
    }

    fn run_node<'a>(
        &'a self,
        session_id: &'a str,
        stream_id: &'a str,
        execution_id: &'a str,
        node_id: String,
        visit_counts: &'a mut HashMap<String, u32>,
        join_arrivals: &'a mut HashMap<String, HashSet<String>>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StreamError>> + Send + 'a>> {
        Box::pin(async move {
            let node = self
                .graph
                .node(&node_id)
                .ok_or_else(|| GraphError::validation(format!("node '{}' not found", node_id)))?
                .clone();

            let visits = visit_counts.entry(node_id.clone()).or_insert(0);
            *visits += 1;
            if node.max_node_visits > 0 && *visits > node.max_node_visits {
                return Err(GraphError::escalated(
                    node_id,
                    format!("exceeded maxNodeVisits ({})", node.max_node_visits),
                )
                .into());
            }

            let mut state = self.session_store.read_state(session_id).await?;
            let thread_id = match node.conversation_mode {
                crate::graph::ConversationMode::Continuous => session_id.to_string(),
                crate::graph::ConversationMode::Isolated => format!("{}-{}", session_id, node_id),
            };
            let conversation = self.session_store.conversation_store_for(&node_id, &thread_id);
            let replayed_tail = repair_orphans(conversation.as_ref()).await?;
            if matches!(node.conversation_mode, crate::graph::ConversationMode::Continuous) {
                conversation
                    .append(ConversationMessage::new(
                        MessageKind::SystemMarker,
                        serde_json::json!({ "nextNode": node_id }),
                    ))
                    .await?;
            }

            let identity = VisitIdentity {
                session_id: session_id.to_string(),
                graph_id: self.graph.id.clone(),
                stream_id: stream_id.to_string(),
                execution_id: execution_id.to_string(),
            };
            let goal_context = self
                .graph
                .goal
                .as_ref()
                .map(|g| format!("Goal: {} — {}", g.name, g.description))
                .unwrap_or_default();

            let (outcome, accumulator) = self
                .executor
                .run_node_visit(&identity, &node, &goal_context, conversation, &state.memory, &self.cancel, &replayed_tail)
                .await?;

            accumulator.flush(&mut state.memory);
            state.updated_at = chrono::Utc::now();
            self.session_store.write_state(&state).await?;

            let decision = evaluate_edges(&self.graph, &node_id, outcome, &state.memory)?;
            match decision {
                EdgeDecision::Complete => {
                    state.status = SessionStatus::Completed;
                    self.session_store.write_state(&state).await?;
                    Ok(())
                }
                EdgeDecision::DeadEnd => {
                    state.status = SessionStatus::Failed;
                    self.session_store.write_state(&state).await?;
                    Err(GraphError::DeadEnd(node_id.to_string()).into())
                }
                EdgeDecision::Loopback(target) => {
                    self.event_bus
                        .publish(
                            AgentEvent::new(
                                EventType::EdgeTraversed,
                                serde_json::json!({ "from": node_id, "to": target }),
                            )
                            .with_graph(self.graph.id.clone())
                            .with_stream(stream_id.to_string())
                            .with_execution(execution_id.to_string()),
                        )
                        .await;
                    self.run_node(session_id, stream_id, execution_id, target, visit_counts, join_arrivals).await
                }
                EdgeDecision::FanOut(targets) => {
                    for target in &targets {
                        self.event_bus
                            .publish(
                                AgentEvent::new(
                                    EventType::EdgeTraversed,
                                    serde_json::json!({ "from": node_id, "to": target }),
                                )
                                .with_graph(self.graph.id.clone())
                                .with_stream(stream_id.to_string())
                                .with_execution(execution_id.to_string()),
                            )
                            .await;
                    }
                    // Sequential fan-out: each branch reuses the same
                    // `visit_counts` map, so cycles spanning branches still
                    // respect `maxNodeVisits`. A future revision may run
                    // disjoint-output branches concurrently; determinism of
                    // the decision itself does not require it.
                    //
                    // A target reachable by more than one forward edge (a
                    // join) only runs once all of its forward predecessors
                    // have arrived here; earlier arrivals record themselves
                    // in `join_arrivals` and stop without recursing, relying
                    // on the shared `SessionStore` to carry each branch's
                    // output into the state the join eventually reads.
                    let mut results = Vec::with_capacity(targets.len());
                    for target in targets {
                        let predecessors = self.graph.forward_predecessors(&target);
                        let ready = if predecessors.len() <= 1 {
                            true
                        } else {
                            let arrived = join_arrivals.entry(target.clone()).or_default();
                            arrived.insert(node_id.clone());
                            predecessors.iter().all(|p| arrived.contains(*p))
                        };
                        if ready {
                            join_arrivals.remove(&target);
                            results.push(
                                self.run_node(session_id, stream_id, execution_id, target, visit_counts, join_arrivals)
                                    .await,
                            );
                        } else {
                            results.push(Ok(()));
                        }
                    }
                    results.into_iter().collect::<Result<Vec<()>, StreamError>>().map(|_| ())
                }
            }
        })
    }

    /// Delivers content to a node paused on `CLIENT_INPUT_REQUESTED`.
    pub async fn inject_input(&self, node_id: &str, content: String) -> bool {
        self.pending_input.deliver(node_id, content).await
    }

    /// Cooperatively cancels the in-flight execution, if any.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether `(sessionId, executionId)` is the pair this stream is
    /// currently driving through `execute`.
    pub fn is_running(&self, session_id: &str, execution_id: &str) -> bool {
        self.in_flight.lock().unwrap().contains(&(session_id.to_string(), execution_id.to_string()))
    }

    /// The `Stop(sessionId, executionId)` RPC: cancels this stream only if
    /// it's the one currently running that execution. The cancellation
    /// token itself is stream-wide (§5's cleanup sequence doesn't
    /// distinguish which concurrent execution tripped it), so this is a
    /// best-effort targeting layered on top, not per-execution isolation.
    pub fn cancel_execution(&self, session_id: &str, execution_id: &str) -> bool {
        if self.is_running(session_id, execution_id) {
            self.cancel();
            true
        } else {
            false
        }
    }

    pub async fn checkpoint(&self, session_id: &str, name: &str) -> Result<(), StreamError> {
        self.checkpoint_store.checkpoint(session_id, name).await?;
        Ok(())
    }

    pub async fn restore_checkpoint(&self, session_id: &str, name: &str) -> Result<SessionState, StreamError> {
        Ok(self.checkpoint_store.restore_checkpoint(session_id, name).await?)
    }
}

/// Deregisters an `(sessionId, executionId)` pair from `in_flight` when an
/// `execute` call ends, including early returns from `?` on a store error.
struct InFlightGuard<'a> {
    stream: &'a ExecutionStream,
    key: (String, String),
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.stream.in_flight.lock().unwrap().remove(&self.key);
    }
}
