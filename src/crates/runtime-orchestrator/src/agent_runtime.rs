//! `AgentRuntime`: the multi-graph registry. Owns one `EventBus`, one
//! `LlmClient`/`ToolRegistry`/`Judge` trio shared by every graph's
//! `GraphExecutor`, and a map of `Registration`s (one per loaded graph).
//! Each registration holds one `ExecutionStream` per entry point and the
//! trigger task(s) that drive it.
//!
//! Grounded on the teacher's `Orchestrator` (task map + config, `add_task`/
//! `remove_task`/`tasks_by_status`) generalized from a flat task table to a
//! graph-keyed registry whose entries each own their own execution
//! machinery rather than a shared one.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use runtime_core::{
    CheckpointStore, EventBus, ExecutionStream, Goal, GraphSpec, Judge, LlmClient, LoopConfig, PendingInput,
    SessionState, SessionStore, SharedMemory, StreamHandle, ToolRegistry,
};
use runtime_store::{FileCheckpointStore, FileSessionStore};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Result, RuntimeError};
use crate::triggers::{spawn_event_trigger, spawn_timer_trigger, TriggerTask, WebhookRoute};

/// Everything `AgentRuntime` keeps about one loaded graph.
pub struct Registration {
    pub graph: Arc<GraphSpec>,
    pub goal: Option<Goal>,
    pub session_store: Arc<FileSessionStore>,
    checkpoint_store: Arc<FileCheckpointStore>,
    streams: HashMap<String, Arc<ExecutionStream>>,
    trigger_tasks: Vec<TriggerTask>,
    /// The most recent session id this graph was triggered with, used to
    /// bridge primary `SharedMemory` into a secondary graph's entry node
    /// (§4.9's "primary-session bridging").
    last_session_id: Option<String>,
}

struct RuntimeState {
    primary_graph_id: Option<String>,
    graphs: HashMap<String, Registration>,
    active_graph_id: Option<String>,
    user_last_input: Option<Instant>,
}

pub struct AgentRuntime {
    state: RwLock<RuntimeState>,
    event_bus: EventBus,
    llm: Arc<dyn LlmClient>,
    tools: Arc<dyn ToolRegistry>,
    judge: Arc<dyn Judge>,
    loop_config: LoopConfig,
    storage_root: PathBuf,
}

impl AgentRuntime {
    pub fn new(
        event_bus: EventBus,
        llm: Arc<dyn LlmClient>,
        tools: Arc<dyn ToolRegistry>,
        judge: Arc<dyn Judge>,
        loop_config: LoopConfig,
        storage_root: PathBuf,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(RuntimeState {
                primary_graph_id: None,
                graphs: HashMap::new(),
                active_graph_id: None,
                user_last_input: None,
            }),
            event_bus,
            llm,
            tools,
            judge,
            loop_config,
            storage_root,
        })
    }

    pub fn event_bus(&self) -> EventBus {
        self.event_bus.clone()
    }

    /// Registers a graph and starts one `ExecutionStream` per entry point,
    /// wiring each entry point's `TriggerConfig` to its trigger source.
    /// `storage_subpath` roots this graph's `SessionStore` under a
    /// sub-directory instead of the shared root, used for secondary graphs
    /// (Health Judge, Queen) that must never touch the primary's
    /// `state.json`. Callable while the runtime is already running.
    pub async fn add_graph(
        self: &Arc<Self>,
        graph_id: String,
        graph: GraphSpec,
        goal: Option<Goal>,
        storage_subpath: Option<String>,
        is_primary: bool,
    ) -> Result<()> {
        let graph = Arc::new(graph);
        let root = match &storage_subpath {
            Some(sub) => self.storage_root.join(sub),
            None => self.storage_root.clone(),
        };
        let session_store = Arc::new(FileSessionStore::new(root.clone()));
        let checkpoint_store = Arc::new(FileCheckpointStore::new(root));

        let executor = Arc::new(runtime_core::GraphExecutor {
            graph: graph.clone(),
            llm: self.llm.clone(),
            tools: self.tools.clone(),
            judge: self.judge.clone(),
            event_bus: self.event_bus.clone(),
            loop_config: self.loop_config.clone(),
            pending_input: Arc::new(PendingInput::new()),
        });

        let mut streams = HashMap::new();
        for entry_point in &graph.entry_points {
            let stream = Arc::new(ExecutionStream::new(
                graph.clone(),
                executor.clone(),
                session_store.clone() as Arc<dyn runtime_core::SessionStore>,
                checkpoint_store.clone() as Arc<dyn runtime_core::CheckpointStore>,
                self.event_bus.clone(),
                executor.pending_input.clone(),
                entry_point.max_concurrent,
            ));
            streams.insert(entry_point.id.clone(), stream);
        }

        let mut trigger_tasks = Vec::new();
        for entry_point in &graph.entry_points {
            use runtime_core::TriggerType;
            let task = match entry_point.trigger_type {
                TriggerType::Manual => None,
                TriggerType::Timer => Some(spawn_timer_trigger(
                    self.clone(),
                    graph_id.clone(),
                    entry_point.id.clone(),
                    entry_point.trigger_config.clone(),
                )),
                TriggerType::Event => Some(
                    spawn_event_trigger(
                        self.clone(),
                        graph_id.clone(),
                        entry_point.id.clone(),
                        entry_point.trigger_config.clone(),
                    )
                    .await,
                ),
                // Webhook routes are served by looking entry points up via
                // `find_webhook_route` when a request arrives; no
                // background task is needed here.
                TriggerType::Webhook => None,
            };
            if let Some(task) = task {
                trigger_tasks.push(task);
            }
        }

        let registration = Registration {
            graph,
            goal,
            session_store,
            checkpoint_store,
            streams,
            trigger_tasks,
            last_session_id: None,
        };

        let mut state = self.state.write().await;
        if is_primary {
            state.primary_graph_id = Some(graph_id.clone());
        }
        if state.active_graph_id.is_none() {
            state.active_graph_id = Some(graph_id.clone());
        }
        state.graphs.insert(graph_id, registration);
        Ok(())
    }

    /// Stops every stream's trigger task and subscription for `graph_id`,
    /// then drops its registration. Rejects removing the primary graph.
    pub async fn remove_graph(&self, graph_id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if state.primary_graph_id.as_deref() == Some(graph_id) {
            return Err(RuntimeError::CannotRemovePrimary);
        }
        let mut registration = state
            .graphs
            .remove(graph_id)
            .ok_or_else(|| RuntimeError::GraphNotFound(graph_id.to_string()))?;
        if state.active_graph_id.as_deref() == Some(graph_id) {
            state.active_graph_id = state.primary_graph_id.clone();
        }
        drop(state);

        for task in registration.trigger_tasks.drain(..) {
            task.stop(&self.event_bus).await;
        }
        Ok(())
    }

    /// Looks up the graph/entry point served at `path`, for the webhook
    /// HTTP handler to dispatch an incoming request to.
    pub async fn find_webhook_route(&self, path: &str) -> Option<WebhookRoute> {
        let state = self.state.read().await;
        for (graph_id, registration) in &state.graphs {
            for entry_point in &registration.graph.entry_points {
                if entry_point.trigger_type == runtime_core::TriggerType::Webhook
                    && entry_point.trigger_config.webhook_path.as_deref() == Some(path)
                {
                    return Some(WebhookRoute {
                        path: path.to_string(),
                        graph_id: graph_id.clone(),
                        entry_point_id: entry_point.id.clone(),
                        secret: entry_point.trigger_config.webhook_secret.clone(),
                    });
                }
            }
        }
        None
    }

    /// Fires `entry_point_id` on `graph_id` (or the active graph). When
    /// `session_id` names a session that already exists the execution
    /// resumes it (continuous-mode timers reuse the same id every fire);
    /// otherwise a fresh session is created.
    pub async fn trigger(
        self: &Arc<Self>,
        graph_id: Option<String>,
        entry_point_id: &str,
        input: SharedMemory,
        session_id: Option<String>,
    ) -> Result<StreamHandle> {
        let graph_id = self.resolve_graph_id(graph_id).await?;
        let (stream, entry_node, session_store) = {
            let state = self.state.read().await;
            let registration = state
                .graphs
                .get(&graph_id)
                .ok_or_else(|| RuntimeError::GraphNotFound(graph_id.clone()))?;
            let entry_point = registration
                .graph
                .entry_points
                .iter()
                .find(|ep| ep.id == entry_point_id)
                .ok_or_else(|| RuntimeError::EntryPointNotFound(entry_point_id.to_string(), graph_id.clone()))?;
            let stream = registration
                .streams
                .get(entry_point_id)
                .expect("every entry point has a stream built in add_graph")
                .clone();
            (stream, entry_point.entry_node.clone(), registration.session_store.clone())
        };

        let (session_id, resume) = match session_id {
            Some(id) => {
                let exists = session_store.read_state(&id).await.is_ok();
                (id, exists)
            }
            None => (Uuid::new_v4().to_string(), false),
        };

        let handle = stream.execute(session_id.clone(), entry_node, input, resume).await?;

        let mut state = self.state.write().await;
        if let Some(registration) = state.graphs.get_mut(&graph_id) {
            registration.last_session_id = Some(session_id);
        }
        Ok(handle)
    }

    /// Fires `entry_point_id` with a deterministic session id so repeated
    /// timer fires resume the same continuous-mode session.
    pub async fn trigger_continuous(
        self: &Arc<Self>,
        graph_id: String,
        entry_point_id: String,
        input: SharedMemory,
    ) -> Result<StreamHandle> {
        let session_id = format!("{}-{}", graph_id, entry_point_id);
        self.trigger(Some(graph_id), &entry_point_id, input, Some(session_id)).await
    }

    /// Delivers `content` to `node_id`, searching the active graph's
    /// streams first and falling back to every other registered graph.
    pub async fn inject_input(&self, node_id: &str, content: String, graph_id: Option<String>) -> Result<bool> {
        let state = self.state.read().await;
        let order: Vec<String> = match graph_id {
            Some(id) => vec![id],
            None => {
                let mut ids = Vec::new();
                if let Some(active) = &state.active_graph_id {
                    ids.push(active.clone());
                }
                for id in state.graphs.keys() {
                    if Some(id) != state.active_graph_id.as_ref() {
                        ids.push(id.clone());
                    }
                }
                ids
            }
        };
        for id in order {
            if let Some(registration) = state.graphs.get(&id) {
                for stream in registration.streams.values() {
                    if stream.inject_input(node_id, content.clone()).await {
                        return Ok(true);
                    }
                }
            }
        }
        Ok(false)
    }

    pub async fn active_graph_id(&self) -> Option<String> {
        self.state.read().await.active_graph_id.clone()
    }

    /// Changes which graph the TUI/HTTP front focuses on. Does not pause
    /// or otherwise affect non-active graphs — every registered graph's
    /// triggers keep firing regardless of focus.
    pub async fn set_active_graph_id(&self, graph_id: String) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.graphs.contains_key(&graph_id) {
            return Err(RuntimeError::GraphNotFound(graph_id));
        }
        state.active_graph_id = Some(graph_id);
        Ok(())
    }

    pub async fn mark_user_input(&self) {
        self.state.write().await.user_last_input = Some(Instant::now());
    }

    /// Seconds since the last `mark_user_input`, or `+inf` if the user has
    /// never interacted this process.
    pub async fn user_idle_seconds(&self) -> f64 {
        match self.state.read().await.user_last_input {
            Some(t) => t.elapsed().as_secs_f64(),
            None => f64::INFINITY,
        }
    }

    /// Reads the primary graph's most recently triggered session state and
    /// restricts its memory to `input_keys`, for a secondary entry point
    /// whose node consumes primary-session context (§4.9).
    pub async fn bridge_primary_memory(&self, input_keys: &[String]) -> SharedMemory {
        let (session_store, session_id) = {
            let state = self.state.read().await;
            let primary_id = match &state.primary_graph_id {
                Some(id) => id.clone(),
                None => return SharedMemory::default(),
            };
            let registration = match state.graphs.get(&primary_id) {
                Some(r) => r,
                None => return SharedMemory::default(),
            };
            let session_id = match &registration.last_session_id {
                Some(id) => id.clone(),
                None => return SharedMemory::default(),
            };
            (registration.session_store.clone(), session_id)
        };
        match session_store.read_state(&session_id).await {
            Ok(state) => state.memory.filtered(input_keys),
            Err(_) => SharedMemory::default(),
        }
    }

    pub async fn checkpoint(&self, graph_id: &str, session_id: &str, name: &str) -> Result<()> {
        let state = self.state.read().await;
        let registration = state.graphs.get(graph_id).ok_or_else(|| RuntimeError::GraphNotFound(graph_id.to_string()))?;
        registration.checkpoint_store.checkpoint(session_id, name).await.map_err(|e| RuntimeError::Stream(e.into()))?;
        Ok(())
    }

    pub async fn restore_checkpoint(&self, graph_id: &str, session_id: &str, name: &str) -> Result<SessionState> {
        let state = self.state.read().await;
        let registration = state.graphs.get(graph_id).ok_or_else(|| RuntimeError::GraphNotFound(graph_id.to_string()))?;
        registration
            .checkpoint_store
            .restore_checkpoint(session_id, name)
            .await
            .map_err(|e| RuntimeError::Stream(e.into()))
    }

    /// The `Stop(sessionId, executionId)` RPC: searches every registered
    /// graph's streams for the one currently driving this execution and
    /// cancels it. Returns whether a matching stream was found running.
    pub async fn stop(&self, session_id: &str, execution_id: &str) -> Result<bool> {
        let state = self.state.read().await;
        for registration in state.graphs.values() {
            for stream in registration.streams.values() {
                if stream.cancel_execution(session_id, execution_id) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    async fn resolve_graph_id(&self, graph_id: Option<String>) -> Result<String> {
        match graph_id {
            Some(id) => Ok(id),
            None => self
                .state
                .read()
                .await
                .active_graph_id
                .clone()
                .ok_or_else(|| RuntimeError::GraphNotFound("<no active graph>".to_string())),
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use runtime_core::{
        ConversationMode, EdgeSpec, EntryPointSpec, ImplicitJudge, IsolationLevel, NodeSpec, TriggerConfig, TriggerType,
    };
    use runtime_llm::MockLlmClient;
    use runtime_tools::ToolRegistryBuilder;

    fn trivial_graph(id: &str) -> GraphSpec {
        let node = NodeSpec {
            id: "only".to_string(),
            description: String::new(),
            system_prompt: "reply plainly".to_string(),
            input_keys: Vec::new(),
            output_keys: Vec::new(),
            nullable_output_keys: Vec::new(),
            tools: Vec::new(),
            client_facing: false,
            isolation_level: IsolationLevel::Isolated,
            conversation_mode: ConversationMode::Isolated,
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
            entry_node: "only".to_string(),
            terminal_nodes: std::iter::once("only".to_string()).collect(),
            pause_nodes: Default::default(),
            entry_points: vec![EntryPointSpec {
                id: "manual".to_string(),
                entry_node: "only".to_string(),
                trigger_type: TriggerType::Manual,
                trigger_config: TriggerConfig::default(),
                isolation_level: IsolationLevel::Isolated,
                max_concurrent: 1,
            }],
            goal: None,
        }
    }

    async fn test_runtime(dir: &std::path::Path) -> Arc<AgentRuntime> {
        AgentRuntime::new(
            EventBus::new(),
            Arc::new(MockLlmClient::single_text("ok")),
            Arc::new(ToolRegistryBuilder::with_defaults().build()),
            Arc::new(ImplicitJudge),
            LoopConfig::default(),
            dir.to_path_buf(),
        )
    }

    #[tokio::test]
    async fn triggering_an_unknown_graph_is_a_graph_not_found_error() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = test_runtime(dir.path()).await;
        let err = runtime
            .trigger(Some("missing".to_string()), "manual", SharedMemory::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::GraphNotFound(_)));
    }

    #[tokio::test]
    async fn add_graph_then_trigger_runs_to_completion() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = test_runtime(dir.path()).await;
        runtime.add_graph("g1".to_string(), trivial_graph("g1"), None, None, true).await.unwrap();

        let handle = runtime.trigger(Some("g1".to_string()), "manual", SharedMemory::default(), None).await.unwrap();
        assert_eq!(handle.session_id.is_empty(), false);
        assert_eq!(runtime.active_graph_id().await, Some("g1".to_string()));
    }

    #[tokio::test]
    async fn cannot_remove_the_primary_graph() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = test_runtime(dir.path()).await;
        runtime.add_graph("g1".to_string(), trivial_graph("g1"), None, None, true).await.unwrap();
        let err = runtime.remove_graph("g1").await.unwrap_err();
        assert!(matches!(err, RuntimeError::CannotRemovePrimary));
    }

    #[tokio::test]
    async fn user_idle_seconds_is_infinite_before_any_input() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = test_runtime(dir.path()).await;
        assert_eq!(runtime.user_idle_seconds().await, f64::INFINITY);
        runtime.mark_user_input().await;
        assert!(runtime.user_idle_seconds().await < 1.0);
    }

    #[tokio::test]
    async fn inject_input_returns_false_when_no_node_is_waiting() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = test_runtime(dir.path()).await;
        runtime.add_graph("g1".to_string(), trivial_graph("g1"), None, None, true).await.unwrap();
        let delivered = runtime.inject_input("only", "hello".to_string(), None).await.unwrap();
        assert!(!delivered);
    }
}
