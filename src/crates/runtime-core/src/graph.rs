//! Graph specification types: `GraphSpec`, `NodeSpec`, `EdgeSpec`, `Goal`,
//! and the entry-point records that bind a trigger to an entry node.
//!
//! These are plain, serde-friendly records — no executor state lives here.
//! A `GraphSpec` is loaded once (typically from YAML, see [`crate::graph::GraphSpec::from_yaml`])
//! and then shared read-only (`Arc<GraphSpec>`) across every stream that runs it.
//!
//! ```text
//!        entryNode                              terminalNodes
//!            │                                         │
//!            ▼                                         ▼
//!   ┌─────────────────┐  forward edge   ┌─────────────────┐
//!   │     intake       │ ───────────────▶│     process      │
//!   │ outputKeys: [q]  │                 │  (terminal)      │
//!   └─────────────────┘                 └─────────────────┘
//!            ▲                                    │
//!            └──────────── feedback edge ──────────┘
//!                         (priority < 0)
//! ```

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{GraphError, Result};
use crate::expr::ConditionExpr;

/// How isolated a node's (or entry point's) execution state is from others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IsolationLevel {
    /// Owns a private session; nothing is shared with the primary graph.
    Isolated,
    /// Reads/writes the owning graph's shared session state directly.
    Shared,
    /// Like `Shared` but serialized against concurrent writers via the
    /// process-local session lock (the default for all writes regardless
    /// of this value — this variant exists so specs can be explicit about
    /// intent).
    Synchronized,
}

/// Whether a node's conversation restarts on every visit or continues the
/// same message log across visits within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConversationMode {
    Isolated,
    Continuous,
}

/// How an `EdgeSpec` is evaluated after its source node ACCEPTs (or fails).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "condition")]
pub enum EdgeCondition {
    OnSuccess,
    OnFailure,
    Always,
    Conditional { condition_expr: String },
}

/// A directed edge between two nodes in the same `GraphSpec`.
///
/// `priority >= 0` marks a forward edge; `priority < 0` marks a feedback
/// (loop-back) edge. Within each partition, edges are tried in descending
/// priority order (see [`crate::executor`]'s edge evaluation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(flatten)]
    pub condition: EdgeCondition,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl EdgeSpec {
    pub fn is_forward(&self) -> bool {
        self.priority >= 0
    }

    /// Parses `conditionExpr` (if this is a `CONDITIONAL` edge) once, at
    /// load time. A parse failure here is fatal per the expression
    /// language contract.
    pub fn parsed_condition(&self) -> Result<Option<ConditionExpr>> {
        match &self.condition {
            EdgeCondition::Conditional { condition_expr } => {
                ConditionExpr::parse(condition_expr)
                    .map(Some)
                    .map_err(|reason| GraphError::ExpressionParse {
                        expr: condition_expr.clone(),
                        reason,
                    })
            }
            _ => Ok(None),
        }
    }
}

/// One node in a `GraphSpec`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub input_keys: Vec<String>,
    #[serde(default)]
    pub output_keys: Vec<String>,
    #[serde(default)]
    pub nullable_output_keys: Vec<String>,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub client_facing: bool,
    #[serde(default = "default_isolation_level")]
    pub isolation_level: IsolationLevel,
    #[serde(default = "default_conversation_mode")]
    pub conversation_mode: ConversationMode,
    /// `0` means unbounded.
    #[serde(default)]
    pub max_node_visits: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub success_criteria: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

fn default_isolation_level() -> IsolationLevel {
    IsolationLevel::Shared
}

fn default_conversation_mode() -> ConversationMode {
    ConversationMode::Isolated
}

fn default_max_retries() -> u32 {
    3
}

impl NodeSpec {
    /// Output keys that must be set for the implicit judge to ACCEPT
    /// (`outputKeys \ nullableOutputKeys`).
    pub fn required_output_keys(&self) -> HashSet<&str> {
        let nullable: HashSet<&str> = self.nullable_output_keys.iter().map(String::as_str).collect();
        self.output_keys
            .iter()
            .map(String::as_str)
            .filter(|k| !nullable.contains(k))
            .collect()
    }
}

/// Weighted success criterion for a `Goal`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessCriterion {
    pub description: String,
    pub weight: f64,
}

/// Informational: carried into prompts, not consulted by the executor's
/// control flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub success_criteria: Vec<SuccessCriterion>,
    #[serde(default)]
    pub constraints: Vec<String>,
}

/// How an entry point is activated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerType {
    Manual,
    Timer,
    Event,
    Webhook,
}

/// Trigger-type-specific configuration. Only the fields relevant to
/// `trigger_type` are consulted by `TriggerSources`; the rest are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerConfig {
    /// Timer: cron expression (mutually exclusive with `interval_minutes`).
    pub cron: Option<String>,
    /// Timer: fixed interval in minutes.
    pub interval_minutes: Option<u64>,
    /// Event: event types this entry point subscribes to.
    #[serde(default)]
    pub event_types: Vec<String>,
    /// Event: optional stream/node filters narrowing the subscription.
    pub filter_stream: Option<String>,
    pub filter_node: Option<String>,
    /// Event: avoid feedback loops from a secondary graph's own events.
    #[serde(default)]
    pub exclude_own_graph: bool,
    /// Webhook: HTTP path this entry point is served on.
    pub webhook_path: Option<String>,
    /// Webhook: optional HMAC-SHA256 shared secret.
    pub webhook_secret: Option<String>,
}

/// Binds a trigger to an entry node of a `GraphSpec`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPointSpec {
    pub id: String,
    pub entry_node: String,
    pub trigger_type: TriggerType,
    #[serde(default)]
    pub trigger_config: TriggerConfig,
    #[serde(default = "default_isolation_level")]
    pub isolation_level: IsolationLevel,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: u32,
}

fn default_max_concurrent() -> u32 {
    1
}

/// A complete, validated graph: nodes, edges, and the boundary markers that
/// define where execution starts, ends, and may pause.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSpec {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub nodes: Vec<NodeSpec>,
    pub edges: Vec<EdgeSpec>,
    pub entry_node: String,
    #[serde(default)]
    pub terminal_nodes: HashSet<String>,
    #[serde(default)]
    pub pause_nodes: HashSet<String>,
    #[serde(default)]
    pub entry_points: Vec<EntryPointSpec>,
    #[serde(default)]
    pub goal: Option<Goal>,
}

impl GraphSpec {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let spec: GraphSpec = serde_yaml::from_str(yaml)?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn node(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_map(&self) -> HashMap<&str, &NodeSpec> {
        self.nodes.iter().map(|n| (n.id.as_str(), n)).collect()
    }

    pub fn edges_from<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a EdgeSpec> + 'a {
        self.edges.iter().filter(move |e| e.source == node_id)
    }

    /// Distinct source nodes with a forward edge targeting `node_id`, used
    /// to recognise a join point (a node reached by more than one branch of
    /// a prior fan-out) so it fires once rather than once per arrival.
    pub fn forward_predecessors(&self, node_id: &str) -> Vec<&str> {
        let mut sources: Vec<&str> = self
            .edges
            .iter()
            .filter(|e| e.target == node_id && e.is_forward())
            .map(|e| e.source.as_str())
            .collect();
        sources.sort_unstable();
        sources.dedup();
        sources
    }

    pub fn is_forever_alive(&self) -> bool {
        self.terminal_nodes.is_empty()
    }

    /// Checks invariants 1-3 of the data model:
    ///
    /// 1. Every `EdgeSpec` `source`/`target` references a `NodeSpec` in
    ///    this graph.
    /// 2. `nullableOutputKeys ⊆ outputKeys` for every node.
    /// 3. If the graph is forever-alive (`terminalNodes = ∅`), every node
    ///    has at least one outgoing edge.
    ///
    /// Also rejects `CONDITIONAL` edges whose expression fails to parse,
    /// and entry points whose `entryNode`/`entry_node` is not a real node.
    pub fn validate(&self) -> Result<()> {
        let node_ids: HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();

        if !node_ids.contains(self.entry_node.as_str()) {
            return Err(GraphError::validation(format!(
                "entry node '{}' does not exist in graph '{}'",
                self.entry_node, self.id
            )));
        }

        for edge in &self.edges {
            if !node_ids.contains(edge.source.as_str()) {
                return Err(GraphError::validation(format!(
                    "edge '{}' source '{}' does not exist",
                    edge.id, edge.source
                )));
            }
            if !node_ids.contains(edge.target.as_str()) {
                return Err(GraphError::validation(format!(
                    "edge '{}' target '{}' does not exist",
                    edge.id, edge.target
                )));
            }
            edge.parsed_condition()?;
        }

        for node in &self.nodes {
            let output_set: HashSet<&str> = node.output_keys.iter().map(String::as_str).collect();
            for nullable in &node.nullable_output_keys {
                if !output_set.contains(nullable.as_str()) {
                    return Err(GraphError::validation(format!(
                        "node '{}': nullableOutputKeys must be a subset of outputKeys (found '{}')",
                        node.id, nullable
                    )));
                }
            }
        }

        if self.is_forever_alive() {
            for node in &self.nodes {
                if self.edges_from(&node.id).next().is_none() {
                    return Err(GraphError::validation(format!(
                        "forever-alive graph '{}': node '{}' has no outgoing edge",
                        self.id, node.id
                    )));
                }
            }
        }

        for ep in &self.entry_points {
            if !node_ids.contains(ep.entry_node.as_str()) {
                return Err(GraphError::validation(format!(
                    "entry point '{}' entry node '{}' does not exist",
                    ep.id, ep.entry_node
                )));
            }
        }

        Ok(())
    }

    /// Checks that a forward fan-out's targets declare pairwise disjoint
    /// `outputKeys`, per edge-evaluation step 4. Called by the executor
    /// right before spawning child executions, not at load time (the
    /// violating combination depends on which edges actually matched).
    pub fn check_disjoint_outputs<'a>(&self, node_ids: impl Iterator<Item = &'a str>) -> Result<()> {
        let mut seen: HashSet<&str> = HashSet::new();
        for id in node_ids {
            let node = self
                .node(id)
                .ok_or_else(|| GraphError::validation(format!("unknown fan-out target '{}'", id)))?;
            for key in &node.output_keys {
                if !seen.insert(key.as_str()) {
                    return Err(GraphError::validation(format!(
                        "fan-out targets have overlapping outputKey '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    fn edge(id: &str, source: &str, target: &str, priority: i32) -> EdgeSpec {
        EdgeSpec {
            id: id.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            condition: EdgeCondition::Always,
            priority,
            metadata: Map::new(),
        }
    }

    #[test]
    fn rejects_dangling_edge_target() {
        let graph = GraphSpec {
            id: "g".into(),
            name: None,
            description: None,
            nodes: vec![node("a")],
            edges: vec![edge("e1", "a", "missing", 0)],
            entry_node: "a".into(),
            terminal_nodes: ["a".to_string()].into_iter().collect(),
            pause_nodes: HashSet::new(),
            entry_points: vec![],
            goal: None,
        };
        assert!(graph.validate().is_err());
    }

    #[test]
    fn forever_alive_requires_outgoing_edges() {
        let graph = GraphSpec {
            id: "g".into(),
            name: None,
            description: None,
            nodes: vec![node("a"), node("b")],
            edges: vec![edge("e1", "a", "b", 0)],
            entry_node: "a".into(),
            terminal_nodes: HashSet::new(),
            pause_nodes: HashSet::new(),
            entry_points: vec![],
            goal: None,
        };
        // "b" has no outgoing edge and the graph is forever-alive.
        assert!(graph.validate().is_err());
    }

    #[test]
    fn nullable_keys_must_be_subset_of_output_keys() {
        let mut a = node("a");
        a.output_keys = vec!["x".into()];
        a.nullable_output_keys = vec!["y".into()];
        let graph = GraphSpec {
            id: "g".into(),
            name: None,
            description: None,
            nodes: vec![a],
            edges: vec![],
            entry_node: "a".into(),
            terminal_nodes: ["a".to_string()].into_iter().collect(),
            pause_nodes: HashSet::new(),
            entry_points: vec![],
            goal: None,
        };
        assert!(graph.validate().is_err());
    }

    #[test]
    fn disjoint_outputs_detects_overlap() {
        let mut a = node("a");
        a.output_keys = vec!["x".into()];
        let mut b = node("b");
        b.output_keys = vec!["x".into()];
        let graph = GraphSpec {
            id: "g".into(),
            name: None,
            description: None,
            nodes: vec![a, b],
            edges: vec![],
            entry_node: "a".into(),
            terminal_nodes: ["a".to_string(), "b".to_string()].into_iter().collect(),
            pause_nodes: HashSet::new(),
            entry_points: vec![],
            goal: None,
        };
        assert!(graph.check_disjoint_outputs(["a", "b"].into_iter()).is_err());
    }

    #[test]
    fn required_output_keys_excludes_nullable() {
        let mut a = node("a");
        a.output_keys = vec!["x".into(), "y".into()];
        a.nullable_output_keys = vec!["y".into()];
        let required = a.required_output_keys();
        assert!(required.contains("x"));
        assert!(!required.contains("y"));
    }
}
