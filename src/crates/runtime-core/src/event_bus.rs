//! `EventBus`: topic-free, typed publish/subscribe with structural
//! filters, ordered per-stream delivery, and a bounded buffer per
//! subscription.
//!
//! Unlike `orchestrator`'s single shared `broadcast::Sender<WsEvent>`, each
//! subscription here owns its own bounded `mpsc` channel: `excludeOwnGraph`
//! and per-subscription lag accounting both need independent drop
//! behaviour per consumer, which a single shared broadcast channel cannot
//! give without tracking one lag counter per receiver anyway. Publish fans
//! out to a filtered table of these channels instead of one shared one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Minimum event-type set named by the external interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    ExecutionStarted,
    ExecutionCompleted,
    ExecutionFailed,
    ExecutionPaused,
    NodeLoopStarted,
    NodeLoopCompleted,
    EdgeTraversed,
    LlmTextDelta,
    ToolCallStarted,
    ToolCallCompleted,
    ClientOutputDelta,
    ClientInputRequested,
    ClientInputReceived,
    GoalProgress,
    WebhookReceived,
    WorkerEscalationTicket,
    QueenInterventionRequested,
    SubscriberLagged,
}

/// `{id, type, timestamp, graphId?, streamId?, nodeId?, executionId?, payload}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEvent {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub graph_id: Option<String>,
    pub stream_id: Option<String>,
    pub node_id: Option<String>,
    pub execution_id: Option<String>,
    pub payload: Value,
}

impl AgentEvent {
    /// Stamps `id`/`timestamp`; everything else is caller-provided.
    pub fn new(event_type: EventType, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            timestamp: Utc::now(),
            graph_id: None,
            stream_id: None,
            node_id: None,
            execution_id: None,
            payload,
        }
    }

    pub fn with_graph(mut self, graph_id: impl Into<String>) -> Self {
        self.graph_id = Some(graph_id.into());
        self
    }

    pub fn with_stream(mut self, stream_id: impl Into<String>) -> Self {
        self.stream_id = Some(stream_id.into());
        self
    }

    pub fn with_node(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    pub fn with_execution(mut self, execution_id: impl Into<String>) -> Self {
        self.execution_id = Some(execution_id.into());
        self
    }
}

/// Structural filter applied at `Subscribe` time. `None` fields match
/// anything.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionFilter {
    pub filter_type: Option<EventType>,
    pub filter_graph: Option<String>,
    pub filter_stream: Option<String>,
    pub filter_node: Option<String>,
    /// Set by a secondary graph's own subscriber to avoid feedback loops:
    /// events whose `graph_id` equals the filter's own graph are dropped.
    pub exclude_own_graph: Option<String>,
}

impl SubscriptionFilter {
    fn matches(&self, event: &AgentEvent) -> bool {
        if let Some(t) = self.filter_type {
            if event.event_type != t {
                return false;
            }
        }
        if let Some(g) = &self.filter_graph {
            if event.graph_id.as_deref() != Some(g.as_str()) {
                return false;
            }
        }
        if let Some(s) = &self.filter_stream {
            if event.stream_id.as_deref() != Some(s.as_str()) {
                return false;
            }
        }
        if let Some(n) = &self.filter_node {
            if event.node_id.as_deref() != Some(n.as_str()) {
                return false;
            }
        }
        if let Some(own) = &self.exclude_own_graph {
            if event.graph_id.as_deref() == Some(own.as_str()) {
                return false;
            }
        }
        true
    }
}

pub type SubscriptionId = Uuid;

/// Per-subscription bounded buffer size. Chosen generously enough that a
/// momentarily slow HTTP/WS consumer does not lag under ordinary event
/// volume; a consumer that falls behind sees `SubscriberLagged` rather
/// than blocking the publisher.
const SUBSCRIPTION_BUFFER: usize = 1024;

struct Subscription {
    filter: SubscriptionFilter,
    tx: mpsc::Sender<AgentEvent>,
    lagging: bool,
}

/// Shared, cloneable event bus. One instance per `AgentRuntime`.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<RwLock<HashMap<SubscriptionId, Subscription>>>,
    lag_events: Arc<AtomicU64>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            lag_events: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Registers a subscription and returns its id plus the receiving end
    /// of its bounded channel.
    pub async fn subscribe(&self, filter: SubscriptionFilter) -> (SubscriptionId, mpsc::Receiver<AgentEvent>) {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let id = Uuid::new_v4();
        self.inner.write().await.insert(
            id,
            Subscription {
                filter,
                tx,
                lagging: false,
            },
        );
        (id, rx)
    }

    pub async fn unsubscribe(&self, id: SubscriptionId) {
        self.inner.write().await.remove(&id);
    }

    /// Stamps `id`/`timestamp` if not already set and fans out to every
    /// matching subscription. Never fails for the caller: a full buffer
    /// drops the oldest entry for that subscription (via `try_send`
    /// failing and being treated as a lag event) rather than blocking
    /// publish, and a subscriber whose receiver was dropped is pruned
    /// silently.
    pub async fn publish(&self, event: AgentEvent) {
        let mut guard = self.inner.write().await;
        let mut lagged: Vec<SubscriptionId> = Vec::new();
        let mut dead: Vec<SubscriptionId> = Vec::new();

        for (id, sub) in guard.iter_mut() {
            if !sub.filter.matches(&event) {
                continue;
            }
            match sub.tx.try_send(event.clone()) {
                Ok(()) => {
                    sub.lagging = false;
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    if !sub.lagging {
                        sub.lagging = true;
                        lagged.push(*id);
                    }
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    dead.push(*id);
                }
            }
        }
        for id in &dead {
            guard.remove(id);
        }
        drop(guard);

        for id in lagged {
            self.lag_events.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(subscription_id = %id, "subscriber lagged, dropping event for this subscription");
            let lag_event = AgentEvent::new(
                EventType::SubscriberLagged,
                serde_json::json!({ "subscriptionId": id }),
            );
            // Best-effort: deliver the lag notice to everyone else matching
            // SUBSCRIBER_LAGGED; recursion depth is bounded to one level
            // because SubscriberLagged publishes never themselves lag-loop
            // (a lag notice that cannot be delivered is simply dropped).
            let guard = self.inner.read().await;
            for (sid, sub) in guard.iter() {
                if *sid == id {
                    continue;
                }
                if sub.filter.matches(&lag_event) {
                    let _ = sub.tx.try_send(lag_event.clone());
                }
            }
        }
    }

    pub fn lag_event_count(&self) -> u64 {
        self.lag_events.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_matching_events_only() {
        let bus = EventBus::new();
        let (_id, mut rx) = bus
            .subscribe(SubscriptionFilter {
                filter_graph: Some("g1".into()),
                ..Default::default()
            })
            .await;

        bus.publish(AgentEvent::new(EventType::ExecutionStarted, Value::Null).with_graph("g2"))
            .await;
        bus.publish(AgentEvent::new(EventType::ExecutionStarted, Value::Null).with_graph("g1"))
            .await;

        let received = rx.try_recv().expect("should receive the g1 event");
        assert_eq!(received.graph_id.as_deref(), Some("g1"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn exclude_own_graph_drops_self_originated_events() {
        let bus = EventBus::new();
        let (_id, mut rx) = bus
            .subscribe(SubscriptionFilter {
                exclude_own_graph: Some("queen".into()),
                ..Default::default()
            })
            .await;
        bus.publish(AgentEvent::new(EventType::WorkerEscalationTicket, Value::Null).with_graph("queen"))
            .await;
        bus.publish(AgentEvent::new(EventType::WorkerEscalationTicket, Value::Null).with_graph("worker"))
            .await;
        let received = rx.try_recv().expect("should receive the non-self event");
        assert_eq!(received.graph_id.as_deref(), Some("worker"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let (id, mut rx) = bus.subscribe(SubscriptionFilter::default()).await;
        bus.unsubscribe(id).await;
        bus.publish(AgentEvent::new(EventType::ExecutionStarted, Value::Null)).await;
        assert!(rx.try_recv().is_err());
    }
}
