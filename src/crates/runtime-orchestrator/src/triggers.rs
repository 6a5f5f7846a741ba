//! The four trigger sources bound to an entry point's `TriggerConfig`:
//! manual (no background task), timer (cron or fixed interval), event
//! (a filtered `EventBus` subscription), and webhook (an HTTP route
//! registered for the Axum router to dispatch into).
//!
//! Grounded on the teacher's `TaskExecutor` background-loop shape
//! (spawn a task, hold an abort handle, log and continue on a step's
//! error rather than tearing down the loop).

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use cron::Schedule;
use hmac::{Hmac, Mac};
use runtime_core::{EventBus, SharedMemory, SubscriptionFilter};
use sha2::Sha256;
use tokio::task::AbortHandle;

use crate::agent_runtime::AgentRuntime;

/// A webhook entry point resolved by `AgentRuntime::find_webhook_route`,
/// handed to the Axum webhook handler to verify and dispatch a request.
#[derive(Debug, Clone)]
pub struct WebhookRoute {
    pub path: String,
    pub graph_id: String,
    pub entry_point_id: String,
    pub secret: Option<String>,
}

/// A background trigger's handle, stoppable from `AgentRuntime::remove_graph`.
pub struct TriggerTask {
    abort: AbortHandle,
    subscription: Option<runtime_core::SubscriptionId>,
}

impl TriggerTask {
    pub async fn stop(self, event_bus: &EventBus) {
        self.abort.abort();
        if let Some(id) = self.subscription {
            event_bus.unsubscribe(id).await;
        }
    }
}

/// Drives `graph_id`'s `entry_point_id` on a cron schedule or fixed
/// interval. A `StreamError::Busy` result (the prior fire is still
/// running and `maxConcurrent == 1`) is logged and dropped rather than
/// retried: the next scheduled fire is the next opportunity, not a queue.
pub fn spawn_timer_trigger(
    runtime: Arc<AgentRuntime>,
    graph_id: String,
    entry_point_id: String,
    config: runtime_core::TriggerConfig,
) -> TriggerTask {
    let handle = tokio::spawn(async move {
        let schedule = config.cron.as_deref().and_then(|expr| Schedule::from_str(expr).ok());
        loop {
            let sleep_for = match &schedule {
                Some(schedule) => {
                    let now = chrono::Utc::now();
                    match schedule.after(&now).next() {
                        Some(next) => (next - now).to_std().unwrap_or(Duration::from_secs(1)),
                        None => {
                            tracing::warn!(graph_id, entry_point_id, "cron schedule has no future occurrence, stopping");
                            break;
                        }
                    }
                }
                None => Duration::from_secs(config.interval_minutes.unwrap_or(60) * 60),
            };
            tokio::time::sleep(sleep_for).await;

            let result = runtime
                .trigger_continuous(graph_id.clone(), entry_point_id.clone(), SharedMemory::default())
                .await;
            match result {
                Ok(_) => {}
                Err(crate::error::RuntimeError::Stream(runtime_core::StreamError::Busy)) => {
                    tracing::debug!(graph_id, entry_point_id, "timer fire skipped, prior execution still running");
                }
                Err(err) => {
                    tracing::warn!(graph_id, entry_point_id, %err, "timer-triggered execution failed");
                }
            }
        }
    });
    TriggerTask {
        abort: handle.abort_handle(),
        subscription: None,
    }
}

/// Subscribes to the event bus and fires `entry_point_id` whenever an
/// event's type matches `config.event_types`. `SubscriptionFilter`'s
/// `filter_type` only holds a single `EventType`, so the subscription is
/// opened unfiltered-by-type and matching against the configured list is
/// done by hand in the loop below.
pub async fn spawn_event_trigger(
    runtime: Arc<AgentRuntime>,
    graph_id: String,
    entry_point_id: String,
    config: runtime_core::TriggerConfig,
) -> TriggerTask {
    let filter = SubscriptionFilter {
        filter_type: None,
        filter_graph: None,
        filter_stream: config.filter_stream.clone(),
        filter_node: config.filter_node.clone(),
        exclude_own_graph: if config.exclude_own_graph { Some(graph_id.clone()) } else { None },
    };
    let event_bus = runtime.event_bus();
    let (subscription_id, mut rx) = event_bus.subscribe(filter).await;

    let wanted_types = config.event_types.clone();
    let handle = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if !event_type_matches(&event.event_type, &wanted_types) {
                continue;
            }
            let mut input = SharedMemory::default();
            input.insert("triggeringEvent".to_string(), serde_json::to_value(&event).unwrap_or_default());

            let result = runtime
                .trigger(Some(graph_id.clone()), &entry_point_id, input, None)
                .await;
            if let Err(crate::error::RuntimeError::Stream(runtime_core::StreamError::Busy)) = result {
                tracing::debug!(graph_id, entry_point_id, "event fire skipped, prior execution still running");
            } else if let Err(err) = result {
                tracing::warn!(graph_id, entry_point_id, %err, "event-triggered execution failed");
            }
        }
    });
    TriggerTask {
        abort: handle.abort_handle(),
        subscription: Some(subscription_id),
    }
}

fn event_type_matches(event_type: &runtime_core::EventType, wanted: &[String]) -> bool {
    if wanted.is_empty() {
        return true;
    }
    let serialized = serde_json::to_value(event_type).ok();
    let as_str = serialized.as_ref().and_then(|v| v.as_str());
    match as_str {
        Some(s) => wanted.iter().any(|w| w == s),
        None => false,
    }
}

type HmacSha256 = Hmac<Sha256>;

/// Verifies an `X-Hub-Signature-256`-style `sha256=<hex>` header value
/// against `body` using the route's shared secret. A route with no
/// configured secret accepts any payload.
pub fn verify_webhook_signature(secret: Option<&str>, body: &[u8], signature_header: Option<&str>) -> bool {
    let Some(secret) = secret else { return true };
    let Some(header) = signature_header else { return false };
    let hex_sig = header.strip_prefix("sha256=").unwrap_or(header);
    let Ok(expected_bytes) = hex::decode(hex_sig) else { return false };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else { return false };
    mac.update(body);
    mac.verify_slice(&expected_bytes).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_signature_round_trips() {
        let secret = "shh";
        let body = b"{\"hello\":true}";
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        let tag = hex::encode(mac.finalize().into_bytes());
        let header = format!("sha256={}", tag);
        assert!(verify_webhook_signature(Some(secret), body, Some(&header)));
    }

    #[test]
    fn webhook_signature_rejects_wrong_secret() {
        let body = b"payload";
        let mut mac = HmacSha256::new_from_slice(b"right").unwrap();
        mac.update(body);
        let header = format!("sha256={}", hex::encode(mac.finalize().into_bytes()));
        assert!(!verify_webhook_signature(Some("wrong"), body, Some(&header)));
    }

    #[test]
    fn webhook_with_no_secret_accepts_anything() {
        assert!(verify_webhook_signature(None, b"anything", None));
    }

    #[test]
    fn event_type_matching_is_case_exact_against_configured_list() {
        let wanted = vec!["WORKER_ESCALATION_TICKET".to_string()];
        assert!(event_type_matches(&runtime_core::EventType::WorkerEscalationTicket, &wanted));
        assert!(!event_type_matches(&runtime_core::EventType::ExecutionStarted, &wanted));
    }
}
