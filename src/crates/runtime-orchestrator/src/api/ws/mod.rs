//! `Subscribe`: the WebSocket endpoint backing the Runtime RPC surface's
//! event stream. Forwards `AgentEvent`s published on the shared
//! `EventBus` to the client as JSON text frames, narrowed by the
//! connection's query-string filter.
//!
//! Grounded on the teacher's `ws::handler` upgrade shape, replacing its
//! `broadcast::Sender<WsEvent>` fan-out (a fixed, hand-rolled event enum)
//! with a direct `EventBus::subscribe` filtered by `SubscriptionFilter`.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use crate::api::routes::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SubscribeQuery {
    #[serde(default)]
    pub graph_id: Option<String>,
    #[serde(default)]
    pub stream_id: Option<String>,
    #[serde(default)]
    pub node_id: Option<String>,
}

pub async fn handler(
    State(state): State<AppState>,
    Query(query): Query<SubscribeQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve(socket, state, query))
}

async fn serve(mut socket: WebSocket, state: AppState, query: SubscribeQuery) {
    let filter = runtime_core::SubscriptionFilter {
        filter_type: None,
        filter_graph: query.graph_id,
        filter_stream: query.stream_id,
        filter_node: query.node_id,
        exclude_own_graph: None,
    };
    let (subscription_id, mut rx) = state.runtime.event_bus().subscribe(filter).await;

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Some(event) => {
                        let text = match serde_json::to_string(&event) {
                            Ok(text) => text,
                            Err(err) => {
                                tracing::warn!(%err, "failed to serialize event for websocket client");
                                continue;
                            }
                        };
                        if socket.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    state.runtime.event_bus().unsubscribe(subscription_id).await;
}
