//! WebSocket transport for live session observation and control.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};

use crate::session::{InteractiveSession, SessionEvent, SessionStore};

use super::messages::{parse_client_message, ClientMessage, ServerMessage, ServerPayload};

const OUTBOUND_CAPACITY: usize = 256;

/// Shared state behind every WebSocket connection.
pub struct WsState {
    pub controller: Arc<InteractiveSession>,
    pub store: SessionStore,
}

/// Handle one WebSocket connection.
///
/// The connection is registered as an observer: a full snapshot is sent
/// first, then change events are forwarded as they are broadcast.
/// Malformed or unknown inbound messages are answered with an error
/// envelope; the connection stays open.
pub async fn handle_websocket(socket: WebSocket, state: Arc<WsState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Channel for sending messages to the WebSocket
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(OUTBOUND_CAPACITY);

    // Spawn task to forward messages to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(j) => j,
                Err(e) => {
                    tracing::error!("Failed to serialize message: {}", e);
                    continue;
                }
            };
            if ws_sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // Subscribe before the initial snapshot so no change is missed.
    let events = state.controller.subscribe();
    if tx.send(connection_init(&state.controller)).await.is_err() {
        send_task.abort();
        return;
    }

    let forward_task = tokio::spawn(forward_events(events, state.clone(), tx.clone()));

    while let Some(result) = ws_receiver.next().await {
        let text = match result {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::error!("WebSocket error: {}", e);
                break;
            }
        };

        let client_msg = match parse_client_message(&text) {
            Ok(m) => m,
            Err(reply) => {
                if tx.send(reply).await.is_err() {
                    break;
                }
                continue;
            }
        };

        if dispatch(&state, &tx, client_msg).await.is_err() {
            break;
        }
    }

    forward_task.abort();
    send_task.abort();
}

/// Forward broadcast session events to one connection. A lagged
/// receiver resynchronizes with a fresh full update instead of
/// disconnecting.
async fn forward_events(
    mut events: broadcast::Receiver<SessionEvent>,
    state: Arc<WsState>,
    tx: mpsc::Sender<ServerMessage>,
) {
    loop {
        let msg = match events.recv().await {
            Ok(SessionEvent::StateChanged) => state_update(&state.controller),
            Ok(SessionEvent::GraphChanged) => graph_update(&state.controller),
            Ok(SessionEvent::SessionSaved { path }) => {
                ServerMessage::new(ServerPayload::SessionSaved { path })
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "Observer lagged; resynchronizing");
                if tx.send(graph_update(&state.controller)).await.is_err() {
                    break;
                }
                state_update(&state.controller)
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        if tx.send(msg).await.is_err() {
            break;
        }
    }
}

/// Err means the outbound channel is gone and the loop should end.
async fn dispatch(
    state: &Arc<WsState>,
    tx: &mpsc::Sender<ServerMessage>,
    msg: ClientMessage,
) -> Result<(), ()> {
    let send = |m: ServerMessage| async move { tx.send(m).await.map_err(|_| ()) };

    match msg {
        ClientMessage::ExecuteAction { action_id } => {
            let payload = match state.controller.execute_action(&action_id).await {
                Ok(outcome) => ServerPayload::ActionResult {
                    success: true,
                    previous_state_id: Some(outcome.previous_state_id),
                    new_state_id: Some(outcome.new_state_id),
                    is_new_state: outcome.is_new_state,
                    error: None,
                },
                Err(err) => ServerPayload::ActionResult {
                    success: false,
                    previous_state_id: None,
                    new_state_id: None,
                    is_new_state: false,
                    error: Some(err.to_string()),
                },
            };
            send(ServerMessage::new(payload)).await
        }

        ClientMessage::SkipAction {
            state_id,
            action_id,
        } => match state.controller.skip_action(&state_id, &action_id) {
            Ok(()) => Ok(()),
            Err(err) => send(ServerMessage::error(err.code(), err.to_string())).await,
        },

        ClientMessage::UnskipAction {
            state_id,
            action_id,
        } => match state.controller.unskip_action(&state_id, &action_id) {
            Ok(()) => Ok(()),
            Err(err) => send(ServerMessage::error(err.code(), err.to_string())).await,
        },

        ClientMessage::JumpToState { state_id } => {
            // Updates reach the client through the event forwarder.
            match state.controller.jump_to_state(&state_id).await {
                Ok(()) => Ok(()),
                Err(err) => send(ServerMessage::error(err.code(), err.to_string())).await,
            }
        }

        ClientMessage::GoToRoot => match state.controller.go_to_root().await {
            Ok(()) => Ok(()),
            Err(err) => send(ServerMessage::error(err.code(), err.to_string())).await,
        },

        ClientMessage::SaveSession { path } => {
            let store = match path {
                Some(path) => SessionStore::new(path),
                None => state.store.clone(),
            };
            let mut session = state.controller.to_session();
            match store.save(&mut session) {
                Ok(written) => {
                    // The broadcast reaches every observer, this client included.
                    state
                        .controller
                        .notify_saved(written.display().to_string());
                    Ok(())
                }
                Err(err) => send(ServerMessage::error(err.code(), err.to_string())).await,
            }
        }

        ClientMessage::RequestState => send(state_update(&state.controller)).await,
    }
}

fn connection_init(controller: &InteractiveSession) -> ServerMessage {
    ServerMessage::new(ServerPayload::ConnectionInit {
        session: controller.to_session(),
        current_state: controller.current_state(),
        available_actions: controller.available_actions(),
    })
}

fn state_update(controller: &InteractiveSession) -> ServerMessage {
    ServerMessage::new(ServerPayload::StateUpdate {
        current_state: controller.current_state(),
        available_actions: controller.available_actions(),
        path_from_root: controller.path_from_root(),
    })
}

fn graph_update(controller: &InteractiveSession) -> ServerMessage {
    ServerMessage::new(ServerPayload::GraphUpdate {
        graph: controller.graph_snapshot(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::mock::MockBrowser;
    use crate::browser::{PageSnapshot, RawElement};
    use crate::config::ExplorerConfig;

    async fn controller() -> Arc<InteractiveSession> {
        let browser = MockBrowser::new().with_page(
            "home",
            PageSnapshot::new("http://app.test/", "home").with_elements(vec![
                RawElement::new("button").with_attr("id", "go").with_text("Go"),
            ]),
        );
        Arc::new(
            InteractiveSession::start(
                Arc::new(browser),
                ExplorerConfig::default(),
                "http://app.test/",
            )
            .await
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_connection_init_carries_full_snapshot() {
        let controller = controller().await;
        let json = serde_json::to_value(connection_init(&controller)).unwrap();
        assert_eq!(json["type"], "connection_init");
        assert_eq!(json["payload"]["session"]["appUrl"], "http://app.test/");
        assert_eq!(
            json["payload"]["currentState"]["id"],
            json["payload"]["session"]["currentStateId"]
        );
        assert_eq!(json["payload"]["availableActions"][0]["id"], "action_0");
    }

    #[tokio::test]
    async fn test_state_update_includes_path_from_root() {
        let controller = controller().await;
        let json = serde_json::to_value(state_update(&controller)).unwrap();
        assert_eq!(json["type"], "state_update");
        assert_eq!(json["payload"]["pathFromRoot"][0], "state_001");
    }
}
