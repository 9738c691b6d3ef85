//! Typed envelopes for the live observer protocol.
//!
//! Every message on the wire is `{type, timestamp, payload}`. The
//! payload enum is adjacently tagged and flattened next to the
//! timestamp so serde produces the envelope directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{
    AppState, AvailableAction, ExplorationSession, GraphSnapshot, StateId,
};

/// Server-to-client payloads.
#[derive(Debug, Clone, Serialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ServerPayload {
    /// Full snapshot sent once to each newly-registered observer.
    ConnectionInit {
        session: ExplorationSession,
        current_state: Option<AppState>,
        available_actions: Vec<AvailableAction>,
    },
    StateUpdate {
        current_state: Option<AppState>,
        available_actions: Vec<AvailableAction>,
        path_from_root: Vec<StateId>,
    },
    GraphUpdate {
        graph: GraphSnapshot,
    },
    ActionResult {
        success: bool,
        previous_state_id: Option<StateId>,
        new_state_id: Option<StateId>,
        is_new_state: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Error {
        message: String,
        code: String,
    },
    SessionSaved {
        path: String,
    },
}

/// Server-to-client envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ServerMessage {
    #[serde(flatten)]
    pub payload: ServerPayload,
    pub timestamp: DateTime<Utc>,
}

impl ServerMessage {
    pub fn new(payload: ServerPayload) -> Self {
        Self {
            payload,
            timestamp: Utc::now(),
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ServerPayload::Error {
            message: message.into(),
            code: code.into(),
        })
    }
}

/// Client-to-server payloads.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    ExecuteAction { action_id: String },
    SkipAction { state_id: StateId, action_id: String },
    UnskipAction { state_id: StateId, action_id: String },
    JumpToState { state_id: StateId },
    GoToRoot,
    SaveSession {
        #[serde(default)]
        path: Option<String>,
    },
    RequestState,
}

const CLIENT_MESSAGE_TYPES: &[&str] = &[
    "execute_action",
    "skip_action",
    "unskip_action",
    "jump_to_state",
    "go_to_root",
    "save_session",
    "request_state",
];

/// Parse an incoming frame, distinguishing malformed JSON / payloads
/// from unknown message types. Either way the connection stays open and
/// the caller replies with the returned error envelope.
pub fn parse_client_message(text: &str) -> Result<ClientMessage, ServerMessage> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| ServerMessage::error("malformed_message", format!("Invalid JSON: {e}")))?;

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    serde_json::from_value::<ClientMessage>(value).map_err(|e| {
        if CLIENT_MESSAGE_TYPES.contains(&kind.as_str()) {
            ServerMessage::error("malformed_message", format!("Invalid payload: {e}"))
        } else {
            ServerMessage::error("unknown_message_type", format!("Unknown message type: {kind:?}"))
        }
    })
}
