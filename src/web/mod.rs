//! Web layer: typed WebSocket protocol and the axum server around it.

pub mod messages;
pub mod server;
pub mod ws;

pub use messages::{ClientMessage, ServerMessage, ServerPayload};
pub use server::{run_server, ServerConfig};
pub use ws::WsState;
