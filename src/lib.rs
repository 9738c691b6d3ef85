//! statescout: systematic exploration of a web application's UI states.
//!
//! A browser driver captures structural page snapshots; snapshots are
//! fingerprinted and deduplicated into a directed state graph of
//! `state --action--> state` transitions. Exploration runs either
//! autonomously ([`engine::ExplorationEngine`], breadth-first under
//! state and depth caps) or interactively
//! ([`session::InteractiveSession`], one action at a time with
//! skip/jump/replay), and sessions persist to versioned JSON. The web
//! layer streams live updates to observers over WebSocket.

pub mod browser;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod graph;
pub mod identity;
pub mod model;
pub mod session;
pub mod util;
pub mod web;

pub use browser::{BrowserDriver, PageSnapshot, RawElement};
pub use config::{ExplorerConfig, InputValueTable};
pub use engine::{ExplorationEngine, ExplorationReport};
pub use error::ExploreError;
pub use graph::StateGraph;
pub use identity::StateRegistry;
pub use model::{
    Action, ActionType, AppState, AvailableAction, ElementKind, ExplorationSession,
    InteractiveElement, StateTransition,
};
pub use session::{ActionOutcome, InteractiveSession, SessionEvent, SessionStore, SESSION_VERSION};
pub use web::{run_server, ServerConfig};
