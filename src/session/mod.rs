//! Interactive session: manually-steppable exploration with a single
//! mutation lock, observer notifications, and versioned persistence.

pub mod controller;
pub mod store;

pub use controller::{ActionOutcome, InteractiveSession, SessionEvent};
pub use store::{SessionStore, SESSION_VERSION};
