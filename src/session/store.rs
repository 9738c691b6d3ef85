//! Versioned session persistence.
//!
//! Sessions are stored as a JSON envelope stamped with a schema
//! version. Loading a pre-versioned payload migrates it by filling
//! every missing field with a defined default and never fails; loading
//! a payload written by a newer version fails fatally with no partial
//! recovery. Writes are not atomic; a crash mid-write can corrupt the
//! file, which is an accepted limitation.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::Value;

use crate::error::ExploreError;
use crate::model::ExplorationSession;
use crate::util;

/// Current session schema version.
pub const SESSION_VERSION: u32 = 1;

/// File-backed store for one session.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default store location for an application URL:
    /// `<data dir>/sessions/<sanitized host>.json`.
    pub fn default_path(app_url: &str) -> PathBuf {
        util::sessions_dir().join(format!("{}.json", util::sanitize_host(app_url)))
    }

    pub fn for_app(app_url: &str) -> Self {
        Self::new(Self::default_path(app_url))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored session, migrating forward when needed.
    pub fn load(&self) -> Result<ExplorationSession, ExploreError> {
        let raw = fs::read_to_string(&self.path)?;
        let value: Value = serde_json::from_str(&raw)?;

        let found = value
            .get("version")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32;
        if found > SESSION_VERSION {
            return Err(ExploreError::VersionIncompatible {
                found,
                supported: SESSION_VERSION,
            });
        }
        if found == 0 {
            tracing::info!(path = %self.path.display(), "Migrating pre-versioned session");
            return Ok(migrate_unversioned(value));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Write the session, refreshing `last_updated_at` first. Creates
    /// the destination directory if needed. Returns the path written.
    pub fn save(&self, session: &mut ExplorationSession) -> Result<PathBuf, ExploreError> {
        session.last_updated_at = Utc::now();
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(session)?;
        fs::write(&self.path, json)?;
        tracing::debug!(path = %self.path.display(), "Session saved");
        Ok(self.path.clone())
    }
}

/// Migrate a payload with no (or zero) version: every required field is
/// filled with a defined default and the result is stamped with the
/// current version. Never fails.
fn migrate_unversioned(value: Value) -> ExplorationSession {
    let app_url = value
        .get("appUrl")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let mut session = ExplorationSession::empty(app_url, SESSION_VERSION);

    if let Some(id) = value.get("id").and_then(Value::as_str) {
        session.id = id.to_string();
    }
    if let Some(created) = value
        .get("createdAt")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
    {
        session.created_at = created;
    }
    if let Some(updated) = value
        .get("lastUpdatedAt")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
    {
        session.last_updated_at = updated;
    }
    session.current_state_id = value
        .get("currentStateId")
        .and_then(Value::as_str)
        .map(String::from);
    session.entry_state_id = value
        .get("entryStateId")
        .and_then(Value::as_str)
        .map(String::from);

    if let Some(graph) = value
        .get("stateGraph")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
    {
        session.state_graph = graph;
    }
    if let Some(skipped) = value
        .get("skippedActions")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
    {
        session.skipped_actions = skipped;
    }
    if let Some(history) = value
        .get("explorationHistory")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
    {
        session.exploration_history = history;
    }
    if let Some(explored) = value
        .get("exploredActions")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
    {
        session.explored_actions = explored;
    }

    session
}
