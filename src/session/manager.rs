use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::config::EngineConfig;
use crate::gateway::MarketGateway;
use crate::models::SessionSummary;
use crate::rules::RuleParseError;

use super::session::{BotSession, SessionConfig};

/// In-memory registry of sessions, keyed by id with owner-scoped lookup.
///
/// Stopped sessions stay registered and queryable until process restart;
/// nothing is ever removed.
pub struct SessionManager {
    gateway: Arc<dyn MarketGateway>,
    engine: EngineConfig,
    sessions: Mutex<HashMap<String, Arc<BotSession>>>,
    /// Insertion order, so listings are stable.
    order: Mutex<Vec<String>>,
}

impl SessionManager {
    pub fn new(gateway: Arc<dyn MarketGateway>, engine: EngineConfig) -> Self {
        Self {
            gateway,
            engine,
            sessions: Mutex::new(HashMap::new()),
            order: Mutex::new(Vec::new()),
        }
    }

    /// Construct and start a new session.
    pub fn create_session(&self, config: SessionConfig) -> Result<SessionSummary, RuleParseError> {
        let session = Arc::new(BotSession::new(
            config,
            self.engine.clone(),
            Arc::clone(&self.gateway),
        )?);
        session.start();

        let summary = session.summary();
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id().to_string(), Arc::clone(&session));
        self.order.lock().unwrap().push(session.id().to_string());
        Ok(summary)
    }

    /// Return the owner's existing active session if one exists, otherwise
    /// create one. This is what enforces "at most one active session per
    /// owner", including the default ownerless path (`owner_id = None`).
    pub fn create_or_reuse_session_for_owner(
        &self,
        owner_id: Option<String>,
        mut config: SessionConfig,
    ) -> Result<SessionSummary, RuleParseError> {
        if let Some(existing) = self.find_active_for_owner(owner_id.as_deref()) {
            return Ok(existing.summary());
        }
        config.owner_id = owner_id;
        self.create_session(config)
    }

    /// Stop a session by id. Idempotent: stopping an already-stopped
    /// session returns its last known summary; an unknown id yields `None`.
    pub fn stop_session(&self, id: &str) -> Option<SessionSummary> {
        let session = self.sessions.lock().unwrap().get(id).cloned()?;
        session.stop();
        Some(session.summary())
    }

    /// Stop every session belonging to an owner, returning their summaries.
    pub fn stop_sessions_by_owner(&self, owner_id: Option<&str>) -> Vec<SessionSummary> {
        let owned: Vec<Arc<BotSession>> = {
            let sessions = self.sessions.lock().unwrap();
            let order = self.order.lock().unwrap();
            order
                .iter()
                .filter_map(|id| sessions.get(id))
                .filter(|s| s.owner_id() == owner_id)
                .cloned()
                .collect()
        };

        owned
            .into_iter()
            .map(|session| {
                session.stop();
                session.summary()
            })
            .collect()
    }

    pub fn list_sessions(&self) -> Vec<SessionSummary> {
        let sessions = self.sessions.lock().unwrap();
        let order = self.order.lock().unwrap();
        order
            .iter()
            .filter_map(|id| sessions.get(id))
            .map(|s| s.summary())
            .collect()
    }

    pub fn get_session(&self, id: &str) -> Option<SessionSummary> {
        self.sessions.lock().unwrap().get(id).map(|s| s.summary())
    }

    /// Live handle, for shutdown paths that need to await loop exit.
    pub fn session_handle(&self, id: &str) -> Option<Arc<BotSession>> {
        self.sessions.lock().unwrap().get(id).cloned()
    }

    fn find_active_for_owner(&self, owner_id: Option<&str>) -> Option<Arc<BotSession>> {
        let sessions = self.sessions.lock().unwrap();
        let order = self.order.lock().unwrap();
        order
            .iter()
            .filter_map(|id| sessions.get(id))
            .find(|s| s.owner_id() == owner_id && s.is_active())
            .cloned()
    }
}
