//! Session & Auth: agent registration, bearer tokens, heartbeat,
//! reconnect. Process-wide and sharded (`dashmap`) so no single lock
//! serializes every agent's requests.

use dashmap::DashMap;

use crate::event_log::now_ms;
use crate::ids::new_session_token;

#[derive(Debug, Clone)]
pub struct Session {
    pub agent_id: String,
    pub room_id: String,
    pub token: String,
    pub last_heartbeat_ms: i64,
}

pub struct SessionStore {
    by_agent: DashMap<String, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            by_agent: DashMap::new(),
        }
    }

    pub fn register(&self, agent_id: &str, room_id: &str) -> Session {
        let session = Session {
            agent_id: agent_id.to_string(),
            room_id: room_id.to_string(),
            token: new_session_token(),
            last_heartbeat_ms: now_ms(),
        };
        self.by_agent.insert(agent_id.to_string(), session.clone());
        session
    }

    /// Validates `token` against the stored session for `agent_id`,
    /// returning the session (and bumping `lastHeartbeatMs`, since a
    /// successful authenticated request counts as a heartbeat too).
    pub fn authenticate(&self, agent_id: &str, token: &str) -> Option<Session> {
        let mut entry = self.by_agent.get_mut(agent_id)?;
        if entry.token != token {
            return None;
        }
        entry.last_heartbeat_ms = now_ms();
        Some(entry.clone())
    }

    pub fn reconnect(&self, agent_id: &str, token: &str) -> Option<Session> {
        self.authenticate(agent_id, token)
    }

    pub fn heartbeat(&self, agent_id: &str) -> Option<Session> {
        let mut entry = self.by_agent.get_mut(agent_id)?;
        entry.last_heartbeat_ms = now_ms();
        Some(entry.clone())
    }

    pub fn unregister(&self, agent_id: &str) -> Option<Session> {
        self.by_agent.remove(agent_id).map(|(_, s)| s)
    }

    pub fn count(&self) -> usize {
        self.by_agent.len()
    }

    pub fn get(&self, agent_id: &str) -> Option<Session> {
        self.by_agent.get(agent_id).map(|s| s.clone())
    }

    /// Agents whose last heartbeat predates `now - timeout_ms`.
    pub fn timed_out(&self, timeout_ms: i64) -> Vec<Session> {
        let now = now_ms();
        self.by_agent
            .iter()
            .filter(|entry| now - entry.last_heartbeat_ms > timeout_ms)
            .map(|entry| entry.clone())
            .collect()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
