//! Safety Registry: reports, reciprocal blocks, and timed mutes.
//! Process-wide, a small `Mutex`-guarded tracker in the same shape as
//! the server's other small shared-state registries.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::event_log::now_ms;
use crate::ids::new_message_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Reviewed,
    Resolved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub reporter: String,
    pub target: String,
    pub reason: String,
    pub status: ReportStatus,
    pub created_at_ms: i64,
}

struct MuteRecord {
    by: String,
    expires_at: Option<i64>,
}

pub struct SafetyRegistry {
    reports: RwLock<Vec<Report>>,
    blocks: RwLock<HashSet<(String, String)>>,
    mutes: RwLock<HashMap<(String, String), MuteRecord>>,
}

impl SafetyRegistry {
    pub fn new() -> Self {
        Self {
            reports: RwLock::new(Vec::new()),
            blocks: RwLock::new(HashSet::new()),
            mutes: RwLock::new(HashMap::new()),
        }
    }

    pub fn report(&self, reporter: &str, target: &str, reason: &str) -> Report {
        let report = Report {
            id: new_message_id(),
            reporter: reporter.to_string(),
            target: target.to_string(),
            reason: reason.to_string(),
            status: ReportStatus::Pending,
            created_at_ms: now_ms(),
        };
        self.reports.write().unwrap().push(report.clone());
        report
    }

    pub fn transition_report(&self, report_id: &str, status: ReportStatus) -> bool {
        let mut reports = self.reports.write().unwrap();
        if let Some(r) = reports.iter_mut().find(|r| r.id == report_id) {
            r.status = status;
            true
        } else {
            false
        }
    }

    /// One-directional: `a` blocks `b`. `is_blocked` checks this exact
    /// direction; `is_blocked_either_way` checks both.
    pub fn block(&self, a: &str, b: &str) {
        self.blocks
            .write()
            .unwrap()
            .insert((a.to_string(), b.to_string()));
    }

    pub fn unblock(&self, a: &str, b: &str) {
        self.blocks
            .write()
            .unwrap()
            .remove(&(a.to_string(), b.to_string()));
    }

    pub fn is_blocked(&self, a: &str, b: &str) -> bool {
        self.blocks
            .read()
            .unwrap()
            .contains(&(a.to_string(), b.to_string()))
    }

    pub fn is_blocked_either_way(&self, a: &str, b: &str) -> bool {
        self.is_blocked(a, b) || self.is_blocked(b, a)
    }

    /// Muting the same `(org, target)` replaces any prior record.
    pub fn mute(&self, org_id: &str, target: &str, by: &str, duration_ms: Option<i64>) {
        let expires_at = duration_ms.map(|d| now_ms() + d);
        self.mutes.write().unwrap().insert(
            (org_id.to_string(), target.to_string()),
            MuteRecord {
                by: by.to_string(),
                expires_at,
            },
        );
    }

    pub fn is_muted(&self, org_id: &str, target: &str) -> bool {
        let mutes = self.mutes.read().unwrap();
        match mutes.get(&(org_id.to_string(), target.to_string())) {
            None => false,
            Some(record) => match record.expires_at {
                Some(exp) => now_ms() < exp,
                None => true,
            },
        }
    }

    pub fn muted_by(&self, org_id: &str, target: &str) -> Option<String> {
        self.mutes
            .read()
            .unwrap()
            .get(&(org_id.to_string(), target.to_string()))
            .map(|r| r.by.clone())
    }
}

impl Default for SafetyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_is_directional_but_either_way_checks_both() {
        let reg = SafetyRegistry::new();
        reg.block("a", "b");
        assert!(reg.is_blocked("a", "b"));
        assert!(!reg.is_blocked("b", "a"));
        assert!(reg.is_blocked_either_way("b", "a"));
    }

    #[test]
    fn mute_expires() {
        let reg = SafetyRegistry::new();
        reg.mute("org", "agt_x", "mod", Some(-1)); // already expired
        assert!(!reg.is_muted("org", "agt_x"));
        reg.mute("org", "agt_x", "mod", None);
        assert!(reg.is_muted("org", "agt_x"));
    }

    #[test]
    fn remuting_replaces_prior_record() {
        let reg = SafetyRegistry::new();
        reg.mute("org", "agt_x", "mod1", None);
        reg.mute("org", "agt_x", "mod2", Some(-1));
        assert_eq!(reg.muted_by("org", "agt_x"), Some("mod2".to_string()));
        assert!(!reg.is_muted("org", "agt_x"));
    }
}
