//! Idempotency Cache: `(agentId, txId)` keyed memoization of AIC
//! responses, with conflict detection via a digest of the request body.
//! Process-wide and sharded (`dashmap`) so no single lock serializes
//! every agent's retries.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use sha2::{Digest, Sha256};

struct Record {
    digest: String,
    result: serde_json::Value,
    created_at: Instant,
}

pub struct IdempotencyCache {
    ttl: Duration,
    entries: DashMap<(String, String), Record>,
}

pub enum LookupResult {
    /// No prior record (or it expired): the caller should process the
    /// request and call `store`.
    Fresh,
    /// Same `(agentId, txId)` with a matching digest: replay this result.
    Replay(serde_json::Value),
    /// Same `(agentId, txId)` with a different request body.
    Conflict,
}

impl IdempotencyCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    pub fn digest(body: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(body);
        hex::encode(hasher.finalize())
    }

    pub fn lookup(&self, agent_id: &str, tx_id: &str, digest: &str) -> LookupResult {
        let key = (agent_id.to_string(), tx_id.to_string());
        let Some(record) = self.entries.get(&key) else {
            return LookupResult::Fresh;
        };
        if record.created_at.elapsed() > self.ttl {
            drop(record);
            self.entries.remove(&key);
            return LookupResult::Fresh;
        }
        if record.digest == digest {
            LookupResult::Replay(record.result.clone())
        } else {
            LookupResult::Conflict
        }
    }

    pub fn store(&self, agent_id: &str, tx_id: &str, digest: &str, result: serde_json::Value) {
        self.entries.insert(
            (agent_id.to_string(), tx_id.to_string()),
            Record {
                digest: digest.to_string(),
                result,
                created_at: Instant::now(),
            },
        );
    }

    /// Drops expired entries; intended to run off a periodic background
    /// sweep so the map doesn't grow unbounded under long-lived agents.
    pub fn sweep_expired(&self) {
        let ttl = self.ttl;
        self.entries.retain(|_, record| record.created_at.elapsed() <= ttl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_identical_body_and_conflicts_on_mismatch() {
        let cache = IdempotencyCache::new(Duration::from_secs(600));
        let digest = IdempotencyCache::digest(b"{\"dest\":{\"tx\":5,\"ty\":5}}");
        assert!(matches!(
            cache.lookup("agt_a", "tx_abcdef12", &digest),
            LookupResult::Fresh
        ));
        cache.store(
            "agt_a",
            "tx_abcdef12",
            &digest,
            serde_json::json!({"result": "accepted"}),
        );
        assert!(matches!(
            cache.lookup("agt_a", "tx_abcdef12", &digest),
            LookupResult::Replay(_)
        ));

        let other_digest = IdempotencyCache::digest(b"{\"dest\":{\"tx\":6,\"ty\":5}}");
        assert!(matches!(
            cache.lookup("agt_a", "tx_abcdef12", &other_digest),
            LookupResult::Conflict
        ));
    }

    #[test]
    fn expired_entries_are_treated_as_fresh() {
        let cache = IdempotencyCache::new(Duration::from_millis(0));
        let digest = IdempotencyCache::digest(b"body");
        cache.store("agt_a", "tx_abcdef12", &digest, serde_json::json!({}));
        std::thread::sleep(Duration::from_millis(5));
        assert!(matches!(
            cache.lookup("agt_a", "tx_abcdef12", &digest),
            LookupResult::Fresh
        ));
    }
}
