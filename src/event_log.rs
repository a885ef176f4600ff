//! Event Log: a per-room append-only ring of event envelopes with
//! monotonic cursors and long-poll waiters.
//!
//! Owned exclusively by one room, so it is only ever touched from the
//! room actor's single-writer context — no internal locking beyond
//! what's needed to let `wait()` callers park on a `oneshot` while the
//! actor keeps running.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub cursor: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub room_id: String,
    pub ts_ms: i64,
    pub payload: serde_json::Value,
}

struct Retained {
    envelope: Envelope,
    cursor_num: u64,
    retained_at: Instant,
}

pub struct EventLog {
    room_id: String,
    capacity: usize,
    ttl: Duration,
    next_cursor: AtomicU64,
    ring: VecDeque<Retained>,
    waiters: Vec<(u64, oneshot::Sender<()>)>,
}

impl EventLog {
    pub fn new(room_id: impl Into<String>, capacity: usize, ttl: Duration) -> Self {
        Self {
            room_id: room_id.into(),
            capacity,
            ttl,
            next_cursor: AtomicU64::new(1),
            ring: VecDeque::with_capacity(capacity),
            waiters: Vec::new(),
        }
    }

    /// Assigns the next cursor, stamps `ts_ms`, appends, and wakes every
    /// waiter whose threshold this event crosses.
    pub fn append(&mut self, event_type: impl Into<String>, payload: serde_json::Value) -> Envelope {
        let cursor_num = self.next_cursor.fetch_add(1, Ordering::SeqCst);
        let envelope = Envelope {
            cursor: cursor_num.to_string(),
            event_type: event_type.into(),
            room_id: self.room_id.clone(),
            ts_ms: now_ms(),
            payload,
        };

        if self.ring.len() >= self.capacity {
            self.ring.pop_front();
        }
        self.ring.push_back(Retained {
            envelope: envelope.clone(),
            cursor_num,
            retained_at: Instant::now(),
        });

        self.evict_expired();

        let mut still_waiting = Vec::with_capacity(self.waiters.len());
        for (threshold, tx) in self.waiters.drain(..) {
            if cursor_num > threshold {
                let _ = tx.send(());
            } else {
                still_waiting.push((threshold, tx));
            }
        }
        self.waiters = still_waiting;

        envelope
    }

    fn evict_expired(&mut self) {
        let ttl = self.ttl;
        while let Some(front) = self.ring.front() {
            if front.retained_at.elapsed() > ttl {
                self.ring.pop_front();
            } else {
                break;
            }
        }
    }

    fn oldest_cursor(&self) -> Option<u64> {
        self.ring.front().map(|r| r.cursor_num)
    }

    /// Returns up to `limit` envelopes strictly after `cursor`. An empty
    /// `cursor` means "from the current tail" (returns no events, but the
    /// caller's `nextCursor` becomes the current head). `cursor_expired`
    /// is true when `cursor` is older than the oldest retained event.
    pub fn since(&self, cursor: Option<&str>, limit: usize) -> (Vec<Envelope>, String, bool) {
        let requested: Option<u64> = cursor.and_then(|c| c.parse::<u64>().ok());

        let tail = self.next_cursor.load(Ordering::SeqCst) - 1;

        let Some(since_cursor) = requested else {
            return (Vec::new(), tail.to_string(), false);
        };

        // The cursor is expired if it predates everything still retained
        // (whether by ring-capacity eviction or TTL eviction) while the
        // room has actually produced events that old.
        let expired = match self.oldest_cursor() {
            Some(oldest) => since_cursor < oldest,
            None => since_cursor < tail && tail > 0,
        };

        let events: Vec<Envelope> = self
            .ring
            .iter()
            .filter(|r| r.cursor_num > since_cursor)
            .take(limit)
            .map(|r| r.envelope.clone())
            .collect();

        let next = events
            .last()
            .map(|e| e.cursor.clone())
            .unwrap_or_else(|| since_cursor.to_string());

        (events, next, expired)
    }

    /// Registers a single-shot waiter that fires once an event with
    /// `cursor' > cursor` is appended. Returns a receiver the caller
    /// awaits with its own timeout; dropping the receiver before it
    /// fires releases the waiter slot without emitting (handled lazily:
    /// a dead sender is simply ignored on the next `append`).
    pub fn register_waiter(&mut self, since_cursor: u64) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.waiters.push((since_cursor, tx));
        rx
    }

    pub fn tail_cursor(&self) -> u64 {
        self.next_cursor.load(Ordering::SeqCst).saturating_sub(1)
    }
}

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
