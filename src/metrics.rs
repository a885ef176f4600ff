//! Process metrics: a small counter set surfaced by
//! `GET /aic/v0.1/metrics`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rocket::fairing::{Fairing, Info, Kind};
use rocket::{Request, Response};

pub struct Metrics {
    started_at: Instant,
    requests_total: AtomicU64,
    requests_errored: AtomicU64,
    ticks_run: AtomicU64,
    intents_processed: AtomicU64,
    events_appended: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            requests_total: AtomicU64::new(0),
            requests_errored: AtomicU64::new(0),
            ticks_run: AtomicU64::new(0),
            intents_processed: AtomicU64::new(0),
            events_appended: AtomicU64::new(0),
        }
    }

    pub fn record_request(&self, ok: bool) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.requests_errored.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_tick(&self) {
        self.ticks_run.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_intent(&self) {
        self.intents_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_events(&self, count: u64) {
        self.events_appended.fetch_add(count, Ordering::Relaxed);
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn requests_errored(&self) -> u64 {
        self.requests_errored.load(Ordering::Relaxed)
    }

    pub fn ticks_run(&self) -> u64 {
        self.ticks_run.load(Ordering::Relaxed)
    }

    pub fn intents_processed(&self) -> u64 {
        self.intents_processed.load(Ordering::Relaxed)
    }

    pub fn events_appended(&self) -> u64 {
        self.events_appended.load(Ordering::Relaxed)
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts every response that leaves the process, keyed on managed
/// state rather than a handler-local counter so it covers routes
/// (including 404s) without threading `&State<Arc<Metrics>>` through
/// each one.
pub struct MetricsFairing;

#[rocket::async_trait]
impl Fairing for MetricsFairing {
    fn info(&self) -> Info {
        Info {
            name: "Request Metrics",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        if let Some(metrics) = request.rocket().state::<Arc<Metrics>>() {
            metrics.record_request(response.status().code < 400);
        }
    }
}
