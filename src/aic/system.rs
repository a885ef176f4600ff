//! System endpoints: `GET /channels`, `GET /health`, `GET /metrics`.

use std::sync::Arc;

use rocket::State;
use serde::Serialize;

use crate::error::{AicResult, Ok as AicOk};
use crate::metrics::Metrics;
use crate::room::registry::{ChannelSummary, RoomRegistry};
use crate::session::SessionStore;

#[derive(Serialize)]
pub struct ListChannelsResponse {
    channels: Vec<ChannelSummary>,
}

/// Exempt from bearer auth: a prospective agent needs this before it
/// has a session to authenticate with.
#[rocket::get("/channels")]
pub async fn list_channels(registry: &State<Arc<RoomRegistry>>) -> AicResult<ListChannelsResponse> {
    Ok(AicOk::new(ListChannelsResponse {
        channels: registry.list_channels(),
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    uptime_secs: u64,
    room_count: usize,
}

#[rocket::get("/health")]
pub async fn health(registry: &State<Arc<RoomRegistry>>, metrics: &State<Arc<Metrics>>) -> AicResult<HealthResponse> {
    Ok(AicOk::new(HealthResponse {
        uptime_secs: metrics.uptime_secs(),
        room_count: registry.room_count(),
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsResponse {
    uptime_secs: u64,
    room_count: usize,
    requests_total: u64,
    requests_errored: u64,
    ticks_run: u64,
    intents_processed: u64,
    events_appended: u64,
    active_sessions: usize,
}

#[rocket::get("/metrics")]
pub async fn metrics(
    registry: &State<Arc<RoomRegistry>>,
    metrics: &State<Arc<Metrics>>,
    sessions: &State<Arc<SessionStore>>,
) -> AicResult<MetricsResponse> {
    Ok(AicOk::new(MetricsResponse {
        uptime_secs: metrics.uptime_secs(),
        room_count: registry.room_count(),
        requests_total: metrics.requests_total(),
        requests_errored: metrics.requests_errored(),
        ticks_run: metrics.ticks_run(),
        intents_processed: metrics.intents_processed(),
        events_appended: metrics.events_appended(),
        active_sessions: sessions.count(),
    }))
}
